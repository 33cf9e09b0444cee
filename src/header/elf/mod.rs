//! Implementation of the ELF file header. This header is located at the
//! beginning of the ELF object file and is the only header type in the ELF
//! specification which must be located at a specific offset (0) in the file.

use std::io::{Read, Seek, Write};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use typed_builder::TypedBuilder;

use crate::{
    base::{ElfAddr, ElfHalf, ElfOff, ElfWord},
    error::Error,
    Config, FromReader, HasWrittenSize, ToWriter,
};

use self::identification::ElfHeaderIdentifier;

pub mod identification;

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The ELF object type. The OS-specific range of types is [0xfe00, 0xfeff]
/// and the processor-specific range of types is [0xff00, 0xffff]; neither is
/// decoded here.
pub enum ElfType {
    /// No file type
    None = 0,
    /// Relocatable file type
    Relocatable = 1,
    /// Executable file type
    Executable = 2,
    /// Shared object file type
    Dynamic = 3,
    /// Core file
    Core = 4,
}

impl<R> FromReader<R> for ElfType
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        let ty = ElfHalf::from_reader_with(reader, config)?;
        Self::from_u16(ty.0).ok_or(Error::InvalidType { value: ty.0 })
    }
}

impl<W> ToWriter<W> for ElfType
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        ElfHalf(*self as u16).to_writer(writer)
    }
}

impl HasWrittenSize for ElfType {
    const SIZE: usize = ElfHalf::SIZE;
}

#[allow(non_camel_case_types)]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The ELF object's machine. Only machines this toolkit has met in the wild
/// are represented; an unknown value is a decode error rather than a silent
/// pass-through.
pub enum ElfMachine {
    /// No machine
    NONE = 0,
    /// SPARC
    SPARC = 2,
    /// Intel 80386
    I386 = 3,
    /// Motorola 68000
    M68K = 4,
    /// MIPS I Architecture
    MIPS = 8,
    /// Hewlett-Packard PA-RISC
    PARISC = 15,
    /// PowerPC
    PPC = 20,
    /// 64-bit PowerPC
    PPC64 = 21,
    /// IBM System/390 Processor
    S390 = 22,
    /// ARM 32-bit architecture (AARCH32)
    ARM = 40,
    /// Hitachi SH
    SH = 42,
    /// Intel IA-64 processor architecture
    IA_64 = 50,
    /// AMD x86-64 architecture
    X86_64 = 62,
    /// ARM 64-bit architecture (AARCH64)
    AARCH64 = 183,
    /// RISC-V
    RISCV = 243,
    /// Linux BPF in-kernel virtual machine
    BPF = 247,
}

impl<R> FromReader<R> for ElfMachine
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        let machine = ElfHalf::from_reader_with(reader, config)?;
        Self::from_u16(machine.0).ok_or(Error::InvalidMachine { value: machine.0 })
    }
}

impl<W> ToWriter<W> for ElfMachine
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        ElfHalf(*self as u16).to_writer(writer)
    }
}

impl HasWrittenSize for ElfMachine {
    const SIZE: usize = ElfHalf::SIZE;
}

#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
/// The ELF file header (Elf64_Ehdr). Decoding validates the identification
/// block and the structure sizes the rest of the model relies on: the header
/// itself is 64 bytes, section header entries are 64 bytes, and program
/// header entries are 56 bytes.
pub struct ElfHeader {
    #[builder(default = ElfHeaderIdentifier::builder().build())]
    /// The identification block
    pub ident: ElfHeaderIdentifier,
    #[builder(default = ElfType::Executable)]
    /// The object file type
    pub r#type: ElfType,
    #[builder(default = ElfMachine::X86_64)]
    /// The machine the object targets
    pub machine: ElfMachine,
    #[builder(default = ElfWord(1))]
    /// The object file version, always 1
    pub version: ElfWord,
    #[builder(default)]
    /// The virtual address execution transfers to, or 0
    pub entry: ElfAddr,
    #[builder(default)]
    /// The file offset of the program header table, or 0
    pub program_header_offset: ElfOff,
    #[builder(default)]
    /// The file offset of the section header table, or 0
    pub section_header_offset: ElfOff,
    #[builder(default)]
    /// Processor-specific flags
    pub flags: ElfWord,
    #[builder(default = ElfHalf(ElfHeader::SIZE as u16))]
    /// The size of this header in bytes
    pub header_size: ElfHalf,
    #[builder(default = ElfHalf(ElfHeader::PROGRAM_HEADER_ENTRY_SIZE))]
    /// The size of one program header table entry
    pub program_header_entry_size: ElfHalf,
    #[builder(default)]
    /// The number of program header table entries
    pub program_header_count: ElfHalf,
    #[builder(default = ElfHalf(ElfHeader::SECTION_HEADER_ENTRY_SIZE))]
    /// The size of one section header table entry
    pub section_header_entry_size: ElfHalf,
    #[builder(default)]
    /// The number of section header table entries
    pub section_header_count: ElfHalf,
    #[builder(default)]
    /// The section table index of the section name string table
    pub section_name_table_index: ElfHalf,
}

impl ElfHeader {
    /// The size of one section header table entry in a 64-bit object
    pub const SECTION_HEADER_ENTRY_SIZE: u16 = 64;
    /// The size of one program header table entry in a 64-bit object
    pub const PROGRAM_HEADER_ENTRY_SIZE: u16 = 56;
}

impl<R> FromReader<R> for ElfHeader
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        let ident = ElfHeaderIdentifier::from_reader_with(reader, config)?;
        let r#type = ElfType::from_reader_with(reader, config)?;
        let machine = ElfMachine::from_reader_with(reader, config)?;
        let version = ElfWord::from_reader_with(reader, config)?;
        let entry = ElfAddr::from_reader_with(reader, config)?;
        let program_header_offset = ElfOff::from_reader_with(reader, config)?;
        let section_header_offset = ElfOff::from_reader_with(reader, config)?;
        let flags = ElfWord::from_reader_with(reader, config)?;
        let header_size = ElfHalf::from_reader_with(reader, config)?;
        let program_header_entry_size = ElfHalf::from_reader_with(reader, config)?;
        let program_header_count = ElfHalf::from_reader_with(reader, config)?;
        let section_header_entry_size = ElfHalf::from_reader_with(reader, config)?;
        let section_header_count = ElfHalf::from_reader_with(reader, config)?;
        let section_name_table_index = ElfHalf::from_reader_with(reader, config)?;

        if header_size.0 != Self::SIZE as u16 {
            return Err(Error::InvalidHeaderSize {
                size: header_size.0,
                expected: Self::SIZE as u16,
            });
        }

        if section_header_count.0 != 0
            && section_header_entry_size.0 != Self::SECTION_HEADER_ENTRY_SIZE
        {
            return Err(Error::InvalidSectionEntrySize {
                size: section_header_entry_size.0,
                expected: Self::SECTION_HEADER_ENTRY_SIZE,
            });
        }

        if program_header_count.0 != 0
            && program_header_entry_size.0 != Self::PROGRAM_HEADER_ENTRY_SIZE
        {
            return Err(Error::InvalidProgramEntrySize {
                size: program_header_entry_size.0,
                expected: Self::PROGRAM_HEADER_ENTRY_SIZE,
            });
        }

        Ok(Self {
            ident,
            r#type,
            machine,
            version,
            entry,
            program_header_offset,
            section_header_offset,
            flags,
            header_size,
            program_header_entry_size,
            program_header_count,
            section_header_entry_size,
            section_header_count,
            section_name_table_index,
        })
    }
}

impl<W> ToWriter<W> for ElfHeader
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.ident.to_writer(writer)?;
        self.r#type.to_writer(writer)?;
        self.machine.to_writer(writer)?;
        self.version.to_writer(writer)?;
        self.entry.to_writer(writer)?;
        self.program_header_offset.to_writer(writer)?;
        self.section_header_offset.to_writer(writer)?;
        self.flags.to_writer(writer)?;
        self.header_size.to_writer(writer)?;
        self.program_header_entry_size.to_writer(writer)?;
        self.program_header_count.to_writer(writer)?;
        self.section_header_entry_size.to_writer(writer)?;
        self.section_header_count.to_writer(writer)?;
        self.section_name_table_index.to_writer(writer)
    }
}

impl HasWrittenSize for ElfHeader {
    const SIZE: usize = 64;
}
