//! Implementation of the ELF section header, the link-time view of an object
//! file. A [`Section`] is a value-like wrapper over one Elf64_Shdr record;
//! its data chunk is vended by the owning [`Elf`](crate::elf::Elf), never
//! held by the section itself.

use std::io::{Cursor, Read, Seek, Write};

use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use typed_builder::TypedBuilder;

use crate::{
    base::{ElfAddr, ElfOff, ElfWord, ElfXword},
    chunk::Chunk,
    error::Error,
    Config, FromReader, HasWrittenSize, ToWriter,
};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The type of an ELF section, i.e. its contents and semantics
pub enum SectionType {
    /// Marks the section header as inactive; it does not have an associated
    /// section
    Null = 0,
    /// Holds information defined by the program, whose format and meaning are
    /// determined solely by the program
    ProgramBits = 1,
    /// Holds a symbol table for link editing. As a complete symbol table, it
    /// may contain many symbols unnecessary for dynamic linking.
    SymbolTable = 2,
    /// Holds a string table; an object file may have multiple string table
    /// sections
    StringTable = 3,
    /// Holds relocation entries with explicit addends (Elf64_Rela)
    RelocationAddend = 4,
    /// Holds a symbol hash table
    Hash = 5,
    /// Holds information for dynamic linking
    Dynamic = 6,
    /// Holds information that marks the file in some way
    Note = 7,
    /// Occupies no space in the file but otherwise resembles `ProgramBits`;
    /// its offset member holds the conceptual file placement
    NoBits = 8,
    /// Holds relocation entries without explicit addends (Elf64_Rel)
    Relocation = 9,
    /// Reserved with unspecified semantics
    SectionHeaderLibrary = 10,
    /// Holds a minimal set of dynamic linking symbols
    DynamicSymbolTable = 11,
    /// Holds an array of pointers to initialization functions
    InitializerArray = 14,
    /// Holds an array of pointers to termination functions
    FinalizerArray = 15,
    /// Holds an array of pointers to functions invoked before all other
    /// initialization functions
    PreInitializerArray = 16,
    /// Defines a section group, a set of sections that must be treated
    /// specially by the linker
    Group = 17,
    /// Holds the extended section indexes associated with a symbol table
    SymbolTableSectionIndexes = 18,
    /// RELR relative relocations
    RelR = 19,
    /// GNU object attributes
    GnuAttributes = 0x6ffffff5,
    /// GNU-style symbol hash table
    GnuHash = 0x6ffffff6,
    /// List of prelink dependencies
    GnuLibList = 0x6ffffff7,
    /// Versions defined by the file
    GnuVerDef = 0x6ffffffd,
    /// Versions needed by the file
    GnuVerNeed = 0x6ffffffe,
    /// Symbol versions
    GnuVerSym = 0x6fffffff,
    /// Unwind table
    X86_64Unwind = 0x70000001,
}

impl<R> FromReader<R> for SectionType
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        let ty = ElfWord::from_reader_with(reader, config)?;
        Self::from_u32(ty.0).ok_or(Error::InvalidSectionType { value: ty.0 })
    }
}

impl<W> ToWriter<W> for SectionType
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        ElfWord(*self as u32).to_writer(writer)
    }
}

impl HasWrittenSize for SectionType {
    const SIZE: usize = ElfWord::SIZE;
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    /// Bit-flags that describe miscellaneous section attributes. Unknown
    /// OS- and processor-specific bits are retained verbatim so a decode
    /// and re-encode never drops them.
    pub struct SectionFlags: u64 {
        /// The section contains data that should be writable during process
        /// execution
        const WRITE = 0x1;
        /// The section occupies memory during process execution
        const ALLOC = 0x2;
        /// The section contains executable machine instructions
        const EXECINSTR = 0x4;
        /// The data in the section may be merged to eliminate duplication
        const MERGE = 0x10;
        /// The data elements in the section consist of null-terminated
        /// character strings
        const STRINGS = 0x20;
        /// The info field of this section header holds a section header
        /// table index
        const INFO_LINK = 0x40;
        /// The section carries special ordering requirements for link editors
        const LINK_ORDER = 0x80;
        /// The section requires special OS-specific processing beyond the
        /// standard linking rules
        const OS_NONCONFORMING = 0x100;
        /// The section is a member of a section group
        const GROUP = 0x200;
        /// The section holds thread-local storage
        const TLS = 0x400;
        /// The section contains compressed data
        const COMPRESSED = 0x800;

        const _ = !0;
    }
}

impl<R> FromReader<R> for SectionFlags
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        Ok(Self::from_bits_retain(
            ElfXword::from_reader_with(reader, config)?.0,
        ))
    }
}

impl<W> ToWriter<W> for SectionFlags
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        ElfXword(self.bits()).to_writer(writer)
    }
}

impl HasWrittenSize for SectionFlags {
    const SIZE: usize = ElfXword::SIZE;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
/// One Elf64_Shdr record. Fields are public and value-like; setting one
/// updates the record in place, and [`Section::serialize`] writes the record
/// back out in its fixed 64-byte layout.
pub struct Section {
    #[builder(default)]
    /// The name of the section as an index into the section name string
    /// table, where a null-terminated string gives its location
    pub name: ElfWord,
    #[builder(default = SectionType::Null)]
    /// The section's contents and semantics
    pub r#type: SectionType,
    #[builder(default)]
    /// Bit-flags that describe miscellaneous attributes
    pub flags: SectionFlags,
    #[builder(default)]
    /// The virtual address at which the section's first byte resides in the
    /// memory image of a process, or 0
    pub address: ElfAddr,
    #[builder(default)]
    /// The byte offset from the beginning of the file to the first byte in
    /// the section. For a `NoBits` section this locates the conceptual
    /// placement only.
    pub offset: ElfOff,
    #[builder(default)]
    /// The section's size in bytes. A `NoBits` section may have a non-zero
    /// size but occupies no space in the file.
    pub size: ElfXword,
    #[builder(default)]
    /// A section header table index link whose interpretation depends on the
    /// section type; for a symbol table it is the index of the associated
    /// string table
    pub link: ElfWord,
    #[builder(default)]
    /// Extra information whose interpretation depends on the section type
    pub info: ElfWord,
    #[builder(default)]
    /// The address alignment constraint of the section; 0 and 1 both mean
    /// unconstrained
    pub address_align: ElfXword,
    #[builder(default)]
    /// The size in bytes of each entry for sections that hold a table of
    /// fixed-size entries, or 0
    pub entry_size: ElfXword,
}

impl Section {
    /// Parse one record from the first [`Section::SIZE`] bytes of `chunk`
    pub fn parse(chunk: &Chunk<'_>) -> Result<Self, Error> {
        Self::from_reader(&mut Cursor::new(chunk.as_bytes()))
    }

    /// Serialize the record into its fixed-size little-endian layout
    pub fn serialize(&self) -> Result<[u8; Self::SIZE], Error> {
        let mut buf = [0u8; Self::SIZE];
        self.to_writer(&mut Cursor::new(buf.as_mut_slice()))?;
        Ok(buf)
    }
}

impl<R> FromReader<R> for Section
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        Ok(Self {
            name: ElfWord::from_reader_with(reader, config)?,
            r#type: SectionType::from_reader_with(reader, config)?,
            flags: SectionFlags::from_reader_with(reader, config)?,
            address: ElfAddr::from_reader_with(reader, config)?,
            offset: ElfOff::from_reader_with(reader, config)?,
            size: ElfXword::from_reader_with(reader, config)?,
            link: ElfWord::from_reader_with(reader, config)?,
            info: ElfWord::from_reader_with(reader, config)?,
            address_align: ElfXword::from_reader_with(reader, config)?,
            entry_size: ElfXword::from_reader_with(reader, config)?,
        })
    }
}

impl<W> ToWriter<W> for Section
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.name.to_writer(writer)?;
        self.r#type.to_writer(writer)?;
        self.flags.to_writer(writer)?;
        self.address.to_writer(writer)?;
        self.offset.to_writer(writer)?;
        self.size.to_writer(writer)?;
        self.link.to_writer(writer)?;
        self.info.to_writer(writer)?;
        self.address_align.to_writer(writer)?;
        self.entry_size.to_writer(writer)
    }
}

impl HasWrittenSize for Section {
    const SIZE: usize = 64;
}
