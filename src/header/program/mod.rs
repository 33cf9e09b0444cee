//! Implementation of the ELF program header, the execution-time view of an
//! object file. A [`ProgramHeader`] is a value-like wrapper over one
//! Elf64_Phdr record.

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
/// The kind of segment a program header describes
pub enum SegmentType {
    /// Unused entry; the other members' values are undefined
    Null = 0,
    /// A loadable segment, described by the file and memory size members
    Load = 1,
    /// Dynamic linking information
    Dynamic = 2,
    /// The location and size of a null-terminated path name to invoke as an
    /// interpreter
    Interpreter = 3,
    /// The location and size of auxiliary information
    Note = 4,
    /// Reserved with unspecified semantics
    SharedLibrary = 5,
    /// The location and size of the program header table itself
    ProgramHeaderTable = 6,
    /// The thread-local storage template
    ThreadLocalStorage = 7,
    /// The location of the exception handling frame header (GNU)
    GnuEhFrame = 0x6474e550,
    /// Stack executability marker (GNU)
    GnuStack = 0x6474e551,
    /// The region to be made read-only after relocation (GNU)
    GnuRelRo = 0x6474e552,
    /// GNU property notes
    GnuProperty = 0x6474e553,
}

impl<R> FromReader<R> for SegmentType
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        let ty = ElfWord::from_reader_with(reader, config)?;
        Self::from_u32(ty.0).ok_or(Error::InvalidSegmentType { value: ty.0 })
    }
}

impl<W> ToWriter<W> for SegmentType
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        ElfWord(*self as u32).to_writer(writer)
    }
}

impl HasWrittenSize for SegmentType {
    const SIZE: usize = ElfWord::SIZE;
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    /// Permissions of a segment once mapped. Unknown OS- and
    /// processor-specific bits are retained verbatim.
    pub struct SegmentFlags: u32 {
        /// The segment is executable
        const EXECUTE = 0x1;
        /// The segment is writable
        const WRITE = 0x2;
        /// The segment is readable
        const READ = 0x4;

        const _ = !0;
    }
}

impl<R> FromReader<R> for SegmentFlags
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        Ok(Self::from_bits_retain(
            ElfWord::from_reader_with(reader, config)?.0,
        ))
    }
}

impl<W> ToWriter<W> for SegmentFlags
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        ElfWord(self.bits()).to_writer(writer)
    }
}

impl HasWrittenSize for SegmentFlags {
    const SIZE: usize = ElfWord::SIZE;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
/// One Elf64_Phdr record. Fields are public and value-like; setting one
/// updates the record in place, and [`ProgramHeader::serialize`] writes the
/// record back out in its fixed 56-byte layout.
pub struct ProgramHeader {
    #[builder(default = SegmentType::Null)]
    /// The kind of segment this header describes
    pub r#type: SegmentType,
    #[builder(default)]
    /// Permissions of the segment once mapped
    pub flags: SegmentFlags,
    #[builder(default)]
    /// The file offset of the first byte of the segment
    pub offset: ElfOff,
    #[builder(default)]
    /// The virtual address of the first byte of the segment in memory
    pub virtual_address: ElfAddr,
    #[builder(default)]
    /// The physical address of the segment, on systems where that is
    /// relevant
    pub physical_address: ElfAddr,
    #[builder(default)]
    /// The number of bytes the segment occupies in the file image
    pub file_size: ElfXword,
    #[builder(default)]
    /// The number of bytes the segment occupies in the memory image
    pub memory_size: ElfXword,
    #[builder(default)]
    /// The alignment constraint of the segment in file and memory
    pub align: ElfXword,
}

impl ProgramHeader {
    /// Parse one record from the first [`ProgramHeader::SIZE`] bytes of
    /// `chunk`
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

impl<R> FromReader<R> for ProgramHeader
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        Ok(Self {
            r#type: SegmentType::from_reader_with(reader, config)?,
            flags: SegmentFlags::from_reader_with(reader, config)?,
            offset: ElfOff::from_reader_with(reader, config)?,
            virtual_address: ElfAddr::from_reader_with(reader, config)?,
            physical_address: ElfAddr::from_reader_with(reader, config)?,
            file_size: ElfXword::from_reader_with(reader, config)?,
            memory_size: ElfXword::from_reader_with(reader, config)?,
            align: ElfXword::from_reader_with(reader, config)?,
        })
    }
}

impl<W> ToWriter<W> for ProgramHeader
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.r#type.to_writer(writer)?;
        self.flags.to_writer(writer)?;
        self.offset.to_writer(writer)?;
        self.virtual_address.to_writer(writer)?;
        self.physical_address.to_writer(writer)?;
        self.file_size.to_writer(writer)?;
        self.memory_size.to_writer(writer)?;
        self.align.to_writer(writer)
    }
}

impl HasWrittenSize for ProgramHeader {
    const SIZE: usize = 56;
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_program_header_round_trip() {
        let header = ProgramHeader::builder()
            .r#type(SegmentType::Load)
            .flags(SegmentFlags::READ | SegmentFlags::EXECUTE)
            .offset(ElfOff(0))
            .virtual_address(ElfAddr(0x400000))
            .physical_address(ElfAddr(0x400000))
            .file_size(ElfXword(0x1000))
            .memory_size(ElfXword(0x1000))
            .align(ElfXword(0x1000))
            .build();

        let buf = header.serialize().unwrap();
        let back = ProgramHeader::parse(&Chunk::new(&buf)).unwrap();
        assert_eq!(back, header);
    }
}
