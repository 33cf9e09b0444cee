//! Implementation of the ELF symbol table entry (Elf64_Sym). Function
//! resolution walks these records looking for `SymbolType::Function`
//! entries.

use std::io::{Cursor, Read, Seek, Write};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use typed_builder::TypedBuilder;

use crate::{
    base::{ElfAddr, ElfByte, ElfSectionIndex, ElfWord, ElfXword},
    chunk::Chunk,
    error::Error,
    Config, FromReader, HasWrittenSize, ToWriter,
};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The general classification of a symbol, held in the low nibble of the
/// info field
pub enum SymbolType {
    /// The symbol's type is not specified
    NoType = 0,
    /// The symbol is associated with a data object
    Object = 1,
    /// The symbol is associated with a function or other executable code
    Function = 2,
    /// The symbol is associated with a section
    Section = 3,
    /// The name of the source file associated with the object file
    File = 4,
    /// An uninitialized common block
    Common = 5,
    /// A thread-local storage entity
    ThreadLocalStorage = 6,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The linkage visibility and behavior of a symbol, held in the high nibble
/// of the info field
pub enum SymbolBinding {
    /// Not visible outside the object file containing its definition
    Local = 0,
    /// Visible to all object files being combined
    Global = 1,
    /// Like global, but with lower precedence
    Weak = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
/// One Elf64_Sym record
pub struct Symbol {
    #[builder(default)]
    /// The symbol's name as an index into its table's associated string
    /// table, or 0 for no name
    pub name: ElfWord,
    #[builder(default)]
    /// The symbol's type and binding attributes, packed into one byte
    pub info: ElfByte,
    #[builder(default)]
    /// The symbol's visibility, held in the low bits
    pub other: ElfByte,
    #[builder(default)]
    /// The index of the section this symbol is defined in relation to
    pub section_index: ElfSectionIndex,
    #[builder(default)]
    /// The value of the symbol: an address for most symbol kinds in
    /// executable and shared objects
    pub value: ElfAddr,
    #[builder(default)]
    /// The size associated with the symbol, e.g. the number of bytes in a
    /// function body, or 0
    pub size: ElfXword,
}

impl Symbol {
    /// Pack a binding and type pair into an info byte
    pub fn info_for(binding: SymbolBinding, r#type: SymbolType) -> ElfByte {
        ElfByte(((binding as u8) << 4) | ((r#type as u8) & 0xf))
    }

    /// The symbol's type, decoded from the low nibble of the info field.
    /// `None` when the nibble holds an OS- or processor-specific value.
    pub fn r#type(&self) -> Option<SymbolType> {
        SymbolType::from_u8(self.info.0 & 0xf)
    }

    /// The symbol's binding, decoded from the high nibble of the info field.
    /// `None` when the nibble holds an OS- or processor-specific value.
    pub fn binding(&self) -> Option<SymbolBinding> {
        SymbolBinding::from_u8(self.info.0 >> 4)
    }

    /// Parse one record from the first [`Symbol::SIZE`] bytes of `chunk`
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

impl<R> FromReader<R> for Symbol
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        Ok(Self {
            name: ElfWord::from_reader_with(reader, config)?,
            info: ElfByte::from_reader_with(reader, config)?,
            other: ElfByte::from_reader_with(reader, config)?,
            section_index: ElfSectionIndex::from_reader_with(reader, config)?,
            value: ElfAddr::from_reader_with(reader, config)?,
            size: ElfXword::from_reader_with(reader, config)?,
        })
    }
}

impl<W> ToWriter<W> for Symbol
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.name.to_writer(writer)?;
        self.info.to_writer(writer)?;
        self.other.to_writer(writer)?;
        self.section_index.to_writer(writer)?;
        self.value.to_writer(writer)?;
        self.size.to_writer(writer)
    }
}

impl HasWrittenSize for Symbol {
    const SIZE: usize = 24;
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_symbol_round_trip() {
        let symbol = Symbol::builder()
            .name(ElfWord(1))
            .info(Symbol::info_for(SymbolBinding::Global, SymbolType::Function))
            .section_index(ElfSectionIndex(1))
            .value(ElfAddr(0x401000))
            .size(ElfXword(32))
            .build();

        let buf = symbol.serialize().unwrap();
        let back = Symbol::parse(&Chunk::new(&buf)).unwrap();
        assert_eq!(back, symbol);
        assert_eq!(back.r#type(), Some(SymbolType::Function));
        assert_eq!(back.binding(), Some(SymbolBinding::Global));
    }
}
