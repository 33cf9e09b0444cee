//! Implementation of the ELF relocation entry with explicit addend
//! (Elf64_Rela), the form the x86-64 psABI uses exclusively.

use std::io::{Cursor, Read, Seek, Write};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use typed_builder::TypedBuilder;

use crate::{
    base::{ElfAddr, ElfSxword, ElfXword},
    chunk::Chunk,
    error::Error,
    Config, FromReader, HasWrittenSize, ToWriter,
};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The x86-64 relocation kinds this toolkit interprets. `Relative` is the
/// one whose addend participates in layout edits: it holds a base-relative
/// address rather than a symbol reference.
pub enum RelocationKind {
    /// No relocation
    None = 0,
    /// Direct 64-bit: S + A
    Direct64 = 1,
    /// PC-relative 32-bit: S + A - P
    Pc32 = 2,
    /// 32-bit GOT entry: G + A
    Got32 = 3,
    /// 32-bit PLT address: L + A - P
    Plt32 = 4,
    /// Copy the symbol at runtime
    Copy = 5,
    /// Create a GOT entry: S
    GlobalData = 6,
    /// Create a PLT entry: S
    JumpSlot = 7,
    /// Adjust by the load base: B + A
    Relative = 8,
    /// 32-bit PC-relative offset to a GOT entry: G + GOT + A - P
    GotPcRel = 9,
    /// Direct zero-extended 32-bit: S + A
    Direct32 = 10,
    /// Direct sign-extended 32-bit: S + A
    Direct32Signed = 11,
    /// Direct 16-bit: S + A
    Direct16 = 12,
    /// PC-relative 16-bit: S + A - P
    Pc16 = 13,
    /// Direct 8-bit: S + A
    Direct8 = 14,
    /// PC-relative 8-bit: S + A - P
    Pc8 = 15,
    /// ID of a module containing the symbol
    DtpMod64 = 16,
    /// Offset in a module's TLS block
    DtpOff64 = 17,
    /// Offset in the initial TLS block
    TpOff64 = 18,
    /// PC-relative 64-bit: S + A - P
    Pc64 = 24,
    /// 64-bit offset to the GOT base: S + A - GOT
    GotOff64 = 25,
    /// 32-bit PC-relative offset to the GOT: GOT + A - P
    GotPc32 = 26,
    /// Like `GotPcRel`, relaxable: G + GOT + A - P
    GotPcRelX = 41,
    /// Like `GotPcRelX`, with a REX prefix: G + GOT + A - P
    RexGotPcRelX = 42,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
/// One Elf64_Rela record
pub struct Rela {
    #[builder(default)]
    /// The virtual address the relocation applies at
    pub offset: ElfAddr,
    #[builder(default)]
    /// The symbol table index and relocation kind, packed into one extended
    /// word
    pub info: ElfXword,
    #[builder(default)]
    /// The constant addend used to compute the relocated value
    pub addend: ElfSxword,
}

impl Rela {
    /// Pack a symbol table index and relocation kind into an info word
    pub fn info_for(symbol: u32, kind: RelocationKind) -> ElfXword {
        ElfXword(((symbol as u64) << 32) | (kind as u32 as u64))
    }

    /// The symbol table index this relocation refers to
    pub fn symbol(&self) -> u32 {
        (self.info.0 >> 32) as u32
    }

    /// The relocation kind, decoded from the low word of the info field.
    /// `None` for kinds this toolkit does not interpret.
    pub fn kind(&self) -> Option<RelocationKind> {
        RelocationKind::from_u32(self.info.0 as u32)
    }

    /// Parse one record from the first [`Rela::SIZE`] bytes of `chunk`
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

impl<R> FromReader<R> for Rela
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        Ok(Self {
            offset: ElfAddr::from_reader_with(reader, config)?,
            info: ElfXword::from_reader_with(reader, config)?,
            addend: ElfSxword::from_reader_with(reader, config)?,
        })
    }
}

impl<W> ToWriter<W> for Rela
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        self.offset.to_writer(writer)?;
        self.info.to_writer(writer)?;
        self.addend.to_writer(writer)
    }
}

impl HasWrittenSize for Rela {
    const SIZE: usize = 24;
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rela_round_trip() {
        let rela = Rela::builder()
            .offset(ElfAddr(0x401020))
            .info(Rela::info_for(3, RelocationKind::JumpSlot))
            .addend(ElfSxword(0))
            .build();

        let buf = rela.serialize().unwrap();
        let back = Rela::parse(&Chunk::new(&buf)).unwrap();
        assert_eq!(back, rela);
        assert_eq!(back.symbol(), 3);
        assert_eq!(back.kind(), Some(RelocationKind::JumpSlot));
    }
}
