//! Implementation of the `ident` field of the ELF header. This field is
//! located at the beginning of an ELF object file and specifies how the rest
//! of the file is to be decoded.

use std::{
    io::{Read, Seek, Write},
    mem::size_of,
};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use typed_builder::TypedBuilder;

use crate::{base::ElfByte, error::Error, Config, FromReader, HasWrittenSize, ToWriter};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The file's class/capacity, i.e. whether it is 32-bit or 64-bit.
///
/// A file's data encoding and class specifies how to interpret the basic
/// objects in a file. Class ELFCLASS32 files use objects that occupy 1, 2,
/// and 4 bytes. Class ELFCLASS64 files use objects that occupy 1, 2, 4, and
/// 8 bytes. This object model only decodes ELFCLASS64 objects; ELFCLASS32 is
/// represented so that the invalid and unsupported cases report differently.
pub enum ElfClass {
    /// Unspecified
    None = 0,
    /// 32-bit
    Elf32 = 1,
    /// 64-bit
    Elf64 = 2,
}

impl<R> FromReader<R> for ElfClass
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        let class = ElfByte::from_reader_with(reader, config)?;
        Self::from_u8(class.0).ok_or(Error::InvalidClass { value: class.0 })
    }
}

impl<W> ToWriter<W> for ElfClass
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        ElfByte(*self as u8).to_writer(writer)
    }
}

impl HasWrittenSize for ElfClass {
    const SIZE: usize = size_of::<ElfByte>();
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The file's data encoding, i.e. whether it is little-endian or big-endian.
///
/// Encoding ELFDATA2LSB specifies 2's complement values, with the least
/// significant byte occupying the lowest address. This object model only
/// decodes ELFDATA2LSB objects.
pub enum ElfDataEncoding {
    /// Unspecified
    None = 0,
    /// Little-endian
    LittleEndian = 1,
    /// Big-endian
    BigEndian = 2,
}

impl<R> FromReader<R> for ElfDataEncoding
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        let encoding = ElfByte::from_reader_with(reader, config)?;
        Self::from_u8(encoding.0).ok_or(Error::InvalidDataEncoding { value: encoding.0 })
    }
}

impl<W> ToWriter<W> for ElfDataEncoding
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        ElfByte(*self as u8).to_writer(writer)
    }
}

impl HasWrittenSize for ElfDataEncoding {
    const SIZE: usize = size_of::<ElfByte>();
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The version of the e_ident block's layout. Only EV_CURRENT has ever been
/// defined.
pub enum ElfIdentifierVersion {
    /// Invalid version
    None = 0,
    /// Current version
    Current = 1,
}

impl<R> FromReader<R> for ElfIdentifierVersion
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        let version = ElfByte::from_reader_with(reader, config)?;
        Self::from_u8(version.0).ok_or(Error::InvalidIdentifierVersion { value: version.0 })
    }
}

impl<W> ToWriter<W> for ElfIdentifierVersion
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        ElfByte(*self as u8).to_writer(writer)
    }
}

impl HasWrittenSize for ElfIdentifierVersion {
    const SIZE: usize = size_of::<ElfByte>();
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// The operating system or ABI the object targets. Meaningful only for
/// objects that use OS-specific extensions; most Linux executables carry
/// either `SystemV` or `Gnu`.
pub enum ElfOsAbi {
    /// UNIX System V ABI
    SystemV = 0,
    /// HP-UX
    HpUx = 1,
    /// NetBSD
    NetBsd = 2,
    /// Object uses GNU ELF extensions
    Gnu = 3,
    /// Sun Solaris
    Solaris = 6,
    /// IBM AIX
    Aix = 7,
    /// SGI Irix
    Irix = 8,
    /// FreeBSD
    FreeBsd = 9,
    /// Compaq TRU64 UNIX
    Tru64 = 10,
    /// Novell Modesto
    Modesto = 11,
    /// OpenBSD
    OpenBsd = 12,
    /// ARM EABI
    ArmEabi = 64,
    /// ARM
    Arm = 97,
    /// Standalone (embedded) application
    Standalone = 255,
}

impl<R> FromReader<R> for ElfOsAbi
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        let os_abi = ElfByte::from_reader_with(reader, config)?;
        Self::from_u8(os_abi.0).ok_or(Error::InvalidOsAbi { value: os_abi.0 })
    }
}

impl<W> ToWriter<W> for ElfOsAbi
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        ElfByte(*self as u8).to_writer(writer)
    }
}

impl HasWrittenSize for ElfOsAbi {
    const SIZE: usize = size_of::<ElfByte>();
}

#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
/// The e_ident block at the beginning of every ELF object file. The magic is
/// validated on decode; the class and data encoding are validated to be the
/// 64-bit little-endian pair this object model handles.
pub struct ElfHeaderIdentifier {
    #[builder(default = ElfClass::Elf64)]
    /// The object's class
    pub class: ElfClass,
    #[builder(default = ElfDataEncoding::LittleEndian)]
    /// The object's data encoding
    pub data_encoding: ElfDataEncoding,
    #[builder(default = ElfIdentifierVersion::Current)]
    /// The version of the e_ident layout
    pub version: ElfIdentifierVersion,
    #[builder(default = ElfOsAbi::SystemV)]
    /// The OS or ABI the object targets
    pub os_abi: ElfOsAbi,
    #[builder(default)]
    /// The version of the ABI the object targets
    pub abi_version: ElfByte,
    #[builder(default = [ElfByte(0); 7])]
    /// Zero padding to the end of the e_ident block
    pub padding: [ElfByte; 7],
}

impl ElfHeaderIdentifier {
    /// The four magic bytes every ELF object file begins with
    pub const MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
}

impl<R> FromReader<R> for ElfHeaderIdentifier
where
    R: Read + Seek,
{
    type Error = Error;

    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error> {
        let mut magic = [0u8; 4];

        for byte in &mut magic {
            *byte = ElfByte::from_reader_with(reader, config)?.0;
        }

        if magic != Self::MAGIC {
            return Err(Error::InvalidMagic { found: magic });
        }

        let class = ElfClass::from_reader_with(reader, config)?;

        if class != ElfClass::Elf64 {
            return Err(Error::UnsupportedClass {
                value: class as u8,
            });
        }

        let data_encoding = ElfDataEncoding::from_reader_with(reader, config)?;

        if data_encoding != ElfDataEncoding::LittleEndian {
            return Err(Error::UnsupportedDataEncoding {
                value: data_encoding as u8,
            });
        }

        let version = ElfIdentifierVersion::from_reader_with(reader, config)?;
        let os_abi = ElfOsAbi::from_reader_with(reader, config)?;
        let abi_version = ElfByte::from_reader_with(reader, config)?;
        let mut padding = [ElfByte(0); 7];

        for byte in &mut padding {
            *byte = ElfByte::from_reader_with(reader, config)?;
        }

        Ok(Self {
            class,
            data_encoding,
            version,
            os_abi,
            abi_version,
            padding,
        })
    }
}

impl<W> ToWriter<W> for ElfHeaderIdentifier
where
    W: Write,
{
    type Error = Error;

    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
        for byte in Self::MAGIC {
            ElfByte(byte).to_writer(writer)?;
        }

        self.class.to_writer(writer)?;
        self.data_encoding.to_writer(writer)?;
        self.version.to_writer(writer)?;
        self.os_abi.to_writer(writer)?;
        self.abi_version.to_writer(writer)?;

        for byte in &self.padding {
            byte.to_writer(writer)?;
        }

        Ok(())
    }
}

impl HasWrittenSize for ElfHeaderIdentifier {
    const SIZE: usize = 16;
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_identifier_round_trip() {
        let ident = ElfHeaderIdentifier::builder().build();
        let mut buf = Vec::new();
        ident.to_writer(&mut buf).unwrap();
        assert_eq!(buf.len(), ElfHeaderIdentifier::SIZE);
        assert_eq!(&buf[..4], &ElfHeaderIdentifier::MAGIC);
        let back = ElfHeaderIdentifier::from_reader(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(back, ident);
    }

    #[test]
    fn test_bad_magic_is_fatal() {
        let buf = [0u8; 16];
        assert_eq!(
            ElfHeaderIdentifier::from_reader(&mut Cursor::new(&buf)),
            Err(Error::InvalidMagic { found: [0; 4] })
        );
    }

    #[test]
    fn test_wrong_class_is_unsupported() {
        let mut buf = vec![0x7f, b'E', b'L', b'F', 1, 1, 1, 0];
        buf.resize(16, 0);
        assert_eq!(
            ElfHeaderIdentifier::from_reader(&mut Cursor::new(&buf)),
            Err(Error::UnsupportedClass { value: 1 })
        );
    }
}
