//! Base scalar types for ELF object file structures. Every scalar decodes
//! and encodes little-endian, the only data encoding this object model
//! handles.

use std::{
    fmt::Display,
    io::{Read, Seek, Write},
    mem::size_of,
};

use crate::{error::Error, Config, FromReader, HasWrittenSize, ToWriter};

/// Define a little-endian ELF scalar newtype over a primitive
macro_rules! le_scalar {
    (
        $(#[$attr:meta])*
        $name:ident, $raw:ty
    ) => {
        $(#[$attr])*
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub $raw);

        impl<R> FromReader<R> for $name
        where
            R: Read + Seek,
        {
            type Error = Error;

            fn from_reader_with(
                reader: &mut R,
                config: &mut Config,
            ) -> Result<Self, Self::Error> {
                let mut buf = [0; size_of::<$raw>()];
                reader
                    .read_exact(&mut buf)
                    .map_err(|e| Error::Io { kind: e.kind() })
                    .or_else(|e| {
                        if config.ignore.contains(&e) {
                            Ok(())
                        } else {
                            Err(e)
                        }
                    })?;
                Ok($name(<$raw>::from_le_bytes(buf)))
            }
        }

        impl<W> ToWriter<W> for $name
        where
            W: Write,
        {
            type Error = Error;

            fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error> {
                writer
                    .write_all(&self.0.to_le_bytes())
                    .map_err(|e| Error::Io { kind: e.kind() })
            }
        }

        impl HasWrittenSize for $name {
            const SIZE: usize = size_of::<$raw>();
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for $raw {
            fn from(val: $name) -> Self {
                val.0
            }
        }

        impl From<$raw> for $name {
            fn from(val: $raw) -> Self {
                $name(val)
            }
        }
    };
}

le_scalar! {
    /// A raw byte in an ELF file
    ElfByte, u8
}

le_scalar! {
    /// A half-word in an ELF file. Represented as 16 bits.
    ElfHalf, u16
}

le_scalar! {
    /// A word in an ELF file. Represented as 32 bits.
    ElfWord, u32
}

le_scalar! {
    /// An extended word in an ELF file. Represented as 64 bits.
    ElfXword, u64
}

le_scalar! {
    /// A signed extended word in an ELF file. Represented as 64 bits.
    ElfSxword, i64
}

le_scalar! {
    /// A virtual address in an ELF file. Represented as 64 bits.
    ElfAddr, u64
}

le_scalar! {
    /// A file offset in an ELF file. Represented as 64 bits.
    ElfOff, u64
}

le_scalar! {
    /// A section table index in an ELF file. Represented as 16 bits.
    ElfSectionIndex, u16
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use std::io::{Cursor, ErrorKind};

    #[test]
    fn test_scalar_round_trip() {
        let mut buf = Vec::new();
        ElfAddr(0x401000).to_writer(&mut buf).unwrap();
        assert_eq!(buf, 0x401000u64.to_le_bytes());
        let back = ElfAddr::from_reader(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(back, ElfAddr(0x401000));
    }

    #[test]
    fn test_byte_round_trip() {
        let mut buf = Vec::new();
        ElfByte(0x7f).to_writer(&mut buf).unwrap();
        assert_eq!(buf, [0x7f]);
        assert_eq!(
            ElfByte::from_reader(&mut Cursor::new(&buf)).unwrap(),
            ElfByte(0x7f)
        );
    }

    #[test]
    fn test_short_read_is_an_error_unless_ignored() {
        let mut empty = Cursor::new(Vec::new());
        assert_eq!(
            ElfWord::from_reader(&mut empty),
            Err(Error::Io {
                kind: ErrorKind::UnexpectedEof
            })
        );

        let mut empty = Cursor::new(Vec::new());
        let mut config = Config::builder()
            .ignore([Error::Io {
                kind: ErrorKind::UnexpectedEof,
            }])
            .build();
        assert_eq!(
            ElfWord::from_reader_with(&mut empty, &mut config),
            Ok(ElfWord(0))
        );
    }
}
