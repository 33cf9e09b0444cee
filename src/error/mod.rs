//! Error types for ELF object handling and instruction chain assembly.

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Hash)]
/// Error type for errors during ELF object handling and instruction chain
/// assembly
pub enum Error {
    #[error("An I/O error occurred: {kind}")]
    /// An underlying I/O operation failed
    Io {
        /// The kind of I/O error that occurred
        kind: std::io::ErrorKind,
    },
    #[error("Invalid ELF magic {found:02x?}")]
    /// The file does not begin with \x7fELF
    InvalidMagic {
        /// The four bytes found where the magic was expected
        found: [u8; 4],
    },
    #[error("Invalid value {value} for ELF Class")]
    /// The e_ident class byte is not a known class
    InvalidClass {
        /// The value found in the class byte
        value: u8,
    },
    #[error("Unsupported ELF Class value {value}, only 64-bit objects are handled")]
    /// The class is valid but not handled by this object model
    UnsupportedClass {
        /// The value found in the class byte
        value: u8,
    },
    #[error("Invalid value {value} for ELF Data Encoding")]
    /// The e_ident data encoding byte is not a known encoding
    InvalidDataEncoding {
        /// The value found in the data encoding byte
        value: u8,
    },
    #[error("Unsupported ELF Data Encoding value {value}, only little-endian objects are handled")]
    /// The data encoding is valid but not handled by this object model
    UnsupportedDataEncoding {
        /// The value found in the data encoding byte
        value: u8,
    },
    #[error("Invalid value {value} for ELF Identifier Version")]
    /// The e_ident version byte is not EV_CURRENT
    InvalidIdentifierVersion {
        /// The value found in the version byte
        value: u8,
    },
    #[error("Invalid value {value} for ELF OS ABI")]
    /// The e_ident OS ABI byte is not a known ABI
    InvalidOsAbi {
        /// The value found in the OS ABI byte
        value: u8,
    },
    #[error("Invalid value {value} for ELF object type")]
    /// The e_type field is not a known object type
    InvalidType {
        /// The value found in the type field
        value: u16,
    },
    #[error("Invalid value {value} for ELF machine")]
    /// The e_machine field is not a known machine
    InvalidMachine {
        /// The value found in the machine field
        value: u16,
    },
    #[error("Invalid ELF header size {size}, expected {expected}")]
    /// The e_ehsize field disagrees with the 64-bit header layout
    InvalidHeaderSize {
        /// The value found in the e_ehsize field
        size: u16,
        /// The size a 64-bit ELF header occupies
        expected: u16,
    },
    #[error("Invalid section header entry size {size}, expected {expected}")]
    /// The e_shentsize field disagrees with the 64-bit section header layout
    InvalidSectionEntrySize {
        /// The value found in the e_shentsize field
        size: u16,
        /// The size a 64-bit section header occupies
        expected: u16,
    },
    #[error("Invalid program header entry size {size}, expected {expected}")]
    /// The e_phentsize field disagrees with the 64-bit program header layout
    InvalidProgramEntrySize {
        /// The value found in the e_phentsize field
        size: u16,
        /// The size a 64-bit program header occupies
        expected: u16,
    },
    #[error("Invalid value {value} for section header type")]
    /// The sh_type field is not a known section type
    InvalidSectionType {
        /// The value found in the type field
        value: u32,
    },
    #[error("Invalid value {value} for program header type")]
    /// The p_type field is not a known segment type
    InvalidSegmentType {
        /// The value found in the type field
        value: u32,
    },
    #[error("Invalid section name table index {index} for a table of {count} sections")]
    /// The e_shstrndx field does not index a live string table section
    InvalidSectionNameTableIndex {
        /// The value found in the e_shstrndx field
        index: u16,
        /// The number of sections in the table
        count: usize,
    },
    #[error("Truncated image: needed {needed:#x} bytes at offset {offset:#x}")]
    /// A structure extends past the end of the backing region
    Truncated {
        /// The offset the structure begins at
        offset: u64,
        /// The number of bytes the structure occupies
        needed: u64,
    },
    #[error("Range {offset:#x}+{length:#x} exceeds the {available:#x} available bytes")]
    /// A requested byte range does not lie within its source
    OutOfRange {
        /// The offset the range begins at
        offset: u64,
        /// The length of the range
        length: u64,
        /// The number of bytes the source holds
        available: u64,
    },
    #[error("Section index {index} is out of bounds for a table of {count} sections")]
    /// A section index does not name a live section
    BadSectionIndex {
        /// The requested index
        index: usize,
        /// The number of sections in the table
        count: usize,
    },
    #[error("Program header index {index} is out of bounds for a table of {count} entries")]
    /// A program header index does not name a live entry
    BadProgramHeaderIndex {
        /// The requested index
        index: usize,
        /// The number of entries in the table
        count: usize,
    },
    #[error("Section data of {actual} bytes disagrees with the declared size {declared}")]
    /// The backing bytes handed to a mutation do not match the header
    SectionSizeMismatch {
        /// The size the section header declares
        declared: u64,
        /// The size of the bytes provided
        actual: u64,
    },
    #[error("Refusing to remove section {name:?}: it backs the section name table")]
    /// A mutation was rejected because it would break name resolution
    SectionInUse {
        /// The resolved name of the rejected section
        name: String,
    },
    #[error("Undecodable instruction byte at {address:#x}")]
    /// The decoder could not decode an instruction at the given address
    UndecodableInstruction {
        /// The virtual address of the first undecodable byte
        address: u64,
    },
    #[error("Instruction could not be encoded: {reason}")]
    /// The encoder rejected an instruction handed to chain assembly
    EncodeFailed {
        /// The encoder's description of the rejection
        reason: String,
    },
}

/// Result type alias for ELF object handling
pub type Result<T> = std::result::Result<T, Error>;
