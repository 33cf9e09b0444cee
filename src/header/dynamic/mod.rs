//! Dynamic-table tag definitions and the conventional mapping from section
//! names to the tags that describe them in the `.dynamic` section.

use num_derive::{FromPrimitive, ToPrimitive};

#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[non_exhaustive]
/// A dynamic-table entry tag. The d_un union of an entry is interpreted as
/// an address (d_ptr) or an integer (d_val) depending on the tag;
/// [`DynamicTag::is_pointer`] encodes that partition.
pub enum DynamicTag {
    /// Marks the end of the dynamic table
    Null = 0,
    /// The string table offset of a needed library's name
    Needed = 1,
    /// The total size of the PLT relocation entries
    PltRelocationSize = 2,
    /// The address of the PLT and/or GOT
    PltGot = 3,
    /// The address of the symbol hash table
    Hash = 4,
    /// The address of the string table
    StringTable = 5,
    /// The address of the symbol table
    SymbolTable = 6,
    /// The address of the relocation table with addends
    RelocationAddend = 7,
    /// The total size of the relocation table with addends
    RelocationAddendSize = 8,
    /// The size of one relocation entry with addend
    RelocationAddendEntrySize = 9,
    /// The size of the string table
    StringTableSize = 10,
    /// The size of one symbol table entry
    SymbolEntrySize = 11,
    /// The address of the initialization function
    Initializer = 12,
    /// The address of the termination function
    Finalizer = 13,
    /// The string table offset of the shared object's name
    SharedObjectName = 14,
    /// The string table offset of a library search path
    RuntimePath = 15,
    /// Alters symbol resolution to start from the shared object itself
    Symbolic = 16,
    /// The address of the relocation table without addends
    Relocation = 17,
    /// The total size of the relocation table without addends
    RelocationSize = 18,
    /// The size of one relocation entry without addend
    RelocationEntrySize = 19,
    /// The kind of relocation entry the PLT refers to
    PltRelocationKind = 20,
    /// Used for debugging; contents are not specified
    Debug = 21,
    /// Signals that relocations may modify a non-writable segment
    TextRelocation = 22,
    /// The address of the PLT relocation entries
    JumpRelocations = 23,
    /// Instructs the loader to process all relocations before transferring
    /// control
    BindNow = 24,
    /// The address of the initialization function array
    InitializerArray = 25,
    /// The address of the termination function array
    FinalizerArray = 26,
    /// The size of the initialization function array
    InitializerArraySize = 27,
    /// The size of the termination function array
    FinalizerArraySize = 28,
    /// The string table offset of a library search path, superseding
    /// `RuntimePath`
    RunPath = 29,
    /// Flags for the object being loaded
    Flags = 30,
    /// The address of the pre-initialization function array
    PreInitializerArray = 32,
    /// The size of the pre-initialization function array
    PreInitializerArraySize = 33,
    /// The section table index of the extended section index table
    SymbolTableSectionIndexes = 34,
}

impl DynamicTag {
    /// The tag that conventionally describes the section named `name` in the
    /// dynamic table, or `None` when no conventional mapping exists
    pub fn for_section_name(name: &str) -> Option<Self> {
        match name {
            ".init" => Some(Self::Initializer),
            ".fini" => Some(Self::Finalizer),
            ".hash" => Some(Self::Hash),
            ".strtab" | ".dynstr" => Some(Self::StringTable),
            ".symtab" | ".dynsym" => Some(Self::SymbolTable),
            ".rela.dyn" => Some(Self::RelocationAddend),
            ".rela.plt" => Some(Self::JumpRelocations),
            ".got.plt" => Some(Self::PltGot),
            ".init_array" => Some(Self::InitializerArray),
            ".fini_array" => Some(Self::FinalizerArray),
            ".preinit_array" => Some(Self::PreInitializerArray),
            _ => None,
        }
    }

    /// Whether an entry with this tag interprets its d_un union as an
    /// address (d_ptr) rather than an integer (d_val)
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            Self::PltGot
                | Self::Hash
                | Self::StringTable
                | Self::SymbolTable
                | Self::RelocationAddend
                | Self::Initializer
                | Self::Finalizer
                | Self::Relocation
                | Self::Debug
                | Self::JumpRelocations
                | Self::InitializerArray
                | Self::FinalizerArray
                | Self::PreInitializerArray
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unmapped_names_have_no_tag() {
        assert_eq!(DynamicTag::for_section_name(".text"), None);
        assert_eq!(DynamicTag::for_section_name(""), None);
    }

    #[test]
    fn test_pointer_partition() {
        assert!(DynamicTag::SymbolTable.is_pointer());
        assert!(DynamicTag::JumpRelocations.is_pointer());
        assert!(!DynamicTag::Needed.is_pointer());
        assert!(!DynamicTag::StringTableSize.is_pointer());
        assert!(!DynamicTag::PltRelocationKind.is_pointer());
    }
}
