//! Core object model for binary analysis of ELF files: a typed, mutable,
//! round-trippable in-memory representation of 64-bit little-endian ELF
//! images, and address-keyed chains of the instructions decoded from them.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, missing_docs)]

use std::{
    collections::HashSet,
    io::{Read, Seek, Write},
};

use typed_builder::TypedBuilder;

use chunk::Chunk;
use error::Error;

pub mod base;
pub mod chain;
pub mod chunk;
pub mod elf;
pub mod error;
pub mod header;
pub mod region;
pub mod translate;

/// Decode an owned instance of a type from a reader
pub trait FromReader<R>
where
    R: Read + Seek,
    Self: Sized,
{
    /// The error type for this operation
    type Error;

    /// Decode an instance of this type from a reader, with a configuration
    fn from_reader_with(reader: &mut R, config: &mut Config) -> Result<Self, Self::Error>;

    /// Decode an instance of this type from a reader
    fn from_reader(reader: &mut R) -> Result<Self, Self::Error> {
        Self::from_reader_with(reader, &mut Config::default())
    }
}

/// Encode an instance of a type to a writer
pub trait ToWriter<W>
where
    W: Write,
    Self: Sized,
{
    /// The error type for this operation
    type Error;

    /// Encode an instance of this type to a writer
    fn to_writer(&self, writer: &mut W) -> Result<(), Self::Error>;
}

/// A type which always has a known size when written to a writer
pub trait HasWrittenSize {
    /// The size when written
    const SIZE: usize;
}

#[derive(Debug, Default, TypedBuilder)]
/// A configuration for the object file handler. Primarily configures errors
/// which should be ignored during decoding.
pub struct Config {
    #[builder(default, setter(into))]
    /// Ignored errors. Each error is handled somewhat differently when it is
    /// ignored, and the implementation for each is located where the error
    /// would have been raised. For example, an ignored short read decodes as
    /// zeroes.
    ignore: HashSet<Error>,
}

/// Contract satisfied by any executable-file model this toolkit can analyze.
/// [`Elf`](elf::Elf) is the current sole implementor; other formats satisfy
/// the same two lookups. Resource release is the implementor's `Drop`.
pub trait Code {
    /// Resolve the virtual address of the named function, or `None` when the
    /// model holds no function by that name
    fn function_offset(&self, name: &str) -> Option<u64>;

    /// Resolve the chunk of bytes backing the named function, or `None` when
    /// the model holds no function by that name
    fn function_chunk(&self, name: &str) -> Option<Chunk<'_>>;
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        base::{ElfAddr, ElfHalf, ElfOff, ElfSectionIndex, ElfSxword, ElfWord, ElfXword},
        elf::Elf,
        header::{
            dynamic::DynamicTag,
            elf::ElfHeader,
            relocation::{Rela, RelocationKind},
            section::{Section, SectionFlags, SectionType},
            symbol::{Symbol, SymbolBinding, SymbolType},
        },
        region::Region,
    };
    use paste::paste;

    /// Assemble a minimal statically linked image: the null section, then
    /// `.text` holding `text`, `.symtab` with a null symbol and a global
    /// function `main` at 0x401000 of 32 bytes, `.strtab`, `.shstrtab`, and
    /// optionally `.rela.plt` holding one caller-provided entry.
    fn build_image(text: &[u8], rela: Option<Rela>) -> Vec<u8> {
        let text_offset = ElfHeader::SIZE as u64;
        let symtab_offset = text_offset + text.len() as u64;
        let strtab: &[u8] = b"\0main\0";
        let strtab_offset = symtab_offset + 2 * Symbol::SIZE as u64;
        let shstrtab_offset = strtab_offset + strtab.len() as u64;

        let mut shstrtab = b"\0.text\0.symtab\0.strtab\0.shstrtab\0".to_vec();

        if rela.is_some() {
            shstrtab.extend_from_slice(b".rela.plt\0");
        }

        let rela_offset = shstrtab_offset + shstrtab.len() as u64;
        let section_header_offset =
            rela_offset + rela.map_or(0, |_| Rela::SIZE as u64);
        let section_count = if rela.is_some() { 6 } else { 5 };

        let header = ElfHeader::builder()
            .entry(ElfAddr(0x401000))
            .section_header_offset(ElfOff(section_header_offset))
            .section_header_count(ElfHalf(section_count))
            .section_name_table_index(ElfHalf(4))
            .build();

        let mut sections = vec![
            Section::builder().build(),
            Section::builder()
                .name(ElfWord(1))
                .r#type(SectionType::ProgramBits)
                .flags(SectionFlags::ALLOC | SectionFlags::EXECINSTR)
                .address(ElfAddr(0x401000))
                .offset(ElfOff(text_offset))
                .size(ElfXword(text.len() as u64))
                .address_align(ElfXword(16))
                .build(),
            Section::builder()
                .name(ElfWord(7))
                .r#type(SectionType::SymbolTable)
                .offset(ElfOff(symtab_offset))
                .size(ElfXword(2 * Symbol::SIZE as u64))
                .link(ElfWord(3))
                .info(ElfWord(1))
                .entry_size(ElfXword(Symbol::SIZE as u64))
                .build(),
            Section::builder()
                .name(ElfWord(15))
                .r#type(SectionType::StringTable)
                .offset(ElfOff(strtab_offset))
                .size(ElfXword(strtab.len() as u64))
                .address_align(ElfXword(1))
                .build(),
            Section::builder()
                .name(ElfWord(23))
                .r#type(SectionType::StringTable)
                .offset(ElfOff(shstrtab_offset))
                .size(ElfXword(shstrtab.len() as u64))
                .address_align(ElfXword(1))
                .build(),
        ];

        if rela.is_some() {
            sections.push(
                Section::builder()
                    .name(ElfWord(33))
                    .r#type(SectionType::RelocationAddend)
                    .offset(ElfOff(rela_offset))
                    .size(ElfXword(Rela::SIZE as u64))
                    .link(ElfWord(2))
                    .info(ElfWord(1))
                    .entry_size(ElfXword(Rela::SIZE as u64))
                    .build(),
            );
        }

        let symbols = [
            Symbol::builder().build(),
            Symbol::builder()
                .name(ElfWord(1))
                .info(Symbol::info_for(SymbolBinding::Global, SymbolType::Function))
                .section_index(ElfSectionIndex(1))
                .value(ElfAddr(0x401000))
                .size(ElfXword(32))
                .build(),
        ];

        let mut image = Vec::new();
        header.to_writer(&mut image).unwrap();
        image.extend_from_slice(text);

        for symbol in &symbols {
            symbol.to_writer(&mut image).unwrap();
        }

        image.extend_from_slice(strtab);
        image.extend_from_slice(&shstrtab);

        if let Some(rela) = rela {
            rela.to_writer(&mut image).unwrap();
        }

        for section in &sections {
            section.to_writer(&mut image).unwrap();
        }

        image
    }

    /// 63 single-byte nops followed by a ret
    fn nop_sled() -> Vec<u8> {
        let mut text = vec![0x90u8; 63];
        text.push(0xc3);
        text
    }

    #[test]
    fn test_parse_minimal_static_elf() {
        let elf = Elf::from_region(Region::from(build_image(&nop_sled(), None))).unwrap();

        assert_eq!(elf.sections().len(), 5);
        assert_eq!(
            elf.header().section_header_count.0 as usize,
            elf.sections().len()
        );
        assert_eq!(
            elf.header().program_header_count.0 as usize,
            elf.program_headers().len()
        );

        let text = elf.section_by_name(".text").unwrap();
        assert_eq!(elf.section_name(text), Some(".text"));
    }

    #[test]
    fn test_section_data_matches_declared_size() {
        let elf = Elf::from_region(Region::from(build_image(&nop_sled(), None))).unwrap();

        for section in elf.sections() {
            if section.size.0 > 0 && section.r#type != SectionType::NoBits {
                assert_eq!(
                    elf.section_data(section).unwrap().len() as u64,
                    section.size.0
                );
            }
        }
    }

    #[test]
    fn test_named_section_lookup_round_trips() {
        let elf = Elf::from_region(Region::from(build_image(&nop_sled(), None))).unwrap();

        for section in elf.sections() {
            let Some(name) = elf.section_name(section).filter(|n| !n.is_empty()) else {
                continue;
            };
            assert_eq!(elf.section_by_name(name), Some(section));
        }
    }

    #[test]
    fn test_resolve_function() {
        let text = nop_sled();
        let elf = Elf::from_region(Region::from(build_image(&text, None))).unwrap();

        assert_eq!(elf.function_offset("main"), Some(0x401000));

        let chunk = elf.function_chunk("main").unwrap();
        assert_eq!(chunk.len(), 32);

        let section = elf.section_by_name(".text").unwrap();
        let data = elf.section_data(section).unwrap();
        assert_eq!(chunk, data.slice(0, 32).unwrap());
    }

    #[test]
    fn test_resolve_function_through_code_contract() {
        let elf = Elf::from_region(Region::from(build_image(&nop_sled(), None))).unwrap();
        let code: &dyn Code = &elf;

        assert_eq!(code.function_offset("main"), Some(0x401000));
        assert_eq!(code.function_chunk("main").map(|c| c.len()), Some(32));
    }

    #[test]
    fn test_missing_function_is_absent() {
        let elf = Elf::from_region(Region::from(build_image(&nop_sled(), None))).unwrap();
        assert_eq!(elf.function_offset("nope"), None);
        assert_eq!(elf.function_chunk("nope"), None);
    }

    #[test]
    fn test_function_chunk_decodes_as_a_chain() {
        let elf = Elf::from_region(Region::from(build_image(&nop_sled(), None))).unwrap();
        let chunk = elf.function_chunk("main").unwrap();
        let chain = crate::chain::Chain::from_bytes(0x401000, chunk).unwrap();

        assert_eq!(chain.instructions().len(), 32);
        assert_eq!(
            chain.instructions().iter().map(|i| i.len()).sum::<usize>(),
            chunk.len()
        );
    }

    #[test]
    fn test_section_tags_resolve_through_names() {
        let elf = Elf::from_region(Region::from(build_image(&nop_sled(), None))).unwrap();

        let symtab = elf.section_by_name(".symtab").unwrap();
        assert_eq!(elf.section_tag(symtab), Some(DynamicTag::SymbolTable));

        let text = elf.section_by_name(".text").unwrap();
        assert_eq!(elf.section_tag(text), None);
    }

    macro_rules! tag_test {
        ($name:literal, $tag:ident) => {
            paste! {
                #[test]
                fn [<test_tag_ $tag:snake>]() {
                    assert_eq!(
                        DynamicTag::for_section_name($name),
                        Some(DynamicTag::$tag)
                    );
                }
            }
        };
    }

    tag_test!(".init", Initializer);

    tag_test!(".fini", Finalizer);

    tag_test!(".hash", Hash);

    tag_test!(".strtab", StringTable);

    tag_test!(".symtab", SymbolTable);

    tag_test!(".rela.dyn", RelocationAddend);

    tag_test!(".rela.plt", JumpRelocations);

    tag_test!(".init_array", InitializerArray);

    tag_test!(".fini_array", FinalizerArray);

    tag_test!(".preinit_array", PreInitializerArray);

    #[test]
    fn test_offset_update_propagates_to_relocations() {
        let rela = Rela::builder()
            .offset(ElfAddr(0x401020))
            .info(Rela::info_for(1, RelocationKind::JumpSlot))
            .build();
        let mut elf =
            Elf::from_region(Region::from(build_image(&nop_sled(), Some(rela)))).unwrap();

        let text_index = elf.section_index_by_name(".text").unwrap();
        elf.update_symbols_offsets(text_index, 16).unwrap();

        let table = *elf.section_by_name(".rela.plt").unwrap();
        let entry = Rela::parse(&elf.section_data(&table).unwrap()).unwrap();
        assert_eq!(entry.offset, ElfAddr(0x401030));
        assert_eq!(entry.addend, ElfSxword(0));

        // symbols defined relative to .text move by the same delta
        assert_eq!(elf.function_offset("main"), Some(0x401010));
    }

    #[test]
    fn test_offset_update_adjusts_relative_addends() {
        let rela = Rela::builder()
            .offset(ElfAddr(0x401020))
            .info(Rela::info_for(0, RelocationKind::Relative))
            .addend(ElfSxword(0x401020))
            .build();
        let mut elf =
            Elf::from_region(Region::from(build_image(&nop_sled(), Some(rela)))).unwrap();

        let text_index = elf.section_index_by_name(".text").unwrap();
        elf.update_symbols_offsets(text_index, 16).unwrap();

        let table = *elf.section_by_name(".rela.plt").unwrap();
        let entry = Rela::parse(&elf.section_data(&table).unwrap()).unwrap();
        assert_eq!(entry.offset, ElfAddr(0x401030));
        assert_eq!(entry.addend, ElfSxword(0x401030));
    }

    #[test]
    fn test_unmutated_sync_round_trips() {
        let image = build_image(&nop_sled(), None);
        let mut elf = Elf::from_region(Region::from(image.clone())).unwrap();
        elf.sync().unwrap();
        assert_eq!(elf.region().as_slice(), image.as_slice());
    }

    #[test]
    fn test_add_then_remove_section_restores_image() {
        let image = build_image(&nop_sled(), None);
        let mut elf = Elf::from_region(Region::from(image.clone())).unwrap();

        // place the new section where .symtab currently sits, pushing the
        // symbol and string tables down
        let point = elf.section_by_name(".symtab").unwrap().offset;
        let added = Section::builder()
            .r#type(SectionType::ProgramBits)
            .offset(point)
            .size(ElfXword(32))
            .build();

        elf.add_section(added, &[0xcc; 32]).unwrap();
        assert_eq!(elf.sections().len(), 6);
        assert_eq!(elf.header().section_header_count, ElfHalf(6));

        // cross-referencing tables moved with the splice, so resolution
        // still works on the edited layout
        assert_eq!(elf.function_offset("main"), Some(0x401000));

        elf.remove_section(5).unwrap();
        assert_eq!(elf.sections().len(), 5);
        assert_eq!(elf.header().section_header_count, ElfHalf(5));
        assert_eq!(elf.region().as_slice(), image.as_slice());
    }

    #[test]
    fn test_add_section_rejects_mismatched_data() {
        let mut elf = Elf::from_region(Region::from(build_image(&nop_sled(), None))).unwrap();
        let before = elf.region().clone();

        let added = Section::builder()
            .r#type(SectionType::ProgramBits)
            .offset(ElfOff(0))
            .size(ElfXword(32))
            .build();

        assert_eq!(
            elf.add_section(added, &[0xcc; 16]).unwrap_err(),
            Error::SectionSizeMismatch {
                declared: 32,
                actual: 16
            }
        );
        assert_eq!(elf.sections().len(), 5);
        assert_eq!(elf.region(), &before);
    }

    #[test]
    fn test_removing_the_name_table_is_rejected() {
        let mut elf = Elf::from_region(Region::from(build_image(&nop_sled(), None))).unwrap();
        let before = elf.region().clone();

        assert_eq!(
            elf.remove_section(4).unwrap_err(),
            Error::SectionInUse {
                name: ".shstrtab".to_string()
            }
        );
        assert_eq!(elf.sections().len(), 5);
        assert_eq!(elf.region(), &before);
    }

    #[test]
    fn test_bad_magic_aborts_construction() {
        assert_eq!(
            Elf::from_region(Region::with_size(64)).unwrap_err(),
            Error::InvalidMagic { found: [0; 4] }
        );
    }

    #[test]
    fn test_truncated_section_table_aborts_construction() {
        let mut image = build_image(&nop_sled(), None);
        // drop the last section header record
        image.truncate(image.len() - 8);
        assert!(matches!(
            Elf::from_region(Region::from(image)).unwrap_err(),
            Error::Truncated { .. }
        ));
    }
}
