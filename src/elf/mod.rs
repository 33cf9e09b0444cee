//! The concrete ELF object model. An [`Elf`] owns the byte [`Region`] an
//! image was parsed from along with its ordered section and program header
//! lists, and keeps the cross-referencing tables (symbol table, relocation
//! tables) consistent while the layout is edited.

use std::{io::Cursor, path::Path};

use tracing::{debug, trace};

use crate::{
    base::{ElfAddr, ElfHalf, ElfOff, ElfSxword},
    chunk::Chunk,
    error::{Error, Result},
    header::{
        dynamic::DynamicTag,
        elf::ElfHeader,
        program::ProgramHeader,
        relocation::{Rela, RelocationKind},
        section::{Section, SectionType},
        symbol::{Symbol, SymbolType},
    },
    region::Region,
    Code, Config, FromReader, HasWrittenSize, ToWriter,
};

/// The relocation table names whose entries are rewritten when a section's
/// layout shifts
const RELOCATION_TABLE_NAMES: [&str; 2] = [".rela.dyn", ".rela.plt"];

/// Add a signed delta to an unsigned file offset or address
fn shifted(value: u64, delta: i64, available: u64) -> Result<u64> {
    value.checked_add_signed(delta).ok_or(Error::OutOfRange {
        offset: value,
        length: delta.unsigned_abs(),
        available,
    })
}

#[derive(Debug, Clone)]
/// A parsed 64-bit little-endian ELF image. Parsing is all-or-nothing: a
/// structural failure (bad magic, truncated tables, out-of-range section
/// data) aborts construction and no partial object is observable. After
/// construction, lookups that find nothing return `None` and mutations that
/// would violate an invariant fail without changing the object.
pub struct Elf {
    /// The backing byte store the image was parsed from
    region: Region,
    /// The file header
    header: ElfHeader,
    /// The section list, in section header table order
    sections: Vec<Section>,
    /// The program header list, in program header table order
    program_headers: Vec<ProgramHeader>,
    /// The index of the section name string table, resolved from the file
    /// header at parse time
    section_name_table: Option<usize>,
    /// The index of the first string table section named `.strtab`,
    /// resolved by linear scan at parse time
    string_table: Option<usize>,
}

impl Elf {
    /// Load an ELF image from a file on the filesystem
    pub fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        Self::from_region(Region::load(path)?)
    }

    /// Parse an ELF image from an owned region
    pub fn from_region(region: Region) -> Result<Self> {
        Self::from_region_with(region, &mut Config::default())
    }

    /// Parse an ELF image from an owned region with a decode configuration
    pub fn from_region_with(region: Region, config: &mut Config) -> Result<Self> {
        let header = ElfHeader::from_reader_with(&mut Cursor::new(region.as_slice()), config)?;

        let section_offset = header.section_header_offset.0;
        let section_count = header.section_header_count.0 as u64;
        let section_table_size = section_count * Section::SIZE as u64;

        if section_offset
            .checked_add(section_table_size)
            .map_or(true, |end| end > region.len() as u64)
        {
            return Err(Error::Truncated {
                offset: section_offset,
                needed: section_table_size,
            });
        }

        let mut sections = Vec::with_capacity(section_count as usize);

        for i in 0..section_count {
            let chunk =
                region.chunk_at(section_offset + i * Section::SIZE as u64, Section::SIZE as u64)?;
            sections.push(Section::from_reader_with(
                &mut Cursor::new(chunk.as_bytes()),
                config,
            )?);
        }

        for section in &sections {
            if section.r#type != SectionType::NoBits
                && section.size.0 > 0
                && region.chunk_at(section.offset.0, section.size.0).is_err()
            {
                return Err(Error::Truncated {
                    offset: section.offset.0,
                    needed: section.size.0,
                });
            }
        }

        let program_offset = header.program_header_offset.0;
        let program_count = header.program_header_count.0 as u64;
        let program_table_size = program_count * ProgramHeader::SIZE as u64;

        if program_offset
            .checked_add(program_table_size)
            .map_or(true, |end| end > region.len() as u64)
        {
            return Err(Error::Truncated {
                offset: program_offset,
                needed: program_table_size,
            });
        }

        let mut program_headers = Vec::with_capacity(program_count as usize);

        for i in 0..program_count {
            let chunk = region.chunk_at(
                program_offset + i * ProgramHeader::SIZE as u64,
                ProgramHeader::SIZE as u64,
            )?;
            program_headers.push(ProgramHeader::from_reader_with(
                &mut Cursor::new(chunk.as_bytes()),
                config,
            )?);
        }

        // Index 0 in the e_shstrndx field is SHN_UNDEF: no name table
        let name_index = header.section_name_table_index.0;
        let section_name_table = if name_index == 0 {
            None
        } else {
            match sections.get(name_index as usize) {
                Some(section) if section.r#type == SectionType::StringTable => {
                    Some(name_index as usize)
                }
                _ => {
                    return Err(Error::InvalidSectionNameTableIndex {
                        index: name_index,
                        count: sections.len(),
                    })
                }
            }
        };

        let mut elf = Self {
            region,
            header,
            sections,
            program_headers,
            section_name_table,
            string_table: None,
        };

        let string_table = elf.sections.iter().position(|s| {
            s.r#type == SectionType::StringTable && elf.section_name(s) == Some(".strtab")
        });
        elf.string_table = string_table;

        debug!(
            sections = elf.sections.len(),
            program_headers = elf.program_headers.len(),
            string_table = ?elf.string_table,
            "parsed ELF image"
        );

        Ok(elf)
    }

    /// The file header
    pub fn header(&self) -> &ElfHeader {
        &self.header
    }

    /// The backing region
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Consume the object, returning the backing region
    pub fn into_region(self) -> Region {
        self.region
    }

    /// The section list, in section header table order
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The program header list, in program header table order
    pub fn program_headers(&self) -> &[ProgramHeader] {
        &self.program_headers
    }

    /// Mutable access to the section at `index`, for in-place field edits
    pub fn section_mut(&mut self, index: usize) -> Option<&mut Section> {
        self.sections.get_mut(index)
    }

    /// Resolve a section's name through the section name string table.
    /// `None` when the image carries no name table, the name offset runs
    /// past the table, or the name is not valid UTF-8.
    pub fn section_name(&self, section: &Section) -> Option<&str> {
        let table = self.sections.get(self.section_name_table?)?;
        let data = self.section_data(table).ok()?;
        string_at(&data, section.name.0 as u64)
    }

    /// The first section whose resolved name equals `name`, in section table
    /// order. Sections with empty names (the null section) never match.
    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| {
            self.section_name(s)
                .is_some_and(|n| !n.is_empty() && n == name)
        })
    }

    /// The index of the first section whose resolved name equals `name`
    pub fn section_index_by_name(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| {
            self.section_name(s)
                .is_some_and(|n| !n.is_empty() && n == name)
        })
    }

    /// The first section of the given type, in section table order
    pub fn section_by_type(&self, r#type: SectionType) -> Option<&Section> {
        self.sections.iter().find(|s| s.r#type == r#type)
    }

    /// The first section whose virtual address range contains `address`
    pub fn section_containing(&self, address: u64) -> Option<&Section> {
        self.sections.iter().find(|s| {
            s.size.0 > 0
                && s.address.0 <= address
                && address < s.address.0.saturating_add(s.size.0)
        })
    }

    /// The chunk of region bytes backing a section. A `NoBits` or zero-size
    /// section yields the empty chunk.
    pub fn section_data(&self, section: &Section) -> Result<Chunk<'_>> {
        if section.r#type == SectionType::NoBits || section.size.0 == 0 {
            return Ok(Chunk::EMPTY);
        }

        self.region.chunk_at(section.offset.0, section.size.0)
    }

    /// The chunk of region bytes backing a segment's file image
    pub fn program_header_data(&self, header: &ProgramHeader) -> Result<Chunk<'_>> {
        if header.file_size.0 == 0 {
            return Ok(Chunk::EMPTY);
        }

        self.region.chunk_at(header.offset.0, header.file_size.0)
    }

    /// The conventional dynamic-table tag for a section, resolved through
    /// its name
    pub fn section_tag(&self, section: &Section) -> Option<DynamicTag> {
        self.section_name(section)
            .and_then(DynamicTag::for_section_name)
    }

    /// Iterate the entries of the symbol table. Empty when the image carries
    /// no `SymbolTable` section.
    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.section_by_type(SectionType::SymbolTable)
            .and_then(|s| self.section_data(s).ok())
            .map(|c| c.as_bytes())
            .unwrap_or(&[])
            .chunks_exact(Symbol::SIZE)
            .filter_map(|raw| Symbol::parse(&Chunk::new(raw)).ok())
    }

    /// Iterate the function symbols of the symbol table
    pub fn function_symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.symbols()
            .filter(|s| s.r#type() == Some(SymbolType::Function))
    }

    /// Resolve a symbol's name through the `.strtab` string table
    pub fn symbol_name(&self, symbol: &Symbol) -> Option<&str> {
        let table = self.sections.get(self.string_table?)?;
        let data = self.section_data(table).ok()?;
        string_at(&data, symbol.name.0 as u64)
    }

    /// The virtual address of the first function symbol named `name`
    pub fn function_offset(&self, name: &str) -> Option<u64> {
        self.function_symbols()
            .find(|s| self.symbol_name(s) == Some(name))
            .map(|s| s.value.0)
    }

    /// The chunk of bytes backing the first function symbol named `name`:
    /// the sub-chunk of the containing section starting at the function's
    /// intra-section offset, of the symbol's declared size
    pub fn function_chunk(&self, name: &str) -> Option<Chunk<'_>> {
        let symbol = self
            .function_symbols()
            .find(|s| self.symbol_name(s) == Some(name))?;
        let section = self.section_containing(symbol.value.0)?;
        let data = self.section_data(section).ok()?;
        data.slice(symbol.value.0 - section.address.0, symbol.size.0).ok()
    }

    /// Append a section whose header the caller has fully prepared,
    /// including its `offset` placement, and splice its backing bytes into
    /// the region at that offset. Every section whose data now sits later in
    /// the file has its offset shifted and its symbol and relocation entries
    /// rewritten. Fails without mutating when `data` disagrees with the
    /// declared size or the placement lies outside the region.
    pub fn add_section(&mut self, section: Section, data: &[u8]) -> Result<()> {
        let declared = if section.r#type == SectionType::NoBits {
            0
        } else {
            section.size.0
        };

        if data.len() as u64 != declared {
            return Err(Error::SectionSizeMismatch {
                declared,
                actual: data.len() as u64,
            });
        }

        let point = section.offset.0;

        if point > self.region.len() as u64 {
            return Err(Error::OutOfRange {
                offset: point,
                length: data.len() as u64,
                available: self.region.len() as u64,
            });
        }

        self.region.insert(point, data)?;
        self.shift_layout(point, data.len() as i64, None)?;
        self.sections.push(section);
        self.header.section_header_count = ElfHalf(self.sections.len() as u16);

        debug!(
            offset = point,
            len = data.len(),
            sections = self.sections.len(),
            "added section"
        );

        Ok(())
    }

    /// Remove the section at `index` and splice its backing bytes out of the
    /// region, shifting trailing sections back down and rewriting their
    /// symbol and relocation entries. Refuses to remove the section backing
    /// the section name table. Returns the removed section header.
    ///
    /// Section indexes recorded elsewhere (sh_link, sh_info, st_shndx) are
    /// not renumbered.
    pub fn remove_section(&mut self, index: usize) -> Result<Section> {
        let Some(section) = self.sections.get(index).copied() else {
            return Err(Error::BadSectionIndex {
                index,
                count: self.sections.len(),
            });
        };

        if Some(index) == self.section_name_table {
            return Err(Error::SectionInUse {
                name: self.section_name(&section).unwrap_or_default().to_string(),
            });
        }

        let length = if section.r#type == SectionType::NoBits {
            0
        } else {
            section.size.0
        };
        let point = section.offset.0;

        self.region.remove(point, length)?;
        self.shift_layout(point + length, -(length as i64), Some(index))?;

        self.sections.remove(index);
        self.header.section_header_count = ElfHalf(self.sections.len() as u16);

        if let Some(table) = self.section_name_table {
            if table > index {
                self.section_name_table = Some(table - 1);
                self.header.section_name_table_index = ElfHalf((table - 1) as u16);
            }
        }

        match self.string_table {
            Some(table) if table == index => self.string_table = None,
            Some(table) if table > index => self.string_table = Some(table - 1),
            _ => {}
        }

        debug!(
            index,
            offset = point,
            len = length,
            sections = self.sections.len(),
            "removed section"
        );

        Ok(section)
    }

    /// Append a program header, keeping the file header's count in step
    pub fn add_program_header(&mut self, header: ProgramHeader) {
        self.program_headers.push(header);
        self.header.program_header_count = ElfHalf(self.program_headers.len() as u16);
    }

    /// Remove the program header at `index`, keeping the file header's count
    /// in step
    pub fn remove_program_header(&mut self, index: usize) -> Result<ProgramHeader> {
        if index >= self.program_headers.len() {
            return Err(Error::BadProgramHeaderIndex {
                index,
                count: self.program_headers.len(),
            });
        }

        let header = self.program_headers.remove(index);
        self.header.program_header_count = ElfHalf(self.program_headers.len() as u16);
        Ok(header)
    }

    /// Rewrite the cross-referencing tables for a section whose layout
    /// shifted by `delta` bytes: every symbol table entry defined relative
    /// to the section has `delta` added to its value, and every `.rela.dyn`
    /// and `.rela.plt` entry whose offset lies in the section's virtual
    /// range has `delta` added to its offset. Entries of kind `Relative`
    /// additionally have their addend adjusted by the same delta.
    pub fn update_symbols_offsets(&mut self, section_index: usize, delta: i64) -> Result<()> {
        let Some(target) = self.sections.get(section_index).copied() else {
            return Err(Error::BadSectionIndex {
                index: section_index,
                count: self.sections.len(),
            });
        };

        let available = self.region.len() as u64;

        if let Some(symtab) = self.section_by_type(SectionType::SymbolTable).copied() {
            let base = symtab.offset.0;

            for i in 0..symtab.size.0 / Symbol::SIZE as u64 {
                let at = base + i * Symbol::SIZE as u64;
                let chunk = self.region.chunk_at(at, Symbol::SIZE as u64)?;
                let mut symbol = Symbol::parse(&chunk)?;

                if symbol.section_index.0 as usize == section_index {
                    symbol.value = ElfAddr(shifted(symbol.value.0, delta, available)?);
                    self.region.write_at(at, &symbol.serialize()?)?;
                    trace!(index = i, value = symbol.value.0, "rewrote symbol value");
                }
            }
        }

        let low = target.address.0;
        let high = low.saturating_add(target.size.0);

        for name in RELOCATION_TABLE_NAMES {
            let Some(table) = self.section_by_name(name).copied() else {
                continue;
            };

            let base = table.offset.0;

            for i in 0..table.size.0 / Rela::SIZE as u64 {
                let at = base + i * Rela::SIZE as u64;
                let chunk = self.region.chunk_at(at, Rela::SIZE as u64)?;
                let mut rela = Rela::parse(&chunk)?;

                if rela.offset.0 >= low && rela.offset.0 < high {
                    rela.offset = ElfAddr(shifted(rela.offset.0, delta, available)?);

                    if rela.kind() == Some(RelocationKind::Relative) {
                        rela.addend = ElfSxword(rela.addend.0.wrapping_add(delta));
                    }

                    self.region.write_at(at, &rela.serialize()?)?;
                    trace!(table = name, index = i, offset = rela.offset.0, "rewrote relocation");
                }
            }
        }

        Ok(())
    }

    /// Write the file header and every section and program header record
    /// back into the region at their recorded offsets. A freshly parsed,
    /// unmutated object syncs to a region byte-identical to its input.
    pub fn sync(&mut self) -> Result<()> {
        let mut buf = [0u8; ElfHeader::SIZE];
        self.header
            .to_writer(&mut Cursor::new(buf.as_mut_slice()))?;
        self.region.write_at(0, &buf)?;

        let program_offset = self.header.program_header_offset.0;

        for (i, header) in self.program_headers.iter().enumerate() {
            self.region.write_at(
                program_offset + (i * ProgramHeader::SIZE) as u64,
                &header.serialize()?,
            )?;
        }

        let section_offset = self.header.section_header_offset.0;

        for (i, section) in self.sections.iter().enumerate() {
            self.region.write_at(
                section_offset + (i * Section::SIZE) as u64,
                &section.serialize()?,
            )?;
        }

        Ok(())
    }

    /// Shift the recorded file offset of every layout structure at or past
    /// `threshold` by `delta`, then rewrite the cross-referencing tables for
    /// each shifted section. `skip` names a section index exempt from
    /// shifting (the one being removed).
    fn shift_layout(&mut self, threshold: u64, delta: i64, skip: Option<usize>) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }

        let available = self.region.len() as u64;
        let stale = self
            .sections
            .iter()
            .enumerate()
            .filter(|(i, s)| Some(*i) != skip && s.offset.0 >= threshold)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        for &i in &stale {
            self.sections[i].offset = ElfOff(shifted(self.sections[i].offset.0, delta, available)?);
        }

        if self.header.section_header_offset.0 >= threshold {
            self.header.section_header_offset =
                ElfOff(shifted(self.header.section_header_offset.0, delta, available)?);
        }

        if self.header.program_header_offset.0 != 0
            && self.header.program_header_offset.0 >= threshold
        {
            self.header.program_header_offset =
                ElfOff(shifted(self.header.program_header_offset.0, delta, available)?);
        }

        for header in &mut self.program_headers {
            if header.offset.0 >= threshold {
                header.offset = ElfOff(shifted(header.offset.0, delta, available)?);
            }
        }

        for i in stale {
            self.update_symbols_offsets(i, delta)?;
        }

        Ok(())
    }
}

impl Code for Elf {
    fn function_offset(&self, name: &str) -> Option<u64> {
        Elf::function_offset(self, name)
    }

    fn function_chunk(&self, name: &str) -> Option<Chunk<'_>> {
        Elf::function_chunk(self, name)
    }
}

/// Read the null-terminated string at `offset` within a string table chunk
fn string_at<'a>(data: &Chunk<'a>, offset: u64) -> Option<&'a str> {
    let bytes = data.as_bytes().get(offset as usize..)?;
    let end = bytes.iter().position(|b| *b == 0)?;
    std::str::from_utf8(&bytes[..end]).ok()
}
