//! ELF symbol maps.
//!
//! The linked firmware ELF file is the authoritative description of the
//! non-volatile memory layout: one section (e.g. `.eeprom`) holds the default
//! content and the static symbol table names every field in it.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use object::{BinaryFormat, Object, ObjectSection, ObjectSymbol, ObjectSymbolTable};
use tracing::debug;

use super::source::{RawSymbol, SectionData, SymbolSource};
use crate::error::{Error, Result};

/// Symbol map read from a memory-mapped ELF file.
#[derive(Debug)]
pub struct ElfSymbolMap {
    mmap: Mmap,
    path: PathBuf,
}

impl ElfSymbolMap {
    /// Opens and validates an ELF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path).map_err(|e| Error::FileOpen {
            path: path.clone(),
            source: e,
        })?;

        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MemoryMap {
            path: path.clone(),
            source: e,
        })?;

        let map = Self { mmap, path };
        let format = map.parse()?.format();
        if format != BinaryFormat::Elf {
            return Err(map.invalid(format!("not an ELF object ({:?})", format)));
        }
        debug!("Opened symbol map {}", map.path.display());

        Ok(map)
    }

    /// Path of the ELF file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self) -> Result<object::File<'_>> {
        object::File::parse(&*self.mmap).map_err(|e| self.invalid(e))
    }

    fn invalid(&self, reason: impl ToString) -> Error {
        Error::InvalidElf {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl SymbolSource for ElfSymbolMap {
    fn section(&self, name: &str) -> Result<SectionData<'_>> {
        let object = self.parse()?;
        let section = object
            .section_by_name(name)
            .ok_or_else(|| Error::SectionNotFound {
                name: name.to_string(),
            })?;
        let data = section.data().map_err(|e| self.invalid(e))?;

        Ok(SectionData {
            index: section.index().0,
            address: section.address(),
            size: section.size(),
            data,
        })
    }

    fn symbols(&self) -> Result<Vec<RawSymbol>> {
        let object = self.parse()?;
        let table = object.symbol_table().ok_or(Error::SymbolTableNotFound)?;

        let mut symbols = Vec::new();
        for symbol in table.symbols() {
            let name = match symbol.name() {
                Ok(name) => name,
                Err(e) => {
                    debug!("Skipping symbol {}: {}", symbol.index().0, e);
                    continue;
                }
            };
            symbols.push(RawSymbol::new(
                name,
                symbol.address(),
                symbol.size(),
                symbol.section_index().map(|index| index.0),
            ));
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use object::write::{self, SymbolSection};
    use object::{Architecture, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope};

    use super::*;
    use crate::field::FieldRegistry;
    use crate::symbol::materialize;

    fn add_symbol(
        obj: &mut write::Object<'_>,
        name: &str,
        section: write::SectionId,
        value: u64,
        size: u64,
    ) {
        obj.add_symbol(write::Symbol {
            name: name.as_bytes().to_vec(),
            value,
            size,
            kind: SymbolKind::Data,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(section),
            flags: SymbolFlags::None,
        });
    }

    /// Relocatable ELF with an `.eeprom` section, code and an uninitialized section.
    fn firmware_elf() -> tempfile::NamedTempFile {
        let mut obj =
            write::Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);

        let text = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
        obj.append_section_data(text, &[0xC3; 8], 1);
        let eeprom = obj.add_section(Vec::new(), b".eeprom".to_vec(), SectionKind::Data);
        obj.append_section_data(eeprom, &[0x11, 0x22, 0x33, 0x44, 0x39, 0x30, 0x01, 0xFF], 1);
        let noinit = obj.add_section(
            Vec::new(),
            b".noinit".to_vec(),
            SectionKind::UninitializedData,
        );
        obj.append_section_bss(noinit, 6, 1);

        add_symbol(&mut obj, "main", text, 0, 8);
        add_symbol(&mut obj, "nvm_crc", eeprom, 0, 4);
        add_symbol(&mut obj, "nvm_unique", eeprom, 4, 3);
        add_symbol(&mut obj, "nvm_scratch", noinit, 2, 4);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&obj.write().unwrap()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_materialize_from_elf() {
        let file = firmware_elf();
        let map = ElfSymbolMap::open(file.path()).unwrap();

        let eeprom = map.section(".eeprom").unwrap();
        let main = map
            .symbols()
            .unwrap()
            .into_iter()
            .find(|symbol| symbol.name == "main")
            .unwrap();
        assert_ne!(main.section_index, Some(eeprom.index));

        let mut registry = FieldRegistry::builtin();
        let layout = materialize(&map, ".eeprom", &mut registry).unwrap();
        assert_eq!(layout.blob().len(), 8);
        assert_eq!(layout.symbols().len(), 2);
        assert!(layout.symbols().find_symbol("main").is_none());
        assert_eq!(layout.value_of("nvm_crc"), Some(&[0x11, 0x22, 0x33, 0x44][..]));
        assert_eq!(layout.value_of("nvm_unique"), Some(&[0x39, 0x30, 0x01][..]));
        assert_eq!(registry.unknown_count(), 0);
    }

    #[test]
    fn test_uninitialized_section_is_zero_filled() {
        let file = firmware_elf();
        let map = ElfSymbolMap::open(file.path()).unwrap();

        let section = map.section(".noinit").unwrap();
        assert_eq!(section.size, 6);

        let mut registry = FieldRegistry::builtin();
        let layout = materialize(&map, ".noinit", &mut registry).unwrap();
        assert_eq!(layout.blob(), &[0; 6]);
        assert_eq!(layout.symbols().find_symbol("nvm_scratch").unwrap().offset(), 2);
    }

    #[test]
    fn test_missing_section() {
        let file = firmware_elf();
        let map = ElfSymbolMap::open(file.path()).unwrap();
        assert!(matches!(
            map.section(".data"),
            Err(Error::SectionNotFound { .. })
        ));
    }

    #[test]
    fn test_open_missing_file() {
        let err = ElfSymbolMap::open("/nonexistent/firmware.elf").unwrap_err();
        assert!(matches!(err, Error::FileOpen { .. }));
    }

    #[test]
    fn test_open_rejects_non_elf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not an object file at all").unwrap();
        file.flush().unwrap();

        let err = ElfSymbolMap::open(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidElf { .. }));
    }
}
