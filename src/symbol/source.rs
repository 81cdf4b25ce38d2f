//! Sources of symbol metadata and section content.

use crate::error::{Error, Result};

/// Symbol table entry as supplied by a symbol map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSymbol {
    /// Symbol name
    pub name: String,
    /// Virtual address
    pub value: u64,
    /// Size in bytes
    pub size: u64,
    /// Index of the containing section, if any
    pub section_index: Option<usize>,
}

impl RawSymbol {
    /// Creates a symbol table entry.
    pub fn new(name: impl Into<String>, value: u64, size: u64, section_index: Option<usize>) -> Self {
        Self {
            name: name.into(),
            value,
            size,
            section_index,
        }
    }
}

/// Content and placement of the data section of interest.
#[derive(Debug, Clone, Copy)]
pub struct SectionData<'a> {
    /// Section index, matched against [`RawSymbol::section_index`]
    pub index: usize,
    /// Virtual address of the first section byte
    pub address: u64,
    /// Section size in bytes
    pub size: u64,
    /// Stored content; shorter than `size` for sections without file data
    pub data: &'a [u8],
}

/// Provider of a data section and the symbols describing it.
pub trait SymbolSource {
    /// Returns the named section.
    fn section(&self, name: &str) -> Result<SectionData<'_>>;

    /// Returns all symbol table entries in table order.
    fn symbols(&self) -> Result<Vec<RawSymbol>>;
}

/// Symbol source backed by data already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySymbolMap {
    sections: Vec<(String, u64, Vec<u8>)>,
    symbols: Vec<RawSymbol>,
}

impl MemorySymbolMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a section and returns its index.
    pub fn add_section(&mut self, name: impl Into<String>, address: u64, data: Vec<u8>) -> usize {
        self.sections.push((name.into(), address, data));
        self.sections.len() - 1
    }

    /// Adds a symbol located in the given section.
    pub fn add_symbol(&mut self, name: impl Into<String>, value: u64, size: u64, section: usize) {
        self.symbols
            .push(RawSymbol::new(name, value, size, Some(section)));
    }

    /// Adds a symbol table entry as is.
    pub fn push_raw(&mut self, symbol: RawSymbol) {
        self.symbols.push(symbol);
    }
}

impl SymbolSource for MemorySymbolMap {
    fn section(&self, name: &str) -> Result<SectionData<'_>> {
        self.sections
            .iter()
            .enumerate()
            .find(|(_, (section, _, _))| section == name)
            .map(|(index, (_, address, data))| SectionData {
                index,
                address: *address,
                size: data.len() as u64,
                data,
            })
            .ok_or_else(|| Error::SectionNotFound {
                name: name.to_string(),
            })
    }

    fn symbols(&self) -> Result<Vec<RawSymbol>> {
        Ok(self.symbols.clone())
    }
}
