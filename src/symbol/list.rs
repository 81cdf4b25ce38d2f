//! Symbols and symbol lists.

use std::collections::HashMap;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::field::{FieldDescriptor, FieldRef};

/// One occurrence of a field within a blob.
///
/// A symbol does not hold the blob itself, only its position in it. Access
/// goes through [`value`](Self::value) with the blob the symbol was created
/// for, which is owned by a [`Layout`](super::Layout).
#[derive(Debug, Clone)]
pub struct Symbol {
    offset: usize,
    size: usize,
    field: FieldRef,
    original_value: Option<Vec<u8>>,
}

impl Symbol {
    /// Creates a symbol at the given blob position.
    pub fn new(offset: usize, size: usize, field: FieldRef) -> Self {
        Self {
            offset,
            size,
            field,
            original_value: None,
        }
    }

    /// Byte offset into the blob.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Actual size in bytes, possibly different from the field's expected size.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Byte range occupied in the blob.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.size
    }

    /// The field this symbol is an instance of.
    #[inline]
    pub fn field(&self) -> &FieldRef {
        &self.field
    }

    /// Symbol name of the field.
    #[inline]
    pub fn name(&self) -> &str {
        self.field.symbol()
    }

    /// Returns the symbol's bytes within `blob`.
    #[inline]
    pub fn value<'b>(&self, blob: &'b [u8]) -> &'b [u8] {
        &blob[self.range()]
    }

    /// Returns the symbol's bytes within `blob` for modification.
    #[inline]
    pub fn value_mut<'b>(&self, blob: &'b mut [u8]) -> &'b mut [u8] {
        &mut blob[self.range()]
    }

    /// Records the current value, unless a snapshot was taken already.
    pub fn snapshot(&mut self, blob: &[u8]) {
        if self.original_value.is_none() {
            self.original_value = Some(self.value(blob).to_vec());
        }
    }

    /// Value before the first recorded modification, if any.
    pub fn original_value(&self) -> Option<&[u8]> {
        self.original_value.as_deref()
    }

    /// Returns true if a snapshot exists and differs from the current value.
    pub fn is_changed(&self, blob: &[u8]) -> bool {
        self.original_value
            .as_deref()
            .is_some_and(|original| original != self.value(blob))
    }

    pub(crate) fn clip_to(&mut self, blob_len: usize) {
        self.size = self.size.min(blob_len.saturating_sub(self.offset));
    }
}

/// Ordered list of symbols, not necessarily sorted by offset.
#[derive(Debug, Clone, Default)]
pub struct SymbolList {
    symbols: Vec<Symbol>,
}

impl SymbolList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty list with room for `capacity` symbols.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut symbols = Vec::new();
        symbols
            .try_reserve(capacity)
            .map_err(|_| Error::allocation("symbol list", capacity * std::mem::size_of::<Symbol>()))?;
        Ok(Self { symbols })
    }

    /// Appends a symbol, growing storage on demand.
    pub fn push(&mut self, symbol: Symbol) -> Result<()> {
        self.symbols
            .try_reserve(1)
            .map_err(|_| Error::allocation("symbol list", std::mem::size_of::<Symbol>()))?;
        self.symbols.push(symbol);
        Ok(())
    }

    /// Releases storage reserved beyond the current symbol count.
    pub fn shrink_to_fit(&mut self) {
        self.symbols.shrink_to_fit();
    }

    /// Number of symbols.
    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if the list is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Returns the symbol at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    /// Returns the symbol at `index` for modification.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Symbol> {
        self.symbols.get_mut(index)
    }

    /// Iterates over symbols in list order.
    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }

    /// Iterates mutably over symbols in list order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Symbol> {
        self.symbols.iter_mut()
    }

    /// Finds the first symbol bound to the given field descriptor.
    pub fn find_field(&self, field: &FieldRef) -> Option<&Symbol> {
        self.symbols
            .iter()
            .find(|symbol| FieldDescriptor::same(&symbol.field, field))
    }

    /// Finds the first symbol whose field has the given name.
    pub fn find_symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|symbol| symbol.name() == name)
    }

    /// Builds a map from symbol name to list index.
    ///
    /// Fails if two symbols share a name, which violates the list invariant.
    pub fn index_by_name(&self) -> Result<HashMap<&str, usize>> {
        let mut index = HashMap::with_capacity(self.symbols.len());
        for (i, symbol) in self.symbols.iter().enumerate() {
            if index.insert(symbol.name(), i).is_some() {
                return Err(Error::DuplicateSymbol {
                    symbol: symbol.name().to_string(),
                });
            }
        }
        Ok(index)
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&Symbol) -> bool) {
        self.symbols.retain(f);
    }
}

impl FromIterator<Symbol> for SymbolList {
    fn from_iter<I: IntoIterator<Item = Symbol>>(iter: I) -> Self {
        Self {
            symbols: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SymbolList {
    type Item = &'a Symbol;
    type IntoIter = std::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}
