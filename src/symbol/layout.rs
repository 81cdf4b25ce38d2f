//! A blob together with the symbols describing it.

use tracing::{debug, warn};

use super::list::{Symbol, SymbolList};

/// One binary image and its symbol-to-offset mapping.
///
/// The layout owns the blob; every symbol in it refers to a range that lies
/// completely within the blob.
#[derive(Debug, Clone)]
pub struct Layout {
    section: String,
    base_address: u64,
    blob: Vec<u8>,
    symbols: SymbolList,
}

impl Layout {
    /// Creates a layout, clipping symbols to the blob.
    ///
    /// Symbols starting at or beyond the end of the blob are dropped.
    pub fn new(
        section: impl Into<String>,
        base_address: u64,
        blob: Vec<u8>,
        mut symbols: SymbolList,
    ) -> Self {
        let blob_len = blob.len();
        symbols.retain(|symbol| {
            let inside = symbol.offset() < blob_len;
            if !inside {
                warn!(
                    "Symbol {} at offset {:#x} lies outside the {}-byte blob",
                    symbol.name(),
                    symbol.offset(),
                    blob_len
                );
            }
            inside
        });
        for symbol in symbols.iter_mut() {
            symbol.clip_to(blob_len);
        }

        Self {
            section: section.into(),
            base_address,
            blob,
            symbols,
        }
    }

    /// Name of the section the blob was taken from.
    #[inline]
    pub fn section(&self) -> &str {
        &self.section
    }

    /// Address of the first blob byte in the symbol map's address space.
    #[inline]
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// The binary image.
    #[inline]
    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// The binary image, for in-place modification.
    #[inline]
    pub fn blob_mut(&mut self) -> &mut [u8] {
        &mut self.blob
    }

    /// The symbol list.
    #[inline]
    pub fn symbols(&self) -> &SymbolList {
        &self.symbols
    }

    /// Splits into mutable blob and symbol list, for stages touching both.
    #[inline]
    pub fn parts_mut(&mut self) -> (&mut [u8], &mut SymbolList) {
        (&mut self.blob, &mut self.symbols)
    }

    /// Consumes the layout, returning blob and symbol list.
    pub fn into_parts(self) -> (Vec<u8>, SymbolList) {
        (self.blob, self.symbols)
    }

    /// Returns the value of the named symbol.
    pub fn value_of(&self, name: &str) -> Option<&[u8]> {
        self.symbols
            .find_symbol(name)
            .map(|symbol| symbol.value(&self.blob))
    }

    /// Symbols whose value differs from the snapshot taken before modification.
    pub fn changed_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols
            .iter()
            .filter(move |symbol| symbol.is_changed(&self.blob))
    }

    /// Loads each symbol's value from image data at the same offsets.
    ///
    /// `image` holds the bytes actually provided by an image file. Symbols are
    /// filled as far as that data reaches; symbols starting beyond it are
    /// skipped. Loaded values are the baseline for change reporting, so no
    /// snapshot is taken. Returns the number of symbols loaded.
    pub fn merge_from(&mut self, image: &[u8]) -> usize {
        let mut loaded = 0;
        for symbol in self.symbols.iter() {
            if symbol.offset() >= image.len() {
                warn!(
                    "No image data for {} at offset {:#x} ({} bytes available)",
                    symbol.name(),
                    symbol.offset(),
                    image.len()
                );
                continue;
            }
            let end = symbol.range().end.min(image.len());
            let available = end - symbol.offset();
            symbol.value_mut(&mut self.blob)[..available]
                .copy_from_slice(&image[symbol.offset()..end]);
            debug!("Loaded {} bytes for {}", available, symbol.name());
            loaded += 1;
        }
        loaded
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::field::FieldDescriptor;

    fn layout(blob: Vec<u8>, symbols: &[(&'static str, usize, usize)]) -> Layout {
        let list = symbols
            .iter()
            .map(|&(name, offset, size)| {
                Symbol::new(offset, size, Arc::new(FieldDescriptor::unknown(name, size)))
            })
            .collect();
        Layout::new(".eeprom", 0x810000, blob, list)
    }

    #[test]
    fn test_new_clips_symbols() {
        let layout = layout(vec![0; 8], &[("a", 0, 4), ("b", 6, 4), ("c", 8, 2)]);
        assert_eq!(layout.symbols().len(), 2);
        assert_eq!(layout.symbols().find_symbol("b").unwrap().size(), 2);
        assert!(layout.symbols().find_symbol("c").is_none());
    }

    #[test]
    fn test_merge_partial_image() {
        let mut layout = layout(vec![0xEE; 8], &[("a", 0, 4), ("b", 4, 4)]);
        let loaded = layout.merge_from(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(loaded, 2);
        assert_eq!(layout.blob(), &[1, 2, 3, 4, 5, 6, 0xEE, 0xEE]);

        let loaded = layout.merge_from(&[9, 9]);
        assert_eq!(loaded, 1);
        assert_eq!(layout.value_of("a"), Some(&[9u8, 9, 3, 4][..]));
        assert_eq!(layout.changed_symbols().count(), 0);
    }

    #[test]
    fn test_changed_symbols() {
        let mut layout = layout(vec![0; 4], &[("a", 0, 2), ("b", 2, 2)]);
        let (blob, symbols) = layout.parts_mut();
        for symbol in symbols.iter_mut() {
            symbol.snapshot(blob);
        }
        blob[3] = 1;
        let changed: Vec<_> = layout.changed_symbols().map(|s| s.name()).collect();
        assert_eq!(changed, ["b"]);
    }
}
