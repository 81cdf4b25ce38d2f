//! Turns symbol map entries and section bytes into a typed layout.

use tracing::{debug, info, warn};

use super::layout::Layout;
use super::list::{Symbol, SymbolList};
use super::source::{RawSymbol, SectionData, SymbolSource};
use crate::error::{Error, Result};
use crate::field::FieldRegistry;

/// Reads a section and its symbols from a symbol source.
///
/// See [`materialize_section`] for how symbols are classified and sized.
pub fn materialize<S>(source: &S, section_name: &str, registry: &mut FieldRegistry) -> Result<Layout>
where
    S: SymbolSource + ?Sized,
{
    let section = source.section(section_name)?;
    let symbols = source.symbols()?;
    materialize_section(section_name, &section, symbols, registry)
}

/// Builds a layout from section content and symbol table entries.
///
/// The blob is a private copy of the section content, zero-padded to the
/// section size. Only non-empty symbols inside the section are kept. Each
/// symbol is bound to a known field or to a newly registered unknown field;
/// fields that encode their own length are resized from the blob content,
/// never past the end of the blob.
///
/// A section without any usable symbols yields an empty layout, not an error.
pub fn materialize_section<I>(
    section_name: &str,
    section: &SectionData<'_>,
    symbols: I,
    registry: &mut FieldRegistry,
) -> Result<Layout>
where
    I: IntoIterator<Item = RawSymbol>,
{
    let blob = copy_section(section)?;
    let mut list = SymbolList::with_capacity(registry.expected_count())?;

    for raw in symbols {
        if raw.section_index != Some(section.index) || raw.size == 0 {
            continue;
        }

        let declared = usize::try_from(raw.size).unwrap_or(usize::MAX);
        let field = registry.resolve(&raw.name, declared);

        let offset = match raw
            .value
            .checked_sub(section.address)
            .and_then(|offset| usize::try_from(offset).ok())
        {
            Some(offset) if offset < blob.len() => offset,
            _ => {
                warn!(
                    "Symbol {} at {:#x} lies outside section {} ({:#x}, {} bytes)",
                    raw.name,
                    raw.value,
                    section_name,
                    section.address,
                    blob.len()
                );
                continue;
            }
        };

        if list.find_field(&field).is_some() {
            warn!("Ignoring duplicate symbol {} at {:#x}", raw.name, raw.value);
            continue;
        }

        let mut size = declared;
        if field.expected_size() != size {
            if let Some(resized) = field.resize(&blob[offset..], size) {
                debug!("Resized {} from {} to {} bytes", raw.name, size, resized);
                size = resized;
            }
        }
        size = size.min(blob.len() - offset);

        list.push(Symbol::new(offset, size, field))?;
    }

    if list.is_empty() {
        warn!("No symbols found in section {}", section_name);
    } else {
        info!(
            "Found {} symbols in section {} ({} unknown fields)",
            list.len(),
            section_name,
            registry.unknown_count()
        );
    }
    list.shrink_to_fit();

    Ok(Layout::new(section_name, section.address, blob, list))
}

/// Copies section content into a freshly allocated blob.
fn copy_section(section: &SectionData<'_>) -> Result<Vec<u8>> {
    let size = usize::try_from(section.size)
        .map_err(|_| Error::allocation("image data", usize::MAX))?
        .max(section.data.len());

    let mut blob = Vec::new();
    blob.try_reserve_exact(size)
        .map_err(|_| Error::allocation("image data", size))?;
    blob.extend_from_slice(section.data);
    blob.resize(size, 0);
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::known::{UNIQUE_SYMBOL, VERSION_SYMBOL};
    use crate::field::FieldDescriptor;
    use crate::symbol::MemorySymbolMap;

    const BASE: u64 = 0x810000;

    fn section(data: &[u8]) -> SectionData<'_> {
        SectionData {
            index: 3,
            address: BASE,
            size: data.len() as u64,
            data,
        }
    }

    fn raw(name: &str, offset: u64, size: u64) -> RawSymbol {
        RawSymbol::new(name, BASE + offset, size, Some(3))
    }

    #[test]
    fn test_materialize_known_and_unknown() {
        let data = [0x39, 0x30, 0x01, 0xAA, 0xBB];
        let mut registry = FieldRegistry::builtin();
        let layout = materialize_section(
            ".eeprom",
            &section(&data),
            vec![raw(UNIQUE_SYMBOL, 0, 3), raw("nvm_extra", 3, 2)],
            &mut registry,
        )
        .unwrap();

        assert_eq!(layout.symbols().len(), 2);
        let unique = layout.symbols().find_symbol(UNIQUE_SYMBOL).unwrap();
        assert!(FieldDescriptor::same(
            unique.field(),
            registry.lookup(UNIQUE_SYMBOL).unwrap()
        ));
        assert_eq!(layout.value_of("nvm_extra"), Some(&[0xAA, 0xBB][..]));
        assert_eq!(registry.unknown_count(), 1);
        assert_eq!(registry.lookup("nvm_extra").unwrap().expected_size(), 2);
    }

    #[test]
    fn test_skips_empty_foreign_and_outside_symbols() {
        let data = [0u8; 4];
        let mut registry = FieldRegistry::builtin();
        let layout = materialize_section(
            ".eeprom",
            &section(&data),
            vec![
                raw("empty", 0, 0),
                RawSymbol::new("foreign", BASE, 2, Some(1)),
                RawSymbol::new("below", BASE - 2, 2, Some(3)),
                raw("beyond", 4, 2),
                raw("inside", 1, 2),
            ],
            &mut registry,
        )
        .unwrap();

        let names: Vec<_> = layout.symbols().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["inside"]);
    }

    #[test]
    fn test_resize_from_length_prefix() {
        // Symbol table claims 2 bytes, the length prefix says 1 + 4
        let data = [4, b'1', b'.', b'2', 0, 0xFF, 0xFF];
        let mut registry = FieldRegistry::builtin();
        let layout = materialize_section(
            ".eeprom",
            &section(&data),
            vec![raw(VERSION_SYMBOL, 0, 2)],
            &mut registry,
        )
        .unwrap();

        assert_eq!(layout.symbols().find_symbol(VERSION_SYMBOL).unwrap().size(), 5);
    }

    #[test]
    fn test_resize_clipped_to_blob() {
        let data = [0xF0, b'a', b'b', b'c'];
        let mut registry = FieldRegistry::builtin();
        let layout = materialize_section(
            ".eeprom",
            &section(&data),
            vec![raw(VERSION_SYMBOL, 0, 4)],
            &mut registry,
        )
        .unwrap();

        assert_eq!(layout.symbols().find_symbol(VERSION_SYMBOL).unwrap().size(), 4);
    }

    #[test]
    fn test_no_symbols_is_not_an_error() {
        let data = [0u8; 8];
        let mut registry = FieldRegistry::builtin();
        let layout =
            materialize_section(".eeprom", &section(&data), Vec::new(), &mut registry).unwrap();
        assert!(layout.symbols().is_empty());
        assert_eq!(layout.blob().len(), 8);
    }

    #[test]
    fn test_blob_padded_to_section_size() {
        let data = [1u8, 2];
        let section = SectionData {
            index: 3,
            address: BASE,
            size: 6,
            data: &data,
        };
        let mut registry = FieldRegistry::builtin();
        let layout =
            materialize_section(".eeprom", &section, vec![raw("tail", 4, 2)], &mut registry)
                .unwrap();
        assert_eq!(layout.blob(), &[1, 2, 0, 0, 0, 0]);
        assert_eq!(layout.symbols().len(), 1);
    }

    #[test]
    fn test_materialize_from_source() {
        let mut map = MemorySymbolMap::new();
        let index = map.add_section(".eeprom", BASE, vec![7; 4]);
        map.add_symbol("nvm_word", BASE + 2, 2, index);

        let mut registry = FieldRegistry::builtin();
        let layout = materialize(&map, ".eeprom", &mut registry).unwrap();
        assert_eq!(layout.base_address(), BASE);
        assert_eq!(layout.symbols().get(0).unwrap().offset(), 2);

        assert!(matches!(
            materialize(&map, ".data", &mut registry),
            Err(Error::SectionNotFound { .. })
        ));
    }
}
