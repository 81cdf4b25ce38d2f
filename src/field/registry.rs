//! Field registry: known field catalog plus fields discovered while parsing.

use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use super::descriptor::{FieldDescriptor, FieldRef};
use super::known::builtin_fields;

/// Immutable table of known fields, sorted by symbol name.
#[derive(Debug)]
pub struct FieldCatalog {
    fields: Vec<FieldRef>,
}

impl FieldCatalog {
    /// Creates a catalog from the given descriptors.
    ///
    /// Descriptors are sorted by symbol name. If a name occurs more than once,
    /// only the first descriptor is kept.
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        let mut fields: Vec<FieldRef> = fields.into_iter().map(Arc::new).collect();
        fields.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        fields.dedup_by(|dup, kept| {
            let same = dup.symbol() == kept.symbol();
            if same {
                warn!("Ignoring duplicate known field {}", dup.symbol());
            }
            same
        });
        Self { fields }
    }

    /// Returns the process-wide catalog of built-in fields.
    pub fn builtin() -> Arc<FieldCatalog> {
        static BUILTIN: OnceLock<Arc<FieldCatalog>> = OnceLock::new();
        Arc::clone(BUILTIN.get_or_init(|| Arc::new(FieldCatalog::new(builtin_fields()))))
    }

    /// Finds a known field by exact, case-sensitive symbol name.
    pub fn find(&self, symbol: &str) -> Option<&FieldRef> {
        self.fields
            .binary_search_by(|field| field.symbol().cmp(symbol))
            .ok()
            .map(|index| &self.fields[index])
    }

    /// Number of known fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the catalog has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over known fields in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldRef> {
        self.fields.iter()
    }
}

/// Field lookup for one parse session.
///
/// Known fields come from a shared [`FieldCatalog`]. Symbols without a known
/// field get a descriptor appended to this registry's unknown list, which only
/// grows. Handles to unknown descriptors stay valid after later insertions.
#[derive(Debug)]
pub struct FieldRegistry {
    known: Arc<FieldCatalog>,
    unknown: Vec<FieldRef>,
}

impl FieldRegistry {
    /// Creates a registry over the given catalog with an empty unknown list.
    pub fn new(known: Arc<FieldCatalog>) -> Self {
        Self {
            known,
            unknown: Vec::new(),
        }
    }

    /// Creates a registry over the built-in catalog.
    pub fn builtin() -> Self {
        Self::new(FieldCatalog::builtin())
    }

    /// Looks up a field, known fields first, then fields found while parsing.
    pub fn lookup(&self, symbol: &str) -> Option<&FieldRef> {
        self.known
            .find(symbol)
            .or_else(|| self.unknown.iter().find(|field| field.symbol() == symbol))
    }

    /// Appends a descriptor for a symbol without a known field.
    ///
    /// Callers must check [`lookup`](Self::lookup) first; registering a name
    /// twice is a logic error.
    pub fn register_unknown(&mut self, symbol: &str, observed_size: usize) -> FieldRef {
        debug_assert!(
            self.lookup(symbol).is_none(),
            "field {symbol} registered twice"
        );
        debug!("Unknown field {} ({} bytes)", symbol, observed_size);
        let field = Arc::new(FieldDescriptor::unknown(symbol.to_string(), observed_size));
        self.unknown.push(Arc::clone(&field));
        field
    }

    /// Looks up a field, registering it as unknown if not found.
    pub fn resolve(&mut self, symbol: &str, observed_size: usize) -> FieldRef {
        match self.lookup(symbol) {
            Some(field) => Arc::clone(field),
            None => self.register_unknown(symbol, observed_size),
        }
    }

    /// Number of known fields, used to pre-size symbol lists.
    #[inline]
    pub fn expected_count(&self) -> usize {
        self.known.len()
    }

    /// Number of fields discovered during this session.
    #[inline]
    pub fn unknown_count(&self) -> usize {
        self.unknown.len()
    }

    /// Returns the known field catalog.
    pub fn catalog(&self) -> &Arc<FieldCatalog> {
        &self.known
    }

    /// Iterates over fields discovered during this session.
    pub fn unknown_fields(&self) -> impl Iterator<Item = &FieldRef> {
        self.unknown.iter()
    }

    /// Forgets all discovered fields, starting a new session.
    ///
    /// Handles already given out stay valid but will no longer be found.
    pub fn reset(&mut self) {
        self.unknown.clear();
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::descriptor::Verbatim;
    use crate::field::known::{CHECKSUM_SYMBOL, UNIQUE_SYMBOL, VERSION_SYMBOL};

    #[test]
    fn test_builtin_lookup() {
        let registry = FieldRegistry::builtin();
        assert_eq!(registry.expected_count(), 3);
        assert_eq!(registry.lookup(VERSION_SYMBOL).unwrap().symbol(), VERSION_SYMBOL);
        assert_eq!(registry.lookup(CHECKSUM_SYMBOL).unwrap().expected_size(), 4);
        assert!(registry.lookup("NVM_VERSION").is_none());
        assert!(registry.lookup("nvm_").is_none());
    }

    #[test]
    fn test_builtin_catalog_shared() {
        let a = FieldRegistry::builtin();
        let b = FieldRegistry::builtin();
        assert!(FieldDescriptor::same(
            a.lookup(UNIQUE_SYMBOL).unwrap(),
            b.lookup(UNIQUE_SYMBOL).unwrap()
        ));
    }

    #[test]
    fn test_catalog_sorted_and_deduplicated() {
        let catalog = FieldCatalog::new(vec![
            FieldDescriptor::new("zeta", "Z", 1, Verbatim),
            FieldDescriptor::new("alpha", "first", 1, Verbatim),
            FieldDescriptor::new("alpha", "second", 1, Verbatim),
        ]);
        assert_eq!(catalog.len(), 2);
        let names: Vec<_> = catalog.iter().map(|f| f.symbol()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert_eq!(catalog.find("alpha").unwrap().description(), "first");
    }

    #[test]
    fn test_unknown_fields_stable() {
        let mut registry = FieldRegistry::builtin();
        let first = registry.register_unknown("nvm_first", 4);
        let second = registry.register_unknown("nvm_second", 8);
        assert!(!FieldDescriptor::same(&first, &second));

        for i in 0..64 {
            registry.register_unknown(&format!("nvm_filler_{i}"), i);
        }

        let again = registry.lookup("nvm_first").unwrap();
        assert!(FieldDescriptor::same(&first, again));
        assert_eq!(again.expected_size(), 4);
        assert_eq!(registry.unknown_count(), 66);
    }

    #[test]
    fn test_resolve_prefers_existing() {
        let mut registry = FieldRegistry::builtin();
        let known = registry.resolve(VERSION_SYMBOL, 9);
        assert_eq!(known.expected_size(), 0);
        assert_eq!(registry.unknown_count(), 0);

        let a = registry.resolve("nvm_other", 2);
        let b = registry.resolve("nvm_other", 5);
        assert!(FieldDescriptor::same(&a, &b));
        assert_eq!(registry.unknown_count(), 1);
    }

    #[test]
    fn test_reset_clears_session() {
        let mut registry = FieldRegistry::builtin();
        let kept = registry.register_unknown("nvm_temp", 1);
        registry.reset();
        assert!(registry.lookup("nvm_temp").is_none());
        assert_eq!(kept.symbol(), "nvm_temp");
    }
}
