//! Field descriptors and their pluggable behavior.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a field descriptor.
///
/// Two symbols belong to the same field if and only if their handles point to
/// the same descriptor (see [`FieldDescriptor::same`]); names are not compared.
pub type FieldRef = Arc<FieldDescriptor>;

/// Type-specific behavior of a field.
///
/// Every method has a default, so a field without special semantics (including
/// every field discovered at parse time) uses [`Verbatim`].
pub trait FieldBehavior: Send + Sync + fmt::Debug {
    /// Recomputes the true size of a field from its own encoded content.
    ///
    /// `content` runs from the field's offset to the end of the blob. Returns
    /// `None` if the field has no size encoding of its own.
    fn resize(&self, _content: &[u8], _current: usize) -> Option<usize> {
        None
    }

    /// Copies a field value between two layouts.
    ///
    /// `dst` and `src` are exactly the destination and source symbol regions,
    /// so their lengths are the respective capacities. Returns the number of
    /// bytes taken over from the source.
    fn copy(&self, _field: &FieldDescriptor, dst: &mut [u8], src: &[u8]) -> usize {
        copy_verbatim(dst, src)
    }

    /// Renders field content in human-readable form, if the field knows how.
    fn render(&self, _data: &[u8]) -> Option<String> {
        None
    }
}

/// Default behavior: byte-wise copy, no resize, no rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbatim;

impl FieldBehavior for Verbatim {}

/// Behavior for fields that must never be overwritten by a transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCopy;

impl FieldBehavior for NoCopy {
    fn copy(&self, _field: &FieldDescriptor, _dst: &mut [u8], _src: &[u8]) -> usize {
        0
    }
}

/// Copies `min(dst.len(), src.len())` bytes from `src` to `dst`.
#[inline]
pub fn copy_verbatim(dst: &mut [u8], src: &[u8]) -> usize {
    let len = dst.len().min(src.len());
    dst[..len].copy_from_slice(&src[..len]);
    len
}

/// Description of a named binary data field.
pub struct FieldDescriptor {
    symbol: Cow<'static, str>,
    description: Cow<'static, str>,
    expected_size: usize,
    behavior: Box<dyn FieldBehavior>,
}

impl FieldDescriptor {
    /// Creates a field descriptor with custom behavior.
    pub fn new(
        symbol: impl Into<Cow<'static, str>>,
        description: impl Into<Cow<'static, str>>,
        expected_size: usize,
        behavior: impl FieldBehavior + 'static,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            description: description.into(),
            expected_size,
            behavior: Box::new(behavior),
        }
    }

    /// Creates a descriptor for a symbol with no known meaning.
    ///
    /// The observed size becomes the expected size and the description is empty.
    pub fn unknown(symbol: impl Into<Cow<'static, str>>, observed_size: usize) -> Self {
        Self::new(symbol, "", observed_size, Verbatim)
    }

    /// Symbol name used to locate the field in a symbol map.
    #[inline]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Textual description, empty for unknown fields.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Default size in bytes, zero if the size varies.
    #[inline]
    pub fn expected_size(&self) -> usize {
        self.expected_size
    }

    /// Returns the field's behavior.
    #[inline]
    pub fn behavior(&self) -> &dyn FieldBehavior {
        self.behavior.as_ref()
    }

    /// Recomputes the field size from its content, see [`FieldBehavior::resize`].
    #[inline]
    pub fn resize(&self, content: &[u8], current: usize) -> Option<usize> {
        self.behavior.resize(content, current)
    }

    /// Copies a value using the field's copy semantics.
    #[inline]
    pub fn copy(&self, dst: &mut [u8], src: &[u8]) -> usize {
        self.behavior.copy(self, dst, src)
    }

    /// Renders content in human-readable form, if supported.
    #[inline]
    pub fn render(&self, data: &[u8]) -> Option<String> {
        self.behavior.render(data)
    }

    /// Returns the description, or the symbol name for unknown fields.
    pub fn display_name(&self) -> &str {
        if self.description.is_empty() {
            &self.symbol
        } else {
            &self.description
        }
    }

    /// Returns true if both handles denote the same descriptor.
    #[inline]
    pub fn same(a: &FieldRef, b: &FieldRef) -> bool {
        Arc::ptr_eq(a, b)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("symbol", &self.symbol)
            .field("description", &self.description)
            .field("expected_size", &self.expected_size)
            .field("behavior", &self.behavior)
            .finish()
    }
}
