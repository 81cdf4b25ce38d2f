//! Field overrides given as `name=hexbytes` directives.
//!
//! A directive list is a comma separated string such as
//! `nvm_unique=3930 01,nvm_flags=ff`. Values are hex byte pairs; whitespace
//! between pairs is ignored and a single trailing digit is a byte of its own.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error as ThisError;
use tracing::debug;

use crate::error::{Error, Result};
use crate::field::known::UNIQUE_SYMBOL;
use crate::symbol::Layout;
use crate::util::hex_digit;

use super::ConversionContext;

/// Separator between directives.
pub const DIRECTIVE_SEPARATOR: char = ',';

// =============================================================================
// Directive List
// =============================================================================

/// Accumulated override directives.
///
/// Directives are joined with [`DIRECTIVE_SEPARATOR`]; empty directives are
/// dropped so the list never contains empty segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideList {
    directives: String,
}

impl OverrideList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one formatted directive.
    ///
    /// On allocation failure the list keeps its previous content.
    pub fn append(&mut self, directive: fmt::Arguments<'_>) -> Result<()> {
        match directive.as_str() {
            Some(text) => self.push(text),
            None => self.push(&directive.to_string()),
        }
    }

    /// Appends a directive setting the serial number of the unique system
    /// identification, low byte first.
    ///
    /// The hardware type byte is not part of the directive and keeps its value.
    pub fn push_serial(&mut self, serial: u16) -> Result<()> {
        self.append(format_args!(
            "{}={:02x}{:02x}",
            UNIQUE_SYMBOL,
            serial & 0xFF,
            serial >> 8
        ))
    }

    /// Appends one directive (or several, if it contains separators).
    pub fn push(&mut self, directive: &str) -> Result<()> {
        if directive.is_empty() {
            return Ok(());
        }

        let separator = usize::from(!self.directives.is_empty());
        let needed = separator + directive.len();
        self.directives
            .try_reserve(needed)
            .map_err(|_| Error::allocation("override list", self.directives.len() + needed))?;

        if separator != 0 {
            self.directives.push(DIRECTIVE_SEPARATOR);
        }
        self.directives.push_str(directive);
        Ok(())
    }

    /// The joined directive string.
    pub fn as_str(&self) -> &str {
        &self.directives
    }

    /// Whether no directive has been added.
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Iterates over the non-empty directives.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        directives(&self.directives)
    }
}

impl fmt::Display for OverrideList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.directives)
    }
}

impl<S: AsRef<str>> FromIterator<S> for OverrideList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = Self::new();
        for directive in iter {
            let directive = directive.as_ref();
            if !directive.is_empty() {
                if !list.directives.is_empty() {
                    list.directives.push(DIRECTIVE_SEPARATOR);
                }
                list.directives.push_str(directive);
            }
        }
        list
    }
}

fn directives(text: &str) -> impl Iterator<Item = &str> {
    text.split(DIRECTIVE_SEPARATOR).filter(|d| !d.is_empty())
}

// =============================================================================
// Hex Decoding
// =============================================================================

/// Decodes hex byte pairs from `text` into `out`.
///
/// Leading whitespace before each pair is skipped. Decoding stops at the
/// first character that does not start a pair, or when `out` is full.
/// Returns the number of bytes written and the undecoded rest of `text`.
pub fn decode_hex_bytes<'a>(text: &'a str, out: &mut [u8]) -> (usize, &'a str) {
    let bytes = text.as_bytes();
    let mut pos = 0;
    let mut written = 0;

    while written < out.len() {
        let start = pos
            + bytes[pos..]
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();

        let Some(high) = bytes.get(start).copied().and_then(hex_digit) else {
            break;
        };
        let (value, len) = match bytes.get(start + 1).copied().and_then(hex_digit) {
            Some(low) => ((high << 4) | low, 2),
            None => (high, 1),
        };

        out[written] = value;
        written += 1;
        pos = start + len;
    }

    (written, &text[pos..])
}

// =============================================================================
// Applying Overrides
// =============================================================================

/// Why one directive could not be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum DirectiveError {
    #[error("Field not found")]
    FieldNotFound,

    #[error("Could not parse byte data")]
    InvalidBytes,
}

/// A directive that was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDirective {
    pub directive: String,
    pub error: DirectiveError,
}

/// Outcome of applying a directive list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideReport {
    /// Directives that wrote at least one byte
    pub applied: usize,
    /// Directives that were rejected
    pub failed: Vec<FailedDirective>,
}

/// Applies override directives to the fields of a layout.
///
/// Each directive writes at most the symbol's size in bytes, starting at the
/// symbol's offset; bytes not covered by the value are left untouched.
/// Rejected directives are reported and skipped. Applying the same list
/// twice yields the same blob.
///
/// Returns an error only if the layout itself is unusable for name lookup.
pub fn apply_overrides(
    ctx: &ConversionContext,
    directive_list: &str,
    layout: &mut Layout,
) -> Result<OverrideReport> {
    let mut report = OverrideReport::default();

    let resolved: Vec<(&str, std::result::Result<(usize, &str), DirectiveError>)> = {
        let index: HashMap<&str, usize> = layout.symbols().index_by_name()?;
        directives(directive_list)
            .map(|directive| {
                let (name, value) = match directive.split_once('=') {
                    Some((name, value)) => (name, Some(value)),
                    None => (directive, None),
                };
                let target = match (index.get(name), value) {
                    (None, _) => Err(DirectiveError::FieldNotFound),
                    (Some(_), None) => Err(DirectiveError::InvalidBytes),
                    (Some(&index), Some(value)) => Ok((index, value)),
                };
                (directive, target)
            })
            .collect()
    };

    let (blob, symbols) = layout.parts_mut();
    for (directive, target) in resolved {
        let result = target.and_then(|(index, value)| {
            let symbol = symbols
                .get_mut(index)
                .ok_or(DirectiveError::FieldNotFound)?;
            symbol.snapshot(blob);

            let (written, rest) = decode_hex_bytes(value, symbol.value_mut(blob));
            if written == 0 {
                return Err(DirectiveError::InvalidBytes);
            }
            if !rest.trim().is_empty() {
                debug!(
                    "{}: ignoring trailing data {:?} after {} bytes",
                    symbol.name(),
                    rest,
                    written
                );
            }
            debug!("{}: overrode {} of {} bytes", symbol.name(), written, symbol.size());
            Ok(())
        });

        match result {
            Ok(()) => report.applied += 1,
            Err(error) => {
                ctx.warn(&format!(
                    "Ignoring override parameter: {} ({})",
                    directive, error
                ));
                report.failed.push(FailedDirective {
                    directive: directive.to_string(),
                    error,
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldRegistry;
    use crate::symbol::{Symbol, SymbolList};

    fn layout() -> Layout {
        let mut registry = FieldRegistry::builtin();
        let symbols: SymbolList = [("nvm_a", 0, 2), ("nvm_b", 2, 4)]
            .iter()
            .map(|&(name, offset, size)| Symbol::new(offset, size, registry.resolve(name, size)))
            .collect();
        Layout::new(".eeprom", 0, vec![0xEE; 6], symbols)
    }

    #[test]
    fn test_override_list_append() {
        let mut list = OverrideList::new();
        list.append(format_args!("nvm_a={:02x}", 0x12)).unwrap();
        list.push("").unwrap();
        list.push("nvm_b=34").unwrap();
        assert_eq!(list.as_str(), "nvm_a=12,nvm_b=34");
        assert_eq!(list.iter().count(), 2);

        let collected: OverrideList = ["", "x=1", "", "y=2"].into_iter().collect();
        assert_eq!(collected.to_string(), "x=1,y=2");
    }

    #[test]
    fn test_push_serial() {
        let mut list = OverrideList::new();
        list.push("nvm_a=01").unwrap();
        list.push_serial(12345).unwrap();
        assert_eq!(list.as_str(), "nvm_a=01,nvm_unique=3930");

        let mut list = OverrideList::new();
        list.push_serial(1).unwrap();
        assert_eq!(list.as_str(), "nvm_unique=0100");
    }

    #[test]
    fn test_decode_hex_bytes() {
        let mut out = [0u8; 4];
        assert_eq!(decode_hex_bytes(" 12 aB\tc", &mut out), (3, ""));
        assert_eq!(out, [0x12, 0xAB, 0x0C, 0]);

        let mut out = [0u8; 2];
        assert_eq!(decode_hex_bytes("010203", &mut out), (2, "03"));

        let mut out = [0u8; 2];
        assert_eq!(decode_hex_bytes("zz", &mut out), (0, "zz"));
        assert_eq!(decode_hex_bytes("12 zz", &mut out), (1, " zz"));
    }

    #[test]
    fn test_apply_overrides() {
        let ctx = ConversionContext::builtin();
        let mut layout = layout();

        let report =
            apply_overrides(&ctx, "nvm_b=01 02,,bogus=00,nvm_a=xy,nvm_a=ff", &mut layout).unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(
            report.failed,
            vec![
                FailedDirective {
                    directive: "bogus=00".to_string(),
                    error: DirectiveError::FieldNotFound,
                },
                FailedDirective {
                    directive: "nvm_a=xy".to_string(),
                    error: DirectiveError::InvalidBytes,
                },
            ]
        );
        assert_eq!(layout.blob(), &[0xFF, 0xEE, 0x01, 0x02, 0xEE, 0xEE]);
        assert_eq!(layout.changed_symbols().count(), 2);
    }

    #[test]
    fn test_override_truncated_to_symbol_size() {
        let ctx = ConversionContext::builtin();
        let mut layout = layout();
        apply_overrides(&ctx, "nvm_a=11223344", &mut layout).unwrap();
        assert_eq!(layout.blob(), &[0x11, 0x22, 0xEE, 0xEE, 0xEE, 0xEE]);
    }

    #[test]
    fn test_overrides_idempotent() {
        let ctx = ConversionContext::builtin();
        let directives = "nvm_a=1,nvm_b=aabbccdd";

        let mut once = layout();
        apply_overrides(&ctx, directives, &mut once).unwrap();
        let mut twice = layout();
        apply_overrides(&ctx, directives, &mut twice).unwrap();
        apply_overrides(&ctx, directives, &mut twice).unwrap();

        assert_eq!(once.blob(), twice.blob());
        assert_eq!(once.blob(), &[0x01, 0xEE, 0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn test_missing_value_rejected() {
        let ctx = ConversionContext::builtin();
        let mut layout = layout();
        let report = apply_overrides(&ctx, "nvm_a", &mut layout).unwrap();
        assert_eq!(report.applied, 0);
        assert_eq!(report.failed[0].error, DirectiveError::InvalidBytes);
        assert_eq!(layout.blob(), &[0xEE; 6]);
    }
}
