//! CRC-32 checksum verification and update.
//!
//! The checksum covers the whole blob except the checksum field itself and is
//! stored little-endian in the `nvm_crc` field. The polynomial is the common
//! reflected 0x04C11DB7 with all-ones initial value and final XOR.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::field::known::CHECKSUM_SYMBOL;
use crate::symbol::SymbolList;
use crate::util::{read_u32_le_at, u32_le_bytes};

use super::post_process::{ChainControl, PostProcessor};
use super::ConversionContext;

/// Size of the checksum field in bytes.
pub const CHECKSUM_SIZE: usize = 4;

/// Computes the CRC-32 of `blob` without the bytes in `skip`.
pub fn crc32_skipping(blob: &[u8], skip: Range<usize>) -> u32 {
    let start = skip.start.min(blob.len());
    let end = skip.end.clamp(start, blob.len());

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&blob[..start]);
    hasher.update(&blob[end..]);
    hasher.finalize()
}

/// What a [`ChecksumProcessor`] does with a mismatching checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumMode {
    /// Report a mismatch, leave the blob unchanged
    Verify,
    /// Store the computed checksum
    Update,
}

impl ChecksumMode {
    /// Name of the processor running in this mode.
    pub const fn processor_name(self) -> &'static str {
        match self {
            ChecksumMode::Verify => "crc-verify",
            ChecksumMode::Update => "crc-update",
        }
    }
}

/// Post-processor for the checksum field.
///
/// If the blob has no checksum field, or the field has the wrong size, the
/// update step is disabled for the rest of the run.
#[derive(Debug, Clone)]
pub struct ChecksumProcessor {
    mode: ChecksumMode,
    symbol: &'static str,
}

impl ChecksumProcessor {
    /// Creates a processor for the `nvm_crc` field.
    pub fn new(mode: ChecksumMode) -> Self {
        Self::for_symbol(mode, CHECKSUM_SYMBOL)
    }

    /// Creates a processor for a differently named checksum field.
    pub fn for_symbol(mode: ChecksumMode, symbol: &'static str) -> Self {
        Self { mode, symbol }
    }

    /// Processing mode.
    pub fn mode(&self) -> ChecksumMode {
        self.mode
    }
}

impl PostProcessor for ChecksumProcessor {
    fn name(&self) -> &'static str {
        self.mode.processor_name()
    }

    fn process(
        &self,
        ctx: &ConversionContext,
        blob: &mut [u8],
        symbols: &mut SymbolList,
        chain: &mut ChainControl<'_>,
    ) -> Result<usize> {
        let update = ChecksumMode::Update.processor_name();

        let field = symbols.iter_mut().find(|symbol| symbol.name() == self.symbol);
        let Some(field) = field else {
            ctx.warn(&format!("Checksum field {} not found in map", self.symbol));
            chain.disable(update);
            return Ok(0);
        };

        if field.size() != CHECKSUM_SIZE {
            chain.disable(update);
            return Err(Error::ChecksumFieldSize {
                symbol: self.symbol.to_string(),
                actual: field.size(),
                expected: CHECKSUM_SIZE,
            });
        }

        let computed = crc32_skipping(blob, field.range());
        let stored = read_u32_le_at(blob, field.offset()).unwrap_or(!computed);

        if stored == computed {
            ctx.info(&format!("CORRECT checksum {:08X}", stored));
            return Ok(0);
        }

        match self.mode {
            ChecksumMode::Verify => {
                ctx.warn(&format!(
                    "WRONG checksum {:08X}, expected {:08X}",
                    stored, computed
                ));
                Ok(0)
            }
            ChecksumMode::Update => {
                field.snapshot(blob);
                field.value_mut(blob).copy_from_slice(&u32_le_bytes(computed));
                ctx.info(&format!(
                    "Updated checksum field {:08X} to {:08X}",
                    stored, computed
                ));
                Ok(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::PostProcessChain;
    use crate::field::FieldRegistry;
    use crate::symbol::{Layout, Symbol};

    fn layout(blob: Vec<u8>, crc_offset: usize, crc_size: usize) -> Layout {
        let mut registry = FieldRegistry::builtin();
        let mut symbols = SymbolList::new();
        symbols
            .push(Symbol::new(
                crc_offset,
                crc_size,
                registry.resolve(CHECKSUM_SYMBOL, crc_size),
            ))
            .unwrap();
        Layout::new(".eeprom", 0, blob, symbols)
    }

    #[test]
    fn test_crc32_known_values() {
        assert_eq!(crc32_skipping(b"123456789", 0..0), 0xCBF43926);
        assert_eq!(crc32_skipping(&[0, 0, 0, 0], 0..0), 0x2144DF1C);
        assert_eq!(crc32_skipping(b"12345678xxxx9", 8..12), 0xCBF43926);
    }

    #[test]
    fn test_update_then_verify() {
        let ctx = ConversionContext::builtin();
        let mut layout = layout(vec![0, 0, 0, 0, 0, 0, 0, 0], 4, 4);
        let mut chain = PostProcessChain::with_defaults();

        let changes = crate::converter::post_process(&ctx, &mut chain, &mut layout).unwrap();
        assert_eq!(changes, 1);
        // CRC-32 of four zero bytes, stored little-endian
        assert_eq!(&layout.blob()[4..], &[0x1C, 0xDF, 0x44, 0x21]);
        let changed: Vec<_> = layout.changed_symbols().map(|s| s.name()).collect();
        assert_eq!(changed, [CHECKSUM_SYMBOL]);

        let mut chain = PostProcessChain::with_defaults();
        let changes = crate::converter::post_process(&ctx, &mut chain, &mut layout).unwrap();
        assert_eq!(changes, 0);
    }

    #[test]
    fn test_verify_only_leaves_blob() {
        let ctx = ConversionContext::builtin();
        let mut layout = layout(vec![0xAA; 8], 0, 4);
        let mut chain = PostProcessChain::new();
        chain.push(ChecksumProcessor::new(ChecksumMode::Verify));

        assert_eq!(
            crate::converter::post_process(&ctx, &mut chain, &mut layout).unwrap(),
            0
        );
        assert_eq!(layout.blob(), &[0xAA; 8]);
    }

    #[test]
    fn test_missing_field_disables_update() {
        let ctx = ConversionContext::builtin();
        let mut blob = [0u8; 8];
        let mut chain = PostProcessChain::with_defaults();

        let changes = chain.run(&ctx, &mut blob, &mut SymbolList::new()).unwrap();
        assert_eq!(changes, 0);
        assert!(!chain.is_enabled(ChecksumMode::Update.processor_name()));
        assert_eq!(blob, [0u8; 8]);
    }

    #[test]
    fn test_wrong_field_size_fails() {
        let ctx = ConversionContext::builtin();
        let mut layout = layout(vec![0; 8], 0, 2);
        let mut chain = PostProcessChain::with_defaults();

        let err = crate::converter::post_process(&ctx, &mut chain, &mut layout).unwrap_err();
        assert!(matches!(
            err,
            Error::ChecksumFieldSize {
                actual: 2,
                expected: 4,
                ..
            }
        ));
        assert_eq!(layout.blob(), &[0; 8]);
    }
}
