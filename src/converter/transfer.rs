//! Field transfer between two layouts.
//!
//! Fields are matched by descriptor identity, not by name and not by offset:
//! the same field may live at different offsets in the two layouts. Fields
//! discovered while parsing each layout have distinct descriptors and are
//! therefore never matched, even if their names are equal.

use tracing::debug;

use crate::symbol::Layout;

use super::ConversionContext;

/// Outcome of a field transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Destination fields found in the source
    pub matched: usize,
    /// Total bytes taken over from the source
    pub bytes_copied: usize,
    /// Destination fields without a counterpart in the source
    pub missing: Vec<String>,
}

/// Copies field values from `src` into `dst`.
///
/// Every destination field is handled independently. A field missing in the
/// source keeps its destination value and is reported, never failing the
/// whole transfer.
pub fn transfer_fields(ctx: &ConversionContext, src: &Layout, dst: &mut Layout) -> TransferReport {
    ctx.info(&format!(
        "Transferring {} source symbols into {} target symbols...",
        src.symbols().len(),
        dst.symbols().len()
    ));

    let mut report = TransferReport::default();
    let (blob, symbols) = dst.parts_mut();

    for symbol in symbols.iter_mut() {
        let Some(source) = src.symbols().find_field(symbol.field()) else {
            ctx.warn(&format!(
                "Target map field {} not found in source",
                symbol.name()
            ));
            report.missing.push(symbol.name().to_string());
            continue;
        };

        symbol.snapshot(blob);
        let copied = symbol
            .field()
            .copy(symbol.value_mut(blob), source.value(src.blob()));
        debug!(
            "{}: {} of {} bytes copied (source offset {:#x}, target offset {:#x})",
            symbol.name(),
            copied,
            symbol.size(),
            source.offset(),
            symbol.offset()
        );

        report.matched += 1;
        report.bytes_copied += copied;
    }

    report
}
