//! Human-readable listing of symbols and their content.

use std::fmt::Write as _;
use std::str::FromStr;

use bitflags::bitflags;

use crate::symbol::{Layout, Symbol};
use crate::util::hex_dump;

bitflags! {
    /// Extra information shown for each symbol.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ShowFields: u8 {
        /// Symbol name instead of the field description
        const SYMBOL = 0x2;
        /// Symbol size in bytes
        const BYTE_SIZE = 0x4;
        /// Symbol offset within the blob
        const ADDRESS = 0x8;
    }
}

/// How symbol content is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrintContent {
    /// Header line only
    #[default]
    None,
    /// Field-specific interpretation
    Pretty,
    /// Generic hex dump
    Hex,
}

impl FromStr for PrintContent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "pretty" => Ok(PrintContent::Pretty),
            "hex" => Ok(PrintContent::Hex),
            "none" => Ok(PrintContent::None),
            _ => Err(format!("unknown print format '{}' (expected pretty or hex)", s)),
        }
    }
}

/// Formats one symbol, terminated by a newline.
pub fn format_symbol(symbol: &Symbol, blob: &[u8], show: ShowFields, content: PrintContent) -> String {
    let field = symbol.field();
    let data = symbol.value(blob);
    let pretty = field.render(data);

    let mut out = String::new();
    if show.contains(ShowFields::ADDRESS) {
        let _ = write!(out, "[{:04x}]\t", symbol.offset());
    }
    if show.contains(ShowFields::SYMBOL) || pretty.is_none() {
        let _ = write!(out, "{}:", field.symbol());
    } else {
        let _ = write!(out, "{}:", field.display_name());
    }
    if show.contains(ShowFields::BYTE_SIZE) {
        let _ = write!(out, " {} bytes", symbol.size());
    }

    if symbol.size() < field.expected_size() {
        let _ = write!(
            out,
            "\tMissing {} of {} data bytes!",
            field.expected_size() - symbol.size(),
            field.expected_size()
        );
    }

    let body = match content {
        PrintContent::None => None,
        PrintContent::Pretty => pretty,
        PrintContent::Hex => Some(hex_dump(data)),
    };
    if let Some(body) = body {
        out.push_str("\n\t");
        out.push_str(&body);
    }
    out.push('\n');
    out
}

/// Formats every symbol of a layout in list order.
pub fn format_layout(layout: &Layout, show: ShowFields, content: PrintContent) -> String {
    layout
        .symbols()
        .iter()
        .map(|symbol| format_symbol(symbol, layout.blob(), show, content))
        .collect()
}
