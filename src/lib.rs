//! elfmangle - Field-aware conversion of non-volatile memory images.
//!
//! This library reads the layout of a firmware's non-volatile memory section
//! (e.g. an AVR `.eeprom` section) from the ELF symbol table, loads image data
//! into it, carries field values over to the layout of another firmware
//! build, applies overrides and writes the result as raw binary or Intel Hex.
//!
//! # Features
//!
//! - Memory-mapped ELF symbol maps
//! - Field transfer between layouts by field identity, not offset
//! - Field-specific copy, resize and display behavior
//! - `name=hexbytes` overrides
//! - CRC-32 checksum verification and update
//! - Raw binary and Intel Hex images with format auto-detection
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use elfmangle::{convert, ConversionOptions, ImageFormat};
//!
//! fn main() -> elfmangle::Result<()> {
//!     let mut options = ConversionOptions::default();
//!     options.input_image = Some("old.hex".into());
//!     options.output_image = Some("new.hex".into());
//!     options.overrides.push("nvm_unique=3930 02")?;
//!
//!     let summary = convert(Path::new("old.elf"), Some(Path::new("new.elf")), &options)?;
//!     println!("{} fields changed", summary.layout.changed_symbols().count());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod converter;
pub mod display;
pub mod error;
pub mod field;
pub mod image;
pub mod symbol;
pub mod util;

// Re-export main types
pub use converter::{ConversionContext, OverrideList, PostProcessChain};
pub use error::{Error, Result, ResultCode};
pub use field::{FieldCatalog, FieldDescriptor, FieldRef, FieldRegistry};
pub use image::ImageFormat;
pub use symbol::{ElfSymbolMap, Layout, MemorySymbolMap, Symbol, SymbolList, SymbolSource};

use std::path::{Path, PathBuf};

use converter::{
    apply_overrides, post_process, transfer_fields, OverrideReport, TransferReport,
};
use image::write_image;
use symbol::materialize;

/// Default section holding the non-volatile memory content.
pub const DEFAULT_SECTION: &str = ".eeprom";

/// Options for a conversion run.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Section of the symbol maps to process
    pub section: String,
    /// Image file loaded into the input layout
    pub input_image: Option<PathBuf>,
    /// Format of the input image
    pub input_format: ImageFormat,
    /// Image file written from the final layout
    pub output_image: Option<PathBuf>,
    /// Format of the output image
    pub output_format: ImageFormat,
    /// Field overrides applied after transfer
    pub overrides: OverrideList,
    /// Skip checksum verification and update
    pub skip_post_process: bool,
    /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
    pub verbosity: u8,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            section: DEFAULT_SECTION.to_string(),
            input_image: None,
            input_format: ImageFormat::Auto,
            output_image: None,
            output_format: ImageFormat::IntelHex,
            overrides: OverrideList::new(),
            skip_post_process: false,
            verbosity: 1,
        }
    }
}

/// Result of a conversion run.
#[derive(Debug)]
pub struct ConversionSummary {
    /// Final layout, as written to the output image
    pub layout: Layout,
    /// Symbols loaded from the input image
    pub merged: Option<usize>,
    /// Field transfer outcome, if an output map was used
    pub transfer: Option<TransferReport>,
    /// Override outcome
    pub overrides: OverrideReport,
    /// Changes made by post-processing, unless skipped
    pub post_processed: Option<usize>,
    /// Bytes written to the output image
    pub written: Option<usize>,
}

impl ConversionSummary {
    /// Result code of the run: success with the number of symbols.
    pub fn result_code(&self) -> ResultCode {
        ResultCode::Success(self.layout.symbols().len())
    }
}

/// Converts an image between the layouts of two ELF symbol maps.
///
/// Without an output map, the input layout is modified in place.
pub fn convert(
    in_map: &Path,
    out_map: Option<&Path>,
    options: &ConversionOptions,
) -> Result<ConversionSummary> {
    let input = ElfSymbolMap::open(in_map)?;
    let output = out_map.map(ElfSymbolMap::open).transpose()?;

    convert_sources(
        &input,
        output.as_ref().map(|map| map as &dyn SymbolSource),
        options,
    )
}

/// Converts an image between the layouts of two symbol sources.
///
/// # Pipeline
///
/// 1. Materialize the input layout; an empty one aborts the run
/// 2. Merge the input image, if any; loading no symbol aborts the run
/// 3. Materialize the output layout and transfer fields into it, unless it
///    has no symbols, in which case the input layout is used
/// 4. Apply overrides, post-process and write the output image
///
/// A failing post-processor stops the chain but not the run: the output
/// image is still written, then the error is returned.
pub fn convert_sources(
    input: &dyn SymbolSource,
    output: Option<&dyn SymbolSource>,
    options: &ConversionOptions,
) -> Result<ConversionSummary> {
    let ctx = ConversionContext::builtin().with_verbosity(options.verbosity);

    ctx.info(&format!("Reading input map section {}...", options.section));
    let mut registry = ctx.new_registry();
    let mut source = materialize(input, &options.section, &mut registry)?;
    if source.symbols().is_empty() {
        return Err(Error::NoSymbols {
            section: options.section.clone(),
        });
    }

    let merged = match &options.input_image {
        Some(path) => {
            let loaded = source.merge_image(path, options.input_format)?;
            if loaded == 0 {
                return Err(Error::ImageNoSymbols { path: path.clone() });
            }
            Some(loaded)
        }
        None => None,
    };

    let target = match output {
        Some(map) => {
            ctx.info(&format!("Reading output map section {}...", options.section));
            let mut registry = ctx.new_registry();
            let target = materialize(map, &options.section, &mut registry)?;
            if target.symbols().is_empty() {
                ctx.warn("Output map has no symbols, keeping input layout");
                None
            } else {
                Some(target)
            }
        }
        None => None,
    };

    let (mut layout, transfer) = match target {
        Some(mut target) => {
            let report = transfer_fields(&ctx, &source, &mut target);
            (target, Some(report))
        }
        None => (source, None),
    };

    let overrides = apply_overrides(&ctx, options.overrides.as_str(), &mut layout)?;

    let post_processed = if options.skip_post_process {
        Ok(None)
    } else {
        let mut chain = PostProcessChain::with_defaults();
        post_process(&ctx, &mut chain, &mut layout).map(Some)
    };

    let written = options
        .output_image
        .as_ref()
        .map(|path| write_image(path, layout.blob(), options.output_format))
        .transpose()?;
    let post_processed = post_processed?;

    Ok(ConversionSummary {
        layout,
        merged,
        transfer,
        overrides,
        post_processed,
        written,
    })
}
