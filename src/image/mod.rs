//! Image files holding non-volatile memory content.
//!
//! An image is the content of the memory section, either as a raw binary
//! dump or as Intel Hex text. Reading yields exactly as many bytes as the
//! layout's blob; a shorter file is zero-extended and reported.

mod ihex;
mod raw;
mod records;

pub use ihex::*;
pub use raw::*;
pub use records::*;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::error::{Error, Result};
use crate::symbol::Layout;

/// Image file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// Intel Hex if the file parses as such, raw binary otherwise
    #[default]
    Auto,
    /// Raw binary
    Raw,
    /// Intel Hex
    IntelHex,
}

impl ImageFormat {
    /// Human-readable format name.
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Auto => "auto",
            ImageFormat::Raw => "raw",
            ImageFormat::IntelHex => "ihex",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ImageFormat::Auto),
            "raw" | "bin" | "binary" => Ok(ImageFormat::Raw),
            "ihex" | "hex" | "intelhex" => Ok(ImageFormat::IntelHex),
            _ => Err(format!("unknown image format '{}' (expected auto, raw or ihex)", s)),
        }
    }
}

/// Image content read from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    /// Image bytes, always as long as requested
    pub data: Vec<u8>,
    /// Bytes actually provided by the file
    pub available: usize,
    /// Bytes missing from the file, read as zero
    pub deficit: usize,
    /// Format the file was read as
    pub format: ImageFormat,
}

impl LoadedImage {
    /// Allocates a zeroed image of `size` bytes with nothing available yet.
    pub(crate) fn zeroed(size: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| Error::allocation("image file data", size))?;
        data.resize(size, 0);

        Ok(Self {
            data,
            available: 0,
            deficit: size,
            format: ImageFormat::Auto,
        })
    }

    /// The bytes the file actually provided.
    pub fn available_data(&self) -> &[u8] {
        &self.data[..self.available]
    }
}

/// Reads an image file of `blob_size` bytes in the given format.
///
/// With [`ImageFormat::Auto`] the file is read as Intel Hex if it parses as
/// such, and as raw binary otherwise.
pub fn read_image<P: AsRef<Path>>(path: P, blob_size: usize, format: ImageFormat) -> Result<LoadedImage> {
    let path = path.as_ref();

    let image = match format {
        ImageFormat::Raw => read_raw(path, blob_size).map(|image| (image, ImageFormat::Raw))?,
        ImageFormat::IntelHex => match read_ihex(path, blob_size)? {
            Some(image) => (image, ImageFormat::IntelHex),
            None => {
                return Err(Error::UnrecognizedImage {
                    path: path.to_path_buf(),
                    format: "Intel Hex",
                })
            }
        },
        ImageFormat::Auto => match read_ihex(path, blob_size)? {
            Some(image) => (image, ImageFormat::IntelHex),
            None => {
                info!("{} is not Intel Hex, reading as raw binary", path.display());
                (read_raw(path, blob_size)?, ImageFormat::Raw)
            }
        },
    };

    let (mut image, format) = image;
    image.format = format;
    Ok(image)
}

/// Writes a blob to an image file.
///
/// [`ImageFormat::Auto`] writes Intel Hex. Returns the number of data bytes
/// written.
pub fn write_image<P: AsRef<Path>>(path: P, blob: &[u8], format: ImageFormat) -> Result<usize> {
    match format {
        ImageFormat::Raw => write_raw(path, blob),
        ImageFormat::IntelHex | ImageFormat::Auto => write_ihex_file(path, blob),
    }
}

impl Layout {
    /// Loads symbol values from an image file.
    ///
    /// Only symbol regions are taken from the image; bytes between symbols
    /// keep the layout's defaults. Returns the number of symbols loaded.
    pub fn merge_image<P: AsRef<Path>>(&mut self, path: P, format: ImageFormat) -> Result<usize> {
        let path = path.as_ref();
        let image = read_image(path, self.blob().len(), format)?;
        let loaded = self.merge_from(image.available_data());
        info!(
            "Loaded {} of {} symbols from {} image {}",
            loaded,
            self.symbols().len(),
            image.format,
            path.display()
        );
        Ok(loaded)
    }
}
