//! Raw binary image files.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info, warn};

use super::LoadedImage;
use crate::error::{Error, Result};

/// How raw image content is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Memory-map the file and copy from the mapping
    Mapped,
    /// Plain sequential reads
    Sequential,
}

/// Reads a raw image of `blob_size` bytes.
///
/// Tries a memory mapping first and falls back to sequential reads if the
/// file cannot be mapped.
pub fn read_raw<P: AsRef<Path>>(path: P, blob_size: usize) -> Result<LoadedImage> {
    let path = path.as_ref();
    match read_raw_with(path, blob_size, ReadStrategy::Mapped) {
        Err(Error::MemoryMap { source, .. }) => {
            debug!("Cannot map {} ({}), reading sequentially", path.display(), source);
            read_raw_with(path, blob_size, ReadStrategy::Sequential)
        }
        result => result,
    }
}

/// Reads a raw image of `blob_size` bytes with the given strategy.
///
/// The image is the first `blob_size` bytes of the file. A shorter file
/// leaves the rest zeroed and is reported as a deficit; an empty file is an
/// error.
pub fn read_raw_with<P: AsRef<Path>>(
    path: P,
    blob_size: usize,
    strategy: ReadStrategy,
) -> Result<LoadedImage> {
    let path = path.as_ref();

    let mut file = File::open(path).map_err(|e| Error::FileOpen {
        path: path.to_path_buf(),
        source: e,
    })?;
    let read_error = |e: io::Error| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    };

    let file_size = file.metadata().map_err(read_error)?.len();
    if file_size == 0 {
        return Err(Error::EmptyImage {
            path: path.to_path_buf(),
        });
    }

    let available = usize::try_from(file_size).map_or(blob_size, |size| size.min(blob_size));
    let mut image = LoadedImage::zeroed(blob_size)?;

    match strategy {
        ReadStrategy::Mapped => {
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MemoryMap {
                path: path.to_path_buf(),
                source: e,
            })?;
            image.data[..available].copy_from_slice(&mmap[..available]);
        }
        ReadStrategy::Sequential => {
            file.read_exact(&mut image.data[..available])
                .map_err(read_error)?;
        }
    }

    image.available = available;
    image.deficit = blob_size - available;
    if image.deficit > 0 {
        warn!(
            "Image file is too small, {} of {} bytes missing",
            image.deficit, blob_size
        );
    }

    info!(
        "Read {} bytes from raw image {}",
        available,
        path.display()
    );
    Ok(image)
}

/// Writes a blob to a raw binary file, replacing any previous content.
///
/// Returns the number of bytes written. A write that stops early is
/// reported with the number of bytes still missing.
pub fn write_raw<P: AsRef<Path>>(path: P, blob: &[u8]) -> Result<usize> {
    let path = path.as_ref();
    let write_error = |e: io::Error| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = File::create(path).map_err(write_error)?;
    file.set_len(blob.len() as u64).map_err(write_error)?;

    let mut written = 0;
    while written < blob.len() {
        match file.write(&blob[written..]) {
            Ok(0) => {
                return Err(Error::ShortWrite {
                    path: path.to_path_buf(),
                    remaining: blob.len() - written,
                    total: blob.len(),
                })
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!(
                    "Write to {} failed with {} of {} bytes remaining",
                    path.display(),
                    blob.len() - written,
                    blob.len()
                );
                return Err(write_error(e));
            }
        }
    }

    info!("Wrote {} bytes to {} (raw)", written, path.display());
    Ok(written)
}
