//! Intel Hex image files.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use super::records::{parse_records, write_record, RecordType};
use super::LoadedImage;
use crate::error::{Error, Result};

/// Data bytes per record written.
pub const RECORD_DATA_LENGTH: usize = 0x20;

/// Bytes addressable by one segment.
pub const SEGMENT_LENGTH: usize = 0x10000;

/// Largest image addressable with extended segment address records.
pub const MAX_IHEX_IMAGE: usize = 0x10 * SEGMENT_LENGTH;

/// Writes a blob as Intel Hex records.
///
/// Data records hold at most [`RECORD_DATA_LENGTH`] bytes and never cross a
/// 64 KiB segment boundary. Each new segment is announced by an extended
/// segment address record before its first data record; the file ends with
/// an end-of-file record. Returns the number of data bytes written.
pub fn write_ihex<W: Write>(out: &mut W, blob: &[u8]) -> Result<usize> {
    if blob.len() > MAX_IHEX_IMAGE {
        return Err(Error::ImageTooLarge {
            size: blob.len(),
            max: MAX_IHEX_IMAGE,
            format: "Intel Hex",
        });
    }

    for (segment, data) in blob.chunks(SEGMENT_LENGTH).enumerate() {
        if segment > 0 {
            // Segment base in 16-byte paragraphs
            let paragraph = (segment * (SEGMENT_LENGTH >> 4)) as u16;
            write_record(out, RecordType::ExtendedSegmentAddress, 0, &paragraph.to_be_bytes())?;
        }
        for (index, record) in data.chunks(RECORD_DATA_LENGTH).enumerate() {
            let offset = (index * RECORD_DATA_LENGTH) as u16;
            write_record(out, RecordType::Data, offset, record)?;
        }
    }
    write_record(out, RecordType::EndOfFile, 0, &[])?;

    Ok(blob.len())
}

/// Writes a blob to an Intel Hex file.
pub fn write_ihex_file<P: AsRef<Path>>(path: P, blob: &[u8]) -> Result<usize> {
    let path = path.as_ref();
    let file_error = |e: io::Error| Error::FileWrite {
        path: path.to_path_buf(),
        source: e,
    };

    let file = File::create(path).map_err(file_error)?;
    let mut writer = BufWriter::new(file);

    let written = match write_ihex(&mut writer, blob) {
        Err(Error::Io(e)) => return Err(file_error(e)),
        result => result?,
    };
    writer.flush().map_err(file_error)?;

    info!("Wrote {} bytes to {} (Intel Hex)", written, path.display());
    Ok(written)
}

/// Reads an Intel Hex file into an image of `blob_size` bytes.
///
/// Returns `Ok(None)` if the file is not valid Intel Hex or holds no data,
/// so callers can try another format. Addresses at or beyond `blob_size`
/// are dropped; bytes not covered by any record read as zero.
pub fn read_ihex<P: AsRef<Path>>(path: P, blob_size: usize) -> Result<Option<LoadedImage>> {
    let path = path.as_ref();

    let raw = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => Error::FileOpen {
            path: path.to_path_buf(),
            source: e,
        },
        _ => Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let Ok(text) = std::str::from_utf8(&raw) else {
        debug!("{} is not text, not Intel Hex", path.display());
        return Ok(None);
    };

    let records = match parse_records(text) {
        Ok(records) => records,
        Err(e) if e.is_format_mismatch() => {
            debug!("{} is not Intel Hex: {}", path.display(), e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let Some((start, end)) = records.address_range() else {
        warn!("Intel Hex file {} is empty", path.display());
        return Ok(None);
    };

    let mut image = LoadedImage::zeroed(blob_size)?;
    records.copy_into(&mut image.data);

    let end = usize::try_from(end).unwrap_or(usize::MAX);
    if end > blob_size {
        warn!(
            "Intel Hex data up to {:#x} exceeds image size {:#x}, extra bytes dropped",
            end, blob_size
        );
    }
    image.available = end.min(blob_size);
    image.deficit = blob_size - image.available;
    if image.deficit > 0 {
        warn!(
            "Image file is too small, {} of {} bytes missing",
            image.deficit, blob_size
        );
    }

    info!(
        "Read Intel Hex image {} ({:#x}..{:#x})",
        path.display(),
        start,
        end
    );
    Ok(Some(image))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_text(blob: &[u8]) -> String {
        let mut out = Vec::new();
        write_ihex(&mut out, blob).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_write_small_blob() {
        assert_eq!(to_text(&[0x01, 0x02, 0x03]), ":03000000010203F7\n:00000001FF\n");
        assert_eq!(to_text(&[]), ":00000001FF\n");
    }

    #[test]
    fn test_records_split_at_32_bytes() {
        let text = to_text(&[0xAB; 0x41]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with(":20000000"));
        assert!(lines[1].starts_with(":20002000"));
        assert!(lines[2].starts_with(":01004000"));
        assert_eq!(lines[3], ":00000001FF");
    }

    #[test]
    fn test_segment_boundary() {
        let blob: Vec<u8> = (0..SEGMENT_LENGTH + 16).map(|i| i as u8).collect();
        let text = to_text(&blob);
        let lines: Vec<&str> = text.lines().collect();

        let esa: Vec<_> = lines.iter().filter(|l| &l[7..9] == "02").collect();
        assert_eq!(esa, [&":020000021000EC"]);
        assert_eq!(lines.len(), SEGMENT_LENGTH / RECORD_DATA_LENGTH + 3);
        assert!(lines[lines.len() - 2].starts_with(":10000000"));

        let records = parse_records(&text).unwrap();
        let mut data = vec![0u8; blob.len()];
        assert_eq!(records.copy_into(&mut data), blob.len());
        assert_eq!(data, blob);
    }

    #[test]
    fn test_too_large() {
        let blob = vec![0u8; MAX_IHEX_IMAGE + 1];
        let mut out = Vec::new();
        assert!(matches!(
            write_ihex(&mut out, &blob),
            Err(Error::ImageTooLarge { .. })
        ));
    }

    #[test]
    fn test_file_round_trip_with_deficit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.hex");
        write_ihex_file(&path, &[1, 2, 3, 4]).unwrap();

        let image = read_ihex(&path, 6).unwrap().unwrap();
        assert_eq!(image.data, [1, 2, 3, 4, 0, 0]);
        assert_eq!(image.available, 4);
        assert_eq!(image.deficit, 2);

        let image = read_ihex(&path, 2).unwrap().unwrap();
        assert_eq!(image.data, [1, 2]);
        assert_eq!(image.deficit, 0);
    }

    #[test]
    fn test_not_ihex_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.bin");
        fs::write(&path, [0x00u8, 0xFF, 0x3A]).unwrap();
        assert!(read_ihex(&path, 4).unwrap().is_none());

        fs::write(&path, ":00000001FF\n").unwrap();
        assert!(read_ihex(&path, 4).unwrap().is_none());

        assert!(matches!(
            read_ihex(dir.path().join("missing.hex"), 4),
            Err(Error::FileOpen { .. })
        ));
    }
}
