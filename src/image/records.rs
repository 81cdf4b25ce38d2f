//! Intel Hex record encoding and parsing.
//!
//! A record is one text line `:LLAAAATT<data>CC`: byte count, 16-bit load
//! offset, record type, data bytes and a checksum making the sum of all
//! record bytes zero modulo 256. All fields are hex digit pairs.

use std::io::{self, Write};

use crate::error::{Error, Result};
use crate::util::hex_digit;

/// Record start code.
pub const START_CODE: char = ':';

/// Maximum number of data bytes in one record.
pub const MAX_RECORD_DATA: usize = 0xFF;

/// Intel Hex record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    Data = 0x00,
    EndOfFile = 0x01,
    ExtendedSegmentAddress = 0x02,
    StartSegmentAddress = 0x03,
    ExtendedLinearAddress = 0x04,
    StartLinearAddress = 0x05,
}

impl RecordType {
    /// Decodes a record type byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0x00 => RecordType::Data,
            0x01 => RecordType::EndOfFile,
            0x02 => RecordType::ExtendedSegmentAddress,
            0x03 => RecordType::StartSegmentAddress,
            0x04 => RecordType::ExtendedLinearAddress,
            0x05 => RecordType::StartLinearAddress,
            _ => return None,
        })
    }
}

/// Record checksum: two's complement of the byte sum.
pub fn record_checksum(rectype: RecordType, offset: u16, data: &[u8]) -> u8 {
    let [hi, lo] = offset.to_be_bytes();
    [data.len() as u8, hi, lo, rectype as u8]
        .iter()
        .chain(data)
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
        .wrapping_neg()
}

/// Writes one record line, digits in upper case.
///
/// `data` must not exceed [`MAX_RECORD_DATA`] bytes.
pub fn write_record<W: Write>(out: &mut W, rectype: RecordType, offset: u16, data: &[u8]) -> io::Result<()> {
    debug_assert!(data.len() <= MAX_RECORD_DATA);

    write!(out, "{}{:02X}{:04X}{:02X}", START_CODE, data.len(), offset, rectype as u8)?;
    for byte in data {
        write!(out, "{:02X}", byte)?;
    }
    writeln!(out, "{:02X}", record_checksum(rectype, offset, data))
}

// =============================================================================
// Parsing
// =============================================================================

/// A data record placed at its absolute address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    pub address: u64,
    pub data: Vec<u8>,
}

impl DataChunk {
    /// First address after the chunk.
    pub fn end(&self) -> u64 {
        self.address + self.data.len() as u64
    }
}

/// Data records of an Intel Hex file, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    chunks: Vec<DataChunk>,
}

impl RecordSet {
    /// Data chunks in file order.
    pub fn chunks(&self) -> &[DataChunk] {
        &self.chunks
    }

    /// Whether the file holds no data bytes.
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(|chunk| chunk.data.is_empty())
    }

    /// Lowest address and first address past the highest data byte.
    pub fn address_range(&self) -> Option<(u64, u64)> {
        let data = self.chunks.iter().filter(|chunk| !chunk.data.is_empty());
        data.fold(None, |range, chunk| match range {
            None => Some((chunk.address, chunk.end())),
            Some((start, end)) => Some((start.min(chunk.address), end.max(chunk.end()))),
        })
    }

    /// Copies all data into `buf`, addressed from zero.
    ///
    /// Bytes beyond the end of `buf` are dropped. Returns the number of bytes
    /// copied; later records overwrite earlier ones.
    pub fn copy_into(&self, buf: &mut [u8]) -> usize {
        let mut copied = 0;
        for chunk in &self.chunks {
            let Ok(start) = usize::try_from(chunk.address) else {
                continue;
            };
            if start >= buf.len() {
                continue;
            }
            let len = chunk.data.len().min(buf.len() - start);
            buf[start..start + len].copy_from_slice(&chunk.data[..len]);
            copied += len;
        }
        copied
    }
}

/// Parses Intel Hex text into its data records.
///
/// Blank lines are skipped and anything after the end-of-file record is
/// ignored. Start address records carry no data and are ignored too.
pub fn parse_records(text: &str) -> Result<RecordSet> {
    let mut set = RecordSet::default();
    let mut base: u64 = 0;

    for (index, line) in text.lines().enumerate() {
        let lineno = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let bytes = decode_line(lineno, line)?;
        let (header, rest) = bytes.split_at(4);
        let (data, checksum) = rest.split_at(rest.len() - 1);
        let offset = u16::from_be_bytes([header[1], header[2]]);

        let rectype = RecordType::from_u8(header[3])
            .ok_or_else(|| Error::ihex_record(lineno, format!("unknown record type {:02X}", header[3])))?;

        let expected = record_checksum(rectype, offset, data);
        if expected != checksum[0] {
            return Err(Error::IhexChecksum {
                line: lineno,
                expected,
                actual: checksum[0],
            });
        }

        match rectype {
            RecordType::Data => set.chunks.push(DataChunk {
                address: base + u64::from(offset),
                data: data.to_vec(),
            }),
            RecordType::EndOfFile => return Ok(set),
            RecordType::ExtendedSegmentAddress => base = u64::from(address_word(lineno, data)?) << 4,
            RecordType::ExtendedLinearAddress => base = u64::from(address_word(lineno, data)?) << 16,
            RecordType::StartSegmentAddress | RecordType::StartLinearAddress => {}
        }
    }

    Err(Error::IhexNoEof)
}

/// Decodes one record line into bytes and validates its length.
fn decode_line(lineno: usize, line: &str) -> Result<Vec<u8>> {
    let digits = line
        .strip_prefix(START_CODE)
        .ok_or_else(|| Error::ihex_record(lineno, "missing start code"))?
        .as_bytes();

    if digits.len() % 2 != 0 {
        return Err(Error::ihex_record(lineno, "odd number of hex digits"));
    }

    let bytes = digits
        .chunks_exact(2)
        .map(|pair| Some((hex_digit(pair[0])? << 4) | hex_digit(pair[1])?))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| Error::ihex_record(lineno, "invalid hex digit"))?;

    if bytes.len() < 5 {
        return Err(Error::ihex_record(lineno, "record too short"));
    }
    if bytes.len() != 5 + usize::from(bytes[0]) {
        return Err(Error::ihex_record(
            lineno,
            format!("byte count {} does not match record length", bytes[0]),
        ));
    }
    Ok(bytes)
}

fn address_word(lineno: usize, data: &[u8]) -> Result<u16> {
    match data {
        [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(Error::ihex_record(lineno, "address record must hold 2 bytes")),
    }
}
