//! Error types for symbol map parsing, field transformation and image I/O.
//!
//! Errors are grouped by the pipeline stage that raises them. Each error maps
//! onto one of a small, closed set of [`ResultCode`]s so callers can turn a
//! failed run into a process exit status without matching every variant.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for conversion operations.
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to memory map file '{path}': {source}")]
    MemoryMap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("short write to '{path}': {remaining} of {total} bytes not written")]
    ShortWrite {
        path: PathBuf,
        remaining: usize,
        total: usize,
    },

    #[error("could not allocate {bytes} bytes for {what}")]
    Allocation { what: &'static str, bytes: usize },

    // ==================== Symbol Map Errors ====================
    #[error("invalid ELF symbol map '{path}': {reason}")]
    InvalidElf { path: PathBuf, reason: String },

    #[error("section '{name}' not found in symbol map")]
    SectionNotFound { name: String },

    #[error("symbol table not found in symbol map")]
    SymbolTableNotFound,

    #[error("no symbols found in section '{section}'")]
    NoSymbols { section: String },

    #[error("duplicate symbol '{symbol}' in symbol list")]
    DuplicateSymbol { symbol: String },

    // ==================== Post-Processing Errors ====================
    #[error("checksum field '{symbol}' has {actual} bytes, expected {expected}")]
    ChecksumFieldSize {
        symbol: String,
        actual: usize,
        expected: usize,
    },

    #[error("post-processor '{name}' failed: {reason}")]
    PostProcess { name: String, reason: String },

    // ==================== Image Format Errors ====================
    #[error("image file '{path}' is empty")]
    EmptyImage { path: PathBuf },

    #[error("Intel Hex parse error on line {line}: {reason}")]
    IhexRecord { line: usize, reason: String },

    #[error("Intel Hex checksum mismatch on line {line}: expected {expected:02X}, got {actual:02X}")]
    IhexChecksum { line: usize, expected: u8, actual: u8 },

    #[error("Intel Hex file has no end-of-file record")]
    IhexNoEof,

    #[error("image file '{path}' provides no data for any symbol")]
    ImageNoSymbols { path: PathBuf },

    #[error("image file '{path}' is not in {format} format")]
    UnrecognizedImage { path: PathBuf, format: &'static str },

    #[error("image of {size} bytes exceeds the {max} byte limit of {format} output")]
    ImageTooLarge {
        size: usize,
        max: usize,
        format: &'static str,
    },
}

/// A specialized Result type for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of outcomes a conversion run can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// Completed, carrying a count of processed items
    Success(usize),
    /// The symbol map yielded no usable symbols
    NoSymbols,
    /// Malformed input data or unsupported file format
    Format,
    /// A file could not be opened, read or written
    Io,
    /// Memory for an image or list could not be reserved
    Allocation,
    /// Required input missing or an internal invariant violated
    Structural,
}

impl ResultCode {
    /// Process exit status for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            ResultCode::Success(_) => 0,
            ResultCode::Structural => 1,
            ResultCode::NoSymbols => 2,
            ResultCode::Format => 3,
            ResultCode::Io => 4,
            ResultCode::Allocation => 5,
        }
    }
}

impl Error {
    /// Returns true if this error means the data is simply not in the
    /// expected format, so another decoder may be tried instead.
    #[inline]
    pub fn is_format_mismatch(&self) -> bool {
        matches!(
            self,
            Error::IhexRecord { .. }
                | Error::IhexChecksum { .. }
                | Error::IhexNoEof
                | Error::UnrecognizedImage { .. }
        )
    }

    /// Maps this error onto the closed set of result codes.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Error::Io(_)
            | Error::FileOpen { .. }
            | Error::FileRead { .. }
            | Error::MemoryMap { .. }
            | Error::FileWrite { .. }
            | Error::ShortWrite { .. } => ResultCode::Io,
            Error::Allocation { .. } => ResultCode::Allocation,
            Error::NoSymbols { .. } | Error::ImageNoSymbols { .. } => ResultCode::NoSymbols,
            Error::InvalidElf { .. }
            | Error::EmptyImage { .. }
            | Error::IhexRecord { .. }
            | Error::IhexChecksum { .. }
            | Error::IhexNoEof
            | Error::UnrecognizedImage { .. } => ResultCode::Format,
            Error::SectionNotFound { .. }
            | Error::SymbolTableNotFound
            | Error::DuplicateSymbol { .. }
            | Error::ChecksumFieldSize { .. }
            | Error::PostProcess { .. }
            | Error::ImageTooLarge { .. } => ResultCode::Structural,
        }
    }

    /// Creates an Intel Hex record error with a formatted message.
    #[inline]
    pub fn ihex_record(line: usize, reason: impl Into<String>) -> Self {
        Error::IhexRecord {
            line,
            reason: reason.into(),
        }
    }

    /// Creates an allocation failure error.
    #[inline]
    pub fn allocation(what: &'static str, bytes: usize) -> Self {
        Error::Allocation { what, bytes }
    }
}
