//! Built-in table of known fields.
//!
//! These describe the non-volatile memory layout of the reference firmware:
//! an image checksum, a unique system identifier and a length-prefixed
//! firmware version string.

use std::fmt::Write as _;

use tracing::warn;

use super::descriptor::{copy_verbatim, FieldBehavior, FieldDescriptor};
use crate::util::{memchr_null, read_u16_le_at, read_u32_le_at};

/// Symbol name of the image checksum field.
pub const CHECKSUM_SYMBOL: &str = "nvm_crc";

/// Symbol name of the unique system identification field.
pub const UNIQUE_SYMBOL: &str = "nvm_unique";

/// Symbol name of the firmware version field.
pub const VERSION_SYMBOL: &str = "nvm_version";

// Unique system identification layout
const UNIQUE_SERIAL_OFFSET: usize = 0;
const UNIQUE_HARDWARE_OFFSET: usize = 2;

// Version string layout
const VERSION_LENGTH_OFFSET: usize = 0;
const VERSION_STRING_OFFSET: usize = 1;

/// Hardware type code stored in the unique system identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareType {
    /// Development prototype
    Prototype,
    /// Series production unit
    Production,
    /// Reserved code within the valid range
    Unknown(u8),
    /// Code above the highest valid type
    Invalid(u8),
}

impl HardwareType {
    const PROTOTYPE: u8 = 1;
    const PRODUCTION: u8 = 2;
    const MAX_TYPE: u8 = 0x1F;

    /// Classifies a raw hardware type code.
    pub fn from_code(code: u8) -> Self {
        match code {
            Self::PROTOTYPE => HardwareType::Prototype,
            Self::PRODUCTION => HardwareType::Production,
            c if c > Self::MAX_TYPE => HardwareType::Invalid(c),
            c => HardwareType::Unknown(c),
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            HardwareType::Prototype => "Prototype system",
            HardwareType::Production => "Production system",
            HardwareType::Invalid(_) => "invalid hardware",
            HardwareType::Unknown(_) => "unknown hardware",
        }
    }
}

// =============================================================================
// Checksum
// =============================================================================

/// Four-byte little-endian CRC-32 over the whole image.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checksum;

impl FieldBehavior for Checksum {
    fn render(&self, data: &[u8]) -> Option<String> {
        read_u32_le_at(data, 0).map(|crc| format!("{:08X}", crc))
    }
}

// =============================================================================
// Unique System Identification
// =============================================================================

/// Serial number plus hardware type.
///
/// Transfers keep the destination's hardware type, since it identifies the
/// physical board the target image is meant for.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueId;

impl FieldBehavior for UniqueId {
    fn copy(&self, field: &FieldDescriptor, dst: &mut [u8], src: &[u8]) -> usize {
        let target_hwtype = dst.get(UNIQUE_HARDWARE_OFFSET).copied();
        let copied = copy_verbatim(dst, src);

        match target_hwtype {
            Some(target) if copied > UNIQUE_HARDWARE_OFFSET && src[UNIQUE_HARDWARE_OFFSET] != target => {
                let provided = src[UNIQUE_HARDWARE_OFFSET];
                warn!(
                    "{} changed to match target hardware type: {:02} ({}) in target map, {:02} ({}) provided from image",
                    field.description(),
                    target,
                    HardwareType::from_code(target).name(),
                    provided,
                    HardwareType::from_code(provided).name(),
                );
                dst[UNIQUE_HARDWARE_OFFSET] = target;
                copied - 1
            }
            _ => copied,
        }
    }

    fn render(&self, data: &[u8]) -> Option<String> {
        let serial = read_u16_le_at(data, UNIQUE_SERIAL_OFFSET).unwrap_or(0xFFFF);
        let hwtype = data.get(UNIQUE_HARDWARE_OFFSET).copied().unwrap_or(0xFF);
        Some(format!(
            "S/N {:02}-{:05} ({})",
            hwtype,
            serial,
            HardwareType::from_code(hwtype).name()
        ))
    }
}

// =============================================================================
// Firmware Version
// =============================================================================

/// Version string with a one-byte length prefix.
///
/// The stored length counts the string bytes including the NUL terminator.
/// Transfers never overwrite the destination's version.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionString;

impl FieldBehavior for VersionString {
    fn resize(&self, content: &[u8], _current: usize) -> Option<usize> {
        content
            .get(VERSION_LENGTH_OFFSET)
            .map(|&len| VERSION_STRING_OFFSET + len as usize)
    }

    fn copy(&self, _field: &FieldDescriptor, _dst: &mut [u8], _src: &[u8]) -> usize {
        0
    }

    fn render(&self, data: &[u8]) -> Option<String> {
        let length = data.get(VERSION_LENGTH_OFFSET).copied().unwrap_or(0) as usize;
        if length == 0 || data.len() <= VERSION_STRING_OFFSET {
            return Some(format!("<unknown version> ({} bytes)", length));
        }

        let declared_end = VERSION_STRING_OFFSET + length;
        let stored = &data[VERSION_STRING_OFFSET..declared_end.min(data.len())];
        let text_len = memchr_null(stored);

        let mut out = String::from_utf8_lossy(&stored[..text_len]).into_owned();
        if data.len() < declared_end {
            let _ = write!(
                out,
                " ({} of {} bytes missing)",
                declared_end - data.len(),
                length
            );
        } else {
            let _ = write!(out, " ({} bytes)", length);
        }
        if text_len == stored.len() {
            out.push_str(" missing NUL termination!");
        }
        Some(out)
    }
}

/// Returns the built-in known field descriptors.
pub fn builtin_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::new(CHECKSUM_SYMBOL, "Image checksum", 4, Checksum),
        FieldDescriptor::new(UNIQUE_SYMBOL, "Unique system identification", 3, UniqueId),
        FieldDescriptor::new(VERSION_SYMBOL, "System firmware version", 0, VersionString),
    ]
}
