//! Vendor identity of a distribution executable
//!
//! The default probe reads the `CompanyName` entry of the executable's
//! embedded version resource (`VS_VERSIONINFO` / `StringFileInfo`) straight
//! from the file bytes, so it works on every platform. A file without that
//! metadata yields no information, which the transaction trusts.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace};

/// Reads the publisher recorded in an executable
///
/// Implementations must never modify the file. `None` means the vendor
/// cannot be determined.
pub trait VendorProbe: Send + Sync {
    fn company_name(&self, executable: &Path) -> Option<String>;
}

/// Probe parsing the PE version resource
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionInfoProbe;

impl VendorProbe for VersionInfoProbe {
    fn company_name(&self, executable: &Path) -> Option<String> {
        let bytes = match std::fs::read(executable) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Cannot read {} for vendor check: {}", executable.display(), e);
                return None;
            }
        };
        parse_company_name(&bytes)
    }
}

/// Outcome of comparing the expected vendor with the probed one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorCheck {
    Match(String),
    Mismatch(String),
    /// No vendor information available
    Indeterminate,
}

impl VendorCheck {
    /// Whether the installation may be kept
    pub fn is_trusted(&self) -> bool {
        !matches!(self, VendorCheck::Mismatch(_))
    }
}

/// Case-insensitive containment of `expected` in the reported company name
pub fn vendor_matches(expected: &str, found: &str) -> bool {
    found.to_lowercase().contains(&expected.trim().to_lowercase())
}

/// Probe `executable` on the blocking pool and compare with `expected`
pub async fn check_vendor(probe: Arc<dyn VendorProbe>, executable: &Path, expected: &str) -> VendorCheck {
    let path = executable.to_path_buf();
    let found = match tokio::task::spawn_blocking(move || probe.company_name(&path)).await {
        Ok(found) => found,
        Err(e) => {
            debug!("Vendor probe task failed: {}", e);
            None
        }
    };

    match found {
        Some(company) if vendor_matches(expected, &company) => VendorCheck::Match(company),
        Some(company) => VendorCheck::Mismatch(company),
        None => VendorCheck::Indeterminate,
    }
}

const COMPANY_NAME_KEY: &str = "CompanyName";
/// wLength + wValueLength + wType
const STRING_HEADER_LEN: usize = 6;
const TEXT_VALUE_TYPE: u16 = 1;

fn utf16le_key(key: &str) -> Vec<u8> {
    key.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let pair = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([pair[0], pair[1]]))
}

/// Extract `CompanyName` from raw executable bytes
///
/// Every UTF-16LE occurrence of the key is tried until one sits inside a
/// well-formed `String` structure with a non-empty text value.
pub fn parse_company_name(bytes: &[u8]) -> Option<String> {
    let key = utf16le_key(COMPANY_NAME_KEY);
    let mut search_from = 0;

    while let Some(position) = find(&bytes[search_from..], &key) {
        let key_pos = search_from + position;
        search_from = key_pos + 1;

        if let Some(value) = read_string_value(bytes, key_pos, key.len()) {
            trace!("CompanyName found at offset {:#x}", key_pos);
            return Some(value);
        }
    }
    None
}

fn read_string_value(bytes: &[u8], key_pos: usize, key_len: usize) -> Option<String> {
    let start = key_pos.checked_sub(STRING_HEADER_LEN)?;
    let length = read_u16(bytes, start)? as usize;
    let value_chars = read_u16(bytes, start + 2)? as usize;
    let value_type = read_u16(bytes, start + 4)?;

    if value_type != TEXT_VALUE_TYPE || value_chars == 0 {
        return None;
    }

    // Value is 32-bit aligned relative to the structure start
    let header_and_key = STRING_HEADER_LEN + key_len;
    let value_offset = start + ((header_and_key + 3) & !3);
    if length < value_offset - start {
        return None;
    }

    let available = bytes.len().saturating_sub(value_offset) / 2;
    let units: Vec<u16> = (0..value_chars.min(available))
        .filter_map(|i| read_u16(bytes, value_offset + i * 2))
        .take_while(|unit| *unit != 0)
        .collect();

    let value = String::from_utf16_lossy(&units).trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
