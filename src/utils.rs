//! Utility functions.

use std::fmt::Write;

/// Appends a little-endian 64-bit word to a payload buffer.
pub fn push_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Appends a little-endian 32-bit word to a payload buffer.
pub fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Index of the first table slot at or past `addr`, counting `stride`-sized
/// entries from `base`. An `addr` at or below `base` maps to slot 0.
pub fn stride_index(addr: u64, base: u64, stride: u64) -> u64 {
    addr.saturating_sub(base).div_ceil(stride)
}

/// Formats a payload buffer as a contiguous hex string.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}
