//! Hex helpers for diagnostic logging of bus payloads

use std::fmt::Write;

/// Encode bytes to uppercase hex string
/// Example: [0x12, 0x34, 0xAB] -> "1234AB"
pub fn encode_upper(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 2);
    for byte in data {
        // Writing to String buffer is infallible
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

/// Hex preview of at most `limit` bytes, with a `..(+N)` suffix when cut
pub fn preview(data: &[u8], limit: usize) -> String {
    if data.len() <= limit {
        return encode_upper(data);
    }
    format!("{}..(+{})", encode_upper(&data[..limit]), data.len() - limit)
}
