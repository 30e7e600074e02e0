//! Echo protocol handler for the reactor.

use std::io::{self, Write};

/// Uppercase every byte of `data` in place.
///
/// Each byte is taken as a Latin-1 code point. It is replaced only when its
/// uppercase form is a single code point that still fits in a byte, so
/// non-letters and letters like `ß` or `ÿ` pass through unchanged.
pub fn uppercase_in_place(data: &mut [u8]) {
    for byte in data.iter_mut() {
        *byte = uppercase_latin1(*byte);
    }
}

fn uppercase_latin1(byte: u8) -> u8 {
    if byte.is_ascii() {
        return byte.to_ascii_uppercase();
    }

    let mut upper = char::from(byte).to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(c), None) => u8::try_from(u32::from(c)).unwrap_or(byte),
        _ => byte,
    }
}

/// Uppercase one received chunk and write it back to the sender.
///
/// The whole chunk is written; no delimiter is added.
pub fn handle<W: Write>(message: &mut [u8], peer: &mut W) -> io::Result<()> {
    uppercase_in_place(message);
    peer.write_all(message)
}
