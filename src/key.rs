//! Module implement order preserving key encoding for sequence numbers.
//!
//! Sequence numbers are encoded as fixed-width big-endian bytes, so
//! that lexicographic order of the encoded keys is the natural order
//! of the numbers. Width is configurable between 1 and 8 bytes, every
//! key within a store uses the same width.

use crate::{Error, Result};

/// Maximum supported key width, in bytes. Widest keys hold the full
/// u64 range of sequence numbers.
pub const MAX_KEY_WIDTH: usize = 8;

/// Encode sequence number `seq` as a big-endian key of exactly `width`
/// bytes.
pub fn encode_key(seq: u64, width: usize) -> Result<Vec<u8>> {
    if width == 0 || width > MAX_KEY_WIDTH {
        return err_at!(InvalidInput, msg: "key width {} not within 1..={}", width, MAX_KEY_WIDTH);
    }
    if width < MAX_KEY_WIDTH && (seq >> (width * 8)) > 0 {
        return err_at!(InvalidInput, msg: "seq {} overflows key width {}", seq, width);
    }

    Ok(seq.to_be_bytes()[(MAX_KEY_WIDTH - width)..].to_vec())
}

/// Decode a key of exactly `width` bytes back to its sequence number.
pub fn decode_key(data: &[u8], width: usize) -> Result<u64> {
    if width == 0 || width > MAX_KEY_WIDTH {
        return err_at!(InvalidInput, msg: "key width {} not within 1..={}", width, MAX_KEY_WIDTH);
    }
    if data.len() != width {
        return err_at!(InvalidInput, msg: "key {:?} expected width {}", data, width);
    }

    let mut scratch = [0_u8; MAX_KEY_WIDTH];
    scratch[(MAX_KEY_WIDTH - width)..].copy_from_slice(data);
    Ok(u64::from_be_bytes(scratch))
}

// Reserved key under which store statistics are persisted. One byte
// wider than the widest entry key, sorts after every entry key for
// all supported widths.
pub fn meta_key() -> Vec<u8> {
    vec![0xFF; MAX_KEY_WIDTH + 1]
}

#[cfg(test)]
#[path = "key_test.rs"]
mod key_test;
