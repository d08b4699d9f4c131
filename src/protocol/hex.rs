//! Decoding helpers for the all-hex, no-prefix numbers of the wire
//! protocol.

use btoi::{btoi_radix, btou_radix, ParseIntegerError};
use num_traits::{CheckedAdd, CheckedMul, CheckedSub, FromPrimitive, Zero};

/// Decode a big-endian hex string into an unsigned integer.
#[inline]
pub fn decode_hex<I>(buf: &[u8]) -> Result<I, ParseIntegerError>
where
    I: FromPrimitive + Zero + CheckedAdd + CheckedMul,
{
    btou_radix(buf, 16)
}

/// Decode a big-endian hex string with an optional leading sign.
#[inline]
pub fn decode_signed_hex<I>(buf: &[u8]) -> Result<I, ParseIntegerError>
where
    I: FromPrimitive + Zero + CheckedAdd + CheckedSub + CheckedMul,
{
    btoi_radix(buf, 16)
}

fn ascii2byte(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode a hex string into its bytes.
///
/// Fails on odd-length input or non-hex characters.
pub fn decode_hex_vec(buf: &[u8]) -> Result<Vec<u8>, &'static str> {
    const MUST_BE_ASCII: &str = "buf must only contain ASCII hexdigits";
    const EVEN_LEN: &str = "buf must have even number of bytes";

    if buf.len() % 2 != 0 {
        return Err(EVEN_LEN);
    }

    let mut decoded = Vec::with_capacity(buf.len() / 2);
    for pair in buf.chunks_exact(2) {
        let b = ascii2byte(pair[0]).ok_or(MUST_BE_ASCII)? << 4
            | ascii2byte(pair[1]).ok_or(MUST_BE_ASCII)?;
        decoded.push(b);
    }

    Ok(decoded)
}
