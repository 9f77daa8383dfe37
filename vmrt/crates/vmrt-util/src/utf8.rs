//! Modified UTF-8 as used by class files and symbols.
//!
//! Differences from standard UTF-8: U+0000 is encoded as `C0 80`, and
//! supplementary characters are stored as two three-byte surrogates.

use crate::error::{Utf8Error, Utf8Result};

/// Encoded length of a single UTF-16 code unit.
#[inline]
fn encoded_len(c: u16) -> usize {
    match c {
        0x0001..=0x007f => 1,
        0x0000 | 0x0080..=0x07ff => 2,
        _ => 3,
    }
}

/// Number of bytes `chars` occupies in modified UTF-8.
pub fn utf8_length(chars: &[u16]) -> usize {
    chars.iter().map(|&c| encoded_len(c)).sum()
}

/// Encode UTF-16 code units as modified UTF-8.
pub fn encode(chars: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(utf8_length(chars));
    for &c in chars {
        match encoded_len(c) {
            1 => out.push(c as u8),
            2 => {
                out.push(0xc0 | ((c >> 6) & 0x1f) as u8);
                out.push(0x80 | (c & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | ((c >> 12) & 0x0f) as u8);
                out.push(0x80 | ((c >> 6) & 0x3f) as u8);
                out.push(0x80 | (c & 0x3f) as u8);
            }
        }
    }
    out
}

/// Decode modified UTF-8 into UTF-16 code units.
pub fn decode(bytes: &[u8]) -> Utf8Result<Vec<u16>> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        match b0 >> 4 {
            0x0..=0x7 => {
                out.push(b0 as u16);
                i += 1;
            }
            0xc | 0xd => {
                let b1 = continuation(bytes, i, 1)?;
                out.push((((b0 & 0x1f) as u16) << 6) | b1);
                i += 2;
            }
            0xe => {
                let b1 = continuation(bytes, i, 1)?;
                let b2 = continuation(bytes, i, 2)?;
                out.push((((b0 & 0x0f) as u16) << 12) | (b1 << 6) | b2);
                i += 3;
            }
            _ => return Err(Utf8Error::Malformed { pos: i }),
        }
    }
    Ok(out)
}

#[inline]
fn continuation(bytes: &[u8], start: usize, offset: usize) -> Utf8Result<u16> {
    let pos = start + offset;
    let b = *bytes.get(pos).ok_or(Utf8Error::Truncated { pos: start })?;
    if b & 0xc0 != 0x80 {
        return Err(Utf8Error::Malformed { pos });
    }
    Ok((b & 0x3f) as u16)
}

/// Encode a Rust string; surrogate pairs become two three-byte groups.
pub fn encode_str(s: &str) -> Vec<u8> {
    let chars: Vec<u16> = s.encode_utf16().collect();
    encode(&chars)
}

/// Decode to a Rust string, replacing unpaired surrogates.
pub fn decode_lossy(bytes: &[u8]) -> String {
    match decode(bytes) {
        Ok(chars) => String::from_utf16_lossy(&chars),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_ascii_is_identity() {
        assert_eq!(encode_str("java/lang/Object"), b"java/lang/Object".to_vec());
    }

    #[test]
    fn test_nul_uses_two_bytes() {
        assert_eq!(encode(&[0]), vec![0xc0, 0x80]);
        assert_eq!(decode(&[0xc0, 0x80]).unwrap(), vec![0]);
    }

    #[test]
    fn test_supplementary_uses_surrogates() {
        let encoded = encode_str("\u{1F600}");
        assert_eq!(encoded.len(), 6);
        assert_eq!(decode_lossy(&encoded), "\u{1F600}");
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(decode(&[0x80]), Err(Utf8Error::Malformed { pos: 0 }));
        assert_eq!(decode(&[0xe0, 0x80]), Err(Utf8Error::Truncated { pos: 0 }));
        assert_eq!(decode(&[0xc3, 0x41]), Err(Utf8Error::Malformed { pos: 1 }));
    }

    #[quickcheck]
    fn prop_round_trip(chars: Vec<u16>) -> bool {
        let encoded = encode(&chars);
        encoded.len() == utf8_length(&chars) && decode(&encoded).ok() == Some(chars)
    }
}
