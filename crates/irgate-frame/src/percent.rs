//! `application/x-www-form-urlencoded` style text for binary serial data.
//!
//! Each byte maps to one Latin-1 character: `%XX` escapes carry arbitrary
//! bytes, `+` stands for a space, and any other character is taken as its
//! own code point. Characters above U+00FF have no byte form and become `?`.

use crate::error::{FrameError, Result};

/// Decode percent-encoded text into raw bytes.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.char_indices();

    while let Some((position, ch)) = chars.next() {
        match ch {
            '+' => out.push(b' '),
            '%' => {
                let hi = chars.next().map(|(_, c)| c);
                let lo = chars.next().map(|(_, c)| c);
                let (Some(hi), Some(lo)) = (hi, lo) else {
                    return Err(FrameError::InvalidEncoding {
                        position,
                        reason: "incomplete escape",
                    });
                };
                match (hi.to_digit(16), lo.to_digit(16)) {
                    (Some(hi), Some(lo)) => out.push((hi * 16 + lo) as u8),
                    _ => {
                        return Err(FrameError::InvalidEncoding {
                            position,
                            reason: "non-hex digit in escape",
                        })
                    }
                }
            }
            c => out.push(u8::try_from(u32::from(c)).unwrap_or(b'?')),
        }
    }

    Ok(out)
}

/// Encode raw bytes as printable percent-encoded text.
pub fn encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut out = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' | b'*' | b'_' => {
                out.push(char::from(b))
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(char::from(HEX[usize::from(b >> 4)]));
                out.push(char::from(HEX[usize::from(b & 0x0F)]));
            }
        }
    }
    out
}
