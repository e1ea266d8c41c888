//! Infrared code formats.
//!
//! Codes arrive either in the gateway's native form
//! (`frequency,repeat,offset,t1,t2,...`, decimal) or in the common hex
//! notation (`0000 FFFF S1LN S2LN t1 t2 ...`, four hex digits per token).
//! Hex codes are converted to the native form before sending.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

/// Divided by the hex frequency word to get the carrier frequency in Hz.
pub const FREQUENCY_CONVERSION_FACTOR: u32 = 4_145_146;

/// Repeat count written into converted codes.
pub const DEFAULT_REPEAT: u32 = 1;

const MIN_HEX_TOKENS: usize = 5;

static HEX_CODE_REGEX: OnceLock<Regex> = OnceLock::new();

/// Errors converting a hex IR code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IrCodeError {
    /// Too few tokens, or the leading token is not `0000`.
    #[error("invalid hex code format: {0}")]
    InvalidFormat(&'static str),

    /// Token 1 is not a non-zero hex number.
    #[error("unable to convert frequency from element 1")]
    InvalidFrequency,

    /// Token 2 is not a hex number.
    #[error("unable to convert offset from element 2")]
    InvalidOffset,

    /// One of the timing tokens is not a hex number.
    #[error("unable to convert timing element {0}")]
    InvalidPayload(usize),
}

/// An IR code as returned by the lookup collaborator, classified once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrCode {
    /// Hex notation, needs conversion before sending.
    Hex(String),
    /// Already in the gateway's native format.
    Native(String),
}

impl IrCode {
    /// Classify a code by its shape.
    ///
    /// Anything containing `0000` followed by space-separated four-digit hex
    /// groups is treated as hex; everything else passes through as native.
    pub fn classify(code: impl Into<String>) -> Self {
        let code = code.into();
        let re = HEX_CODE_REGEX.get_or_init(|| {
            Regex::new(r"0000( +[0-9A-Fa-f]{4})+").expect("Invalid hex code regex")
        });
        if re.is_match(&code) {
            Self::Hex(code)
        } else {
            Self::Native(code)
        }
    }

    /// The code as given.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Hex(code) | Self::Native(code) => code,
        }
    }

    /// The code in native format, converting hex codes.
    pub fn to_native(&self) -> Result<Cow<'_, str>, IrCodeError> {
        match self {
            Self::Hex(code) => convert_hex_to_native(code).map(Cow::Owned),
            Self::Native(code) => Ok(Cow::Borrowed(code)),
        }
    }
}

/// Convert a hex-notation IR code to the gateway's native format.
///
/// Output is `frequency,1,offset` followed by every timing token in decimal,
/// where `frequency = round(4145146 / token[1])` and
/// `offset = token[2] * 2 + 1`. Token 3 (second sequence length) is not used.
pub fn convert_hex_to_native(hex_code: &str) -> Result<String, IrCodeError> {
    let tokens: Vec<&str> = hex_code.split_ascii_whitespace().collect();

    if tokens.len() < MIN_HEX_TOKENS {
        return Err(IrCodeError::InvalidFormat("hex code is too short"));
    }
    if tokens[0] != "0000" {
        return Err(IrCodeError::InvalidFormat("element 0 must be 0000"));
    }

    let divisor = parse_hex(tokens[1])
        .filter(|d| *d != 0)
        .ok_or(IrCodeError::InvalidFrequency)?;
    // Rounded to nearest; integer division here would give 38028 for 0x6D, not 38029.
    let frequency = (u64::from(FREQUENCY_CONVERSION_FACTOR) + u64::from(divisor) / 2)
        / u64::from(divisor);

    let offset = parse_hex(tokens[2])
        .and_then(|len| len.checked_mul(2))
        .and_then(|len| len.checked_add(1))
        .ok_or(IrCodeError::InvalidOffset)?;

    let mut native = format!("{frequency},{DEFAULT_REPEAT},{offset}");
    for (index, token) in tokens.iter().enumerate().skip(4) {
        let value = parse_hex(token).ok_or(IrCodeError::InvalidPayload(index))?;
        let _ = write!(native, ",{value}");
    }

    Ok(native)
}

fn parse_hex(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(token, 16).ok()
}
