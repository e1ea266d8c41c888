use std::fmt;

use bytes::Bytes;

use crate::error::{FrameError, Result};
use crate::percent;

/// Returns true iff `buffer` ends with exactly the bytes of `delimiter`.
///
/// A buffer shorter than the delimiter is never complete.
pub fn is_complete(buffer: &[u8], delimiter: &[u8]) -> bool {
    buffer.ends_with(delimiter)
}

/// A non-empty end-of-message byte sequence.
#[derive(Clone, PartialEq, Eq)]
pub struct Delimiter(Bytes);

impl Delimiter {
    /// Wrap raw delimiter bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(FrameError::EmptyDelimiter);
        }
        Ok(Self(bytes))
    }

    /// Decode a percent/URL-form encoded delimiter such as `%0D%0A`.
    pub fn decode(encoded: &str) -> Result<Self> {
        Self::new(percent::decode(encoded)?)
    }

    /// Raw delimiter bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Delimiter length in bytes (always at least one).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for the `len`/`is_empty` pairing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Delimiter")
            .field(&percent::encode(&self.0))
            .finish()
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&percent::encode(&self.0))
    }
}
