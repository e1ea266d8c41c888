/// Errors that can occur while framing or decoding serial data.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame delimiter must contain at least one byte.
    #[error("end-of-message delimiter is empty")]
    EmptyDelimiter,

    /// Malformed `%XX` escape in percent-encoded text.
    #[error("invalid percent encoding at byte {position}: {reason}")]
    InvalidEncoding { position: usize, reason: &'static str },

    /// No delimiter seen before the buffer reached its limit.
    #[error("frame too large ({size} bytes, max {max}) without delimiter")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended; any partial frame is discarded.
    #[error("unexpected end of stream")]
    UnexpectedEof,
}

pub type Result<T> = std::result::Result<T, FrameError>;
