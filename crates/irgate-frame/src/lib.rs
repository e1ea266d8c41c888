//! Framing for gateway serial channels.
//!
//! Serial ports on the gateway are raw byte pipes. Outbound payloads and the
//! end-of-message delimiter are configured as percent/URL-form encoded text so
//! arbitrary bytes fit in printable configuration; inbound bytes are cut into
//! frames wherever the accumulated buffer ends with the delimiter.

pub mod codec;
pub mod delimiter;
pub mod error;
pub mod percent;

pub use codec::{DelimiterCodec, DEFAULT_MAX_FRAME};
pub use delimiter::{is_complete, Delimiter};
pub use error::{FrameError, Result};
