//! TCP transport to a networked IR/serial/relay gateway.
//!
//! A gateway exposes one command port and up to two serial pass-through ports.
//! Each port is reached through its own [`DeviceConnection`], which binds to a
//! chosen local interface before connecting (multi-homed hosts) and bounds the
//! connect with an explicit timeout.
//!
//! This is the lowest layer of irgate. Everything else builds on top of the
//! connection type provided here.

pub mod connection;
pub mod error;
pub mod tcp;

pub use connection::{DeviceConnection, DEFAULT_CONNECT_TIMEOUT, MAX_REPLY_LEN};
pub use error::{Result, TransportError};
pub use tcp::connect_from;
