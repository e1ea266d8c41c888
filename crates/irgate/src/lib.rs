//! Drive networked IR, serial and relay gateway appliances.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP channels with local interface binding and connect timeouts
//! - [`frame`]: Delimiter framing and percent encoding for serial channels
//! - [`device`]: the per-device engine: request queue, connection management,
//!   heartbeat, serial readers and IR code conversion

/// Re-export transport types.
pub mod transport {
    pub use irgate_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use irgate_frame::*;
}

/// Re-export device types.
pub mod device {
    pub use irgate_device::*;
}
