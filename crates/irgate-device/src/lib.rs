//! Device engine for networked IR/serial/relay gateways.
//!
//! A [`Gateway`] owns everything needed to drive one appliance: a bounded
//! request queue drained by a single [`CommandProcessor`], a
//! [`ConnectionManager`] that opens the command and serial channels as one
//! group, a heartbeat that re-validates the link through the same queue, and
//! one [`SerialPortReader`] per two-way serial port.
//!
//! ```text
//! callers ──submit──▶ queue ──▶ CommandProcessor ──▶ command / serial sockets
//!                       ▲                 │
//!            heartbeat ─┘                 └──▶ Response (per-request oneshot)
//! serial sockets ──▶ SerialPortReader ──▶ StatusSink::update_feedback_channel
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ircode;
pub mod lookup;
pub mod manager;
pub mod message;
pub mod model;
mod monitor;
pub mod processor;
pub mod reader;
pub mod status;

pub use command::{Address, DeviceCommand, RelayState};
pub use config::{GatewayConfig, HeartbeatSchedule, ReaderConfig, ResolvedConfig, SerialPortConfig};
pub use error::{DeviceError, ErrorKind, Result};
pub use gateway::{Gateway, GatewayBuilder};
pub use ircode::{convert_hex_to_native, IrCode, IrCodeError};
pub use lookup::{CodeLookup, LookupError, MapLookup};
pub use manager::{ConnectionManager, ConnectionState, Links};
pub use message::{Request, RequestKind, Response};
pub use model::{ActiveCable, Capabilities, DeviceModel, SerialPort, Target};
pub use processor::CommandProcessor;
pub use reader::SerialPortReader;
pub use status::{DeviceStatus, LogStatusSink, StatusDetail, StatusSink, StatusTracker};
