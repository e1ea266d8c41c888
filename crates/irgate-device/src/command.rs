//! Command-channel text protocol.
//!
//! Each command is one ASCII line terminated by `\r`; each reply is one line
//! terminated by `\n`. Module/connector pairs address IR emitters and relays.

use std::fmt;
use std::str::FromStr;

use crate::error::DeviceError;
use crate::model::DeviceModel;

/// Reply prefix of iTach error responses, e.g. `ERR_1:1,008`.
pub const ITACH_ERROR_PREFIX: &str = "ERR";
/// Reply prefix of GC-100 error responses, e.g. `unknowncommand 14`.
pub const GC100_ERROR_PREFIX: &str = "unknowncommand";

/// A `module:connector` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub module: u8,
    pub connector: u8,
}

impl Address {
    pub fn new(module: u8, connector: u8) -> Self {
        Self { module, connector }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.connector)
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (module, connector) = s
            .split_once(':')
            .ok_or_else(|| format!("address '{s}' must be MODULE:CONNECTOR"))?;
        let module = module
            .trim()
            .parse()
            .map_err(|_| format!("invalid module in address '{s}'"))?;
        let connector = connector
            .trim()
            .parse()
            .map_err(|_| format!("invalid connector in address '{s}'"))?;
        Ok(Self { module, connector })
    }
}

/// Relay (contact closure) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayState {
    Off,
    On,
}

impl RelayState {
    fn wire(self) -> char {
        match self {
            Self::Off => '0',
            Self::On => '1',
        }
    }
}

impl From<bool> for RelayState {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::On => "on",
        })
    }
}

/// A command-channel transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    /// Version/identity query; also used as the heartbeat.
    GetVersion,
    /// Transmit a native-format IR code.
    SendIr {
        address: Address,
        id: u32,
        code: String,
    },
    /// Set a relay.
    SetState { address: Address, state: RelayState },
    /// Query a relay.
    GetState { address: Address },
}

impl DeviceCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetVersion => "getversion",
            Self::SendIr { .. } => "sendir",
            Self::SetState { .. } => "setstate",
            Self::GetState { .. } => "getstate",
        }
    }

    /// Command text, without the `\r` terminator.
    pub fn to_wire(&self, model: DeviceModel) -> String {
        match self {
            Self::GetVersion if model.is_gc100() => "getversion,0".to_string(),
            Self::GetVersion => "getversion".to_string(),
            Self::SendIr { address, id, code } => format!("sendir,{address},{id},{code}"),
            Self::SetState { address, state } => format!("setstate,{address},{}", state.wire()),
            Self::GetState { address } => format!("getstate,{address}"),
        }
    }

    /// Check a reply against what this command expects.
    pub fn check_reply(&self, reply: &str) -> Result<(), DeviceError> {
        if is_device_error(reply) {
            return Err(DeviceError::Rejected(reply.to_string()));
        }
        let expected = match self {
            Self::GetVersion => return Ok(()),
            Self::SendIr { address, id, .. } => format!("completeir,{address},{id}"),
            Self::SetState { address, .. } | Self::GetState { address } => {
                format!("state,{address},")
            }
        };
        if reply.starts_with(&expected) {
            Ok(())
        } else {
            Err(DeviceError::UnexpectedReply(reply.to_string()))
        }
    }
}

/// True if `reply` is an error reply from the device.
pub fn is_device_error(reply: &str) -> bool {
    reply.starts_with(ITACH_ERROR_PREFIX) || reply.starts_with(GC100_ERROR_PREFIX)
}

/// Parse a `state,M:C,N` reply.
pub fn parse_state(reply: &str) -> Result<RelayState, DeviceError> {
    let unexpected = || DeviceError::UnexpectedReply(reply.to_string());
    let mut fields = reply.split(',');
    if fields.next() != Some("state") {
        return Err(unexpected());
    }
    let _address = fields.next().ok_or_else(unexpected)?;
    match fields.next().map(str::trim) {
        Some("0") => Ok(RelayState::Off),
        Some("1") => Ok(RelayState::On),
        _ => Err(unexpected()),
    }
}
