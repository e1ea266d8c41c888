use std::fmt;

use irgate_device::{DeviceError, ErrorKind};
use irgate_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const CONFIG: i32 = 78;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn device_error(context: &str, err: DeviceError) -> CliError {
    let code = match &err {
        DeviceError::Transport(TransportError::ConnectTimeout { .. })
        | DeviceError::Transport(TransportError::ReplyTimeout(_)) => TIMEOUT,
        DeviceError::Rejected(_) | DeviceError::UnexpectedReply(_) | DeviceError::QueueFull(_) => {
            FAILURE
        }
        DeviceError::UnsupportedPort(_) => USAGE,
        _ => match err.kind() {
            ErrorKind::Configuration => CONFIG,
            ErrorKind::Communication => TRANSPORT_ERROR,
            ErrorKind::Protocol => DATA_INVALID,
            ErrorKind::Interrupted => INTERNAL,
        },
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use irgate_device::{IrCodeError, SerialPort};

    use super::*;

    #[test]
    fn maps_error_kinds_to_exit_codes() {
        let code = |err| device_error("op", err).code;
        assert_eq!(code(DeviceError::Configuration("IP address not set".into())), CONFIG);
        assert_eq!(code(DeviceError::Failed("No connection to device".into())), TRANSPORT_ERROR);
        assert_eq!(code(DeviceError::from(IrCodeError::InvalidFrequency)), DATA_INVALID);
        assert_eq!(code(DeviceError::Rejected("ERR_1:1,008".into())), FAILURE);
        assert_eq!(code(DeviceError::UnsupportedPort(SerialPort::Serial2)), USAGE);
        assert_eq!(
            code(DeviceError::from(TransportError::ReplyTimeout(Duration::from_secs(5)))),
            TIMEOUT
        );
        assert_eq!(code(DeviceError::Stopped), INTERNAL);
    }

    #[test]
    fn message_keeps_context() {
        let err = device_error("send failed", DeviceError::Stopped);
        assert_eq!(err.to_string(), "send failed: gateway is shut down");
    }
}
