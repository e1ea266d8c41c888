use irgate_frame::FrameError;
use irgate_transport::TransportError;

use crate::ircode::IrCodeError;
use crate::lookup::LookupError;
use crate::model::SerialPort;

/// How a failure affects the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing settings; the device stays offline until reconfigured.
    Configuration,
    /// Socket-level failure; the link is torn down and rebuilt on the next request.
    Communication,
    /// The request itself is malformed or was refused; the link is untouched.
    Protocol,
    /// Shutdown cancelled the operation.
    Interrupted,
}

/// Errors surfaced by the device engine.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport-level error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Framing or payload decoding error.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// An IR code could not be converted.
    #[error("invalid IR code: {0}")]
    IrCode(#[from] IrCodeError),

    /// The symbolic command could not be resolved.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// The device model has no such serial port.
    #[error("{0} is not available on this device")]
    UnsupportedPort(SerialPort),

    /// The request failed before the device could answer it.
    #[error("{0}")]
    Failed(String),

    /// The device answered with an error reply.
    #[error("device rejected command: {0}")]
    Rejected(String),

    /// The device answered with something the command does not expect.
    #[error("unexpected reply '{0}'")]
    UnexpectedReply(String),

    /// The request queue is at capacity.
    #[error("request queue full (capacity {0})")]
    QueueFull(usize),

    /// The gateway has been shut down.
    #[error("gateway is shut down")]
    Stopped,
}

impl DeviceError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Transport(_) | Self::Failed(_) | Self::QueueFull(_) => ErrorKind::Communication,
            Self::Frame(err) => match err {
                FrameError::Io(_) | FrameError::UnexpectedEof | FrameError::FrameTooLarge { .. } => {
                    ErrorKind::Communication
                }
                FrameError::EmptyDelimiter | FrameError::InvalidEncoding { .. } => {
                    ErrorKind::Protocol
                }
            },
            Self::IrCode(_)
            | Self::Lookup(_)
            | Self::UnsupportedPort(_)
            | Self::Rejected(_)
            | Self::UnexpectedReply(_) => ErrorKind::Protocol,
            Self::Stopped => ErrorKind::Interrupted,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_failures_are_communication_errors() {
        let err = DeviceError::from(TransportError::Closed);
        assert_eq!(err.kind(), ErrorKind::Communication);
        assert_eq!(DeviceError::from(FrameError::UnexpectedEof).kind(), ErrorKind::Communication);
    }

    #[test]
    fn payload_problems_are_protocol_errors() {
        let err = DeviceError::from(FrameError::InvalidEncoding {
            position: 0,
            reason: "incomplete escape",
        });
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(
            DeviceError::from(IrCodeError::InvalidFrequency).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            DeviceError::UnsupportedPort(SerialPort::Serial2).kind(),
            ErrorKind::Protocol
        );
    }

    #[test]
    fn shutdown_is_interrupted() {
        assert_eq!(DeviceError::Stopped.kind(), ErrorKind::Interrupted);
    }
}
