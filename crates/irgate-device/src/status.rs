//! Device status reporting to the host framework.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use irgate_frame::percent;
use tracing::{debug, error, info, warn};

use crate::model::SerialPort;

/// Detail attached to an offline transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusDetail {
    ConfigurationError,
    CommunicationError,
}

impl fmt::Display for StatusDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::CommunicationError => "COMMUNICATION_ERROR",
        })
    }
}

/// Outbound notifications to whoever owns the device's lifecycle.
pub trait StatusSink: Send + Sync {
    fn mark_online(&self);

    fn mark_offline(&self);

    fn mark_offline_with_error(&self, detail: StatusDetail, message: &str);

    /// A complete frame arrived on `port`.
    fn update_feedback_channel(&self, port: SerialPort, frame: &[u8]);

    /// True if something observes feedback for `port`. Unlinked frames are dropped.
    fn is_linked(&self, _port: SerialPort) -> bool {
        true
    }
}

/// Sink that only logs.
#[derive(Debug, Clone, Default)]
pub struct LogStatusSink {
    device: String,
}

impl LogStatusSink {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl StatusSink for LogStatusSink {
    fn mark_online(&self) {
        info!(device = %self.device, "device online");
    }

    fn mark_offline(&self) {
        info!(device = %self.device, "device offline");
    }

    fn mark_offline_with_error(&self, detail: StatusDetail, message: &str) {
        error!(device = %self.device, %detail, message, "device offline");
    }

    fn update_feedback_channel(&self, port: SerialPort, frame: &[u8]) {
        info!(device = %self.device, %port, frame = %percent::encode(frame), "feedback");
    }
}

/// Last status reported through a [`StatusTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceStatus {
    #[default]
    Unknown,
    Online,
    Offline(Option<StatusDetail>),
}

impl DeviceStatus {
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

/// Wraps a [`StatusSink`] and suppresses repeated transitions.
///
/// - online is reported only when not already online,
/// - offline only when currently online,
/// - offline-with-error unless already offline with a detail attached.
#[derive(Clone)]
pub struct StatusTracker {
    sink: Arc<dyn StatusSink>,
    status: Arc<Mutex<DeviceStatus>>,
}

impl StatusTracker {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            sink,
            status: Arc::new(Mutex::new(DeviceStatus::Unknown)),
        }
    }

    /// Current status.
    pub fn status(&self) -> DeviceStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark_online(&self) {
        {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            if status.is_online() {
                return;
            }
            *status = DeviceStatus::Online;
        }
        debug!("status -> online");
        self.sink.mark_online();
    }

    pub fn mark_offline(&self) {
        {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            if !status.is_online() {
                return;
            }
            *status = DeviceStatus::Offline(None);
        }
        debug!("status -> offline");
        self.sink.mark_offline();
    }

    pub fn mark_offline_with_error(&self, detail: StatusDetail, message: &str) {
        {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            if matches!(*status, DeviceStatus::Offline(Some(_))) {
                return;
            }
            *status = DeviceStatus::Offline(Some(detail));
        }
        warn!(%detail, message, "status -> offline");
        self.sink.mark_offline_with_error(detail, message);
    }

    /// Forward a frame if the port is linked.
    pub fn publish_frame(&self, port: SerialPort, frame: &[u8]) -> bool {
        if !self.sink.is_linked(port) {
            debug!(%port, len = frame.len(), "feedback not linked, dropping frame");
            return false;
        }
        self.sink.update_feedback_channel(port, frame);
        true
    }
}

impl fmt::Debug for StatusTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusTracker")
            .field("status", &self.status())
            .finish()
    }
}
