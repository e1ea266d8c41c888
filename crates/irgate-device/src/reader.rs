//! Background reader for unsolicited serial data.

use futures_util::StreamExt;
use irgate_frame::{DelimiterCodec, Delimiter, FrameError};
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::DeviceError;
use crate::model::SerialPort;
use crate::status::StatusTracker;

/// A reader loop ended because its socket failed.
///
/// `generation` identifies the connection the reader belonged to, so a fault
/// from a connection that has since been replaced can be ignored.
#[derive(Debug)]
pub struct SerialFault {
    pub port: SerialPort,
    pub generation: u64,
    pub error: DeviceError,
}

/// Reads one serial channel and publishes each complete frame.
///
/// A reader runs until stopped or until its input fails; it is never
/// restarted. Reconnecting spawns a fresh reader.
#[derive(Debug)]
pub struct SerialPortReader {
    port: SerialPort,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SerialPortReader {
    /// Spawn a reader over `input`.
    pub fn spawn<R>(
        port: SerialPort,
        input: R,
        delimiter: Delimiter,
        status: StatusTracker,
        faults: mpsc::UnboundedSender<SerialFault>,
        generation: u64,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        debug!(%port, %delimiter, generation, "starting serial reader");

        let task = tokio::spawn(async move {
            let mut frames = FramedRead::new(input, DelimiterCodec::new(delimiter));
            let error = loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!(%port, "serial reader stopped");
                        return;
                    }
                    next = frames.next() => match next {
                        Some(Ok(frame)) => {
                            trace!(%port, len = frame.len(), "frame received");
                            status.publish_frame(port, &frame);
                        }
                        Some(Err(err)) => break DeviceError::from(err),
                        None => break DeviceError::from(FrameError::UnexpectedEof),
                    },
                }
            };

            warn!(%port, generation, error = %error, "serial reader failed");
            let _ = faults.send(SerialFault {
                port,
                generation,
                error,
            });
        });

        Self {
            port,
            cancel,
            task: Some(task),
        }
    }

    pub fn port(&self) -> SerialPort {
        self.port
    }

    /// True until the loop has exited.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancel the loop and wait for it to exit. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if err.is_panic() {
                    warn!(port = %self.port, "serial reader panicked");
                }
            }
        }
    }
}

impl Drop for SerialPortReader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
