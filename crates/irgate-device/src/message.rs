use std::fmt;

use tokio::sync::oneshot;

use crate::command::is_device_error;
use crate::model::{SerialPort, Target};

/// What the processor does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Write a line to the command channel and read one reply line.
    Command,
    /// Decode the payload and write it to a serial channel; no reply is read.
    RawSerial,
}

/// One unit of work for the [`CommandProcessor`](crate::CommandProcessor).
///
/// Each request carries its own reply channel and is answered exactly once.
pub struct Request {
    pub kind: RequestKind,
    pub target: Target,
    pub payload: String,
    reply: oneshot::Sender<Response>,
}

impl Request {
    /// A command-channel transaction.
    pub fn command(text: impl Into<String>) -> (Self, oneshot::Receiver<Response>) {
        Self::new(RequestKind::Command, Target::Command, text.into())
    }

    /// A write-only send to a serial port. `payload` may be percent-encoded.
    pub fn raw_serial(
        port: SerialPort,
        payload: impl Into<String>,
    ) -> (Self, oneshot::Receiver<Response>) {
        Self::new(RequestKind::RawSerial, Target::Serial(port), payload.into())
    }

    fn new(
        kind: RequestKind,
        target: Target,
        payload: String,
    ) -> (Self, oneshot::Receiver<Response>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                kind,
                target,
                payload,
                reply,
            },
            rx,
        )
    }

    /// Channel name for logs.
    pub fn name(&self) -> &'static str {
        self.target.name()
    }

    /// Answer the request. A caller that stopped waiting is not an error.
    pub(crate) fn respond(self, response: Response) {
        let _ = self.reply.send(response);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .field("payload", &self.payload)
            .finish()
    }
}

/// Outcome of a request: a reply line, the success marker, or an `ERROR:` text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    text: String,
    generation: Option<u64>,
}

impl Response {
    /// Reply to write-only serial sends.
    pub const SUCCESS_MARKER: &'static str = "successful";
    /// Prefix of locally generated failures.
    pub const ERROR_PREFIX: &'static str = "ERROR:";

    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            generation: None,
        }
    }

    pub fn success() -> Self {
        Self::new(Self::SUCCESS_MARKER)
    }

    pub fn error(message: impl fmt::Display) -> Self {
        Self::new(format!("{} {message}", Self::ERROR_PREFIX))
    }

    pub fn no_connection() -> Self {
        Self::error("No connection to device")
    }

    /// Tag with the connection generation that produced this response.
    pub(crate) fn on_link(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Connection generation the request ran on, or `None` if it never
    /// reached a connected link.
    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// True for locally generated failures.
    pub fn is_error(&self) -> bool {
        self.text.starts_with(Self::ERROR_PREFIX)
    }

    /// True if neither a local failure nor a device error reply.
    pub fn is_successful(&self) -> bool {
        !self.is_error() && !is_device_error(&self.text)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub(crate) enum QueueItem {
    Request(Request),
    Terminate,
}
