//! The single consumer of a gateway's request queue.

use std::sync::Arc;
use std::time::Instant;

use irgate_frame::percent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ResolvedConfig;
use crate::error::{DeviceError, ErrorKind, Result};
use crate::manager::{ConnectionManager, Links};
use crate::message::{QueueItem, Request, RequestKind, Response};
use crate::model::Target;

/// Executes queued requests one at a time, in submission order.
///
/// The processor holds the connection lock for the whole of each request,
/// from the lazy connect through writing and reading, so nothing else touches
/// the channels mid-transaction. A communication failure answers the request
/// with an `ERROR:` response and tears the link down; the next request
/// reconnects. Failed requests are never retried.
pub struct CommandProcessor {
    manager: Arc<ConnectionManager>,
    config: Arc<ResolvedConfig>,
    queue: mpsc::Receiver<QueueItem>,
    shutdown: CancellationToken,
}

impl CommandProcessor {
    pub(crate) fn new(
        manager: Arc<ConnectionManager>,
        config: Arc<ResolvedConfig>,
        queue: mpsc::Receiver<QueueItem>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            manager,
            config,
            queue,
            shutdown,
        }
    }

    /// Run until a terminate sentinel, cancellation, or every sender is gone.
    pub async fn run(mut self) {
        info!(remote = %self.config.remote_ip, "command processor started");
        if let Err(err) = self.manager.connect().await {
            debug!(error = %err, "initial connect failed, retrying on first request");
        }

        loop {
            let polled = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                polled = tokio::time::timeout(self.config.queue_poll, self.queue.recv()) => polled,
            };
            let request = match polled {
                Err(_) => continue,
                Ok(None) => break,
                Ok(Some(QueueItem::Terminate)) => {
                    debug!("terminate received");
                    break;
                }
                Ok(Some(QueueItem::Request(request))) => request,
            };
            self.process(request).await;
        }

        self.queue.close();
        while let Ok(item) = self.queue.try_recv() {
            if let QueueItem::Request(request) = item {
                request.respond(Response::error(DeviceError::Stopped));
            }
        }
        self.manager.disconnect().await;
        info!(remote = %self.config.remote_ip, "command processor stopped");
    }

    async fn process(&self, request: Request) {
        let started = Instant::now();
        let mut links = self.manager.lock().await;

        let response = if links.connect().await.is_err() {
            Response::no_connection()
        } else {
            let generation = links.generation();
            match self.execute(&mut links, &request).await {
                Ok(response) => response.on_link(generation),
                Err(err) => {
                    if err.kind() == ErrorKind::Communication {
                        error!(channel = request.name(), error = %err, "request failed, dropping connection");
                        links.record_comm_error(&err.to_string());
                        links.disconnect().await;
                    } else {
                        warn!(channel = request.name(), error = %err, "request failed");
                    }
                    Response::error(err).on_link(generation)
                }
            }
        };
        drop(links);

        debug!(
            channel = request.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request processed"
        );
        request.respond(response);
    }

    async fn execute(&self, links: &mut Links, request: &Request) -> Result<Response> {
        match request.kind {
            RequestKind::Command => {
                let conn = links
                    .command()
                    .ok_or_else(|| DeviceError::Failed("No connection to device".into()))?;
                debug!(command = %request.payload, "sending command");
                let mut line = String::with_capacity(request.payload.len() + 1);
                line.push_str(&request.payload);
                line.push('\r');
                conn.write_all(line.as_bytes()).await?;

                let reply = conn.read_line(self.config.reply_timeout).await?;
                let reply = reply.trim_end();
                debug!(reply, "received reply");
                Ok(Response::new(reply))
            }
            RequestKind::RawSerial => {
                let bytes = percent::decode(&request.payload)?;
                let conn = match request.target {
                    Target::Serial(port) => links
                        .serial(port)
                        .ok_or(DeviceError::UnsupportedPort(port))?,
                    Target::Command => links
                        .command()
                        .ok_or_else(|| DeviceError::Failed("No connection to device".into()))?,
                };
                debug!(channel = request.name(), len = bytes.len(), "writing serial payload");
                conn.write_all(&bytes).await?;
                Ok(Response::success())
            }
        }
    }
}

impl std::fmt::Debug for CommandProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProcessor")
            .field("remote", &self.config.remote_ip)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::task::JoinHandle;

    use super::*;
    use crate::config::GatewayConfig;
    use crate::model::{DeviceModel, SerialPort};
    use crate::status::testing::{Event, RecordingSink};
    use crate::status::{StatusDetail, StatusTracker};

    struct Harness {
        sink: Arc<RecordingSink>,
        queue: mpsc::Sender<QueueItem>,
        task: JoinHandle<()>,
    }

    fn start(config: GatewayConfig) -> Harness {
        let resolved = Arc::new(config.resolve().unwrap());
        let sink = Arc::new(RecordingSink::default());
        let (fault_tx, _fault_rx) = mpsc::unbounded_channel();
        let manager = Arc::new(ConnectionManager::new(
            resolved.clone(),
            StatusTracker::new(sink.clone()),
            fault_tx,
        ));
        let (tx, rx) = mpsc::channel(resolved.queue_capacity);
        let processor = CommandProcessor::new(manager, resolved, rx, CancellationToken::new());
        Harness {
            sink,
            queue: tx,
            task: tokio::spawn(processor.run()),
        }
    }

    async fn ask(
        queue: &mpsc::Sender<QueueItem>,
        (request, reply): (Request, oneshot::Receiver<Response>),
    ) -> Response {
        queue.send(QueueItem::Request(request)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), reply)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn command_round_trip_trims_the_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut read = BufReader::new(read);
            let mut line = Vec::new();
            read.read_until(b'\r', &mut line).await.unwrap();
            assert_eq!(line, b"getversion\r");
            write.write_all(b"710-1005-05 \r\n").await.unwrap();
            let mut rest = Vec::new();
            let _ = read.read_to_end(&mut rest).await;
        });

        let h = start(GatewayConfig {
            command_port: port,
            ..GatewayConfig::new("127.0.0.1")
        });
        let response = ask(&h.queue, Request::command("getversion")).await;
        assert_eq!(response.text(), "710-1005-05");
        assert_eq!(response.generation(), Some(1));

        h.queue.send(QueueItem::Terminate).await.unwrap();
        h.task.await.unwrap();
        assert_eq!(h.sink.events(), vec![Event::Online, Event::Offline]);
    }

    #[tokio::test]
    async fn unreachable_device_gets_no_connection_response() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let h = start(GatewayConfig {
            command_port: port,
            ..GatewayConfig::new("127.0.0.1")
        });

        let response = ask(&h.queue, Request::command("getversion")).await;
        assert_eq!(response, Response::no_connection());
        assert_eq!(
            h.sink.events(),
            vec![Event::OfflineWithError(StatusDetail::CommunicationError)]
        );

        drop(h.queue);
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn serial_send_writes_decoded_bytes() {
        let command = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let serial = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let h = start(GatewayConfig {
            model: DeviceModel::ItachSl,
            command_port: command.local_addr().unwrap().port(),
            serial1_port: serial.local_addr().unwrap().port(),
            ..GatewayConfig::new("127.0.0.1")
        });
        let (_cmd, _) = command.accept().await.unwrap();
        let (mut device, _) = serial.accept().await.unwrap();

        let response = ask(&h.queue, Request::raw_serial(SerialPort::Serial1, "PWR+ON%0D")).await;
        assert_eq!(response.text(), Response::SUCCESS_MARKER);
        let mut buf = [0u8; 7];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"PWR ON\r");

        // malformed payload fails the request but keeps the link
        let response = ask(&h.queue, Request::raw_serial(SerialPort::Serial1, "%Z1")).await;
        assert!(response.is_error());
        let response = ask(&h.queue, Request::raw_serial(SerialPort::Serial2, "X")).await;
        assert!(response.is_error());
        assert_eq!(h.sink.events(), vec![Event::Online]);

        h.queue.send(QueueItem::Terminate).await.unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn queued_requests_after_shutdown_are_answered() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let h = start(GatewayConfig {
            command_port: port,
            ..GatewayConfig::new("127.0.0.1")
        });

        // both land before the processor task first runs
        h.queue.try_send(QueueItem::Terminate).unwrap();
        let (request, reply) = Request::command("getversion");
        h.queue.try_send(QueueItem::Request(request)).unwrap();

        h.task.await.unwrap();
        let response = reply.await.unwrap();
        assert!(response.is_error());
        assert!(response.text().contains("shut down"));
    }
}
