//! The per-device engine.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use irgate_frame::percent;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::{parse_state, Address, DeviceCommand, RelayState};
use crate::config::{GatewayConfig, ResolvedConfig};
use crate::error::{DeviceError, Result};
use crate::ircode::IrCode;
use crate::lookup::{CodeLookup, MapLookup};
use crate::manager::ConnectionManager;
use crate::message::{QueueItem, Request, Response};
use crate::model::{Capabilities, SerialPort, Target};
use crate::monitor::Monitor;
use crate::processor::CommandProcessor;
use crate::status::{DeviceStatus, LogStatusSink, StatusDetail, StatusSink, StatusTracker};

/// Builds and starts a [`Gateway`].
pub struct GatewayBuilder {
    config: GatewayConfig,
    status: Option<Arc<dyn StatusSink>>,
    lookup: Option<Arc<dyn CodeLookup>>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            status: None,
            lookup: None,
        }
    }

    /// Receive online/offline transitions and serial feedback.
    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status = Some(sink);
        self
    }

    /// Resolve symbolic command names. Takes precedence over `map_file`.
    pub fn with_lookup(mut self, lookup: Arc<dyn CodeLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Validate the configuration and spawn the processor and monitor tasks.
    ///
    /// Must be called inside a tokio runtime. A configuration error is
    /// reported to the status sink once and returned.
    pub fn start(self) -> Result<Gateway> {
        let sink = self.status.unwrap_or_else(|| {
            Arc::new(LogStatusSink::new(self.config.ip.clone().unwrap_or_default()))
        });
        let status = StatusTracker::new(sink);

        let prepared = self.config.resolve().and_then(|resolved| {
            let lookup = match (self.lookup, &self.config.map_file) {
                (Some(lookup), _) => Some(lookup),
                (None, Some(path)) => {
                    let map = MapLookup::load(path)
                        .map_err(|err| DeviceError::Configuration(err.to_string()))?;
                    Some(Arc::new(map) as Arc<dyn CodeLookup>)
                }
                (None, None) => None,
            };
            Ok((Arc::new(resolved), lookup))
        });
        let (config, lookup) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                status.mark_offline_with_error(StatusDetail::ConfigurationError, &err.to_string());
                return Err(err);
            }
        };

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        let manager = Arc::new(ConnectionManager::new(config.clone(), status.clone(), fault_tx));
        let shutdown = CancellationToken::new();
        let heartbeat = CancellationToken::new();

        let processor = CommandProcessor::new(
            manager.clone(),
            config.clone(),
            queue_rx,
            shutdown.clone(),
        );
        let monitor = Monitor::new(
            manager.clone(),
            queue_tx.clone(),
            fault_rx,
            config.heartbeat,
            config.capabilities.model(),
            heartbeat.clone(),
        );

        info!(remote = %config.remote_ip, model = ?config.capabilities.model(), "starting gateway");
        let tasks = Tasks {
            processor: tokio::spawn(processor.run()),
            monitor: tokio::spawn(monitor.run()),
        };

        Ok(Gateway {
            config,
            status,
            manager,
            queue: queue_tx,
            lookup,
            transaction_id: AtomicU32::new(1),
            shutdown,
            heartbeat,
            tasks: Mutex::new(Some(tasks)),
        })
    }
}

struct Tasks {
    processor: JoinHandle<()>,
    monitor: JoinHandle<()>,
}

/// One running device.
///
/// Every operation goes through the bounded request queue and is executed in
/// submission order by a single processor task.
pub struct Gateway {
    config: Arc<ResolvedConfig>,
    status: StatusTracker,
    manager: Arc<ConnectionManager>,
    queue: mpsc::Sender<QueueItem>,
    lookup: Option<Arc<dyn CodeLookup>>,
    transaction_id: AtomicU32,
    shutdown: CancellationToken,
    heartbeat: CancellationToken,
    tasks: Mutex<Option<Tasks>>,
}

impl Gateway {
    /// Start a gateway with default collaborators.
    pub fn start(config: GatewayConfig) -> Result<Self> {
        GatewayBuilder::new(config).start()
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.config.capabilities
    }

    /// Last status reported to the sink.
    pub fn status(&self) -> DeviceStatus {
        self.status.status()
    }

    pub async fn is_connected(&self) -> bool {
        self.manager.is_connected().await
    }

    /// Enqueue a request, waiting for room if the queue is full.
    pub async fn submit(&self, request: Request) -> Result<()> {
        self.queue
            .send(QueueItem::Request(request))
            .await
            .map_err(|_| DeviceError::Stopped)
    }

    /// Enqueue a request, failing with [`DeviceError::QueueFull`] if there is no room.
    pub fn try_submit(&self, request: Request) -> Result<()> {
        self.queue
            .try_send(QueueItem::Request(request))
            .map_err(|err| match err {
                TrySendError::Full(_) => DeviceError::QueueFull(self.config.queue_capacity),
                TrySendError::Closed(_) => DeviceError::Stopped,
            })
    }

    /// Submit a request for `target` and wait for its response.
    ///
    /// Command-channel payloads are sent as text; serial payloads are
    /// percent-decoded first.
    pub async fn execute(&self, target: Target, payload: impl Into<String>) -> Result<Response> {
        let (request, reply) = match target {
            Target::Command => Request::command(payload),
            Target::Serial(port) => Request::raw_serial(port, payload),
        };
        self.submit(request).await?;
        reply.await.map_err(|_| DeviceError::Stopped)
    }

    /// Send raw command text and return the device's reply.
    pub async fn command(&self, text: impl Into<String>) -> Result<String> {
        let response = self.execute(Target::Command, text).await?;
        into_reply(response)
    }

    /// Query the device version.
    pub async fn get_version(&self) -> Result<String> {
        self.transact(DeviceCommand::GetVersion).await
    }

    /// Look up `key` and send the IR code it maps to.
    pub async fn send_ir(&self, address: Address, key: &str) -> Result<()> {
        let code = IrCode::classify(self.lookup(key)?);
        self.send_ir_code(address, &code).await
    }

    /// Send an IR code, converting hex notation first.
    pub async fn send_ir_code(&self, address: Address, code: &IrCode) -> Result<()> {
        let native = code.to_native()?;
        let id = self.next_transaction_id();
        debug!(%address, id, hex = matches!(code, IrCode::Hex(_)), "sending IR");
        self.transact(DeviceCommand::SendIr {
            address,
            id,
            code: native.into_owned(),
        })
        .await
        .map(drop)
    }

    /// Look up `key` and send what it maps to on a serial port.
    pub async fn send_serial(&self, port: SerialPort, key: &str) -> Result<()> {
        let payload = self.lookup(key)?;
        self.send_serial_direct(port, &payload).await
    }

    /// Send a percent-encoded payload on a serial port.
    pub async fn send_serial_direct(&self, port: SerialPort, payload: &str) -> Result<()> {
        if !self.config.capabilities.supports(port) {
            return Err(DeviceError::UnsupportedPort(port));
        }
        percent::decode(payload)?;
        let response = self.execute(Target::Serial(port), payload).await?;
        into_reply(response).map(drop)
    }

    /// Open or close a relay.
    pub async fn set_relay(&self, address: Address, state: RelayState) -> Result<()> {
        self.transact(DeviceCommand::SetState { address, state })
            .await
            .map(drop)
    }

    /// Query a relay.
    pub async fn relay_state(&self, address: Address) -> Result<RelayState> {
        let reply = self.transact(DeviceCommand::GetState { address }).await?;
        parse_state(&reply)
    }

    /// Next IR transaction id. Starts at 1 and wraps on overflow.
    pub fn next_transaction_id(&self) -> u32 {
        self.transaction_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Stop the heartbeat, let the processor finish what is queued ahead of
    /// the terminate sentinel, then close every channel. Safe to call
    /// repeatedly.
    pub async fn shutdown(&self) {
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(tasks) = tasks else {
            return;
        };
        info!(remote = %self.config.remote_ip, "shutting down gateway");

        self.heartbeat.cancel();
        if let Err(err) = tasks.monitor.await {
            warn!(error = %err, "monitor task failed");
        }

        let wait = self.config.queue_poll.max(Duration::from_millis(100));
        let queued = tokio::time::timeout(wait, self.queue.send(QueueItem::Terminate)).await;
        if !matches!(queued, Ok(Ok(()))) {
            debug!("queue busy, cancelling processor");
            self.shutdown.cancel();
        }
        if let Err(err) = tasks.processor.await {
            warn!(error = %err, "processor task failed");
        }
        self.shutdown.cancel();
    }

    async fn transact(&self, command: DeviceCommand) -> Result<String> {
        let reply = self
            .command(command.to_wire(self.config.capabilities.model()))
            .await?;
        command.check_reply(&reply)?;
        Ok(reply)
    }

    fn lookup(&self, key: &str) -> Result<String> {
        let lookup = self
            .lookup
            .as_ref()
            .ok_or_else(|| DeviceError::Configuration("no code lookup configured".into()))?;
        Ok(lookup.lookup(key)?)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.heartbeat.cancel();
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("remote", &self.config.remote_ip)
            .field("model", &self.config.capabilities.model())
            .field("status", &self.status.status())
            .finish()
    }
}

fn into_reply(response: Response) -> Result<String> {
    if let Some(message) = response.text().strip_prefix(Response::ERROR_PREFIX) {
        return Err(DeviceError::Failed(message.trim_start().to_string()));
    }
    Ok(response.into_text())
}
