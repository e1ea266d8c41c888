//! Heartbeat and serial fault supervision.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::DeviceCommand;
use crate::config::HeartbeatSchedule;
use crate::manager::ConnectionManager;
use crate::message::{QueueItem, Request};
use crate::model::DeviceModel;
use crate::reader::SerialFault;

/// Periodically round-trips a version query through the request queue and
/// tears the link down when a serial reader fails.
pub(crate) struct Monitor {
    manager: Arc<ConnectionManager>,
    queue: mpsc::Sender<QueueItem>,
    faults: mpsc::UnboundedReceiver<SerialFault>,
    schedule: HeartbeatSchedule,
    model: DeviceModel,
    shutdown: CancellationToken,
}

impl Monitor {
    pub(crate) fn new(
        manager: Arc<ConnectionManager>,
        queue: mpsc::Sender<QueueItem>,
        faults: mpsc::UnboundedReceiver<SerialFault>,
        schedule: HeartbeatSchedule,
        model: DeviceModel,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            manager,
            queue,
            faults,
            schedule,
            model,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut ticker = interval_at(
            Instant::now() + self.schedule.initial_delay,
            self.schedule.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(fault) = self.faults.recv() => self.manager.handle_fault(fault).await,
                _ = ticker.tick() => self.heartbeat().await,
            }
        }
        debug!("monitor stopped");
    }

    async fn heartbeat(&self) {
        let (request, reply) = Request::command(DeviceCommand::GetVersion.to_wire(self.model));

        let sent = tokio::select! {
            _ = self.shutdown.cancelled() => return,
            sent = self.queue.send(QueueItem::Request(request)) => sent,
        };
        if sent.is_err() {
            return;
        }
        let response = tokio::select! {
            _ = self.shutdown.cancelled() => return,
            response = reply => response,
        };
        let Ok(response) = response else {
            return;
        };

        if response.is_successful() {
            debug!(version = response.text(), "heartbeat ok");
            self.manager.confirm_alive().await;
            return;
        }

        warn!(reply = %response, "heartbeat failed");
        let mut links = self.manager.lock().await;
        // The processor already tore down a link that failed mid-transaction,
        // and a later request may have reconnected since.
        let current = links.is_connected() && response.generation() == Some(links.generation());
        if !current {
            debug!(generation = ?response.generation(), "heartbeat failure belongs to a closed link");
            return;
        }
        links.record_comm_error(&format!("heartbeat failed: {response}"));
        links.disconnect().await;
    }
}
