//! Group lifecycle of the command and serial channels.

use std::sync::Arc;

use irgate_transport::DeviceConnection;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::error::Result;
use crate::model::{SerialPort, Target};
use crate::reader::{SerialFault, SerialPortReader};
use crate::status::{StatusDetail, StatusTracker};

/// Link state as seen from outside the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// The channels of one device, and the readers attached to them.
///
/// Only reachable through [`ConnectionManager::lock`], so at most one
/// connect or teardown runs at a time. Connection handles are handed out
/// per call and only while connected.
#[derive(Debug)]
pub struct Links {
    config: Arc<ResolvedConfig>,
    status: StatusTracker,
    faults: mpsc::UnboundedSender<SerialFault>,
    state: ConnectionState,
    generation: u64,
    command: DeviceConnection,
    serial: [DeviceConnection; 2],
    readers: Vec<SerialPortReader>,
}

impl Links {
    fn new(
        config: Arc<ResolvedConfig>,
        status: StatusTracker,
        faults: mpsc::UnboundedSender<SerialFault>,
    ) -> Self {
        let channel = |target: Target, addr| {
            DeviceConnection::new(target.name(), addr, config.local_ip)
                .with_connect_timeout(config.connect_timeout)
        };
        let command = channel(Target::Command, config.command_addr());
        let serial = SerialPort::ALL
            .map(|port| channel(Target::Serial(port), config.serial_addr(port)));

        Self {
            config,
            status,
            faults,
            state: ConnectionState::Disconnected,
            generation: 0,
            command,
            serial,
            readers: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Bumped on every successful connect.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Open every channel the device has, or none of them.
    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.state = ConnectionState::Connecting;
        debug!(remote = %self.config.remote_ip, "connecting");

        if let Err(err) = self.command.open().await {
            self.state = ConnectionState::Disconnected;
            let detail = if err.is_bind_failure() {
                StatusDetail::ConfigurationError
            } else {
                StatusDetail::CommunicationError
            };
            self.status.mark_offline_with_error(detail, &err.to_string());
            return Err(err.into());
        }

        let capabilities = self.config.capabilities;
        for port in capabilities.serial_ports() {
            if let Err(err) = self.serial[port.index()].open().await {
                self.close_all().await;
                self.state = ConnectionState::Disconnected;
                self.status.mark_offline_with_error(
                    StatusDetail::CommunicationError,
                    &format!("{port}: {err}"),
                );
                return Err(err.into());
            }
        }

        self.generation = self.generation.wrapping_add(1);
        self.state = ConnectionState::Connected;
        info!(remote = %self.config.remote_ip, generation = self.generation, "connected to device");
        self.status.mark_online();
        self.start_readers();
        Ok(())
    }

    /// Stop readers, close every channel and report the device offline.
    pub async fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        for reader in &mut self.readers {
            reader.stop().await;
        }
        self.readers.clear();
        self.close_all().await;
        self.state = ConnectionState::Disconnected;
        info!(remote = %self.config.remote_ip, "disconnected from device");
        self.status.mark_offline();
    }

    /// Report a communication failure without touching the sockets.
    pub fn record_comm_error(&self, message: &str) {
        self.status
            .mark_offline_with_error(StatusDetail::CommunicationError, message);
    }

    /// A successful round trip proves the link is up.
    pub fn confirm_alive(&self) {
        if self.is_connected() {
            self.status.mark_online();
        }
    }

    /// The command channel, if connected.
    pub fn command(&mut self) -> Option<&mut DeviceConnection> {
        if self.is_connected() {
            Some(&mut self.command)
        } else {
            None
        }
    }

    /// A serial channel, if connected and present on this device.
    pub fn serial(&mut self, port: SerialPort) -> Option<&mut DeviceConnection> {
        if self.is_connected() && self.config.capabilities.supports(port) {
            Some(&mut self.serial[port.index()])
        } else {
            None
        }
    }

    /// Tear down after a reader failure on the current connection.
    pub async fn handle_fault(&mut self, fault: SerialFault) {
        if !self.is_connected() || fault.generation != self.generation {
            debug!(port = %fault.port, generation = fault.generation, "ignoring stale reader fault");
            return;
        }
        self.record_comm_error(&format!("{}: {}", fault.port, fault.error));
        self.disconnect().await;
    }

    fn start_readers(&mut self) {
        for port in self.config.capabilities.serial_ports() {
            let Some(reader_config) = self.config.reader(port) else {
                continue;
            };
            let Some(input) = self.serial[port.index()].take_reader() else {
                continue;
            };
            self.readers.push(SerialPortReader::spawn(
                port,
                input,
                reader_config.delimiter.clone(),
                self.status.clone(),
                self.faults.clone(),
                self.generation,
            ));
        }
    }

    async fn close_all(&mut self) {
        self.command.close().await;
        for conn in &mut self.serial {
            conn.close().await;
        }
    }
}

/// Owns the device's channels and serializes every state change.
#[derive(Debug)]
pub struct ConnectionManager {
    links: Mutex<Links>,
}

impl ConnectionManager {
    pub fn new(
        config: Arc<ResolvedConfig>,
        status: StatusTracker,
        faults: mpsc::UnboundedSender<SerialFault>,
    ) -> Self {
        Self {
            links: Mutex::new(Links::new(config, status, faults)),
        }
    }

    /// Exclusive access for a whole transaction.
    pub async fn lock(&self) -> MutexGuard<'_, Links> {
        self.links.lock().await
    }

    pub async fn connect(&self) -> Result<()> {
        self.lock().await.connect().await
    }

    pub async fn disconnect(&self) {
        self.lock().await.disconnect().await;
    }

    pub async fn is_connected(&self) -> bool {
        self.lock().await.is_connected()
    }

    pub async fn state(&self) -> ConnectionState {
        self.lock().await.state()
    }

    pub async fn confirm_alive(&self) {
        self.lock().await.confirm_alive();
    }

    pub async fn handle_fault(&self, fault: SerialFault) {
        self.lock().await.handle_fault(fault).await;
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use irgate_frame::FrameError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::config::{GatewayConfig, SerialPortConfig};
    use crate::error::DeviceError;
    use crate::model::DeviceModel;
    use crate::status::testing::{Event, RecordingSink};

    async fn listen() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    async fn closed_port() -> u16 {
        let (listener, port) = listen().await;
        drop(listener);
        port
    }

    struct Fixture {
        sink: Arc<RecordingSink>,
        links: Links,
        faults: mpsc::UnboundedReceiver<SerialFault>,
    }

    fn fixture(config: GatewayConfig) -> Fixture {
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let resolved = Arc::new(config.resolve().unwrap());
        Fixture {
            links: Links::new(resolved, StatusTracker::new(sink.clone()), tx),
            sink,
            faults: rx,
        }
    }

    fn config(model: DeviceModel, command: u16, serial1: u16) -> GatewayConfig {
        GatewayConfig {
            model,
            command_port: command,
            serial1_port: serial1,
            ..GatewayConfig::new("127.0.0.1")
        }
    }

    #[tokio::test]
    async fn connect_and_disconnect_are_idempotent() {
        let (command, command_port) = listen().await;
        let mut fx = fixture(config(DeviceModel::Itach, command_port, 1));

        fx.links.connect().await.unwrap();
        fx.links.connect().await.unwrap();
        let (_server, _) = command.accept().await.unwrap();
        assert!(fx.links.is_connected());
        assert_eq!(fx.links.generation(), 1);

        // a second accept would only succeed if connect opened another socket
        let second = tokio::time::timeout(Duration::from_millis(100), command.accept()).await;
        assert!(second.is_err());

        fx.links.disconnect().await;
        fx.links.disconnect().await;
        assert_eq!(fx.links.state(), ConnectionState::Disconnected);
        assert!(fx.links.command().is_none());
        assert_eq!(fx.sink.events(), vec![Event::Online, Event::Offline]);
    }

    #[tokio::test]
    async fn serial_failure_rolls_back_the_command_channel() {
        let (command, command_port) = listen().await;
        let mut fx = fixture(config(DeviceModel::ItachSl, command_port, closed_port().await));

        let err = fx.links.connect().await.unwrap_err();
        assert!(matches!(err, DeviceError::Transport(_)));
        assert_eq!(fx.links.state(), ConnectionState::Disconnected);

        let (mut server, _) = command.accept().await.unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
        assert_eq!(
            fx.sink.events(),
            vec![Event::OfflineWithError(StatusDetail::CommunicationError)]
        );
    }

    #[tokio::test]
    async fn refused_command_channel_is_a_communication_error() {
        let mut fx = fixture(config(DeviceModel::Itach, closed_port().await, 1));
        assert!(fx.links.connect().await.is_err());
        assert_eq!(
            fx.sink.events(),
            vec![Event::OfflineWithError(StatusDetail::CommunicationError)]
        );
    }

    #[tokio::test]
    async fn unusable_interface_is_a_configuration_error() {
        let mut fx = fixture(GatewayConfig {
            interface: Some("192.0.2.1".into()),
            ..config(DeviceModel::Itach, 4998, 1)
        });
        assert!(fx.links.connect().await.is_err());
        assert_eq!(
            fx.sink.events(),
            vec![Event::OfflineWithError(StatusDetail::ConfigurationError)]
        );
    }

    #[tokio::test]
    async fn two_way_port_gets_a_reader() {
        let (command, command_port) = listen().await;
        let (serial, serial_port) = listen().await;
        let mut fx = fixture(GatewayConfig {
            serial1: SerialPortConfig {
                enable_two_way: true,
                end_of_message_delimiter: "%0D".into(),
            },
            ..config(DeviceModel::ItachSl, command_port, serial_port)
        });

        fx.links.connect().await.unwrap();
        let (_cmd, _) = command.accept().await.unwrap();
        let (mut device, _) = serial.accept().await.unwrap();
        assert_eq!(fx.links.readers.len(), 1);
        assert!(fx.links.serial(SerialPort::Serial1).is_some());
        assert!(fx.links.serial(SerialPort::Serial2).is_none());

        device.write_all(b"PWR1\r").await.unwrap();
        for _ in 0..200 {
            if fx.sink.events().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            fx.sink.events(),
            vec![
                Event::Online,
                Event::Feedback(SerialPort::Serial1, b"PWR1\r".to_vec())
            ]
        );

        // device hangs up the serial port
        drop(device);
        let fault = tokio::time::timeout(Duration::from_secs(2), fx.faults.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fault.generation, fx.links.generation());
        fx.links.handle_fault(fault).await;
        assert!(!fx.links.is_connected());
        assert_eq!(
            fx.sink.events().last(),
            Some(&Event::OfflineWithError(StatusDetail::CommunicationError))
        );
    }

    #[tokio::test]
    async fn stale_faults_are_ignored() {
        let (command, command_port) = listen().await;
        let mut fx = fixture(config(DeviceModel::Itach, command_port, 1));
        fx.links.connect().await.unwrap();
        let (_server, _) = command.accept().await.unwrap();

        fx.links
            .handle_fault(SerialFault {
                port: SerialPort::Serial1,
                generation: fx.links.generation() + 5,
                error: DeviceError::from(FrameError::UnexpectedEof),
            })
            .await;
        assert!(fx.links.is_connected());
    }

    #[tokio::test]
    async fn manager_serializes_through_the_lock() {
        let (command, command_port) = listen().await;
        let resolved = Arc::new(config(DeviceModel::Itach, command_port, 1).resolve().unwrap());
        let sink = Arc::new(RecordingSink::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(resolved, StatusTracker::new(sink), tx);

        manager.connect().await.unwrap();
        let (_server, peer) = command.accept().await.unwrap();
        assert_eq!(manager.state().await, ConnectionState::Connected);
        {
            let mut links = manager.lock().await;
            let local = links.command().unwrap().local_addr().unwrap();
            assert_eq!(local, peer);
            assert_eq!(local.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
        manager.disconnect().await;
        assert!(!manager.is_connected().await);
    }
}
