//! Gateway configuration.
//!
//! [`GatewayConfig`] is the loosely-typed form read from JSON or built by a
//! host. [`GatewayConfig::resolve`] validates it once and produces a
//! [`ResolvedConfig`] that the rest of the engine works from.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use irgate_frame::Delimiter;
use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, Result};
use crate::model::{ActiveCable, Capabilities, DeviceModel, SerialPort};

pub const DEFAULT_COMMAND_PORT: u16 = 4998;
pub const DEFAULT_SERIAL1_PORT: u16 = 4999;
pub const DEFAULT_SERIAL2_PORT: u16 = 5000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1500;
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_HEARTBEAT_INITIAL_DELAY_MS: u64 = 15_000;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_QUEUE_POLL_MS: u64 = 2000;

/// Per-port serial settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialPortConfig {
    /// Start a reader for unsolicited data on this port.
    pub enable_two_way: bool,
    /// Percent-encoded end-of-message delimiter, e.g. `%0D`.
    pub end_of_message_delimiter: String,
}

/// Gateway settings as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub ip: Option<String>,
    /// Local source address; unset or unspecified lets the OS choose.
    pub interface: Option<String>,
    pub model: DeviceModel,
    pub active_cable: ActiveCable,
    pub command_port: u16,
    pub serial1_port: u16,
    pub serial2_port: u16,
    pub connect_timeout_ms: u64,
    pub reply_timeout_ms: u64,
    pub heartbeat_initial_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub queue_capacity: usize,
    pub queue_poll_ms: u64,
    pub serial1: SerialPortConfig,
    pub serial2: SerialPortConfig,
    pub map_file: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            ip: None,
            interface: None,
            model: DeviceModel::default(),
            active_cable: ActiveCable::default(),
            command_port: DEFAULT_COMMAND_PORT,
            serial1_port: DEFAULT_SERIAL1_PORT,
            serial2_port: DEFAULT_SERIAL2_PORT,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            heartbeat_initial_delay_ms: DEFAULT_HEARTBEAT_INITIAL_DELAY_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_poll_ms: DEFAULT_QUEUE_POLL_MS,
            serial1: SerialPortConfig::default(),
            serial2: SerialPortConfig::default(),
            map_file: None,
        }
    }
}

impl GatewayConfig {
    /// Config for a gateway at `ip`, everything else default.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: Some(ip.into()),
            ..Self::default()
        }
    }

    /// Read a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            DeviceError::Configuration(format!("failed to read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|err| {
            DeviceError::Configuration(format!("invalid config {}: {err}", path.display()))
        })
    }

    /// Settings for one serial port.
    pub fn serial(&self, port: SerialPort) -> &SerialPortConfig {
        match port {
            SerialPort::Serial1 => &self.serial1,
            SerialPort::Serial2 => &self.serial2,
        }
    }

    /// Validate and resolve everything the engine needs.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let ip = self
            .ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| DeviceError::Configuration("IP address not set".into()))?;
        let remote_ip: IpAddr = ip
            .parse()
            .map_err(|_| DeviceError::Configuration(format!("invalid IP address '{ip}'")))?;

        let local_ip = match self.interface.as_deref().map(str::trim) {
            None | Some("") => unspecified_for(remote_ip),
            Some(interface) => interface.parse().map_err(|_| {
                DeviceError::Configuration(format!(
                    "No suitable network interface '{interface}'"
                ))
            })?,
        };

        if self.queue_capacity == 0 {
            return Err(DeviceError::Configuration(
                "queue capacity must be at least 1".into(),
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(DeviceError::Configuration(
                "heartbeat interval must be non-zero".into(),
            ));
        }

        let capabilities = Capabilities::new(self.model, self.active_cable);
        let mut readers = [None, None];
        for port in capabilities.serial_ports() {
            readers[port.index()] = self.reader_config(port)?;
        }

        Ok(ResolvedConfig {
            remote_ip,
            local_ip,
            capabilities,
            command_port: self.command_port,
            serial_ports: [self.serial1_port, self.serial2_port],
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            reply_timeout: Duration::from_millis(self.reply_timeout_ms),
            heartbeat: HeartbeatSchedule {
                initial_delay: Duration::from_millis(self.heartbeat_initial_delay_ms),
                interval: Duration::from_millis(self.heartbeat_interval_ms),
            },
            queue_capacity: self.queue_capacity,
            queue_poll: Duration::from_millis(self.queue_poll_ms),
            readers,
        })
    }

    fn reader_config(&self, port: SerialPort) -> Result<Option<ReaderConfig>> {
        let serial = self.serial(port);
        if !serial.enable_two_way {
            return Ok(None);
        }
        let delimiter = Delimiter::decode(&serial.end_of_message_delimiter).map_err(|err| {
            DeviceError::Configuration(format!("{port} end-of-message delimiter: {err}"))
        })?;
        Ok(Some(ReaderConfig { port, delimiter }))
    }
}

fn unspecified_for(remote: IpAddr) -> IpAddr {
    match remote {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

/// When the heartbeat first fires and how often it repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSchedule {
    pub initial_delay: Duration,
    pub interval: Duration,
}

/// A serial port that gets a reader, and the delimiter its frames end with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    pub port: SerialPort,
    pub delimiter: Delimiter,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub remote_ip: IpAddr,
    pub local_ip: IpAddr,
    pub capabilities: Capabilities,
    pub command_port: u16,
    pub serial_ports: [u16; 2],
    pub connect_timeout: Duration,
    pub reply_timeout: Duration,
    pub heartbeat: HeartbeatSchedule,
    pub queue_capacity: usize,
    pub queue_poll: Duration,
    /// One entry per serial port; `Some` only for supported, two-way ports.
    pub readers: [Option<ReaderConfig>; 2],
}

impl ResolvedConfig {
    pub fn command_addr(&self) -> SocketAddr {
        SocketAddr::new(self.remote_ip, self.command_port)
    }

    pub fn serial_addr(&self, port: SerialPort) -> SocketAddr {
        SocketAddr::new(self.remote_ip, self.serial_ports[port.index()])
    }

    pub fn reader(&self, port: SerialPort) -> Option<&ReaderConfig> {
        self.readers[port.index()].as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_error(config: &GatewayConfig) -> String {
        match config.resolve() {
            Err(DeviceError::Configuration(message)) => message,
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_match_the_device() {
        let resolved = GatewayConfig::new("192.168.1.70").resolve().unwrap();
        assert_eq!(resolved.command_addr().port(), 4998);
        assert_eq!(resolved.serial_addr(SerialPort::Serial1).port(), 4999);
        assert_eq!(resolved.serial_addr(SerialPort::Serial2).port(), 5000);
        assert_eq!(resolved.connect_timeout, Duration::from_millis(1500));
        assert_eq!(resolved.heartbeat.initial_delay, Duration::from_secs(15));
        assert_eq!(resolved.heartbeat.interval, Duration::from_secs(60));
        assert_eq!(resolved.queue_capacity, 10);
        assert_eq!(resolved.queue_poll, Duration::from_secs(2));
        assert_eq!(resolved.local_ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert!(resolved.readers.iter().all(Option::is_none));
    }

    #[test]
    fn missing_ip_is_a_configuration_error() {
        assert_eq!(config_error(&GatewayConfig::default()), "IP address not set");
        assert_eq!(config_error(&GatewayConfig::new("  ")), "IP address not set");
        assert!(config_error(&GatewayConfig::new("gateway.local")).contains("invalid IP"));
    }

    #[test]
    fn bad_interface_is_a_configuration_error() {
        let config = GatewayConfig {
            interface: Some("eth0".into()),
            ..GatewayConfig::new("10.0.0.5")
        };
        assert!(config_error(&config).contains("No suitable network interface"));
    }

    #[test]
    fn readers_only_for_supported_two_way_ports() {
        let two_way = SerialPortConfig {
            enable_two_way: true,
            end_of_message_delimiter: "%0D".into(),
        };
        let config = GatewayConfig {
            model: DeviceModel::Gc100_06,
            serial1: two_way.clone(),
            serial2: two_way,
            ..GatewayConfig::new("10.0.0.5")
        };
        let resolved = config.resolve().unwrap();
        let reader = resolved.reader(SerialPort::Serial1).unwrap();
        assert_eq!(reader.delimiter.as_bytes(), b"\r");
        assert!(resolved.reader(SerialPort::Serial2).is_none());
    }

    #[test]
    fn two_way_without_delimiter_is_rejected() {
        let config = GatewayConfig {
            model: DeviceModel::ItachSl,
            serial1: SerialPortConfig {
                enable_two_way: true,
                end_of_message_delimiter: String::new(),
            },
            ..GatewayConfig::new("10.0.0.5")
        };
        assert!(config_error(&config).contains("serial-1"));

        let config = GatewayConfig {
            model: DeviceModel::ItachSl,
            serial1: SerialPortConfig {
                enable_two_way: true,
                end_of_message_delimiter: "%G1".into(),
            },
            ..GatewayConfig::new("10.0.0.5")
        };
        assert!(config_error(&config).contains("delimiter"));
    }

    #[test]
    fn zero_queue_or_interval_is_rejected() {
        let config = GatewayConfig {
            queue_capacity: 0,
            ..GatewayConfig::new("10.0.0.5")
        };
        assert!(config_error(&config).contains("queue"));

        let config = GatewayConfig {
            heartbeat_interval_ms: 0,
            ..GatewayConfig::new("10.0.0.5")
        };
        assert!(config_error(&config).contains("heartbeat"));
    }

    #[test]
    fn parses_json_with_defaults() {
        let config: GatewayConfig = serde_json::from_str(
            r#"{
                "ip": "10.0.0.5",
                "model": "gc-100-12",
                "serial2": { "enable_two_way": true, "end_of_message_delimiter": "%0D%0A" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.model, DeviceModel::Gc100_12);
        assert_eq!(config.command_port, DEFAULT_COMMAND_PORT);
        assert!(config.serial2.enable_two_way);
        assert!(!config.serial1.enable_two_way);

        let resolved = config.resolve().unwrap();
        assert_eq!(
            resolved.reader(SerialPort::Serial2).unwrap().delimiter.as_bytes(),
            b"\r\n"
        );
    }

    #[test]
    fn ipv6_gateway_gets_ipv6_unspecified_source() {
        let resolved = GatewayConfig::new("fe80::1").resolve().unwrap();
        assert_eq!(resolved.local_ip, IpAddr::V6(Ipv6Addr::UNSPECIFIED));
    }
}
