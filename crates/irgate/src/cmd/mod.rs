use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use irgate_device::{Address, DeviceModel, Gateway, GatewayConfig, SerialPort};

use crate::exit::{device_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod ir;
pub mod listen;
pub mod relay;
pub mod send;
pub mod serial;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Query the gateway's version.
    Info(InfoArgs),
    /// Send a raw command-channel line and print the reply.
    Send(SendArgs),
    /// Transmit an IR code.
    Ir(IrArgs),
    /// Write a payload to a serial port.
    Serial(SerialArgs),
    /// Set or query a relay.
    Relay(RelayArgs),
    /// Print frames arriving on a serial port until interrupted.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, config: Option<&Path>, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, config, format).await,
        Command::Send(args) => send::run(args, config, format).await,
        Command::Ir(args) => ir::run(args, config, format).await,
        Command::Serial(args) => serial::run(args, config, format).await,
        Command::Relay(args) => relay::run(args, config, format).await,
        Command::Listen(args) => listen::run(args, config, format).await,
        Command::Version(args) => version::run(args),
    }
}

/// Connection settings shared by every gateway subcommand.
#[derive(Args, Debug, Clone)]
pub struct GatewayArgs {
    /// Gateway IP address.
    pub ip: String,
    /// Local interface address to connect from.
    #[arg(long, value_name = "ADDR")]
    pub interface: Option<String>,
    /// Device model (itach, itach-cc, itach-sl, itach-flex, gc-100-06, gc-100-12).
    #[arg(long, value_parser = parse_model)]
    pub model: Option<DeviceModel>,
    /// How long to wait for a reply (e.g. 5s, 500ms). Defaults to 5s.
    #[arg(long)]
    pub timeout: Option<String>,
}

impl GatewayArgs {
    /// Layer these flags over the config file, if any.
    pub fn config(&self, file: Option<&Path>) -> CliResult<GatewayConfig> {
        let mut config = match file {
            Some(path) => GatewayConfig::from_json_file(path)
                .map_err(|err| device_error("config load failed", err))?,
            None => GatewayConfig::default(),
        };
        config.ip = Some(self.ip.clone());
        if let Some(interface) = &self.interface {
            config.interface = Some(interface.clone());
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(timeout) = &self.timeout {
            let timeout = parse_duration(timeout)?;
            config.reply_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        }
        Ok(config)
    }

    pub fn start(&self, file: Option<&Path>) -> CliResult<Gateway> {
        Gateway::start(self.config(file)?).map_err(|err| device_error("gateway start failed", err))
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub gateway: GatewayArgs,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub gateway: GatewayArgs,
    /// Command text, without the trailing carriage return.
    pub command: String,
}

#[derive(Args, Debug)]
pub struct IrArgs {
    #[command(flatten)]
    pub gateway: GatewayArgs,
    /// Emitter as MODULE:CONNECTOR.
    #[arg(long, short = 'a')]
    pub address: Address,
    /// IR code in native or hex notation.
    #[arg(long, conflicts_with = "key", required_unless_present = "key")]
    pub code: Option<String>,
    /// Symbolic name to look up in the map file.
    #[arg(long, conflicts_with = "code")]
    pub key: Option<String>,
    /// Map file of NAME=CODE lines.
    #[arg(long, value_name = "FILE")]
    pub map: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SerialArgs {
    #[command(flatten)]
    pub gateway: GatewayArgs,
    /// Serial port number.
    #[arg(long, short = 'p', default_value = "1", value_parser = parse_port)]
    pub port: SerialPort,
    /// Percent-encoded payload, e.g. PWR%0D.
    #[arg(long)]
    pub data: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RelayAction {
    On,
    Off,
    Get,
}

#[derive(Args, Debug)]
pub struct RelayArgs {
    #[command(flatten)]
    pub gateway: GatewayArgs,
    /// Relay as MODULE:CONNECTOR.
    #[arg(long, short = 'a')]
    pub address: Address,
    pub action: RelayAction,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub gateway: GatewayArgs,
    /// Serial port number.
    #[arg(long, short = 'p', default_value = "1", value_parser = parse_port)]
    pub port: SerialPort,
    /// Percent-encoded end-of-message delimiter.
    #[arg(long, default_value = "%0D")]
    pub delimiter: String,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_model(input: &str) -> Result<DeviceModel, String> {
    serde_json::from_value(serde_json::Value::String(input.to_string()))
        .map_err(|_| format!("unknown model '{input}'"))
}

fn parse_port(input: &str) -> Result<SerialPort, String> {
    input
        .parse::<u8>()
        .ok()
        .and_then(SerialPort::from_number)
        .ok_or_else(|| format!("serial port must be 1 or 2, got '{input}'"))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(ip: &str) -> GatewayArgs {
        GatewayArgs {
            ip: ip.to_string(),
            interface: None,
            model: None,
            timeout: None,
        }
    }

    #[test]
    fn flags_override_config_file() {
        let dir = std::env::temp_dir().join(format!("irgate-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.json");
        std::fs::write(
            &path,
            r#"{ "ip": "10.0.0.1", "model": "itach-sl", "command_port": 14998 }"#,
        )
        .unwrap();

        let mut gateway = args("10.0.0.9");
        gateway.timeout = Some("750ms".to_string());
        let config = gateway.config(Some(&path)).unwrap();
        assert_eq!(config.ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(config.model, DeviceModel::ItachSl);
        assert_eq!(config.command_port, 14998);
        assert_eq!(config.reply_timeout_ms, 750);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn config_file_timeout_survives_without_the_flag() {
        let dir = std::env::temp_dir().join(format!("irgate-cli-timeout-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.json");
        std::fs::write(&path, r#"{ "reply_timeout_ms": 1200 }"#).unwrap();

        let config = args("10.0.0.9").config(Some(&path)).unwrap();
        assert_eq!(config.reply_timeout_ms, 1200);
        let config = args("10.0.0.9").config(None).unwrap();
        assert_eq!(config.reply_timeout_ms, irgate_device::config::DEFAULT_REPLY_TIMEOUT_MS);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_config_file_is_a_config_error() {
        let err = args("10.0.0.9")
            .config(Some(Path::new("/nonexistent/irgate.json")))
            .unwrap_err();
        assert_eq!(err.code, crate::exit::CONFIG);
    }

    #[test]
    fn parses_models_and_ports() {
        assert_eq!(parse_model("gc-100-12").unwrap(), DeviceModel::Gc100_12);
        assert!(parse_model("gc100").is_err());
        assert_eq!(parse_port("2").unwrap(), SerialPort::Serial2);
        assert!(parse_port("3").is_err());
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }
}
