//! Device models and the serial ports each one carries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Gateway hardware model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceModel {
    /// iTach IP2IR / WF2IR: infrared only.
    #[default]
    Itach,
    /// iTach IP2CC / WF2CC: relays only.
    ItachCc,
    /// iTach IP2SL / WF2SL: one serial port.
    ItachSl,
    /// iTach Flex: one port whose role depends on the attached cable.
    ItachFlex,
    /// GC-100-06: infrared, relays and one serial port.
    #[serde(rename = "gc-100-06")]
    Gc100_06,
    /// GC-100-12: infrared, relays and two serial ports.
    #[serde(rename = "gc-100-12")]
    Gc100_12,
}

impl DeviceModel {
    /// True for the GC-100 family, whose command dialect differs slightly.
    pub fn is_gc100(self) -> bool {
        matches!(self, Self::Gc100_06 | Self::Gc100_12)
    }
}

/// Cable attached to an iTach Flex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActiveCable {
    #[default]
    Infrared,
    Serial,
    Relay,
}

/// One of the gateway's serial pass-through ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SerialPort {
    Serial1,
    Serial2,
}

impl SerialPort {
    /// Both ports, in connect order.
    pub const ALL: [SerialPort; 2] = [SerialPort::Serial1, SerialPort::Serial2];

    /// Channel name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::Serial1 => "serial-1",
            Self::Serial2 => "serial-2",
        }
    }

    /// Zero-based index into per-port tables.
    pub fn index(self) -> usize {
        match self {
            Self::Serial1 => 0,
            Self::Serial2 => 1,
        }
    }

    /// Port from its one-based number.
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Self::Serial1),
            2 => Some(Self::Serial2),
            _ => None,
        }
    }
}

impl fmt::Display for SerialPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical channel a request is executed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Command,
    Serial(SerialPort),
}

impl Target {
    /// Channel name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Serial(port) => port.name(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which channels a device has, fixed for the lifetime of a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    model: DeviceModel,
    active_cable: ActiveCable,
}

impl Capabilities {
    pub fn new(model: DeviceModel, active_cable: ActiveCable) -> Self {
        Self {
            model,
            active_cable,
        }
    }

    pub fn model(&self) -> DeviceModel {
        self.model
    }

    pub fn active_cable(&self) -> ActiveCable {
        self.active_cable
    }

    /// True if the device has a first serial port.
    pub fn supports_serial1(&self) -> bool {
        match self.model {
            DeviceModel::ItachSl | DeviceModel::Gc100_06 | DeviceModel::Gc100_12 => true,
            DeviceModel::ItachFlex => self.active_cable == ActiveCable::Serial,
            DeviceModel::Itach | DeviceModel::ItachCc => false,
        }
    }

    /// True if the device has a second serial port.
    pub fn supports_serial2(&self) -> bool {
        self.model == DeviceModel::Gc100_12
    }

    /// True if `port` exists on this device.
    pub fn supports(&self, port: SerialPort) -> bool {
        match port {
            SerialPort::Serial1 => self.supports_serial1(),
            SerialPort::Serial2 => self.supports_serial2(),
        }
    }

    /// Serial ports present on this device, in connect order.
    pub fn serial_ports(&self) -> impl Iterator<Item = SerialPort> + '_ {
        SerialPort::ALL.into_iter().filter(|port| self.supports(*port))
    }
}
