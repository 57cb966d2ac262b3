//! # Bridge Configuration
//!
//! Serial link settings, poll cadence and the identity the bridge announces
//! on the telemetry bus. Defaults match an Epever Tracer 10420AN on a USB
//! RS485 adapter.
//!
//! Every struct can be built in code with the `with_*` builders or loaded
//! from YAML:
//!
//! ```yaml
//! serial:
//!   port: /dev/ttyUSB0
//!   baud_rate: 115200
//! poll:
//!   interval_ms: 1000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::constants::MAX_SLAVE_ID;
use crate::error::{TracerError, TracerResult};
use crate::pdu::RegisterKind;
use crate::registers::CYCLE_BLOCKS;

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default per-read timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 200;

/// Default poll period in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Consecutive read failures after which the poll cycle terminates.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Serial parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Serial link settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    /// Per-read response timeout (milliseconds).
    pub timeout_ms: u64,
    /// Modbus slave address of the controller.
    pub slave_id: u8,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            slave_id: 1,
        }
    }
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_slave_id(mut self, slave_id: u8) -> Self {
        self.slave_id = slave_id;
        self
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Last component of the port path (`/dev/ttyUSB0` → `ttyUSB0`).
    pub fn port_name(&self) -> &str {
        self.port.rsplit('/').next().unwrap_or(&self.port)
    }
}

/// Poll cycle settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Tick period (milliseconds).
    pub interval_ms: u64,
    /// Consecutive failures that terminate the cycle.
    pub failure_threshold: u32,
    /// Register table the blocks are read from.
    pub register_kind: RegisterKind,
    /// Pause between the block reads of one tick (milliseconds).
    pub inter_read_delay_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            register_kind: RegisterKind::Input,
            inter_read_delay_ms: 0,
        }
    }
}

impl PollConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_register_kind(mut self, kind: RegisterKind) -> Self {
        self.register_kind = kind;
        self
    }

    pub fn with_inter_read_delay_ms(mut self, delay_ms: u64) -> Self {
        self.inter_read_delay_ms = delay_ms;
        self
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[inline]
    pub fn inter_read_delay(&self) -> Duration {
        Duration::from_millis(self.inter_read_delay_ms)
    }
}

/// Static device metadata announced once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceIdentity {
    pub product_name: String,
    pub serial_number: String,
    pub hardware_version: String,
    /// Must be `None`-like or wider than 24 bits; the bus consumer reads
    /// narrower values as a firmware age.
    pub firmware_version: u64,
    pub software_version: String,
    pub connection: String,
    pub device_instance: u32,
    pub product_id: u32,
    pub service_prefix: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            product_name: "Epever Tracer 10420AN".to_string(),
            serial_number: "04481080049GMWW7-00088".to_string(),
            hardware_version: "412".to_string(),
            firmware_version: 4_110_000_000_000_000,
            software_version: "0.8".to_string(),
            connection: "USB".to_string(),
            device_instance: 290,
            product_id: 1,
            service_prefix: "com.victronenergy.solarcharger.".to_string(),
        }
    }
}

impl DeviceIdentity {
    /// Bus service name for a given serial port name.
    pub fn service_name(&self, port_name: &str) -> String {
        format!("{}{}", self.service_prefix, port_name)
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    pub serial: SerialConfig,
    pub poll: PollConfig,
    pub identity: DeviceIdentity,
}

impl TracerConfig {
    pub fn new(serial: SerialConfig) -> Self {
        Self {
            serial,
            ..Self::default()
        }
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn from_yaml_str(input: &str) -> TracerResult<Self> {
        serde_yaml::from_str(input)
            .map_err(|e| TracerError::configuration(format!("Invalid config: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> TracerResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TracerError::configuration(format!("Unable to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Check the settings for values the device or the poll cycle cannot work with.
    pub fn validate(&self) -> TracerResult<()> {
        let serial = &self.serial;
        if serial.port.is_empty() {
            return Err(TracerError::configuration("Serial port not set"));
        }
        if serial.slave_id == 0 || serial.slave_id > MAX_SLAVE_ID {
            return Err(TracerError::configuration(format!(
                "Slave id {} out of range 1-{}",
                serial.slave_id, MAX_SLAVE_ID
            )));
        }
        if serial.baud_rate == 0 {
            return Err(TracerError::configuration("Baud rate must be non-zero"));
        }
        if !(5..=8).contains(&serial.data_bits) {
            return Err(TracerError::configuration(format!(
                "Data bits {} out of range 5-8",
                serial.data_bits
            )));
        }
        if !(1..=2).contains(&serial.stop_bits) {
            return Err(TracerError::configuration(format!(
                "Stop bits {} out of range 1-2",
                serial.stop_bits
            )));
        }
        if serial.timeout_ms == 0 {
            return Err(TracerError::configuration("Read timeout must be non-zero"));
        }
        if self.poll.interval_ms == 0 {
            return Err(TracerError::configuration("Poll interval must be non-zero"));
        }
        if self.poll.failure_threshold == 0 {
            return Err(TracerError::configuration(
                "Failure threshold must be at least 1",
            ));
        }

        let worst_case_ms = serial.timeout_ms * CYCLE_BLOCKS.len() as u64
            + self.poll.inter_read_delay_ms * (CYCLE_BLOCKS.len() as u64 - 1);
        if worst_case_ms >= self.poll.interval_ms {
            warn!(
                "A tick can take up to {}ms, longer than the {}ms poll interval; ticks will be skipped",
                worst_case_ms, self.poll.interval_ms
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_device() {
        let config = TracerConfig::new(SerialConfig::new("/dev/ttyUSB0"));
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.data_bits, 8);
        assert_eq!(config.serial.parity, Parity::None);
        assert_eq!(config.serial.stop_bits, 1);
        assert_eq!(config.serial.timeout(), Duration::from_millis(200));
        assert_eq!(config.poll.interval(), Duration::from_millis(1000));
        assert_eq!(config.poll.failure_threshold, 3);
        assert_eq!(config.poll.register_kind, RegisterKind::Input);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let serial = SerialConfig::new("/dev/ttyS1")
            .with_baud_rate(9600)
            .with_parity(Parity::Even)
            .with_timeout_ms(500)
            .with_slave_id(7);
        assert_eq!(serial.baud_rate, 9600);
        assert_eq!(serial.parity, Parity::Even);
        assert_eq!(serial.slave_id, 7);

        let poll = PollConfig::new()
            .with_interval_ms(2000)
            .with_failure_threshold(5)
            .with_register_kind(RegisterKind::Holding)
            .with_inter_read_delay_ms(10);
        assert_eq!(poll.interval_ms, 2000);
        assert_eq!(poll.failure_threshold, 5);
        assert_eq!(poll.inter_read_delay_ms, 10);
    }

    #[test]
    fn test_service_name_from_port() {
        let config = TracerConfig::new(SerialConfig::new("/dev/ttyUSB0"));
        assert_eq!(config.serial.port_name(), "ttyUSB0");
        assert_eq!(
            config.identity.service_name(config.serial.port_name()),
            "com.victronenergy.solarcharger.ttyUSB0"
        );
        assert_eq!(SerialConfig::new("COM3").port_name(), "COM3");
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = r#"
serial:
  port: /dev/ttyUSB1
  slave_id: 2
poll:
  interval_ms: 5000
  register_kind: holding
identity:
  device_instance: 291
"#;
        let config = TracerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.serial.slave_id, 2);
        assert_eq!(config.serial.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.poll.interval_ms, 5000);
        assert_eq!(config.poll.register_kind, RegisterKind::Holding);
        assert_eq!(config.poll.failure_threshold, DEFAULT_FAILURE_THRESHOLD);
        assert_eq!(config.identity.device_instance, 291);
        assert_eq!(config.identity.product_name, "Epever Tracer 10420AN");
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            TracerConfig::from_yaml_str("serial: [1, 2"),
            Err(TracerError::Configuration { .. })
        ));
    }

    #[test]
    fn test_validation_failures() {
        let base = TracerConfig::new(SerialConfig::new("/dev/ttyUSB0"));

        let mut config = base.clone();
        config.serial.port.clear();
        assert!(config.validate().is_err());

        let config = TracerConfig::new(SerialConfig::new("/dev/ttyUSB0").with_slave_id(0));
        assert!(config.validate().is_err());

        let config = TracerConfig::new(SerialConfig::new("/dev/ttyUSB0").with_slave_id(248));
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.serial.data_bits = 9;
        assert!(config.validate().is_err());

        let config = base.clone().with_poll(PollConfig::new().with_interval_ms(0));
        assert!(config.validate().is_err());

        let config = base.with_poll(PollConfig::new().with_failure_threshold(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_slow_timeout_is_only_a_warning() {
        let config = TracerConfig::new(SerialConfig::new("/dev/ttyUSB0").with_timeout_ms(900));
        assert!(config.validate().is_ok());
    }
}
