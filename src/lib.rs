//! # Epever Bridge - Solar Charge Controller Telemetry over Modbus RTU
//!
//! **Author:** Evan Liu <liuyifanz.1996@gmail.com>
//! **License:** MIT
//!
//! Polls an Epever Tracer charge controller once per second, decodes its
//! register blocks into physical telemetry and republishes the values on a
//! path-based telemetry bus.
//!
//! ## Features
//!
//! - **Poll-decode-publish core**: [`PollCycle`] drives the read cycle,
//!   [`decode`] turns raw registers into a [`TelemetrySnapshot`]
//! - **Circuit breaker**: three consecutive read failures stop the bridge
//! - **Daily aggregate**: running peak PV power and today's yield
//! - **Modbus RTU**: CRC-16 framing over any async serial link
//! - **Pluggable sinks**: in-memory table or JSON lines on any writer
//!
//! ## Register Blocks
//!
//! | Base | Count | Content |
//! |------|-------|---------|
//! | 0x3100 | 18 | Real-time PV, battery and load data |
//! | 0x3200 | 3 | Battery, charging and discharging status |
//! | 0x3300 | 20 | Energy statistics |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use epever_bridge::{
//!     register_service, JsonLinesSink, ModbusRtuClient, PollCycle, RtuTransport, TracerConfig,
//!     SerialConfig, TracerResult,
//! };
//!
//! #[tokio::main]
//! async fn main() -> TracerResult<()> {
//!     let config = TracerConfig::new(SerialConfig::new("/dev/ttyUSB0"));
//!     config.validate()?;
//!
//!     let transport = RtuTransport::open(&config.serial)?;
//!     let client = ModbusRtuClient::new(transport, config.serial.slave_id, config.poll.register_kind);
//!
//!     let service = config.identity.service_name(config.serial.port_name());
//!     let mut sink = JsonLinesSink::new(std::io::stdout(), service);
//!     register_service(&mut sink, &config.identity, "epever-bridge", config.serial.port_name())?;
//!
//!     let mut cycle = PollCycle::new(client, sink, config.poll);
//!     cycle.run().await
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus protocol constants
pub mod constants;

/// Stack-allocated PDU for register reads
pub mod pdu;

/// RTU framing and CRC
pub mod codec;

/// Serial transport
pub mod transport;

/// Register block clients
pub mod client;

/// Logging setup
pub mod logging;

/// Configuration
pub mod config;

// ============================================================================
// Telemetry engine
// ============================================================================

/// Register map of the controller
pub mod registers;

/// Charging status bitfield and operating state
pub mod status;

/// Register blocks to telemetry snapshot
pub mod decoder;

/// Daily peak tracking
pub mod aggregate;

/// Periodic scheduling and shutdown signals
pub mod scheduler;

/// The poll-decode-publish cycle
pub mod poll;

// ============================================================================
// Publishing
// ============================================================================

/// Published values and units
pub mod value;

/// Telemetry sinks
pub mod sink;

/// Bus paths and per-cycle publishing
pub mod service;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime ===
pub use tokio;

// === Core engine ===
pub use aggregate::DailyAggregate;
pub use decoder::{decode, TelemetrySnapshot};
pub use poll::{CycleState, FailureCounter, PollCycle, TickOutcome};
pub use scheduler::{wait_for_shutdown, PeriodicSchedule};
pub use status::{ChargingStatus, OperatingState};

// === Error handling ===
pub use error::{TracerError, TracerResult};

// === Client and transport ===
pub use client::{ModbusRtuClient, RegisterClient};
pub use pdu::{ModbusPdu, PduBuilder, RegisterKind};
pub use transport::{ModbusTransport, RtuTransport, SerialLink, TransportStats};

// === Configuration ===
pub use config::{DeviceIdentity, Parity, PollConfig, SerialConfig, TracerConfig};

// === Publishing ===
pub use service::{publish, register_service};
pub use sink::{JsonLinesSink, MemorySink, TelemetrySink};
pub use value::{SinkValue, Unit};

// === Logging ===
pub use logging::{init_logging, LogLevel};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("Epever Bridge v{} - Epever Tracer telemetry bridge", VERSION)
}
