//! Epever Tracer telemetry bridge
//!
//! Polls the controller on the given serial port and writes one JSON
//! object per cycle to stdout. Logs go to stderr.
//!
//! Exit status: 0 after Ctrl+C/SIGTERM or `--validate`, 1 when the
//! controller stops answering or startup fails.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use epever_bridge::{
    init_logging, register_service, wait_for_shutdown, JsonLinesSink, LogLevel, ModbusRtuClient,
    PollCycle, RtuTransport, TracerConfig, TracerError, TracerResult,
};

const PROCESS_NAME: &str = env!("CARGO_BIN_NAME");

/// Epever Tracer solar charge controller bridge
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Serial port of the controller, e.g. /dev/ttyUSB0
    port: Option<String>,

    /// YAML configuration file
    #[clap(short, long, env = "EPEVER_CONFIG")]
    config: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[clap(long)]
    interval_ms: Option<u64>,

    /// Serial baud rate
    #[clap(long)]
    baud_rate: Option<u32>,

    /// Modbus slave id of the controller
    #[clap(long)]
    slave_id: Option<u8>,

    /// Per-read response timeout in milliseconds
    #[clap(long)]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[clap(short = 'l', long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output (useful for log files)
    #[clap(long)]
    no_color: bool,

    /// Log every Modbus frame at trace level
    #[clap(long)]
    packet_logging: bool,

    /// Only validate configuration without starting the bridge
    #[clap(long)]
    validate: bool,
}

impl Args {
    /// File config (or defaults) with command-line overrides applied.
    fn build_config(&self) -> TracerResult<TracerConfig> {
        let mut config = match &self.config {
            Some(path) => TracerConfig::from_file(path)?,
            None => TracerConfig::default(),
        };

        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(interval_ms) = self.interval_ms {
            config.poll.interval_ms = interval_ms;
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial.baud_rate = baud_rate;
        }
        if let Some(slave_id) = self.slave_id {
            config.serial.slave_id = slave_id;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.serial.timeout_ms = timeout_ms;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG may hold a full filter directive; init_logging reads it directly
    let level = args.log_level.parse::<LogLevel>().unwrap_or_default();
    if let Err(e) = init_logging(level, !args.no_color) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> TracerResult<()> {
    let config = args.build_config()?;
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let port_name = config.serial.port_name();
    let service = config.identity.service_name(port_name);
    info!(
        "Starting {} v{} on {} ({} baud, slave {})",
        PROCESS_NAME,
        epever_bridge::VERSION,
        config.serial.port,
        config.serial.baud_rate,
        config.serial.slave_id
    );

    let mut transport = RtuTransport::open(&config.serial)?;
    transport.set_packet_logging(args.packet_logging);
    let client = ModbusRtuClient::new(transport, config.serial.slave_id, config.poll.register_kind);

    let mut sink = JsonLinesSink::new(std::io::stdout(), service.as_str());
    register_service(&mut sink, &config.identity, PROCESS_NAME, port_name)?;
    info!("Registered {}", service);

    let mut cycle = PollCycle::new(client, sink, config.poll);
    let result = tokio::select! {
        result = cycle.run() => result,
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    let stats = cycle.client().get_stats();
    info!(
        "Transport: {} requests, {} responses, {} errors, {} timeouts",
        stats.requests_sent, stats.responses_received, stats.errors, stats.timeouts
    );

    if let Err(TracerError::FailuresExhausted { count, .. }) = &result {
        warn!("Controller unreachable after {} attempts, exiting", count);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "epever-bridge",
            "/dev/ttyUSB3",
            "--interval-ms",
            "2000",
            "--slave-id",
            "4",
            "--timeout-ms",
            "300",
            "--log-level",
            "debug",
        ]);
        let config = args.build_config().unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB3");
        assert_eq!(config.serial.slave_id, 4);
        assert_eq!(config.serial.timeout_ms, 300);
        assert_eq!(config.poll.interval_ms, 2000);
        assert_eq!(config.serial.baud_rate, 115_200);
    }

    #[test]
    fn test_missing_port_is_rejected() {
        let args = Args::parse_from(["epever-bridge"]);
        assert!(matches!(
            args.build_config(),
            Err(TracerError::Configuration { .. })
        ));
    }
}
