//! Logging setup
//!
//! Library code only emits `tracing` events. Binaries call [`init_logging`]
//! once to install a formatting subscriber.

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use crate::error::{TracerError, TracerResult};

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = TracerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(TracerError::configuration(format!(
                "Unknown log level '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `level` when it holds a valid filter.
/// Logs go to stderr; stdout is left to the telemetry output.
/// Fails if a global subscriber is already set.
pub fn init_logging(level: LogLevel, ansi: bool) -> TracerResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("epever_bridge={level},{level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .try_init()
        .map_err(|e| TracerError::configuration(format!("Failed to initialise logging: {}", e)))
}

/// Hex dump of a frame for packet logging, e.g. `01 04 31 00`.
pub fn format_frame(frame: &[u8]) -> String {
    let mut out = String::with_capacity(frame.len() * 3);
    for (i, byte) in frame.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" error ".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_default_level_is_info() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::default().to_string(), "info");
    }

    #[test]
    fn test_format_frame() {
        assert_eq!(format_frame(&[0x01, 0x04, 0x31, 0x00]), "01 04 31 00");
        assert_eq!(format_frame(&[]), "");
    }
}
