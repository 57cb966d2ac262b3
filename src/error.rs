//! Error types for the bridge
//!
//! A single error enum covers the serial transport, the poll cycle and the
//! telemetry sink. Transport-level variants are the ones the poll cycle
//! counts toward its failure threshold; see [`TracerError::is_transport`].

use thiserror::Error;

/// Result alias used throughout the crate.
pub type TracerResult<T> = Result<T, TracerError>;

/// Errors raised while talking to the charge controller or publishing its data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TracerError {
    /// Underlying I/O failure on the serial link
    #[error("I/O error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },

    /// Port could not be opened or the link went away
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// No complete response within the read timeout
    #[error("Timeout: {message} (after {timeout_ms}ms)")]
    Timeout { message: String, timeout_ms: u64 },

    /// Malformed frame, wrong slave or wrong function code
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Response checksum mismatch
    #[error("CRC mismatch: expected {expected:#06X}, got {actual:#06X}")]
    Crc { expected: u16, actual: u16 },

    /// Device answered with a Modbus exception
    #[error("Modbus exception {code:#04X} on function {function:#04X}: {message}")]
    Exception {
        function: u8,
        code: u8,
        message: String,
    },

    /// Request or response data outside what the protocol allows
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// A register block came back with the wrong number of registers
    #[error("Register block {address:#06X}: expected {expected} registers, got {actual}")]
    BlockLength {
        address: u16,
        expected: usize,
        actual: usize,
    },

    /// Invalid settings
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Telemetry sink rejected a write
    #[error("Sink error: {message}")]
    Sink { message: String },

    /// Circuit breaker tripped after too many consecutive read failures
    #[error("{count} consecutive read failures, giving up (last: {last})")]
    FailuresExhausted {
        count: u32,
        #[source]
        last: Box<TracerError>,
    },

    /// Poll cycle already terminated
    #[error("Poll cycle is terminated")]
    Terminated,
}

impl TracerError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            message: message.into(),
            timeout_ms,
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Build an exception error from the function and exception codes of a response.
    pub fn exception(function: u8, code: u8) -> Self {
        Self::Exception {
            function: function & 0x7F,
            code,
            message: crate::codec::exception_description(code).to_string(),
        }
    }

    /// Whether this error is a read failure that counts toward the poll
    /// cycle's consecutive-failure threshold.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::Connection { .. }
                | Self::Timeout { .. }
                | Self::Protocol { .. }
                | Self::Crc { .. }
                | Self::Exception { .. }
                | Self::InvalidData { .. }
                | Self::BlockLength { .. }
        )
    }

    /// Whether the error is fatal for the poll cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FailuresExhausted { .. } | Self::Terminated)
    }
}

impl From<std::io::Error> for TracerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "rtu")]
impl From<tokio_serial::Error> for TracerError {
    fn from(err: tokio_serial::Error) -> Self {
        Self::connection(err.to_string())
    }
}
