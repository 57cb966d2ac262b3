//! Modbus RTU transport
//!
//! [`ModbusTransport`] moves one request PDU to a slave and returns the
//! response PDU. [`RtuTransport`] implements it over any [`SerialLink`]:
//! a real serial port (feature `rtu`) or an in-memory stream in tests.
//!
//! One transaction is:
//!
//! 1. discard anything pending in the link buffers
//! 2. write `[slave][pdu][crc]`
//! 3. read the 3-byte response header, then the rest of the frame
//!
//! Steps 2 and 3 share a single timeout. A response that does not arrive
//! in full within it is a [`TracerError::Timeout`].

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::codec::{decode_rtu_frame, encode_rtu_frame, remaining_response_len};
use crate::constants::RTU_RESPONSE_HEADER_LEN;
use crate::error::{TracerError, TracerResult};
use crate::logging::format_frame;
use crate::pdu::ModbusPdu;

#[cfg(feature = "rtu")]
use crate::config::{Parity, SerialConfig};

/// Transport-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Request/response exchange with a slave device.
pub trait ModbusTransport: Send {
    /// Send `pdu` to `slave_id` and wait for its response PDU.
    ///
    /// Exception responses are returned as PDUs, not errors.
    fn request(
        &mut self,
        slave_id: u8,
        pdu: &ModbusPdu,
    ) -> impl Future<Output = TracerResult<ModbusPdu>> + Send;

    fn get_stats(&self) -> TransportStats;
}

/// Byte stream to a serial device.
pub trait SerialLink: AsyncRead + AsyncWrite + Unpin + Send {
    /// Drop unread input and unsent output.
    fn discard_pending(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "rtu")]
impl SerialLink for tokio_serial::SerialStream {
    fn discard_pending(&mut self) -> io::Result<()> {
        use tokio_serial::{ClearBuffer, SerialPort};
        self.clear(ClearBuffer::All).map_err(io::Error::from)
    }
}

impl SerialLink for tokio::io::DuplexStream {}

/// RTU framing over a serial link.
pub struct RtuTransport<L: SerialLink> {
    link: L,
    timeout: Duration,
    stats: TransportStats,
    packet_logging: bool,
}

impl<L: SerialLink> RtuTransport<L> {
    pub fn new(link: L, timeout: Duration) -> Self {
        Self {
            link,
            timeout,
            stats: TransportStats::default(),
            packet_logging: false,
        }
    }

    /// Log every frame as hex at TRACE level.
    pub fn set_packet_logging(&mut self, enabled: bool) {
        self.packet_logging = enabled;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    async fn transact(&mut self, frame: &[u8]) -> TracerResult<Vec<u8>> {
        self.link.discard_pending()?;

        if self.packet_logging {
            trace!("RTU send: {}", format_frame(frame));
        }
        self.link.write_all(frame).await?;
        self.link.flush().await?;
        self.stats.bytes_sent += frame.len() as u64;

        let mut response = vec![0u8; RTU_RESPONSE_HEADER_LEN];
        self.link.read_exact(&mut response).await?;
        let remaining = remaining_response_len(response[1], response[2]);
        response.resize(RTU_RESPONSE_HEADER_LEN + remaining, 0);
        self.link
            .read_exact(&mut response[RTU_RESPONSE_HEADER_LEN..])
            .await?;
        self.stats.bytes_received += response.len() as u64;

        if self.packet_logging {
            trace!("RTU recv: {}", format_frame(&response));
        }
        Ok(response)
    }
}

impl<L: SerialLink> ModbusTransport for RtuTransport<L> {
    async fn request(&mut self, slave_id: u8, pdu: &ModbusPdu) -> TracerResult<ModbusPdu> {
        let frame = encode_rtu_frame(slave_id, pdu);
        self.stats.requests_sent += 1;

        let limit = self.timeout;
        let outcome = tokio::time::timeout(limit, self.transact(&frame)).await;
        let result = match outcome {
            Ok(Ok(response)) => decode_rtu_frame(&response, slave_id),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                self.stats.timeouts += 1;
                debug!("RTU timeout waiting for slave {}", slave_id);
                return Err(TracerError::timeout(
                    format!("No response from slave {}", slave_id),
                    limit.as_millis() as u64,
                ));
            }
        };

        match result {
            Ok(response) => {
                self.stats.responses_received += 1;
                Ok(response)
            }
            Err(e) => {
                self.stats.errors += 1;
                debug!("RTU transaction with slave {} failed: {}", slave_id, e);
                Err(e)
            }
        }
    }

    fn get_stats(&self) -> TransportStats {
        self.stats
    }
}

#[cfg(feature = "rtu")]
impl RtuTransport<tokio_serial::SerialStream> {
    /// Open the serial port described by `config`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(config: &SerialConfig) -> TracerResult<Self> {
        use tokio_serial::SerialPortBuilderExt;

        let data_bits = match config.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };
        let stop_bits = match config.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };
        let parity = match config.parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        };

        let stream = tokio_serial::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .timeout(config.timeout())
            .open_native_async()
            .map_err(|e| {
                TracerError::connection(format!(
                    "Failed to open serial port {}: {}",
                    config.port, e
                ))
            })?;

        debug!("RTU opened: {} @{}baud", config.port, config.baud_rate);
        Ok(Self::new(stream, config.timeout()))
    }
}
