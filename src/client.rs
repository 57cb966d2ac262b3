//! Register block clients
//!
//! The poll cycle only needs one operation from the device: read `count`
//! consecutive 16-bit registers starting at `address`. [`RegisterClient`]
//! is that seam. [`ModbusRtuClient`] implements it on top of any
//! [`ModbusTransport`], building the FC03/FC04 request and checking the
//! response payload.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use epever_bridge::{ModbusRtuClient, RegisterClient, RegisterKind, RtuTransport, SerialConfig, TracerResult};
//!
//! #[tokio::main]
//! async fn main() -> TracerResult<()> {
//!     let config = SerialConfig::new("/dev/ttyUSB0");
//!     let transport = RtuTransport::open(&config)?;
//!     let mut client = ModbusRtuClient::new(transport, config.slave_id, RegisterKind::Input);
//!
//!     // Real-time block: 18 registers at 0x3100
//!     let registers = client.read_block(0x3100, 18).await?;
//!     println!("Battery voltage: {:.2}V", f64::from(registers[4]) / 100.0);
//!     Ok(())
//! }
//! ```

use std::future::Future;

use tracing::trace;

use crate::error::TracerResult;
use crate::pdu::{PduBuilder, RegisterKind};
use crate::transport::{ModbusTransport, TransportStats};

/// Reads blocks of consecutive registers from the controller.
///
/// Every failure (timeout, checksum, port error, device exception) is
/// reported as an error; callers do not distinguish between them.
pub trait RegisterClient: Send {
    fn read_block(
        &mut self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = TracerResult<Vec<u16>>> + Send;
}

/// Modbus register client for a single slave.
pub struct ModbusRtuClient<T: ModbusTransport> {
    transport: T,
    slave_id: u8,
    kind: RegisterKind,
}

impl<T: ModbusTransport> ModbusRtuClient<T> {
    pub fn new(transport: T, slave_id: u8, kind: RegisterKind) -> Self {
        Self {
            transport,
            slave_id,
            kind,
        }
    }

    /// Get a reference to the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn slave_id(&self) -> u8 {
        self.slave_id
    }

    pub fn register_kind(&self) -> RegisterKind {
        self.kind
    }

    pub fn get_stats(&self) -> TransportStats {
        self.transport.get_stats()
    }
}

impl<T: ModbusTransport> RegisterClient for ModbusRtuClient<T> {
    async fn read_block(&mut self, address: u16, count: u16) -> TracerResult<Vec<u16>> {
        let function_code = self.kind.function_code();
        let request = PduBuilder::build_read_request(self.kind, address, count)?;
        trace!(
            "Reading {} registers at {:#06X} (FC{:02X})",
            count,
            address,
            function_code
        );

        let response = self.transport.request(self.slave_id, &request).await?;
        response.parse_registers(function_code, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TracerError;
    use crate::pdu::ModbusPdu;

    // =========================================================================
    // MockTransport
    // =========================================================================

    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock transport with prepared responses
    struct MockTransport {
        /// Records all (slave, request PDU) pairs received
        requests: Mutex<Vec<(u8, Vec<u8>)>>,
        /// Pre-configured responses (FIFO queue)
        responses: Mutex<VecDeque<TracerResult<ModbusPdu>>>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(VecDeque::new()),
            }
        }

        fn add_response(&self, response: TracerResult<ModbusPdu>) {
            self.responses.lock().unwrap().push_back(response);
        }

        fn get_requests(&self) -> Vec<(u8, Vec<u8>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl ModbusTransport for MockTransport {
        fn request(
            &mut self,
            slave_id: u8,
            pdu: &ModbusPdu,
        ) -> impl Future<Output = TracerResult<ModbusPdu>> + Send {
            self.requests
                .lock()
                .unwrap()
                .push((slave_id, pdu.as_slice().to_vec()));

            let response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TracerError::connection("No response prepared in mock")));

            async move { response }
        }

        fn get_stats(&self) -> TransportStats {
            TransportStats::default()
        }
    }

    /// FC03/FC04 response with byte_count prefix
    fn register_response(function_code: u8, values: &[u16]) -> ModbusPdu {
        let mut data = vec![function_code, (values.len() * 2) as u8];
        for &val in values {
            data.extend_from_slice(&val.to_be_bytes());
        }
        ModbusPdu::from_slice(&data).unwrap()
    }

    #[tokio::test]
    async fn test_read_block_input_registers() {
        let mock = MockTransport::new();
        mock.add_response(Ok(register_response(0x04, &[1325, 417, 12])));

        let mut client = ModbusRtuClient::new(mock, 1, RegisterKind::Input);
        let registers = client.read_block(0x3200, 3).await.unwrap();
        assert_eq!(registers, vec![1325, 417, 12]);

        let requests = client.transport().get_requests();
        assert_eq!(requests, vec![(1, vec![0x04, 0x32, 0x00, 0x00, 0x03])]);
    }

    #[tokio::test]
    async fn test_read_block_holding_registers() {
        let mock = MockTransport::new();
        mock.add_response(Ok(register_response(0x03, &[7])));

        let mut client = ModbusRtuClient::new(mock, 9, RegisterKind::Holding);
        assert_eq!(client.read_block(0x9000, 1).await.unwrap(), vec![7]);
        assert_eq!(client.transport().get_requests()[0].0, 9);
        assert_eq!(client.transport().get_requests()[0].1[0], 0x03);
    }

    #[tokio::test]
    async fn test_read_block_rejects_bad_quantity_without_request() {
        let mut client = ModbusRtuClient::new(MockTransport::new(), 1, RegisterKind::Input);
        assert!(matches!(
            client.read_block(0x3100, 0).await,
            Err(TracerError::InvalidData { .. })
        ));
        assert!(client.read_block(0x3100, 126).await.is_err());
        assert!(client.transport().get_requests().is_empty());
    }

    #[tokio::test]
    async fn test_read_block_short_response() {
        let mock = MockTransport::new();
        mock.add_response(Ok(register_response(0x04, &[1, 2])));

        let mut client = ModbusRtuClient::new(mock, 1, RegisterKind::Input);
        let err = client.read_block(0x3200, 3).await.unwrap_err();
        assert!(matches!(err, TracerError::InvalidData { .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_read_block_exception() {
        let mock = MockTransport::new();
        mock.add_response(Ok(ModbusPdu::from_slice(&[0x84, 0x02]).unwrap()));

        let mut client = ModbusRtuClient::new(mock, 1, RegisterKind::Input);
        let err = client.read_block(0x3100, 18).await.unwrap_err();
        assert!(matches!(
            err,
            TracerError::Exception {
                function: 0x04,
                code: 0x02,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_read_block_transport_error_propagates() {
        let mock = MockTransport::new();
        mock.add_response(Err(TracerError::timeout("No response from slave 1", 200)));

        let mut client = ModbusRtuClient::new(mock, 1, RegisterKind::Input);
        let err = client.read_block(0x3300, 20).await.unwrap_err();
        assert!(matches!(err, TracerError::Timeout { timeout_ms: 200, .. }));
    }
}
