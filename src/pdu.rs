//! Modbus PDU for register reads
//!
//! Fixed-size stack buffer, so building a request or holding a response
//! never allocates.

use serde::Deserialize;
use tracing::debug;

use crate::constants::{
    FC_READ_HOLDING_REGISTERS, FC_READ_INPUT_REGISTERS, MAX_PDU_SIZE, MAX_READ_REGISTERS,
};
use crate::error::{TracerError, TracerResult};

/// Which register table a block read targets.
///
/// Epever controllers expose their real-time data as input registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterKind {
    /// Input registers (FC04)
    #[default]
    Input,
    /// Holding registers (FC03)
    Holding,
}

impl RegisterKind {
    /// Function code used to read this register table.
    #[inline]
    pub fn function_code(self) -> u8 {
        match self {
            Self::Input => FC_READ_INPUT_REGISTERS,
            Self::Holding => FC_READ_HOLDING_REGISTERS,
        }
    }
}

/// PDU backed by a stack-allocated array
#[derive(Debug, Clone)]
pub struct ModbusPdu {
    data: [u8; MAX_PDU_SIZE],
    len: usize,
}

impl ModbusPdu {
    /// Create an empty PDU
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PDU_SIZE],
            len: 0,
        }
    }

    /// Create a PDU from a byte slice
    pub fn from_slice(data: &[u8]) -> TracerResult<Self> {
        if data.len() > MAX_PDU_SIZE {
            return Err(TracerError::protocol(format!(
                "PDU too large: {} bytes (max {})",
                data.len(),
                MAX_PDU_SIZE
            )));
        }

        let mut pdu = Self::new();
        pdu.data[..data.len()].copy_from_slice(data);
        pdu.len = data.len();

        match pdu.function_code() {
            Some(fc) if pdu.is_exception() => debug!(
                "PDU parsed: FC={:02X} (Exception: {}), exception_code={:02X}",
                fc,
                Self::function_code_description(fc),
                pdu.exception_code().unwrap_or(0)
            ),
            Some(fc) => debug!(
                "PDU parsed: FC={:02X} ({}), data_len={}",
                fc,
                Self::function_code_description(fc),
                pdu.len - 1
            ),
            None => debug!("PDU parsed: empty PDU"),
        }

        Ok(pdu)
    }

    /// Push a single byte
    #[inline]
    pub fn push(&mut self, byte: u8) -> TracerResult<()> {
        if self.len >= MAX_PDU_SIZE {
            return Err(TracerError::protocol("PDU buffer full"));
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> TracerResult<()> {
        for byte in value.to_be_bytes() {
            self.push(byte)?;
        }
        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Function code (first byte)
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        (self.len > 0).then(|| self.data[0])
    }

    /// Check if exception response
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function_code().is_some_and(|fc| fc & 0x80 != 0)
    }

    /// Exception code of an exception response
    #[inline]
    pub fn exception_code(&self) -> Option<u8> {
        (self.is_exception() && self.len > 1).then(|| self.data[1])
    }

    /// Decode the register payload of a FC03/FC04 response.
    ///
    /// Checks the function code, the byte count prefix and that exactly
    /// `quantity` registers were returned.
    pub fn parse_registers(&self, function_code: u8, quantity: u16) -> TracerResult<Vec<u16>> {
        if let Some(code) = self.exception_code() {
            return Err(TracerError::exception(self.data[0], code));
        }

        match self.function_code() {
            Some(fc) if fc == function_code => {}
            Some(fc) => {
                return Err(TracerError::protocol(format!(
                    "Function code mismatch: expected {:02X}, got {:02X}",
                    function_code, fc
                )))
            }
            None => return Err(TracerError::protocol("Empty response PDU")),
        }

        let payload = &self.as_slice()[1..];
        let Some((&byte_count, registers)) = payload.split_first() else {
            return Err(TracerError::protocol("Response PDU missing byte count"));
        };

        let expected = usize::from(quantity) * 2;
        if usize::from(byte_count) != expected || registers.len() != expected {
            return Err(TracerError::invalid_data(format!(
                "Byte count mismatch: requested {} registers, byte_count={}, payload={} bytes",
                quantity,
                byte_count,
                registers.len()
            )));
        }

        Ok(registers
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Human-readable function code description
    pub fn function_code_description(fc: u8) -> &'static str {
        match fc & 0x7F {
            FC_READ_HOLDING_REGISTERS => "Read Holding Registers",
            FC_READ_INPUT_REGISTERS => "Read Input Registers",
            _ => "Unsupported Function",
        }
    }
}

impl Default for ModbusPdu {
    fn default() -> Self {
        Self::new()
    }
}

/// PDU builder - fluent API
pub struct PduBuilder {
    pdu: ModbusPdu,
}

impl Default for PduBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PduBuilder {
    #[inline]
    pub fn new() -> Self {
        Self {
            pdu: ModbusPdu::new(),
        }
    }

    #[inline]
    pub fn function_code(mut self, fc: u8) -> TracerResult<Self> {
        self.pdu.push(fc)?;
        Ok(self)
    }

    #[inline]
    pub fn address(mut self, addr: u16) -> TracerResult<Self> {
        self.pdu.push_u16(addr)?;
        Ok(self)
    }

    #[inline]
    pub fn quantity(mut self, qty: u16) -> TracerResult<Self> {
        self.pdu.push_u16(qty)?;
        Ok(self)
    }

    #[inline]
    pub fn build(self) -> ModbusPdu {
        self.pdu
    }

    /// Build a FC03/FC04 read request
    ///
    /// Rejects a quantity of zero or above the 125-register protocol limit.
    pub fn build_read_request(
        kind: RegisterKind,
        start_address: u16,
        quantity: u16,
    ) -> TracerResult<ModbusPdu> {
        if quantity == 0 || usize::from(quantity) > MAX_READ_REGISTERS {
            return Err(TracerError::invalid_data(format!(
                "Invalid quantity {} (must be 1-{})",
                quantity, MAX_READ_REGISTERS
            )));
        }
        Ok(PduBuilder::new()
            .function_code(kind.function_code())?
            .address(start_address)?
            .quantity(quantity)?
            .build())
    }
}
