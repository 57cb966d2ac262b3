//! Modbus RTU protocol constants
//!
//! Only the subset needed to read register blocks from a charge controller:
//! - Maximum PDU size: 253 bytes (RS485 ADU limit of 256 bytes)
//! - Register read limit is derived from the PDU size constraint

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Maximum PDU (Protocol Data Unit) size per Modbus specification
///
/// RS485 ADU (256 bytes) - Slave Address (1 byte) - CRC (2 bytes) = 253 bytes
pub const MAX_PDU_SIZE: usize = 253;

/// Maximum RTU ADU size: slave address + PDU + CRC
pub const MAX_RTU_FRAME_SIZE: usize = 1 + MAX_PDU_SIZE + RTU_CRC_LEN;

/// Slave address (1) + function code (1) + byte count or exception code (1)
pub const RTU_RESPONSE_HEADER_LEN: usize = 3;

/// Trailing CRC-16 length in an RTU frame
pub const RTU_CRC_LEN: usize = 2;

/// Length of a read request frame: slave + FC + address(2) + quantity(2) + CRC(2)
pub const RTU_READ_REQUEST_LEN: usize = 8;

// ============================================================================
// Register Operation Limits
// ============================================================================

/// Maximum number of registers for FC03/FC04 (Read Holding/Input Registers)
///
/// Response PDU: Function Code (1) + Byte Count (1) + N × 2 ≤ 253,
/// so N ≤ (253 - 2) / 2 = 125.5 → 125 registers
pub const MAX_READ_REGISTERS: usize = 125;

/// Highest valid unicast slave address
pub const MAX_SLAVE_ID: u8 = 247;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Bit set in the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Illegal Function
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Illegal Data Address
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Illegal Data Value
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Server Device Failure
pub const EXCEPTION_SERVER_DEVICE_FAILURE: u8 = 0x04;

/// Acknowledge
pub const EXCEPTION_ACKNOWLEDGE: u8 = 0x05;

/// Server Device Busy
pub const EXCEPTION_SERVER_DEVICE_BUSY: u8 = 0x06;

/// Memory Parity Error
pub const EXCEPTION_MEMORY_PARITY_ERROR: u8 = 0x08;
