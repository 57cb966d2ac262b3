//! # Modbus RTU Codec
//!
//! Framing of PDUs into RTU application data units and back.
//!
//! ## Frame Layout
//!
//! | Field | Size | Notes |
//! |-------|------|-------|
//! | Slave address | 1 | 1-247 |
//! | PDU | 1-253 | function code + data |
//! | CRC | 2 | CRC-16/MODBUS, low byte first |

use bytes::{BufMut, BytesMut};
use crc::{Crc, CRC_16_MODBUS};

use crate::constants::{
    EXCEPTION_ACKNOWLEDGE, EXCEPTION_FLAG, EXCEPTION_ILLEGAL_DATA_ADDRESS,
    EXCEPTION_ILLEGAL_DATA_VALUE, EXCEPTION_ILLEGAL_FUNCTION, EXCEPTION_MEMORY_PARITY_ERROR,
    EXCEPTION_SERVER_DEVICE_BUSY, EXCEPTION_SERVER_DEVICE_FAILURE, MAX_RTU_FRAME_SIZE,
    RTU_CRC_LEN,
};
use crate::error::{TracerError, TracerResult};
use crate::pdu::ModbusPdu;

const MODBUS_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Compute the CRC-16/MODBUS checksum of `data`.
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    MODBUS_CRC.checksum(data)
}

/// Wrap a PDU into an RTU frame: slave address, PDU, CRC (little-endian).
pub fn encode_rtu_frame(slave_id: u8, pdu: &ModbusPdu) -> BytesMut {
    let mut frame = BytesMut::with_capacity(1 + pdu.len() + RTU_CRC_LEN);
    frame.put_u8(slave_id);
    frame.put_slice(pdu.as_slice());
    let crc = crc16(&frame);
    frame.put_u16_le(crc);
    frame
}

/// Validate an RTU frame and extract its PDU.
///
/// Checks length bounds, CRC and the responding slave address. Exception
/// responses are returned as a PDU; the caller decides how to report them.
pub fn decode_rtu_frame(frame: &[u8], expected_slave: u8) -> TracerResult<ModbusPdu> {
    if frame.len() < 1 + 1 + RTU_CRC_LEN {
        return Err(TracerError::protocol(format!(
            "RTU frame too short: {} bytes",
            frame.len()
        )));
    }
    if frame.len() > MAX_RTU_FRAME_SIZE {
        return Err(TracerError::protocol(format!(
            "RTU frame too long: {} bytes (max {})",
            frame.len(),
            MAX_RTU_FRAME_SIZE
        )));
    }

    let (body, crc_bytes) = frame.split_at(frame.len() - RTU_CRC_LEN);
    let actual = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let expected = crc16(body);
    if actual != expected {
        return Err(TracerError::Crc { expected, actual });
    }

    if body[0] != expected_slave {
        return Err(TracerError::protocol(format!(
            "Response from slave {}, expected {}",
            body[0], expected_slave
        )));
    }

    ModbusPdu::from_slice(&body[1..])
}

/// Remaining bytes to read after the 3-byte response header.
///
/// The third header byte is the byte count of a normal response, or the
/// exception code of an exception response (which has no payload).
#[inline]
pub fn remaining_response_len(function_code: u8, third_byte: u8) -> usize {
    if function_code & EXCEPTION_FLAG != 0 {
        RTU_CRC_LEN
    } else {
        usize::from(third_byte) + RTU_CRC_LEN
    }
}

/// Description of a Modbus exception code.
pub fn exception_description(code: u8) -> &'static str {
    match code {
        EXCEPTION_ILLEGAL_FUNCTION => "Illegal Function",
        EXCEPTION_ILLEGAL_DATA_ADDRESS => "Illegal Data Address",
        EXCEPTION_ILLEGAL_DATA_VALUE => "Illegal Data Value",
        EXCEPTION_SERVER_DEVICE_FAILURE => "Server Device Failure",
        EXCEPTION_ACKNOWLEDGE => "Acknowledge",
        EXCEPTION_SERVER_DEVICE_BUSY => "Server Device Busy",
        EXCEPTION_MEMORY_PARITY_ERROR => "Memory Parity Error",
        _ => "Unknown Exception",
    }
}
