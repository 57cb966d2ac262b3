//! # Epever Register Map
//!
//! The three register blocks read every poll cycle and the offsets of the
//! values decoded from them.
//!
//! | Block | Base | Count | Content |
//! |-------|------|-------|---------|
//! | Real-time | 0x3100 | 18 | PV, battery and load measurements |
//! | Status | 0x3200 | 3 | Battery, charging and discharging status |
//! | Statistics | 0x3300 | 20 | Energy counters |
//!
//! All analog channels use a fixed scale of 1/100.

use crate::error::{TracerError, TracerResult};

/// Divisor turning a raw register into its physical value.
pub const SCALE: f64 = 100.0;

/// A fixed-size register block read in one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpec {
    pub name: &'static str,
    pub address: u16,
    pub count: u16,
}

impl BlockSpec {
    /// Reject a read that returned a different number of registers.
    pub fn validate(&self, registers: &[u16]) -> TracerResult<()> {
        if registers.len() != usize::from(self.count) {
            return Err(TracerError::BlockLength {
                address: self.address,
                expected: usize::from(self.count),
                actual: registers.len(),
            });
        }
        Ok(())
    }
}

pub const REALTIME_BLOCK: BlockSpec = BlockSpec {
    name: "realtime",
    address: 0x3100,
    count: 18,
};

pub const STATUS_BLOCK: BlockSpec = BlockSpec {
    name: "status",
    address: 0x3200,
    count: 3,
};

pub const STATISTICS_BLOCK: BlockSpec = BlockSpec {
    name: "statistics",
    address: 0x3300,
    count: 20,
};

/// Blocks read every tick, in read order.
pub const CYCLE_BLOCKS: [BlockSpec; 3] = [REALTIME_BLOCK, STATUS_BLOCK, STATISTICS_BLOCK];

/// Offsets within the real-time block (0x3100).
pub mod realtime {
    pub const PV_VOLTAGE: usize = 0x00;
    pub const PV_CURRENT: usize = 0x01;
    pub const PV_POWER_LO: usize = 0x02;
    pub const PV_POWER_HI: usize = 0x03;
    pub const BATTERY_VOLTAGE: usize = 0x04;
    pub const BATTERY_CURRENT: usize = 0x05;
    pub const LOAD_VOLTAGE: usize = 0x0C;
    pub const LOAD_CURRENT: usize = 0x0D;
    pub const BATTERY_TEMPERATURE: usize = 0x10;
    pub const DEVICE_TEMPERATURE: usize = 0x11;
}

/// Offsets within the status block (0x3200).
pub mod status {
    pub const BATTERY_STATUS: usize = 0x00;
    pub const CHARGING_STATUS: usize = 0x01;
    pub const DISCHARGING_STATUS: usize = 0x02;
}

/// Offsets within the statistics block (0x3300).
pub mod statistics {
    pub const ENERGY_TODAY_LO: usize = 0x0C;
    pub const ENERGY_TODAY_HI: usize = 0x0D;
    pub const ENERGY_TOTAL_LO: usize = 0x12;
    pub const ENERGY_TOTAL_HI: usize = 0x13;
}

/// Combine a low/high register pair into a 32-bit value as `high * 65536 + low`.
///
/// Used for PV power. An earlier `low | high << 8` form gave wrong results
/// once the high register exceeded 8 bits.
#[inline]
pub fn word_pair(low: u16, high: u16) -> u32 {
    u32::from(high) * 65536 + u32::from(low)
}

/// Combine a low/high register pair as `low | (high << 8)`.
///
/// Used for the energy counters. Kept distinct from [`word_pair`]: do not
/// unify without device documentation of the counters' register width.
#[inline]
pub fn byte_shifted_pair(low: u16, high: u16) -> u32 {
    u32::from(low) | (u32::from(high) << 8)
}

/// Apply the fixed 1/100 scale.
#[inline]
pub fn scaled(raw: u32) -> f64 {
    f64::from(raw) / SCALE
}
