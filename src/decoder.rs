//! Register blocks → telemetry snapshot
//!
//! [`decode`] is a pure function: the same three blocks always produce the
//! same snapshot. It has no error path; the poll cycle validates block
//! lengths with [`BlockSpec::validate`](crate::registers::BlockSpec::validate)
//! before calling it, and a mis-sized block here is a programming error.

use crate::registers::{
    byte_shifted_pair, realtime, scaled, statistics, status, word_pair, REALTIME_BLOCK,
    STATISTICS_BLOCK, STATUS_BLOCK,
};
use crate::status::{ChargingStatus, OperatingState};

/// Load output state published for controllers without a load terminal.
pub const LOAD_STATE_NONE: u8 = 0;

/// Error code published every cycle.
pub const ERROR_CODE_NONE: u16 = 0;

/// Decoded output of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    /// Battery voltage (V)
    pub dc_voltage: f64,
    /// Battery charging current (A)
    pub dc_current: f64,
    /// Battery temperature (°C)
    pub dc_temperature: f64,
    /// PV array voltage (V), never below 0.01
    pub pv_voltage: f64,
    /// PV input power (W)
    pub yield_power: f64,
    /// Load current (A)
    pub load_current: f64,
    pub operating_state: OperatingState,
    pub load_state: u8,
    /// Energy generated today (kWh)
    pub daily_yield: f64,
    /// Total energy generated (kWh)
    pub total_yield: f64,
    pub error_code: u16,
    /// Raw charging status, kept for diagnostics
    pub charging_status: ChargingStatus,
}

impl TelemetrySnapshot {
    /// PV current derived from power and voltage (A).
    ///
    /// Never divides by zero thanks to the PV voltage floor.
    pub fn pv_current(&self) -> f64 {
        self.yield_power / self.pv_voltage
    }
}

/// Decode the real-time (0x3100), status (0x3200) and statistics (0x3300) blocks.
///
/// # Panics
///
/// Panics if a block does not have its fixed register count (18, 3, 20).
pub fn decode(realtime: &[u16], status: &[u16], statistics: &[u16]) -> TelemetrySnapshot {
    assert_eq!(
        realtime.len(),
        usize::from(REALTIME_BLOCK.count),
        "real-time block must hold {} registers",
        REALTIME_BLOCK.count
    );
    assert_eq!(
        status.len(),
        usize::from(STATUS_BLOCK.count),
        "status block must hold {} registers",
        STATUS_BLOCK.count
    );
    assert_eq!(
        statistics.len(),
        usize::from(STATISTICS_BLOCK.count),
        "statistics block must hold {} registers",
        STATISTICS_BLOCK.count
    );

    let analog = |offset: usize| scaled(u32::from(realtime[offset]));
    let pv_voltage_raw = realtime[realtime::PV_VOLTAGE].max(1);
    let charging_status = ChargingStatus::new(status[status::CHARGING_STATUS]);

    TelemetrySnapshot {
        dc_voltage: analog(realtime::BATTERY_VOLTAGE),
        dc_current: analog(realtime::BATTERY_CURRENT),
        dc_temperature: analog(realtime::BATTERY_TEMPERATURE),
        pv_voltage: scaled(u32::from(pv_voltage_raw)),
        yield_power: scaled(word_pair(
            realtime[realtime::PV_POWER_LO],
            realtime[realtime::PV_POWER_HI],
        )),
        load_current: analog(realtime::LOAD_CURRENT),
        operating_state: charging_status.operating_state(),
        load_state: LOAD_STATE_NONE,
        daily_yield: scaled(byte_shifted_pair(
            statistics[statistics::ENERGY_TODAY_LO],
            statistics[statistics::ENERGY_TODAY_HI],
        )),
        total_yield: scaled(byte_shifted_pair(
            statistics[statistics::ENERGY_TOTAL_LO],
            statistics[statistics::ENERGY_TOTAL_HI],
        )),
        error_code: ERROR_CODE_NONE,
        charging_status,
    }
}
