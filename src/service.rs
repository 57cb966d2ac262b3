//! Bus service layout and per-cycle publishing
//!
//! [`register_service`] declares every path once at startup;
//! [`publish`] writes one cycle's values and commits them together.

use tracing::debug;

use crate::aggregate::DailyAggregate;
use crate::config::DeviceIdentity;
use crate::decoder::TelemetrySnapshot;
use crate::error::TracerResult;
use crate::sink::TelemetrySink;
use crate::value::{SinkValue, Unit};

/// Bus path names.
pub mod paths {
    // Management
    pub const PROCESS_NAME: &str = "/Mgmt/ProcessName";
    pub const PROCESS_VERSION: &str = "/Mgmt/ProcessVersion";
    pub const CONNECTION: &str = "/Mgmt/Connection";

    // Identity
    pub const DEVICE_INSTANCE: &str = "/DeviceInstance";
    pub const PRODUCT_ID: &str = "/ProductId";
    pub const PRODUCT_NAME: &str = "/ProductName";
    pub const FIRMWARE_VERSION: &str = "/FirmwareVersion";
    pub const HARDWARE_VERSION: &str = "/HardwareVersion";
    pub const CONNECTED: &str = "/Connected";
    pub const SERIAL: &str = "/Serial";
    pub const CUSTOM_NAME: &str = "/CustomName";
    pub const NETWORK_MODE: &str = "/Link/NetworkMode";
    pub const NETWORK_STATUS: &str = "/Link/NetworkStatus";
    pub const BMS_PRESENT: &str = "/Settings/BmsPresent";

    // Telemetry
    pub const DC_VOLTAGE: &str = "/Dc/0/Voltage";
    pub const DC_CURRENT: &str = "/Dc/0/Current";
    pub const DC_TEMPERATURE: &str = "/Dc/0/Temperature";
    pub const PV_VOLTAGE: &str = "/Pv/V";
    pub const YIELD_POWER: &str = "/Yield/Power";
    pub const YIELD_USER: &str = "/Yield/User";
    pub const LOAD_STATE: &str = "/Load/State";
    pub const LOAD_CURRENT: &str = "/Load/I";
    pub const STATE: &str = "/State";
    pub const ERROR_CODE: &str = "/ErrorCode";

    // History
    pub const TODAY_YIELD: &str = "/History/Daily/0/Yield";
    pub const TODAY_MAX_POWER: &str = "/History/Daily/0/MaxPower";
    pub const YESTERDAY_YIELD: &str = "/History/Daily/1/Yield";
    pub const YESTERDAY_MAX_POWER: &str = "/History/Daily/1/MaxPower";
}

/// Network status reported on `/Link/NetworkStatus` (standalone).
const NETWORK_STATUS_STANDALONE: i64 = 4;

/// Telemetry paths that start empty, with their display unit.
const TELEMETRY_PATHS: [(&str, Option<Unit>); 8] = [
    (paths::DC_CURRENT, Some(Unit::Amp)),
    (paths::DC_VOLTAGE, Some(Unit::Volt)),
    (paths::DC_TEMPERATURE, Some(Unit::Celsius)),
    (paths::LOAD_STATE, None),
    (paths::PV_VOLTAGE, Some(Unit::Volt)),
    (paths::YIELD_POWER, Some(Unit::Watt)),
    (paths::YIELD_USER, Some(Unit::KiloWattHour)),
    (paths::LOAD_CURRENT, Some(Unit::Amp)),
];

/// Paths that start at zero.
const ZEROED_PATHS: [&str; 6] = [
    paths::STATE,
    paths::ERROR_CODE,
    paths::TODAY_YIELD,
    paths::TODAY_MAX_POWER,
    paths::YESTERDAY_YIELD,
    paths::YESTERDAY_MAX_POWER,
];

/// Declare the full path set and commit the initial values.
pub fn register_service<S: TelemetrySink + ?Sized>(
    sink: &mut S,
    identity: &DeviceIdentity,
    process_name: &str,
    port_name: &str,
) -> TracerResult<()> {
    debug!(
        "Registering {} (instance {})",
        identity.service_name(port_name),
        identity.device_instance
    );

    sink.add_path(paths::PROCESS_NAME, process_name.into(), None)?;
    sink.add_path(
        paths::PROCESS_VERSION,
        identity.software_version.as_str().into(),
        None,
    )?;
    sink.add_path(paths::CONNECTION, identity.connection.as_str().into(), None)?;

    sink.add_path(paths::DEVICE_INSTANCE, identity.device_instance.into(), None)?;
    sink.add_path(paths::PRODUCT_ID, identity.product_id.into(), None)?;
    sink.add_path(paths::PRODUCT_NAME, identity.product_name.as_str().into(), None)?;
    sink.add_path(
        paths::FIRMWARE_VERSION,
        SinkValue::Int(i64::try_from(identity.firmware_version).unwrap_or(i64::MAX)),
        None,
    )?;
    sink.add_path(
        paths::HARDWARE_VERSION,
        identity.hardware_version.as_str().into(),
        None,
    )?;
    sink.add_path(paths::CONNECTED, SinkValue::Int(1), None)?;
    sink.add_path(paths::SERIAL, identity.serial_number.as_str().into(), None)?;
    sink.add_path(paths::CUSTOM_NAME, SinkValue::Empty, None)?;
    sink.add_path(paths::NETWORK_MODE, SinkValue::Int(0), None)?;
    sink.add_path(
        paths::NETWORK_STATUS,
        SinkValue::Int(NETWORK_STATUS_STANDALONE),
        None,
    )?;
    sink.add_path(paths::BMS_PRESENT, SinkValue::Int(1), None)?;

    for (path, unit) in TELEMETRY_PATHS {
        sink.add_path(path, SinkValue::Empty, unit)?;
    }
    for path in ZEROED_PATHS {
        sink.add_path(path, SinkValue::Int(0), None)?;
    }

    sink.commit()
}

/// Write one cycle's snapshot and daily aggregate, then commit.
pub fn publish<S: TelemetrySink + ?Sized>(
    sink: &mut S,
    snapshot: &TelemetrySnapshot,
    aggregate: &DailyAggregate,
) -> TracerResult<()> {
    sink.set(paths::DC_VOLTAGE, snapshot.dc_voltage.into())?;
    sink.set(paths::DC_CURRENT, snapshot.dc_current.into())?;
    sink.set(paths::DC_TEMPERATURE, snapshot.dc_temperature.into())?;
    sink.set(paths::PV_VOLTAGE, snapshot.pv_voltage.into())?;
    sink.set(paths::YIELD_POWER, snapshot.yield_power.into())?;
    sink.set(paths::LOAD_CURRENT, snapshot.load_current.into())?;
    sink.set(paths::STATE, snapshot.operating_state.code().into())?;
    sink.set(paths::LOAD_STATE, snapshot.load_state.into())?;
    sink.set(paths::YIELD_USER, snapshot.total_yield.into())?;
    sink.set(paths::ERROR_CODE, snapshot.error_code.into())?;
    sink.set(paths::TODAY_YIELD, aggregate.yield_today.into())?;
    sink.set(paths::TODAY_MAX_POWER, aggregate.max_power_today.into())?;
    sink.commit()
}
