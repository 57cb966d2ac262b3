//! Charging status register (0x3201)
//!
//! | Bits | Meaning |
//! |------|---------|
//! | 0 | Running |
//! | 1 | Fault |
//! | 2-3 | Charge stage: 0 none, 1 float, 2 boost, 3 equalization |
//! | 4 | PV input short |
//! | 7 | Load MOSFET short |
//! | 8 | Load short |
//! | 9 | Load over-current |
//! | 10 | Input over-current |
//! | 11 | Anti-reverse MOSFET short |
//! | 12 | Charging or anti-reverse MOSFET short |
//! | 13 | Charging MOSFET short |
//! | 14-15 | Input voltage: 0 normal, 1 no power, 2 too high, 3 error |
//!
//! The fault detail bits are exposed for diagnostics only. They are not
//! turned into error codes: the controller reports them unreliably.

use std::fmt;

/// Device-native charge stage (bits 2-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChargeStage {
    NoCharging,
    Float,
    Boost,
    Equalization,
}

impl ChargeStage {
    /// Decode from the 2-bit stage code.
    #[inline]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::NoCharging,
            1 => Self::Float,
            2 => Self::Boost,
            _ => Self::Equalization,
        }
    }
}

/// Operating state published on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingState {
    Off,
    Float,
    Boost,
    Equalization,
    Fault,
}

/// Charge stage code → operating state, indexed by `bit3 * 2 + bit2`.
const STAGE_TABLE: [OperatingState; 4] = [
    OperatingState::Off,
    OperatingState::Float,
    OperatingState::Boost,
    OperatingState::Equalization,
];

impl OperatingState {
    /// Numeric state code of the bus vocabulary.
    #[inline]
    pub fn code(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Fault => 2,
            Self::Boost => 3,
            Self::Float => 5,
            Self::Equalization => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Float => "Float",
            Self::Boost => "Boost",
            Self::Equalization => "Equalization",
            Self::Fault => "Fault",
        }
    }
}

impl From<ChargeStage> for OperatingState {
    fn from(stage: ChargeStage) -> Self {
        STAGE_TABLE[stage as usize]
    }
}

impl fmt::Display for OperatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input voltage status (bits 14-15).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputVoltageStatus {
    Normal,
    NoPower,
    HigherVoltage,
    Error,
}

/// Typed view over the raw charging status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChargingStatus(u16);

impl ChargingStatus {
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(&self) -> u16 {
        self.0
    }

    #[inline]
    fn bit(&self, index: u8) -> bool {
        self.0 & (1 << index) != 0
    }

    pub fn is_running(&self) -> bool {
        self.bit(0)
    }

    pub fn is_fault(&self) -> bool {
        self.bit(1)
    }

    /// Stage code `bit3 * 2 + bit2`.
    pub fn charge_stage(&self) -> ChargeStage {
        ChargeStage::from_bits(((self.0 >> 2) & 0b11) as u8)
    }

    /// Fault takes precedence over the charge stage.
    pub fn operating_state(&self) -> OperatingState {
        if self.is_fault() {
            OperatingState::Fault
        } else {
            self.charge_stage().into()
        }
    }

    pub fn pv_input_short(&self) -> bool {
        self.bit(4)
    }

    pub fn load_mosfet_short(&self) -> bool {
        self.bit(7)
    }

    pub fn load_short(&self) -> bool {
        self.bit(8)
    }

    pub fn load_over_current(&self) -> bool {
        self.bit(9)
    }

    pub fn input_over_current(&self) -> bool {
        self.bit(10)
    }

    pub fn anti_reverse_mosfet_short(&self) -> bool {
        self.bit(11)
    }

    pub fn charging_or_anti_reverse_mosfet_short(&self) -> bool {
        self.bit(12)
    }

    pub fn charging_mosfet_short(&self) -> bool {
        self.bit(13)
    }

    pub fn input_voltage_status(&self) -> InputVoltageStatus {
        match (self.0 >> 14) & 0b11 {
            0 => InputVoltageStatus::Normal,
            1 => InputVoltageStatus::NoPower,
            2 => InputVoltageStatus::HigherVoltage,
            _ => InputVoltageStatus::Error,
        }
    }
}

impl From<u16> for ChargingStatus {
    fn from(raw: u16) -> Self {
        Self::new(raw)
    }
}
