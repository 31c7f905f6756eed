//! Protocol commands
//!
//! Defines the operations of the IMPBUS-2 protocol. Table reads and writes
//! take their command code from the catalog; all other operations use fixed
//! codes.

use serde::{Deserialize, Serialize};

/// Protocol operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Addressed presence check answered with a full frame
    LongAck,
    /// Addressed presence check answered with a single CRC byte
    ShortAck,
    /// Broadcast presence check over an address range
    RangeAck,
    /// Ask the only module on the bus for its serial number
    NegativeAck,
    /// Read one parameter of a table
    GetParameter,
    /// Write one parameter of a table
    SetParameter,
    /// Read every parameter of a table
    GetTable,
    /// Write every parameter of a table
    SetTable,
    /// Read a TDR curve
    TdrScan,
    /// Read one EEPROM page
    GetEprPage,
    /// Write one EEPROM page
    SetEprPage,
}

impl Command {
    /// Fixed command code, `None` for table operations
    pub fn code(&self) -> Option<u8> {
        match self {
            Command::LongAck => Some(0x02),
            Command::ShortAck => Some(0x04),
            Command::RangeAck => Some(0x06),
            Command::NegativeAck => Some(0x08),
            Command::TdrScan => Some(0x1E),
            Command::GetEprPage => Some(0x3C),
            Command::SetEprPage => Some(0x3D),
            Command::GetParameter
            | Command::SetParameter
            | Command::GetTable
            | Command::SetTable => None,
        }
    }

    /// Time the module needs to process the request before it answers, in milliseconds
    pub fn process_time_ms(&self) -> u64 {
        match self {
            Command::LongAck | Command::ShortAck | Command::RangeAck | Command::NegativeAck => 5,
            Command::GetParameter | Command::GetTable => 10,
            Command::SetParameter | Command::SetTable => 50,
            Command::TdrScan => 500,
            Command::GetEprPage => 20,
            Command::SetEprPage => 100,
        }
    }
}

/// Parameters of a TDR scan request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TdrScanParams {
    /// First sample point
    pub start: u8,
    /// Last sample point
    pub end: u8,
    /// Sample span
    pub span: u16,
    /// Number of samples averaged per point
    pub count: u16,
}

impl TdrScanParams {
    /// Bundle scan parameters
    pub fn new(start: u8, end: u8, span: u16, count: u16) -> Self {
        Self {
            start,
            end,
            span,
            count,
        }
    }
}

/// One point of a TDR curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TdrPoint {
    /// TDR amplitude
    pub tdr: u8,
    /// Time of the sample
    pub time: f32,
}

/// Measurement modes stored in `ACTION_PARAMETER.MeasMode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasureMode {
    /// Measure on request
    ModeA,
    /// Single measurement after power-up
    ModeB,
    /// Cyclic measurement
    ModeC,
}

impl MeasureMode {
    /// Value written to the module
    pub fn value(&self) -> u8 {
        match self {
            MeasureMode::ModeA => 0,
            MeasureMode::ModeB => 1,
            MeasureMode::ModeC => 2,
        }
    }

    /// Mode for a value read back from the module
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(MeasureMode::ModeA),
            1 => Some(MeasureMode::ModeB),
            2 => Some(MeasureMode::ModeC),
            _ => None,
        }
    }
}
