//! Protocol errors

use thiserror::Error;

use super::status::status_message;
use crate::catalog::CatalogError;

/// Wire-format violations found while decoding a frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Header CRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    BadHeaderCrc { expected: u8, actual: u8 },

    #[error("Data CRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    BadDataCrc { expected: u8, actual: u8 },

    #[error("Payload of {0} bytes exceeds the 252 byte limit")]
    Oversize(usize),

    #[error("Length field announces {expected} bytes, frame holds {actual}")]
    LengthFieldMismatch { expected: usize, actual: usize },
}

/// Errors reported by the responding module
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Module reported status {0:#04x}: {msg}", msg = status_message(*.0))]
    DeviceStatus(u8),
}

/// Responses that decode but do not answer the request that was sent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("Response serial {actual} does not match request serial {expected}")]
    SerialMismatch { expected: u32, actual: u32 },

    #[error("Response command {actual:#04x} does not match expected {expected:#04x}")]
    CommandMismatch { expected: u8, actual: u8 },

    #[error("Malformed payload length {actual} (expected {expected})")]
    MalformedLength { expected: String, actual: usize },
}

/// Caller input rejected before anything is sent
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Parameter '{0}' is read-only")]
    NotWritable(String),

    #[error("Parameter '{param}' takes {expected} values, got {actual}")]
    LengthMismatch {
        param: String,
        expected: usize,
        actual: usize,
    },

    #[error("Value {value} does not fit parameter '{param}'")]
    ValueOutOfRange { param: String, value: f64 },

    #[error("EEPROM page of {0} bytes exceeds the 250 byte limit")]
    PageTooLarge(usize),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown parameter '{param}' in table '{table}'")]
    UnknownParameter { table: String, param: String },

    #[error("Serial number {0:#x} does not fit in 24 bits")]
    InvalidSerial(u32),

    #[error("Module {0} is locked, unlock it before writing protected tables")]
    Locked(u32),

    #[error("Missing value for parameter '{0}'")]
    MissingValue(String),

    #[error("Parameter '{param}' has unknown data type {tag:#04x}")]
    UnknownDataType { param: String, tag: u8 },
}

/// Errors that can occur during bus communication
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("No response within timeout")]
    Timeout,

    #[error("Value not confirmed after {attempts} attempts")]
    ConfirmationFailed { attempts: u32 },

    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Transport is not open")]
    NotConnected,

    #[error("Bus task failed: {0}")]
    TaskFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    /// Whether the error is a read timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, BusError::Timeout)
    }
}

impl From<serialport::Error> for BusError {
    fn from(e: serialport::Error) -> Self {
        BusError::Serial(e.to_string())
    }
}
