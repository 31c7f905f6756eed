//! IMPBUS-2 Protocol
//!
//! Implements the master side of the IMPBUS-2 probe bus.
//!
//! Every exchange is a request frame followed by at most one response:
//! a 7-byte header protected by a CRC-8, optionally followed by a data
//! block carrying its own CRC-8.

mod async_bus;
mod bus;
pub mod command_builder;
pub mod commands;
pub mod crc;
mod error;
pub mod packet;
pub mod response;
pub mod scanner;
pub mod serial;
pub mod status;

pub use async_bus::AsyncBus;
pub use bus::{Bus, BusConfig, Module};
pub use command_builder::{CommandBuilder, Request};
pub use commands::{Command, MeasureMode, TdrPoint, TdrScanParams};
pub use error::{BusError, CommandError, FrameError, ProtocolError, ResponseError};
pub use packet::{Frame, FrameHeader};
pub use response::ResponseParser;
pub use scanner::{scan, AddressRange, Probe};
pub use serial::{list_ports, PortInfo, SerialTransport, Transport};

/// Default baud rate of freshly shipped modules
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Baud rates a module can be configured to, ascending
pub const BAUD_RATES: [u32; 4] = [1200, 2400, 4800, 9600];

/// Default timeout for responses in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// State byte carried by every request
pub const REQUEST_STATE: u8 = 0xFD;

/// Size of the frame header including its CRC
pub const HEADER_LEN: usize = 7;

/// Maximum payload of a data block (excluding its CRC byte)
pub const MAX_PAYLOAD: usize = 252;

/// Maximum size of an EEPROM page written in one frame
pub const MAX_EPR_PAGE: usize = 250;

/// Serial numbers are 24 bits wide
pub const SERIAL_MASK: u32 = 0x00FF_FFFF;

/// All-ones address reaching every module
pub const BROADCAST_SERIAL: u32 = SERIAL_MASK;

/// Highest ordinary parameter number
pub const PARAM_NUMBER_MAX: u8 = 0xFA;

/// Reserved parameter number: configuration id
pub const PARAM_CONFIG_ID: u8 = 0xFB;
/// Reserved parameter number: table size
pub const PARAM_TABLE_SIZE: u8 = 0xFC;
/// Reserved parameter number: table descriptor
pub const PARAM_TABLE_DESCRIPTOR: u8 = 0xFD;
/// Reserved parameter number: group data length
pub const PARAM_DATA_LENGTH: u8 = 0xFE;
/// Reserved parameter number: every parameter of the group
pub const PARAM_ALL: u8 = 0xFF;
