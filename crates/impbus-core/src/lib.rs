//! # impbus Core Library
//!
//! Master-side implementation of the IMPBUS-2 probe bus.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - CRC-8 framing of requests and responses
//! - Typed parameter encoding driven by a table catalog
//! - Bus discovery over the 24-bit serial number space
//! - A blocking bus orchestrator plus an async facade
//!
//! ## Example
//!
//! ```rust,ignore
//! use impbus_core::{catalog::Catalog, protocol::{Bus, BusConfig, SerialTransport}};
//!
//! let catalog = Catalog::builtin()?;
//! let config = BusConfig { port_name: "/dev/ttyUSB0".into(), ..Default::default() };
//! let transport = SerialTransport::new(&config.port_name);
//! let mut bus = Bus::open(transport, catalog, config)?;
//!
//! for serial in bus.scan(0, 0xFF_FFFF)? {
//!     let moist = bus.get_parameter(serial, "MEASURE_PARAMETER", "Moist")?;
//!     println!("{serial}: {moist:?}");
//! }
//! ```

pub mod catalog;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{Access, Catalog, DataType, ParamDescriptor, Table, Value};
    pub use crate::protocol::{
        AsyncBus, Bus, BusConfig, BusError, MeasureMode, Module, SerialTransport, Transport,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
