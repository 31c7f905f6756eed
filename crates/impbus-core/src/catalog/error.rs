//! Error types for catalog loading

use thiserror::Error;

/// Errors that can occur while loading a parameter catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Unknown data type {tag:#04x} for '{table}.{param}'")]
    UnknownDataType { table: String, param: String, tag: u8 },

    #[error("Parameter '{table}.{param}': length {length} is not a multiple of {size}")]
    InvalidLength {
        table: String,
        param: String,
        length: usize,
        size: usize,
    },

    #[error("Parameter '{table}.{param}': number {number:#04x} is reserved")]
    ReservedNumber { table: String, param: String, number: u8 },

    #[error("Duplicate table '{0}'")]
    DuplicateTable(String),

    #[error("Duplicate parameter '{param}' in table '{table}'")]
    DuplicateParameter { table: String, param: String },

    #[error("Command code {0:#04x} used by more than one table")]
    DuplicateCommand(u8),
}
