//! Parameter Catalog
//!
//! Loads the table definitions that describe a probe's parameter groups:
//! - table name with its Get/Set command codes
//! - parameters with number, type tag, access flag and byte length
//!
//! Catalogs are JSON documents deserialized once at startup and never mutated.

mod error;
mod types;
mod values;

pub use error::CatalogError;
pub use types::*;
pub use values::{decode_value, encode_value, Value};

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::protocol::{CommandError, PARAM_NUMBER_MAX};

const BUILTIN_CATALOG: &str = include_str!("../../catalog/impbus.json");

/// Reference to a table, by name or by one of its command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRef<'a> {
    /// Table name
    Name(&'a str),
    /// Get or set command code
    Command(u8),
}

impl<'a> From<&'a str> for TableRef<'a> {
    fn from(name: &'a str) -> Self {
        TableRef::Name(name)
    }
}

impl From<u8> for TableRef<'_> {
    fn from(code: u8) -> Self {
        TableRef::Command(code)
    }
}

/// Reference to a parameter, by name or number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRef<'a> {
    /// Parameter name
    Name(&'a str),
    /// Parameter number
    Number(u8),
}

impl<'a> From<&'a str> for ParamRef<'a> {
    fn from(name: &'a str) -> Self {
        ParamRef::Name(name)
    }
}

impl From<u8> for ParamRef<'_> {
    fn from(number: u8) -> Self {
        ParamRef::Number(number)
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    tables: Vec<Table>,
}

/// Read-only set of parameter tables
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: Vec<Table>,
    by_name: HashMap<String, usize>,
    by_command: HashMap<u8, usize>,
}

impl Catalog {
    /// Load a catalog from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CatalogError::IoError(e.to_string()))?;
        Self::from_json(&content)
    }

    /// Parse a catalog from a JSON string
    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(content)?;
        Self::from_tables(file.tables)
    }

    /// The catalog shipped with the library
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Build a catalog from already deserialized tables, validating them
    pub fn from_tables(mut tables: Vec<Table>) -> Result<Self, CatalogError> {
        let mut by_name = HashMap::new();
        let mut by_command = HashMap::new();

        for (index, table) in tables.iter_mut().enumerate() {
            validate_table(table)?;
            table.params.sort_by_key(|p| p.number);

            if by_name.insert(table.name.clone(), index).is_some() {
                return Err(CatalogError::DuplicateTable(table.name.clone()));
            }
            for code in [table.get_command, table.set_command] {
                if by_command.insert(code, index).is_some() {
                    return Err(CatalogError::DuplicateCommand(code));
                }
            }
        }

        tracing::debug!("Loaded parameter catalog with {} tables", tables.len());

        Ok(Self {
            tables,
            by_name,
            by_command,
        })
    }

    /// All tables in load order
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Look up a table by name or command code
    pub fn lookup_table<'a>(&self, table: impl Into<TableRef<'a>>) -> Result<&Table, CommandError> {
        let table = table.into();
        let index = match table {
            TableRef::Name(name) => self.by_name.get(name),
            TableRef::Command(code) => self.by_command.get(&code),
        };
        index
            .map(|&i| &self.tables[i])
            .ok_or_else(|| CommandError::UnknownTable(describe_table(table)))
    }

    /// Look up a parameter of `table` by name or number
    pub fn lookup_param<'a, 'b>(
        &self,
        table: impl Into<TableRef<'a>>,
        param: impl Into<ParamRef<'b>>,
    ) -> Result<(&Table, &ParamDescriptor), CommandError> {
        let table = self.lookup_table(table)?;
        let param = param.into();
        let found = match param {
            ParamRef::Name(name) => table.param(name),
            ParamRef::Number(number) => table.param_by_number(number),
        };
        let descriptor = found.ok_or_else(|| CommandError::UnknownParameter {
            table: table.name.clone(),
            param: match param {
                ParamRef::Name(name) => name.to_string(),
                ParamRef::Number(number) => format!("#{number}"),
            },
        })?;
        Ok((table, descriptor))
    }
}

fn describe_table(table: TableRef<'_>) -> String {
    match table {
        TableRef::Name(name) => name.to_string(),
        TableRef::Command(code) => format!("command {code:#04x}"),
    }
}

fn validate_table(table: &Table) -> Result<(), CatalogError> {
    let mut names = HashSet::new();
    let mut numbers = HashSet::new();

    for param in &table.params {
        let data_type =
            DataType::from_tag(param.type_tag).ok_or_else(|| CatalogError::UnknownDataType {
                table: table.name.clone(),
                param: param.name.clone(),
                tag: param.type_tag,
            })?;

        let size = data_type.size_bytes();
        let single = !param.is_array() && param.byte_length != size;
        if param.byte_length == 0 || param.byte_length % size != 0 || single {
            return Err(CatalogError::InvalidLength {
                table: table.name.clone(),
                param: param.name.clone(),
                length: param.byte_length,
                size,
            });
        }

        if param.number == 0 || param.number > PARAM_NUMBER_MAX {
            return Err(CatalogError::ReservedNumber {
                table: table.name.clone(),
                param: param.name.clone(),
                number: param.number,
            });
        }

        if !names.insert(param.name.as_str()) || !numbers.insert(param.number) {
            return Err(CatalogError::DuplicateParameter {
                table: table.name.clone(),
                param: param.name.clone(),
            });
        }
    }
    Ok(())
}
