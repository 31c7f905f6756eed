//! Command Builder
//!
//! Builds request frames for every protocol operation. All caller input is
//! validated here, before a single byte is produced.
//!
//! Data block layouts:
//! - table get: `[param number, 0x00]`
//! - table set: `[param number, address param, value bytes...]`
//! - TDR scan:  `[start, end, span (u16 le), count (u16 le)]`
//! - EEPROM:    `[0xFF, page number, page bytes...]`

use byteorder::{ByteOrder, LittleEndian};

use super::{
    packet, BusError, Command, CommandError, TdrScanParams, BROADCAST_SERIAL, MAX_EPR_PAGE,
    PARAM_ALL, SERIAL_MASK,
};
use crate::catalog::{encode_value, ParamDescriptor, Table, Value};

/// An encoded request together with what the response must echo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Operation
    pub command: Command,
    /// Addressed serial number (or broadcast address)
    pub serial: u32,
    /// Command code put on the wire
    pub cmd: u8,
    /// Encoded frame
    pub bytes: Vec<u8>,
}

impl Request {
    fn new(command: Command, serial: u32, cmd: u8, data: Option<Vec<u8>>) -> Result<Self, BusError> {
        check_serial(serial)?;
        let bytes = packet::encode(serial, cmd, data.as_deref())?;
        tracing::trace!("built {:?} for {}: {:02x?}", command, serial, bytes);
        Ok(Self {
            command,
            serial,
            cmd,
            bytes,
        })
    }

    fn fixed(command: Command, serial: u32, data: Option<Vec<u8>>) -> Result<Self, BusError> {
        // every non-table command has a fixed code
        let cmd = command.code().unwrap_or_default();
        Self::new(command, serial, cmd, data)
    }
}

fn check_serial(serial: u32) -> Result<(), CommandError> {
    if serial & !SERIAL_MASK != 0 {
        return Err(CommandError::InvalidSerial(serial));
    }
    Ok(())
}

/// Build request frames
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandBuilder;

impl CommandBuilder {
    /// Create a builder
    pub fn new() -> Self {
        Self
    }

    /// Presence check answered by a full header frame
    pub fn long_ack(&self, serial: u32) -> Result<Request, BusError> {
        Request::fixed(Command::LongAck, serial, None)
    }

    /// Presence check answered by a single CRC byte
    pub fn short_ack(&self, serial: u32) -> Result<Request, BusError> {
        Request::fixed(Command::ShortAck, serial, None)
    }

    /// Range probe; `broadcast` encodes the range as `base | marker`
    pub fn range_ack(&self, broadcast: u32) -> Result<Request, BusError> {
        Request::fixed(Command::RangeAck, broadcast, None)
    }

    /// Serial number query addressed to everyone
    pub fn negative_ack(&self) -> Result<Request, BusError> {
        Request::fixed(Command::NegativeAck, BROADCAST_SERIAL, None)
    }

    /// Read one parameter
    pub fn get_parameter(
        &self,
        serial: u32,
        table: &Table,
        param: &ParamDescriptor,
    ) -> Result<Request, BusError> {
        Request::new(
            Command::GetParameter,
            serial,
            table.get_command,
            Some(vec![param.number, 0x00]),
        )
    }

    /// Read every parameter of `table`
    pub fn get_table(&self, serial: u32, table: &Table) -> Result<Request, BusError> {
        Request::new(
            Command::GetTable,
            serial,
            table.get_command,
            Some(vec![PARAM_ALL, 0x00]),
        )
    }

    /// Write one parameter
    pub fn set_parameter(
        &self,
        serial: u32,
        table: &Table,
        param: &ParamDescriptor,
        address_param: u8,
        value: &Value,
    ) -> Result<Request, BusError> {
        let mut data = vec![param.number, address_param];
        data.extend(encode_value(param, value)?);
        Request::new(Command::SetParameter, serial, table.set_command, Some(data))
    }

    /// Write every parameter of `table`, in ascending parameter number order
    pub fn set_table(
        &self,
        serial: u32,
        table: &Table,
        values: &[(&str, Value)],
    ) -> Result<Request, BusError> {
        let mut data = vec![PARAM_ALL, 0x00];
        for param in &table.params {
            let value = values
                .iter()
                .find(|(name, _)| *name == param.name)
                .map(|(_, v)| v)
                .ok_or_else(|| CommandError::MissingValue(param.name.clone()))?;
            data.extend(encode_value(param, value)?);
        }

        if let Some((name, _)) = values.iter().find(|(name, _)| table.param(name).is_none()) {
            return Err(CommandError::UnknownParameter {
                table: table.name.clone(),
                param: name.to_string(),
            }
            .into());
        }

        Request::new(Command::SetTable, serial, table.set_command, Some(data))
    }

    /// Start a TDR scan
    pub fn tdr_scan(&self, serial: u32, params: TdrScanParams) -> Result<Request, BusError> {
        let mut data = [0u8; 6];
        data[0] = params.start;
        data[1] = params.end;
        LittleEndian::write_u16(&mut data[2..4], params.span);
        LittleEndian::write_u16(&mut data[4..6], params.count);
        Request::fixed(Command::TdrScan, serial, Some(data.to_vec()))
    }

    /// Read one EEPROM page
    pub fn get_epr_page(&self, serial: u32, page_nr: u8) -> Result<Request, BusError> {
        Request::fixed(Command::GetEprPage, serial, Some(vec![PARAM_ALL, page_nr]))
    }

    /// Write one EEPROM page of at most 250 bytes
    pub fn set_epr_page(&self, serial: u32, page_nr: u8, page: &[u8]) -> Result<Request, BusError> {
        if page.len() > MAX_EPR_PAGE {
            return Err(CommandError::PageTooLarge(page.len()).into());
        }
        let mut data = Vec::with_capacity(page.len() + 2);
        data.push(PARAM_ALL);
        data.push(page_nr);
        data.extend_from_slice(page);
        Request::fixed(Command::SetEprPage, serial, Some(data))
    }
}
