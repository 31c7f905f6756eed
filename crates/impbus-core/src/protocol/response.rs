//! Response parsing
//!
//! Validates a response against the request that produced it and decodes
//! its payload. Responses are matched purely by position: the bytes passed
//! in always belong to the request passed alongside.

use byteorder::{ByteOrder, LittleEndian};

use super::crc::crc8;
use super::{
    packet, BusError, Command, FrameHeader, Request, ResponseError, TdrPoint, SERIAL_MASK,
};
use crate::catalog::{decode_value, ParamDescriptor, Table, Value};

const TDR_POINT_LEN: usize = 5;

/// Parse responses for each protocol operation
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    /// Create a parser
    pub fn new() -> Self {
        Self
    }

    /// Long acknowledge: the echoed serial must match
    pub fn long_ack(&self, request: &Request, response: &[u8]) -> Result<bool, BusError> {
        let (header, _) = packet::decode(response)?;
        check_serial(request, &header)?;
        Ok(true)
    }

    /// Short acknowledge: one raw byte equal to the CRC of the serial
    pub fn short_ack(&self, request: &Request, response: &[u8]) -> bool {
        let mut serial = [0u8; 3];
        LittleEndian::write_u24(&mut serial, request.serial);
        match response {
            [byte] => *byte == crc8(&serial),
            _ => false,
        }
    }

    /// Range acknowledge: any single byte means somebody answered
    pub fn range_ack(&self, response: &[u8]) -> bool {
        response.len() == 1
    }

    /// Negative acknowledge: serial number of the answering module
    pub fn negative_ack(&self, response: &[u8]) -> Result<u32, BusError> {
        let (_, payload) = packet::decode(response)?;
        let payload = payload.unwrap_or_default();
        if payload.is_empty() || payload.len() > 4 {
            return Err(ResponseError::MalformedLength {
                expected: "1 to 4".to_string(),
                actual: payload.len(),
            }
            .into());
        }
        let mut word = [0u8; 4];
        word[..payload.len()].copy_from_slice(&payload);
        Ok(LittleEndian::read_u32(&word) & SERIAL_MASK)
    }

    /// Single parameter read
    pub fn get_parameter(
        &self,
        request: &Request,
        table: &Table,
        param: &ParamDescriptor,
        response: &[u8],
    ) -> Result<Value, BusError> {
        let payload = self.table_payload(request, table, response)?;
        check_length(param.byte_length, payload.len())?;
        Ok(decode_value(param, &payload))
    }

    /// Whole table read, decoded in ascending parameter number order
    pub fn get_table(
        &self,
        request: &Request,
        table: &Table,
        response: &[u8],
    ) -> Result<Vec<(String, Value)>, BusError> {
        let payload = self.table_payload(request, table, response)?;
        check_length(table.data_length(), payload.len())?;

        let mut offset = 0;
        let mut values = Vec::with_capacity(table.params.len());
        for param in &table.params {
            let end = offset + param.byte_length;
            values.push((param.name.clone(), decode_value(param, &payload[offset..end])));
            offset = end;
        }
        Ok(values)
    }

    /// Parameter or table write acknowledgement
    pub fn set(&self, request: &Request, table: &Table, response: &[u8]) -> Result<bool, BusError> {
        let (header, _) = packet::decode(response)?;
        check_command(table.set_command, &header)?;
        check_serial(request, &header)?;
        Ok(true)
    }

    /// TDR curve as (amplitude, time) points
    pub fn tdr_scan(&self, request: &Request, response: &[u8]) -> Result<Vec<TdrPoint>, BusError> {
        let payload = self.fixed_payload(request, response)?;
        if payload.len() % TDR_POINT_LEN != 0 {
            return Err(ResponseError::MalformedLength {
                expected: format!("multiple of {TDR_POINT_LEN}"),
                actual: payload.len(),
            }
            .into());
        }

        Ok(payload
            .chunks_exact(TDR_POINT_LEN)
            .map(|chunk| TdrPoint {
                tdr: chunk[0],
                time: LittleEndian::read_f32(&chunk[1..]),
            })
            .collect())
    }

    /// Raw EEPROM page bytes
    pub fn get_epr_page(&self, request: &Request, response: &[u8]) -> Result<Vec<u8>, BusError> {
        self.fixed_payload(request, response)
    }

    /// EEPROM page write acknowledgement
    pub fn set_epr_page(&self, request: &Request, response: &[u8]) -> Result<bool, BusError> {
        let (header, _) = packet::decode(response)?;
        check_command(Command::SetEprPage.code().unwrap_or_default(), &header)?;
        check_serial(request, &header)?;
        Ok(true)
    }

    fn table_payload(&self, request: &Request, table: &Table, response: &[u8]) -> Result<Vec<u8>, BusError> {
        let (header, payload) = packet::decode(response)?;
        check_command(table.get_command, &header)?;
        check_serial(request, &header)?;
        Ok(payload.unwrap_or_default())
    }

    fn fixed_payload(&self, request: &Request, response: &[u8]) -> Result<Vec<u8>, BusError> {
        let (header, payload) = packet::decode(response)?;
        check_command(request.cmd, &header)?;
        check_serial(request, &header)?;
        Ok(payload.unwrap_or_default())
    }
}

fn check_serial(request: &Request, header: &FrameHeader) -> Result<(), ResponseError> {
    if header.serial != request.serial {
        return Err(ResponseError::SerialMismatch {
            expected: request.serial,
            actual: header.serial,
        });
    }
    Ok(())
}

fn check_command(expected: u8, header: &FrameHeader) -> Result<(), ResponseError> {
    if header.cmd != expected {
        return Err(ResponseError::CommandMismatch {
            expected,
            actual: header.cmd,
        });
    }
    Ok(())
}

fn check_length(expected: usize, actual: usize) -> Result<(), ResponseError> {
    if expected != actual {
        return Err(ResponseError::MalformedLength {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
