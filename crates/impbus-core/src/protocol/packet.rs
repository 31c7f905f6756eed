//! Frame encoding/decoding
//!
//! Frame format:
//! - 1 byte: state (0xFD on requests, device status on responses)
//! - 1 byte: command
//! - 1 byte: length of the data block including its CRC (0 = no data block)
//! - 3 bytes: serial number (little-endian)
//! - 1 byte: CRC-8 of the 6 bytes above
//! - N bytes: payload, followed by 1 byte CRC-8 of the payload (iff length > 0)

use byteorder::{ByteOrder, LittleEndian};

use super::crc::crc8;
use super::status;
use super::{BusError, FrameError, ProtocolError, HEADER_LEN, MAX_PAYLOAD, REQUEST_STATE, SERIAL_MASK};

/// Decoded frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol marker or device status
    pub state: u8,
    /// Command code
    pub cmd: u8,
    /// Data block length including its CRC byte
    pub length: u8,
    /// 24-bit serial number or broadcast address
    pub serial: u32,
}

impl FrameHeader {
    /// Parse and CRC-check the 7 header bytes at the start of `data`
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < HEADER_LEN {
            return Err(FrameError::LengthFieldMismatch {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }

        let expected = crc8(&data[..HEADER_LEN - 1]);
        let actual = data[HEADER_LEN - 1];
        if expected != actual {
            return Err(FrameError::BadHeaderCrc { expected, actual });
        }

        Ok(Self {
            state: data[0],
            cmd: data[1],
            length: data[2],
            serial: LittleEndian::read_u24(&data[3..6]),
        })
    }

    /// Encode the header including its CRC
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0] = self.state;
        bytes[1] = self.cmd;
        bytes[2] = self.length;
        LittleEndian::write_u24(&mut bytes[3..6], self.serial & SERIAL_MASK);
        bytes[6] = crc8(&bytes[..6]);
        bytes
    }

    /// Number of bytes following the header on the wire
    pub fn data_len(&self) -> usize {
        self.length as usize
    }
}

/// A complete frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header
    pub header: FrameHeader,
    /// Payload without its CRC byte
    pub payload: Option<Vec<u8>>,
}

impl Frame {
    /// Create a frame with the given state byte
    pub fn new(state: u8, cmd: u8, serial: u32, payload: Option<Vec<u8>>) -> Result<Self, FrameError> {
        let length = match &payload {
            Some(data) if data.len() > MAX_PAYLOAD => return Err(FrameError::Oversize(data.len())),
            Some(data) => data.len() as u8 + 1,
            None => 0,
        };

        Ok(Self {
            header: FrameHeader {
                state,
                cmd,
                length,
                serial: serial & SERIAL_MASK,
            },
            payload,
        })
    }

    /// Create a request frame (state 0xFD)
    pub fn request(cmd: u8, serial: u32, payload: Option<Vec<u8>>) -> Result<Self, FrameError> {
        Self::new(REQUEST_STATE, cmd, serial, payload)
    }

    /// Decode and validate a frame, including the device status
    pub fn from_bytes(data: &[u8]) -> Result<Self, BusError> {
        let header = FrameHeader::from_bytes(data)?;

        if !status::is_ok(header.state) {
            return Err(ProtocolError::DeviceStatus(header.state).into());
        }

        let total = HEADER_LEN + header.data_len();
        if data.len() != total {
            return Err(FrameError::LengthFieldMismatch {
                expected: total,
                actual: data.len(),
            }
            .into());
        }

        if header.length == 0 {
            return Ok(Self { header, payload: None });
        }

        let block = &data[HEADER_LEN..];
        let (payload, crc) = block.split_at(block.len() - 1);
        let expected = crc8(payload);
        if expected != crc[0] {
            return Err(FrameError::BadDataCrc {
                expected,
                actual: crc[0],
            }
            .into());
        }

        if payload.len() > MAX_PAYLOAD {
            return Err(FrameError::Oversize(payload.len()).into());
        }

        Ok(Self {
            header,
            payload: Some(payload.to_vec()),
        })
    }

    /// Encode the frame to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_size());
        bytes.extend_from_slice(&self.header.to_bytes());

        if let Some(payload) = &self.payload {
            bytes.extend_from_slice(payload);
            bytes.push(crc8(payload));
        }

        bytes
    }

    /// Get the total encoded size
    pub fn encoded_size(&self) -> usize {
        HEADER_LEN + self.header.data_len()
    }

    /// Payload bytes, empty when there is no data block
    pub fn data(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or_default()
    }
}

/// Encode a request frame
pub fn encode(serial: u32, cmd: u8, data: Option<&[u8]>) -> Result<Vec<u8>, FrameError> {
    Ok(Frame::request(cmd, serial, data.map(<[u8]>::to_vec))?.to_bytes())
}

/// Decode a response frame into its header and payload
pub fn decode(data: &[u8]) -> Result<(FrameHeader, Option<Vec<u8>>), BusError> {
    let frame = Frame::from_bytes(data)?;
    Ok((frame.header, frame.payload))
}
