//! Table and parameter metadata

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Set in a type tag when the parameter holds an array of the scalar type
pub const ARRAY_FLAG: u8 = 0x80;

/// Wire scalar types, selected by the low 7 bits of a type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Unsigned 8-bit integer
    U08,
    /// Signed 8-bit integer
    S08,
    /// Unsigned 16-bit integer
    U16,
    /// Signed 16-bit integer
    S16,
    /// Unsigned 32-bit integer
    U32,
    /// Signed 32-bit integer
    S32,
    /// 32-bit floating point
    F32,
    /// 64-bit floating point (double)
    F64,
}

impl DataType {
    /// Resolve a type tag; the array flag is ignored
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag & !ARRAY_FLAG {
            0x00 => Some(DataType::U08),
            0x01 => Some(DataType::S08),
            0x02 => Some(DataType::U16),
            0x03 => Some(DataType::S16),
            0x04 => Some(DataType::U32),
            0x05 => Some(DataType::S32),
            0x06 => Some(DataType::F32),
            0x07 => Some(DataType::F64),
            _ => None,
        }
    }

    /// Scalar tag of this type (without array flag)
    pub fn tag(&self) -> u8 {
        match self {
            DataType::U08 => 0x00,
            DataType::S08 => 0x01,
            DataType::U16 => 0x02,
            DataType::S16 => 0x03,
            DataType::U32 => 0x04,
            DataType::S32 => 0x05,
            DataType::F32 => 0x06,
            DataType::F64 => 0x07,
        }
    }

    /// Get the size in bytes for this data type
    pub fn size_bytes(&self) -> usize {
        match self {
            DataType::U08 | DataType::S08 => 1,
            DataType::U16 | DataType::S16 => 2,
            DataType::U32 | DataType::S32 | DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }

    /// Whether the type is an integer type
    pub fn is_integer(&self) -> bool {
        !matches!(self, DataType::F32 | DataType::F64)
    }

    /// Inclusive range of native values representable by an integer type
    pub fn integer_range(&self) -> Option<(f64, f64)> {
        match self {
            DataType::U08 => Some((0.0, u8::MAX as f64)),
            DataType::S08 => Some((i8::MIN as f64, i8::MAX as f64)),
            DataType::U16 => Some((0.0, u16::MAX as f64)),
            DataType::S16 => Some((i16::MIN as f64, i16::MAX as f64)),
            DataType::U32 => Some((0.0, u32::MAX as f64)),
            DataType::S32 => Some((i32::MIN as f64, i32::MAX as f64)),
            DataType::F32 | DataType::F64 => None,
        }
    }

    /// Read one little-endian scalar from the start of `bytes`
    pub fn read_le(&self, bytes: &[u8]) -> f64 {
        match self {
            DataType::U08 => bytes[0] as f64,
            DataType::S08 => bytes[0] as i8 as f64,
            DataType::U16 => LittleEndian::read_u16(bytes) as f64,
            DataType::S16 => LittleEndian::read_i16(bytes) as f64,
            DataType::U32 => LittleEndian::read_u32(bytes) as f64,
            DataType::S32 => LittleEndian::read_i32(bytes) as f64,
            DataType::F32 => LittleEndian::read_f32(bytes) as f64,
            DataType::F64 => LittleEndian::read_f64(bytes),
        }
    }

    /// Append one little-endian scalar to `out`; the caller range-checks `value`
    pub fn write_le(&self, out: &mut Vec<u8>, value: f64) {
        let mut buf = [0u8; 8];
        let size = self.size_bytes();
        match self {
            DataType::U08 => buf[0] = value as u8,
            DataType::S08 => buf[0] = value as i8 as u8,
            DataType::U16 => LittleEndian::write_u16(&mut buf, value as u16),
            DataType::S16 => LittleEndian::write_i16(&mut buf, value as i16),
            DataType::U32 => LittleEndian::write_u32(&mut buf, value as u32),
            DataType::S32 => LittleEndian::write_i32(&mut buf, value as i32),
            DataType::F32 => LittleEndian::write_f32(&mut buf, value as f32),
            DataType::F64 => LittleEndian::write_f64(&mut buf, value),
        }
        out.extend_from_slice(&buf[..size]);
    }
}

/// Access rights of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    /// Read-only
    #[serde(rename = "r")]
    ReadOnly,
    /// Read and write
    #[serde(rename = "rw")]
    ReadWrite,
}

/// Metadata of a single parameter inside a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDescriptor {
    /// Parameter name, unique within its table
    pub name: String,
    /// Parameter number (0x01..=0xFA)
    pub number: u8,
    /// Raw type tag, low 7 bits scalar type, high bit array flag
    #[serde(rename = "type")]
    pub type_tag: u8,
    /// Read/write flag
    pub access: Access,
    /// Total encoded size in bytes
    #[serde(rename = "length")]
    pub byte_length: usize,
}

impl ParamDescriptor {
    /// Scalar type of the parameter.
    ///
    /// Tags are validated when the catalog is loaded, so unknown tags only
    /// show up for hand-built descriptors. Those read as `U08` here, and
    /// `encode_value` refuses to write them.
    pub fn data_type(&self) -> DataType {
        DataType::from_tag(self.type_tag).unwrap_or(DataType::U08)
    }

    /// Whether the parameter is an array of its scalar type
    pub fn is_array(&self) -> bool {
        self.type_tag & ARRAY_FLAG != 0
    }

    /// Number of scalars stored in this parameter
    pub fn element_count(&self) -> usize {
        self.byte_length / self.data_type().size_bytes()
    }

    /// Whether the parameter may be written
    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }
}

/// A parameter table (group) with its command codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Command code reading the table
    #[serde(rename = "get")]
    pub get_command: u8,
    /// Command code writing the table
    #[serde(rename = "set")]
    pub set_command: u8,
    /// Writes require an unlocked module
    #[serde(default)]
    pub protected: bool,
    /// Parameters, kept sorted by number
    pub params: Vec<ParamDescriptor>,
}

impl Table {
    /// Find a parameter by name
    pub fn param(&self, name: &str) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Find a parameter by number
    pub fn param_by_number(&self, number: u8) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.number == number)
    }

    /// Sum of all parameter lengths, the payload size of a whole-table read
    pub fn data_length(&self) -> usize {
        self.params.iter().map(|p| p.byte_length).sum()
    }
}
