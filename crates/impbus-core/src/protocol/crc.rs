//! CRC-8 checksum (Dallas/Maxim 1-Wire)
//!
//! Width 8, polynomial 0x31 reflected, no init/xorout. The lookup table is
//! built at compile time by the `crc` crate.

use crc::{Crc, CRC_8_MAXIM_DOW};

const CRC_IMPBUS: Crc<u8> = Crc::<u8>::new(&CRC_8_MAXIM_DOW);

/// CRC-8 of `data`; the empty slice yields 0x00
pub fn crc8(data: &[u8]) -> u8 {
    CRC_IMPBUS.checksum(data)
}

/// Check a byte sequence whose last byte is the CRC of the preceding bytes
pub fn check(data: &[u8]) -> bool {
    match data.split_last() {
        Some((crc, rest)) => crc8(rest) == *crc,
        None => false,
    }
}
