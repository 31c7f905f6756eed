//! Device status codes
//!
//! Modules report the outcome of a request in the `state` byte of the
//! response header.

/// Status byte of a successful response
pub const STATUS_OK: u8 = 0x00;

/// Whether `state` is an accepted (non-error) status.
///
/// Besides `0x00`, modules may echo the request marker `0xFD`.
pub fn is_ok(state: u8) -> bool {
    matches!(state, STATUS_OK | super::REQUEST_STATE)
}

/// Human readable message for a status code
pub fn status_message(state: u8) -> &'static str {
    match state {
        0x00 | 0xFD => "ok",
        0x01 => "unknown command",
        0x02 => "parameter number out of range",
        0x03 => "parameter is read-only",
        0x04 => "value out of range",
        0x05 => "module is write-protected",
        0x06 => "module busy",
        0x07 => "EEPROM access failed",
        0x08 => "data length error",
        0x09 => "checksum error in request",
        0x0A => "measurement in progress",
        0x0B => "hardware fault",
        _ => "unknown status",
    }
}
