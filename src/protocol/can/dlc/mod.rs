//! CAN Data Length Code: bijection between the 4-bit DLC and the number of
//! data bytes of a classic CAN (0-8) or CAN FD (12-64) frame.
use crate::error::DlcError;

/// Number of data bytes for each DLC value (index = DLC).
pub const DATA_LENGTHS: [usize; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Highest DLC value.
pub const MAX_DLC: u8 = 0xF;
/// Largest classic CAN DLC (and data length).
pub const MAX_CLASSIC_DLC: u8 = 8;
/// Largest CAN FD data field.
pub const MAX_DATA_LENGTH: usize = 64;
/// Default filler byte used to pad frames.
pub const DEFAULT_FILLER_BYTE: u8 = 0xCC;

/// Number of data bytes represented by `dlc`.
pub fn decode(dlc: u8) -> Result<usize, DlcError> {
    DATA_LENGTHS
        .get(dlc as usize)
        .copied()
        .ok_or(DlcError::InvalidDlc { dlc })
}

/// DLC that represents exactly `len` data bytes.
pub fn encode(len: usize) -> Result<u8, DlcError> {
    DATA_LENGTHS
        .binary_search(&len)
        .map(|dlc| dlc as u8)
        .map_err(|_| DlcError::InvalidDataLength { len })
}

/// Smallest DLC whose data length is at least `len` (frame sizing with padding).
pub fn min_dlc(len: usize) -> Result<u8, DlcError> {
    if len > MAX_DATA_LENGTH {
        return Err(DlcError::InvalidDataLength { len });
    }
    Ok(DATA_LENGTHS.partition_point(|&available| available < len) as u8)
}

/// Check a DLC value.
pub fn validate_dlc(dlc: u8) -> Result<(), DlcError> {
    decode(dlc).map(|_| ())
}

/// Check a number of data bytes.
///
/// With `exact`, only lengths that a DLC represents exactly are accepted;
/// otherwise any length up to 64 bytes is.
pub fn validate_data_length(len: usize, exact: bool) -> Result<(), DlcError> {
    if exact {
        encode(len).map(|_| ())
    } else if len <= MAX_DATA_LENGTH {
        Ok(())
    } else {
        Err(DlcError::InvalidDataLength { len })
    }
}

/// Frames longer than eight bytes need CAN FD.
pub const fn is_fd_length(len: usize) -> bool {
    len > MAX_CLASSIC_DLC as usize
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
