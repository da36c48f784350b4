//! Consecutive Frame (CF) codec.
//!
//! The codec cannot tell trailing payload bytes from filler bytes, so the
//! payload view is always the whole remainder of the frame. Trimming happens
//! where the message length is known (see the segmentation assembler).
use crate::error::PacketError;
use crate::protocol::can::dlc;
use crate::protocol::packet::{frame_length, FrameData};

/// N_PCI nibble of a Consecutive Frame.
pub const CONSECUTIVE_FRAME_N_PCI: u8 = 0x2;
/// Sequence numbers wrap after this value.
pub const MAX_SEQUENCE_NUMBER: u8 = 0xF;

/// Payload capacity of a Consecutive Frame of this DLC.
pub fn max_payload(ai_len: usize, frame_dlc: u8) -> Result<usize, PacketError> {
    Ok(dlc::decode(frame_dlc)?.saturating_sub(ai_len + 1))
}

/// Smallest DLC able to carry `payload_len` bytes in a Consecutive Frame.
pub fn min_dlc(ai_len: usize, payload_len: usize) -> Result<u8, PacketError> {
    Ok(dlc::min_dlc(ai_len + 1 + payload_len)?)
}

fn check_sequence_number(sequence_number: u8) -> Result<(), PacketError> {
    if sequence_number > MAX_SEQUENCE_NUMBER {
        return Err(PacketError::InvalidValue {
            field: "sequence number",
            value: sequence_number as u32,
        });
    }
    Ok(())
}

fn encode(
    ai_data_bytes: &[u8],
    sequence_number: u8,
    payload: &[u8],
    frame_dlc: Option<u8>,
    filler_byte: u8,
) -> Result<FrameData, PacketError> {
    check_sequence_number(sequence_number)?;
    let frame_len = frame_length(frame_dlc, ai_data_bytes.len() + 1 + payload.len())?;
    let mut data = FrameData::with_prefix(ai_data_bytes);
    data.push((CONSECUTIVE_FRAME_N_PCI << 4) | sequence_number);
    data.extend(payload);
    data.pad_to(frame_len, filler_byte);
    Ok(data)
}

/// Encode an ISO-compliant Consecutive Frame carrying at least one byte.
pub fn encode_valid(
    ai_data_bytes: &[u8],
    sequence_number: u8,
    payload: &[u8],
    frame_dlc: Option<u8>,
    filler_byte: u8,
) -> Result<FrameData, PacketError> {
    if payload.is_empty() {
        return Err(PacketError::Inconsistent {
            reason: "Consecutive Frame must carry payload",
        });
    }
    encode(
        ai_data_bytes,
        sequence_number,
        payload,
        frame_dlc,
        filler_byte,
    )
}

/// Encode a Consecutive Frame, empty payloads included.
pub fn encode_any(
    ai_data_bytes: &[u8],
    sequence_number: u8,
    payload: &[u8],
    frame_dlc: Option<u8>,
    filler_byte: u8,
) -> Result<FrameData, PacketError> {
    encode(
        ai_data_bytes,
        sequence_number,
        payload,
        frame_dlc,
        filler_byte,
    )
}

/// Check that a data field is a well-formed Consecutive Frame.
pub fn validate(data: &[u8], ai_len: usize) -> Result<(), PacketError> {
    dlc::validate_data_length(data.len(), true)?;
    let pci = *data.get(ai_len).ok_or(PacketError::Inconsistent {
        reason: "Consecutive Frame is too short",
    })?;
    if pci >> 4 != CONSECUTIVE_FRAME_N_PCI {
        return Err(PacketError::InvalidValue {
            field: "N_PCI",
            value: pci as u32,
        });
    }
    if data.len() < ai_len + 2 {
        return Err(PacketError::Inconsistent {
            reason: "Consecutive Frame carries no payload",
        });
    }
    Ok(())
}

pub fn sequence_number(data: &[u8], ai_len: usize) -> Option<u8> {
    data.get(ai_len).map(|pci| pci & 0x0F)
}

/// Everything after the N_PCI byte, padding included.
pub fn payload(data: &[u8], ai_len: usize) -> Option<&[u8]> {
    data.get(ai_len + 1..)
}

//==================================================================================TESTS
#[cfg(test)]
#[path = "tests.rs"]
mod tests;
