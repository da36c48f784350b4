//! First Frame (FF) codec.
//!
//! The 12 bits following the N_PCI nibble carry FF_DL up to 4095. Longer
//! messages use the escape sequence: those 12 bits are zero and the next four
//! bytes hold FF_DL big-endian. A First Frame is never padded, its payload
//! fills the frame exactly.
use crate::error::PacketError;
use crate::protocol::can::dlc::{self, MAX_CLASSIC_DLC};
use crate::protocol::packet::{frame_length, single_frame, FrameData};

/// N_PCI nibble of a First Frame.
pub const FIRST_FRAME_N_PCI: u8 = 0x1;
/// Largest FF_DL of the 12-bit field.
pub const MAX_SHORT_FF_DL: u32 = 0xFFF;

/// N_PCI bytes needed for `data_length`.
pub const fn header_len(data_length: u32) -> usize {
    if data_length > MAX_SHORT_FF_DL {
        6
    } else {
        2
    }
}

/// Payload bytes carried by a First Frame of this DLC announcing `data_length` bytes.
pub fn payload_size(ai_len: usize, frame_dlc: u8, data_length: u32) -> Result<usize, PacketError> {
    let frame_len = dlc::decode(frame_dlc)?;
    Ok(frame_len.saturating_sub(ai_len + header_len(data_length)))
}

fn write_header(data: &mut FrameData, data_length: u32, escape: bool) {
    if escape {
        data.push(FIRST_FRAME_N_PCI << 4);
        data.push(0x00);
        data.extend(&data_length.to_be_bytes());
    } else {
        data.push((FIRST_FRAME_N_PCI << 4) | ((data_length >> 8) & 0x0F) as u8);
        data.push((data_length & 0xFF) as u8);
    }
}

/// Encode an ISO-compliant First Frame.
///
/// The frame must be at least eight bytes long, `data_length` must exceed
/// what a Single Frame of the same DLC carries, and `payload` must fill the
/// frame exactly.
pub fn encode_valid(
    ai_data_bytes: &[u8],
    frame_dlc: u8,
    data_length: u32,
    payload: &[u8],
) -> Result<FrameData, PacketError> {
    if frame_dlc < MAX_CLASSIC_DLC {
        return Err(PacketError::InvalidValue {
            field: "First Frame DLC",
            value: frame_dlc as u32,
        });
    }
    let ai_len = ai_data_bytes.len();
    if data_length as usize <= single_frame::max_payload(ai_len, frame_dlc)? {
        return Err(PacketError::Inconsistent {
            reason: "FF_DL fits in a Single Frame",
        });
    }
    if payload.len() != payload_size(ai_len, frame_dlc, data_length)? {
        return Err(PacketError::Inconsistent {
            reason: "First Frame payload must fill the frame exactly",
        });
    }

    let mut data = FrameData::with_prefix(ai_data_bytes);
    write_header(&mut data, data_length, data_length > MAX_SHORT_FF_DL);
    data.extend(payload);
    Ok(data)
}

/// Encode a First Frame without range checks on FF_DL.
///
/// `escape` forces the 32-bit FF_DL encoding regardless of the value. The
/// payload still has to fill the frame, as no padding exists in First Frames.
pub fn encode_any(
    ai_data_bytes: &[u8],
    frame_dlc: Option<u8>,
    data_length: u32,
    payload: &[u8],
    escape: bool,
) -> Result<FrameData, PacketError> {
    if !escape && data_length > MAX_SHORT_FF_DL {
        return Err(PacketError::InvalidValue {
            field: "FF_DL",
            value: data_length,
        });
    }
    let header = if escape { 6 } else { 2 };
    let content_len = ai_data_bytes.len() + header + payload.len();
    if frame_length(frame_dlc, content_len)? != content_len {
        return Err(PacketError::Inconsistent {
            reason: "First Frame payload must fill the frame exactly",
        });
    }

    let mut data = FrameData::with_prefix(ai_data_bytes);
    write_header(&mut data, data_length, escape);
    data.extend(payload);
    Ok(data)
}

/// FF_DL and the number of N_PCI bytes it took.
fn parse_header(data: &[u8], ai_len: usize) -> Option<(u32, usize)> {
    let pci = *data.get(ai_len)?;
    let low = *data.get(ai_len + 1)?;
    let short = (((pci & 0x0F) as u32) << 8) | low as u32;
    if short != 0 {
        return Some((short, 2));
    }
    let escape = data.get(ai_len + 2..ai_len + 6)?;
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(escape);
    Some((u32::from_be_bytes(bytes), 6))
}

/// Check that a data field is a well-formed First Frame.
pub fn validate(data: &[u8], ai_len: usize) -> Result<(), PacketError> {
    let frame_dlc = dlc::encode(data.len())?;
    if frame_dlc < MAX_CLASSIC_DLC {
        return Err(PacketError::InvalidValue {
            field: "First Frame DLC",
            value: frame_dlc as u32,
        });
    }
    let pci = *data.get(ai_len).ok_or(PacketError::Inconsistent {
        reason: "First Frame is too short",
    })?;
    if pci >> 4 != FIRST_FRAME_N_PCI {
        return Err(PacketError::InvalidValue {
            field: "N_PCI",
            value: pci as u32,
        });
    }
    let (data_length, header) = parse_header(data, ai_len).ok_or(PacketError::Inconsistent {
        reason: "First Frame is too short",
    })?;
    if data.len() <= ai_len + header {
        return Err(PacketError::Inconsistent {
            reason: "First Frame carries no payload",
        });
    }
    if data_length as usize <= single_frame::max_payload(ai_len, frame_dlc)? {
        return Err(PacketError::Inconsistent {
            reason: "FF_DL fits in a Single Frame",
        });
    }
    Ok(())
}

/// FF_DL, from the 12-bit field or the escape sequence.
pub fn data_length(data: &[u8], ai_len: usize) -> Option<u32> {
    parse_header(data, ai_len).map(|(data_length, _)| data_length)
}

/// Payload fragment carried after the header.
pub fn payload(data: &[u8], ai_len: usize) -> Option<&[u8]> {
    let (_, header) = parse_header(data, ai_len)?;
    data.get(ai_len + header..)
}
