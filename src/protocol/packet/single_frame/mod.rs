//! Single Frame (SF) codec.
//!
//! Frames of up to eight bytes use the short form, where the low N_PCI
//! nibble is SF_DL. Longer (CAN FD) frames use the long form: the nibble is
//! zero and the next byte holds SF_DL. The form is always derived from the
//! frame length, never from the payload.
use crate::error::PacketError;
use crate::protocol::can::dlc::{self, MAX_CLASSIC_DLC};
use crate::protocol::packet::{frame_length, FrameData};

/// N_PCI nibble of a Single Frame.
pub const SINGLE_FRAME_N_PCI: u8 = 0x0;

/// N_PCI bytes used by the form matching `frame_len`.
pub const fn header_len(frame_len: usize) -> usize {
    if frame_len <= MAX_CLASSIC_DLC as usize {
        1
    } else {
        2
    }
}

/// Largest payload a Single Frame of this DLC can carry.
pub fn max_payload(ai_len: usize, frame_dlc: u8) -> Result<usize, PacketError> {
    let frame_len = dlc::decode(frame_dlc)?;
    Ok(frame_len.saturating_sub(ai_len + header_len(frame_len)))
}

/// Smallest DLC able to carry `payload_len` bytes in a Single Frame.
pub fn min_dlc(ai_len: usize, payload_len: usize) -> Result<u8, PacketError> {
    let short_len = ai_len + 1 + payload_len;
    if short_len <= MAX_CLASSIC_DLC as usize {
        Ok(dlc::min_dlc(short_len)?)
    } else {
        Ok(dlc::min_dlc(ai_len + 2 + payload_len)?)
    }
}

/// Encode an ISO-compliant Single Frame.
///
/// Without an explicit DLC the smallest fitting frame is used; otherwise the
/// frame is padded with `filler_byte` up to the DLC length.
pub fn encode_valid(
    ai_data_bytes: &[u8],
    payload: &[u8],
    frame_dlc: Option<u8>,
    filler_byte: u8,
) -> Result<FrameData, PacketError> {
    if payload.is_empty() {
        return Err(PacketError::InvalidValue {
            field: "SF_DL",
            value: 0,
        });
    }
    let frame_dlc = match frame_dlc {
        Some(code) => code,
        None => min_dlc(ai_data_bytes.len(), payload.len())?,
    };
    if payload.len() > max_payload(ai_data_bytes.len(), frame_dlc)? {
        return Err(PacketError::Inconsistent {
            reason: "payload does not fit in a Single Frame of this DLC",
        });
    }
    let frame_len = dlc::decode(frame_dlc)?;

    let mut data = FrameData::with_prefix(ai_data_bytes);
    if header_len(frame_len) == 1 {
        data.push((SINGLE_FRAME_N_PCI << 4) | payload.len() as u8);
    } else {
        data.push(SINGLE_FRAME_N_PCI << 4);
        data.push(payload.len() as u8);
    }
    data.extend(payload);
    data.pad_to(frame_len, filler_byte);
    Ok(data)
}

/// Encode a Single Frame with arbitrary SF_DL fields.
///
/// `sf_dl_short` fills the low N_PCI nibble; `sf_dl_long`, when given, is
/// written as the following byte. The values are not cross-checked with the
/// payload, which allows building frames that violate ISO 15765-2.
pub fn encode_any(
    ai_data_bytes: &[u8],
    payload: &[u8],
    sf_dl_short: u8,
    sf_dl_long: Option<u8>,
    frame_dlc: Option<u8>,
    filler_byte: u8,
) -> Result<FrameData, PacketError> {
    if sf_dl_short > 0xF {
        return Err(PacketError::InvalidValue {
            field: "SF_DL nibble",
            value: sf_dl_short as u32,
        });
    }
    let content_len = ai_data_bytes.len() + 1 + sf_dl_long.map_or(0, |_| 1) + payload.len();
    let frame_len = frame_length(frame_dlc, content_len)?;

    let mut data = FrameData::with_prefix(ai_data_bytes);
    data.push((SINGLE_FRAME_N_PCI << 4) | sf_dl_short);
    if let Some(sf_dl) = sf_dl_long {
        data.push(sf_dl);
    }
    data.extend(payload);
    data.pad_to(frame_len, filler_byte);
    Ok(data)
}

/// Check that a data field is a well-formed Single Frame.
pub fn validate(data: &[u8], ai_len: usize) -> Result<(), PacketError> {
    dlc::validate_data_length(data.len(), true)?;
    let pci = *data.get(ai_len).ok_or(PacketError::Inconsistent {
        reason: "Single Frame is too short",
    })?;
    if pci >> 4 != SINGLE_FRAME_N_PCI {
        return Err(PacketError::InvalidValue {
            field: "N_PCI",
            value: pci as u32,
        });
    }
    if header_len(data.len()) == 2 && pci & 0x0F != 0 {
        return Err(PacketError::InvalidValue {
            field: "SF_DL nibble",
            value: (pci & 0x0F) as u32,
        });
    }
    let sf_dl = data_length(data, ai_len).ok_or(PacketError::Inconsistent {
        reason: "Single Frame is too short",
    })?;
    let available = data.len() - ai_len - header_len(data.len());
    if sf_dl == 0 || sf_dl > available {
        return Err(PacketError::Inconsistent {
            reason: "SF_DL does not match the frame length",
        });
    }
    Ok(())
}

/// SF_DL read with the form matching the frame length.
pub fn data_length(data: &[u8], ai_len: usize) -> Option<usize> {
    if header_len(data.len()) == 1 {
        data.get(ai_len).map(|pci| (pci & 0x0F) as usize)
    } else {
        data.get(ai_len + 1).map(|sf_dl| *sf_dl as usize)
    }
}

/// Payload bytes, padding excluded.
pub fn payload(data: &[u8], ai_len: usize) -> Option<&[u8]> {
    let start = ai_len + header_len(data.len());
    let sf_dl = data_length(data, ai_len)?;
    data.get(start..start + sf_dl)
}
