//! Flow Control (FC) codec and Separation Time minimum (STmin) mapping.
use core::time::Duration;

use crate::error::PacketError;
use crate::protocol::can::dlc;
use crate::protocol::packet::{frame_length, FrameData};

/// N_PCI nibble of a Flow Control.
pub const FLOW_CONTROL_N_PCI: u8 = 0x3;

//==================================================================================FLOW_STATUS
/// Flow status carried in the low N_PCI nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FlowStatus {
    /// The sender may transmit the next block of Consecutive Frames.
    ContinueToSend = 0x0,
    /// The sender must wait for another Flow Control.
    Wait = 0x1,
    /// The receiver cannot take the message.
    Overflow = 0x2,
}

impl FlowStatus {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            0x0 => Some(Self::ContinueToSend),
            0x1 => Some(Self::Wait),
            0x2 => Some(Self::Overflow),
            _ => None,
        }
    }
}

//==================================================================================ST_MIN
/// STmin raw byte ⇄ time mapping.
///
/// `0x00..=0x7F` are milliseconds, `0xF1..=0xF9` are 100-900 µs. Every
/// other value is reserved: it decodes to 127 ms and logs a warning.
pub struct StMin;

impl StMin {
    /// Time used for reserved values.
    pub const MAX_MS: u8 = 0x7F;

    pub const fn is_reserved(raw: u8) -> bool {
        !matches!(raw, 0x00..=0x7F | 0xF1..=0xF9)
    }

    /// Milliseconds represented by a raw value.
    pub fn decode(raw: u8) -> f64 {
        match raw {
            0x00..=0x7F => raw as f64,
            0xF1..=0xF9 => (raw - 0xF0) as f64 / 10.0,
            _ => {
                warn!(
                    "Reserved STmin value {:#X}, using {} ms instead",
                    raw,
                    Self::MAX_MS
                );
                Self::MAX_MS as f64
            }
        }
    }

    /// Separation time represented by a raw value.
    pub fn to_duration(raw: u8) -> Duration {
        match raw {
            0x00..=0x7F => Duration::from_millis(raw as u64),
            0xF1..=0xF9 => Duration::from_micros((raw - 0xF0) as u64 * 100),
            _ => {
                warn!(
                    "Reserved STmin value {:#X}, using {} ms instead",
                    raw,
                    Self::MAX_MS
                );
                Duration::from_millis(Self::MAX_MS as u64)
            }
        }
    }

    /// Raw value for a time in milliseconds: whole 0-127 ms or 0.1-0.9 ms.
    pub fn encode(milliseconds: f64) -> Result<u8, PacketError> {
        if (0.0..=Self::MAX_MS as f64).contains(&milliseconds) && milliseconds.fract() == 0.0 {
            return Ok(milliseconds as u8);
        }
        let tenths = (milliseconds * 10.0).round();
        if (1.0..=9.0).contains(&tenths) && (milliseconds * 10.0 - tenths).abs() < 1e-6 {
            return Ok(0xF0 + tenths as u8);
        }
        Err(PacketError::InvalidValue {
            field: "STmin (ms)",
            value: milliseconds as u32,
        })
    }
}

//==================================================================================PARAMETERS
/// Content of a Flow Control to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControlParameters {
    pub flow_status: FlowStatus,
    pub block_size: Option<u8>,
    pub st_min: Option<u8>,
}

impl FlowControlParameters {
    pub const fn continue_to_send(block_size: u8, st_min: u8) -> Self {
        Self {
            flow_status: FlowStatus::ContinueToSend,
            block_size: Some(block_size),
            st_min: Some(st_min),
        }
    }

    pub const fn wait() -> Self {
        Self {
            flow_status: FlowStatus::Wait,
            block_size: None,
            st_min: None,
        }
    }

    pub const fn overflow() -> Self {
        Self {
            flow_status: FlowStatus::Overflow,
            block_size: None,
            st_min: None,
        }
    }
}

//==================================================================================CODEC
/// Encode an ISO-compliant Flow Control.
///
/// ContinueToSend requires block size and STmin. For Wait and Overflow the
/// two bytes are still written, with `filler_byte` when not given.
pub fn encode_valid(
    ai_data_bytes: &[u8],
    flow_status: FlowStatus,
    block_size: Option<u8>,
    st_min: Option<u8>,
    frame_dlc: Option<u8>,
    filler_byte: u8,
) -> Result<FrameData, PacketError> {
    if flow_status == FlowStatus::ContinueToSend && (block_size.is_none() || st_min.is_none()) {
        return Err(PacketError::Inconsistent {
            reason: "ContinueToSend requires block size and STmin",
        });
    }
    let frame_len = frame_length(frame_dlc, ai_data_bytes.len() + 3)?;
    let mut data = FrameData::with_prefix(ai_data_bytes);
    data.push((FLOW_CONTROL_N_PCI << 4) | flow_status as u8);
    data.push(block_size.unwrap_or(filler_byte));
    data.push(st_min.unwrap_or(filler_byte));
    data.pad_to(frame_len, filler_byte);
    Ok(data)
}

/// Encode a Flow Control with any flow status nibble.
///
/// Only the given bytes are written; STmin cannot be given without a block size.
pub fn encode_any(
    ai_data_bytes: &[u8],
    flow_status: u8,
    block_size: Option<u8>,
    st_min: Option<u8>,
    frame_dlc: Option<u8>,
    filler_byte: u8,
) -> Result<FrameData, PacketError> {
    if flow_status > 0xF {
        return Err(PacketError::InvalidValue {
            field: "flow status",
            value: flow_status as u32,
        });
    }
    if st_min.is_some() && block_size.is_none() {
        return Err(PacketError::Inconsistent {
            reason: "STmin cannot be encoded without a block size",
        });
    }
    let content_len =
        ai_data_bytes.len() + 1 + block_size.map_or(0, |_| 1) + st_min.map_or(0, |_| 1);
    let frame_len = frame_length(frame_dlc, content_len)?;
    let mut data = FrameData::with_prefix(ai_data_bytes);
    data.push((FLOW_CONTROL_N_PCI << 4) | flow_status);
    if let Some(block_size) = block_size {
        data.push(block_size);
    }
    if let Some(st_min) = st_min {
        data.push(st_min);
    }
    data.pad_to(frame_len, filler_byte);
    Ok(data)
}

/// Check that a data field is a well-formed Flow Control.
pub fn validate(data: &[u8], ai_len: usize) -> Result<(), PacketError> {
    dlc::validate_data_length(data.len(), true)?;
    let pci = *data.get(ai_len).ok_or(PacketError::Inconsistent {
        reason: "Flow Control is too short",
    })?;
    if pci >> 4 != FLOW_CONTROL_N_PCI {
        return Err(PacketError::InvalidValue {
            field: "N_PCI",
            value: pci as u32,
        });
    }
    let flow_status = FlowStatus::from_nibble(pci & 0x0F).ok_or(PacketError::InvalidValue {
        field: "flow status",
        value: (pci & 0x0F) as u32,
    })?;
    if flow_status == FlowStatus::ContinueToSend && data.len() < ai_len + 3 {
        return Err(PacketError::Inconsistent {
            reason: "ContinueToSend Flow Control lacks block size or STmin",
        });
    }
    Ok(())
}

pub fn flow_status(data: &[u8], ai_len: usize) -> Option<FlowStatus> {
    data.get(ai_len)
        .and_then(|pci| FlowStatus::from_nibble(pci & 0x0F))
}

/// Block size; only meaningful for ContinueToSend.
pub fn block_size(data: &[u8], ai_len: usize) -> Option<u8> {
    match flow_status(data, ai_len)? {
        FlowStatus::ContinueToSend => data.get(ai_len + 1).copied(),
        _ => None,
    }
}

/// Raw STmin; only meaningful for ContinueToSend.
pub fn st_min(data: &[u8], ai_len: usize) -> Option<u8> {
    match flow_status(data, ai_len)? {
        FlowStatus::ContinueToSend => data.get(ai_len + 2).copied(),
        _ => None,
    }
}
