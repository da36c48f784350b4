//! CAN packets (N_PDU): the addressing information plus the packet-type
//! specific bytes carried by one CAN frame.
//!
//! [`CanPacket`] is built from message-level parameters and always stores
//! bytes that decode back to those parameters. [`CanPacketRecord`] is the
//! read-only counterpart reconstructed from a frame observed on the bus.
//! Both expose the same lazily decoded views through [`CanPacketView`].
use core::fmt;

use crate::error::PacketError;
use crate::protocol::addressing::{AddressingFormat, AddressingInformation, AddressingType};
use crate::protocol::can::{
    can_frame::CanFrame,
    can_id::CanId,
    dlc::{self, DEFAULT_FILLER_BYTE, MAX_DATA_LENGTH},
};

pub mod consecutive_frame;
pub mod first_frame;
pub mod flow_control;
pub mod record;
pub mod single_frame;

pub use flow_control::{FlowControlParameters, FlowStatus, StMin};
pub use record::CanPacketRecord;

//==================================================================================PACKET_TYPE
/// Packet type, stored in the high nibble of the first N_PCI byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CanPacketType {
    SingleFrame = 0x0,
    FirstFrame = 0x1,
    ConsecutiveFrame = 0x2,
    FlowControl = 0x3,
}

impl CanPacketType {
    /// Packet type encoded by an N_PCI nibble.
    pub fn from_nibble(nibble: u8) -> Result<Self, PacketError> {
        match nibble {
            0x0 => Ok(Self::SingleFrame),
            0x1 => Ok(Self::FirstFrame),
            0x2 => Ok(Self::ConsecutiveFrame),
            0x3 => Ok(Self::FlowControl),
            _ => Err(PacketError::InvalidValue {
                field: "N_PCI",
                value: nibble as u32,
            }),
        }
    }

    /// Packet type of a data field, given the number of addressing bytes in front of it.
    pub fn from_data(data: &[u8], ai_len: usize) -> Result<Self, PacketError> {
        let pci = data.get(ai_len).ok_or(PacketError::Inconsistent {
            reason: "data field does not contain any N_PCI byte",
        })?;
        Self::from_nibble(pci >> 4)
    }

    /// Packet types that start a new message.
    pub fn is_initial(self) -> bool {
        matches!(self, Self::SingleFrame | Self::FirstFrame)
    }
}

/// Direction of an observed packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransmissionDirection {
    Received,
    Transmitted,
}

//==================================================================================FRAME_DATA
/// Data field of a CAN frame (at most 64 bytes), kept inline.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameData {
    bytes: [u8; MAX_DATA_LENGTH],
    len: usize,
}

impl FrameData {
    /// Copy an observed data field; its length must be representable by a DLC.
    pub fn from_slice(data: &[u8]) -> Result<Self, PacketError> {
        dlc::validate_data_length(data.len(), true)?;
        let mut frame_data = Self::empty();
        frame_data.extend(data);
        Ok(frame_data)
    }

    const fn empty() -> Self {
        Self {
            bytes: [0; MAX_DATA_LENGTH],
            len: 0,
        }
    }

    /// Start a data field with the addressing information bytes.
    pub(crate) fn with_prefix(ai_data_bytes: &[u8]) -> Self {
        let mut frame_data = Self::empty();
        frame_data.extend(ai_data_bytes);
        frame_data
    }

    // Callers size the frame before writing; the 64-byte bound is never crossed.
    pub(crate) fn push(&mut self, byte: u8) {
        self.bytes[self.len] = byte;
        self.len += 1;
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.bytes[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
    }

    pub(crate) fn pad_to(&mut self, len: usize, filler_byte: u8) {
        if len > self.len {
            self.bytes[self.len..len].fill(filler_byte);
            self.len = len;
        }
    }

    pub(crate) fn overwrite_prefix(&mut self, bytes: &[u8]) {
        self.bytes[..bytes.len()].copy_from_slice(bytes);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for FrameData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X?}", self.as_slice())
    }
}

/// Frame length for `content_len` bytes of content.
///
/// With an explicit DLC the frame takes the DLC's length, which must hold the
/// content. Otherwise the smallest DLC that fits is used.
pub(crate) fn frame_length(
    frame_dlc: Option<u8>,
    content_len: usize,
) -> Result<usize, PacketError> {
    let frame_len = match frame_dlc {
        Some(code) => dlc::decode(code)?,
        None => dlc::decode(dlc::min_dlc(content_len)?)?,
    };
    if frame_len < content_len {
        return Err(PacketError::Inconsistent {
            reason: "DLC is too small for the packet content",
        });
    }
    Ok(frame_len)
}

//==================================================================================PACKET_CONTENT
/// Packet-type specific parameters of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketContent<'a> {
    SingleFrame {
        payload: &'a [u8],
    },
    FirstFrame {
        data_length: u32,
        payload: &'a [u8],
    },
    ConsecutiveFrame {
        sequence_number: u8,
        payload: &'a [u8],
    },
    FlowControl {
        flow_status: FlowStatus,
        block_size: Option<u8>,
        st_min: Option<u8>,
    },
}

impl PacketContent<'_> {
    pub fn packet_type(&self) -> CanPacketType {
        match self {
            PacketContent::SingleFrame { .. } => CanPacketType::SingleFrame,
            PacketContent::FirstFrame { .. } => CanPacketType::FirstFrame,
            PacketContent::ConsecutiveFrame { .. } => CanPacketType::ConsecutiveFrame,
            PacketContent::FlowControl { .. } => CanPacketType::FlowControl,
        }
    }
}

impl From<FlowControlParameters> for PacketContent<'_> {
    fn from(parameters: FlowControlParameters) -> Self {
        PacketContent::FlowControl {
            flow_status: parameters.flow_status,
            block_size: parameters.block_size,
            st_min: parameters.st_min,
        }
    }
}

/// Frame sizing options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOptions {
    /// Explicit DLC; `None` uses the smallest frame holding the content.
    /// First Frames default to the DLC their content fills exactly.
    pub dlc: Option<u8>,
    /// Byte used to pad frames.
    pub filler_byte: u8,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            dlc: None,
            filler_byte: DEFAULT_FILLER_BYTE,
        }
    }
}

impl FrameOptions {
    pub fn with_dlc(dlc: u8) -> Self {
        Self {
            dlc: Some(dlc),
            ..Self::default()
        }
    }
}

//==================================================================================VIEW
/// Read-only views shared by [`CanPacket`] and [`CanPacketRecord`].
///
/// Every view is decoded from the stored bytes on demand and returns `None`
/// for packet types where it does not apply.
pub trait CanPacketView {
    fn addressing_format(&self) -> AddressingFormat;
    fn addressing_type(&self) -> AddressingType;
    fn can_id(&self) -> u32;
    fn packet_type(&self) -> CanPacketType;
    /// Raw data field, addressing bytes included.
    fn raw_frame_data(&self) -> &[u8];

    fn ai_len(&self) -> usize {
        self.addressing_format().ai_data_bytes()
    }

    /// DLC of the frame carrying the packet.
    fn dlc(&self) -> u8 {
        // Stored data fields always have a DLC-representable length.
        dlc::encode(self.raw_frame_data().len()).unwrap_or(dlc::MAX_DLC)
    }

    /// Message bytes carried by SF, FF and CF packets.
    ///
    /// For Consecutive Frames this is the whole remainder of the frame,
    /// padding included.
    fn payload(&self) -> Option<&[u8]> {
        let data = self.raw_frame_data();
        match self.packet_type() {
            CanPacketType::SingleFrame => single_frame::payload(data, self.ai_len()),
            CanPacketType::FirstFrame => first_frame::payload(data, self.ai_len()),
            CanPacketType::ConsecutiveFrame => consecutive_frame::payload(data, self.ai_len()),
            CanPacketType::FlowControl => None,
        }
    }

    /// SF_DL or FF_DL.
    fn data_length(&self) -> Option<u32> {
        let data = self.raw_frame_data();
        match self.packet_type() {
            CanPacketType::SingleFrame => {
                single_frame::data_length(data, self.ai_len()).map(|len| len as u32)
            }
            CanPacketType::FirstFrame => first_frame::data_length(data, self.ai_len()),
            _ => None,
        }
    }

    fn sequence_number(&self) -> Option<u8> {
        match self.packet_type() {
            CanPacketType::ConsecutiveFrame => {
                consecutive_frame::sequence_number(self.raw_frame_data(), self.ai_len())
            }
            _ => None,
        }
    }

    fn flow_status(&self) -> Option<FlowStatus> {
        match self.packet_type() {
            CanPacketType::FlowControl => {
                flow_control::flow_status(self.raw_frame_data(), self.ai_len())
            }
            _ => None,
        }
    }

    /// Block size of a ContinueToSend Flow Control.
    fn block_size(&self) -> Option<u8> {
        match self.packet_type() {
            CanPacketType::FlowControl => {
                flow_control::block_size(self.raw_frame_data(), self.ai_len())
            }
            _ => None,
        }
    }

    /// Raw STmin of a ContinueToSend Flow Control.
    fn st_min(&self) -> Option<u8> {
        match self.packet_type() {
            CanPacketType::FlowControl => flow_control::st_min(self.raw_frame_data(), self.ai_len()),
            _ => None,
        }
    }
}

/// Check a data field against the codec of its packet type and return the type.
pub fn validate_frame_data(data: &[u8], ai_len: usize) -> Result<CanPacketType, PacketError> {
    let packet_type = CanPacketType::from_data(data, ai_len)?;
    match packet_type {
        CanPacketType::SingleFrame => single_frame::validate(data, ai_len)?,
        CanPacketType::FirstFrame => first_frame::validate(data, ai_len)?,
        CanPacketType::ConsecutiveFrame => consecutive_frame::validate(data, ai_len)?,
        CanPacketType::FlowControl => flow_control::validate(data, ai_len)?,
    }
    Ok(packet_type)
}

//==================================================================================CAN_PACKET
/// Packet about to be transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanPacket {
    addressing: AddressingInformation,
    packet_type: CanPacketType,
    data: FrameData,
}

impl CanPacket {
    /// Build a packet with ISO-compliant values.
    pub fn new(
        addressing: AddressingInformation,
        content: PacketContent<'_>,
        options: FrameOptions,
    ) -> Result<Self, PacketError> {
        let ai = addressing.ai_data_bytes();
        let FrameOptions {
            dlc: frame_dlc,
            filler_byte,
        } = options;
        let data = match content {
            PacketContent::SingleFrame { payload } => {
                single_frame::encode_valid(&ai, payload, frame_dlc, filler_byte)?
            }
            PacketContent::FirstFrame {
                data_length,
                payload,
            } => {
                let frame_dlc = match frame_dlc {
                    Some(frame_dlc) => frame_dlc,
                    None => dlc::encode(
                        ai.len() + first_frame::header_len(data_length) + payload.len(),
                    )?,
                };
                first_frame::encode_valid(&ai, frame_dlc, data_length, payload)?
            }
            PacketContent::ConsecutiveFrame {
                sequence_number,
                payload,
            } => consecutive_frame::encode_valid(
                &ai,
                sequence_number,
                payload,
                frame_dlc,
                filler_byte,
            )?,
            PacketContent::FlowControl {
                flow_status,
                block_size,
                st_min,
            } => flow_control::encode_valid(
                &ai,
                flow_status,
                block_size,
                st_min,
                frame_dlc,
                filler_byte,
            )?,
        };
        Ok(Self {
            addressing,
            packet_type: content.packet_type(),
            data,
        })
    }

    /// Wrap a data field produced elsewhere (for instance by an `encode_any`
    /// codec). The bytes must start with the addressing bytes of `addressing`
    /// and decode as a packet.
    pub fn from_frame_data(
        addressing: AddressingInformation,
        data: &[u8],
    ) -> Result<Self, PacketError> {
        let data = FrameData::from_slice(data)?;
        let ai = addressing.ai_data_bytes();
        if !data.as_slice().starts_with(&ai) {
            return Err(PacketError::Inconsistent {
                reason: "data field does not start with the addressing bytes",
            });
        }
        let packet_type = validate_frame_data(data.as_slice(), ai.len())?;
        Ok(Self {
            addressing,
            packet_type,
            data,
        })
    }

    /// Same packet with different addressing information.
    ///
    /// Rejected with [`PacketError::Ambiguity`] when the new format uses a
    /// different number of addressing bytes: the packet-type bytes would move.
    pub fn with_addressing(&self, addressing: AddressingInformation) -> Result<Self, PacketError> {
        if addressing.format().ai_data_bytes() != self.addressing.format().ai_data_bytes() {
            return Err(PacketError::Ambiguity {
                reason: "addressing format change alters the number of addressing bytes",
            });
        }
        let mut data = self.data;
        data.overwrite_prefix(&addressing.ai_data_bytes());
        Ok(Self {
            addressing,
            packet_type: self.packet_type,
            data,
        })
    }

    /// New packet with the same addressing and different content.
    pub fn with_content(
        &self,
        content: PacketContent<'_>,
        options: FrameOptions,
    ) -> Result<Self, PacketError> {
        Self::new(self.addressing, content, options)
    }

    pub fn addressing(&self) -> &AddressingInformation {
        &self.addressing
    }

    pub fn frame_data(&self) -> &FrameData {
        &self.data
    }

    /// Physical frame carrying the packet.
    pub fn to_frame(&self) -> Result<CanFrame, PacketError> {
        let id = CanId::new(self.addressing.can_id())?;
        CanFrame::new(id, self.data.as_slice()).ok_or(PacketError::Inconsistent {
            reason: "data field exceeds the CAN frame capacity",
        })
    }
}

impl CanPacketView for CanPacket {
    fn addressing_format(&self) -> AddressingFormat {
        self.addressing.format()
    }

    fn addressing_type(&self) -> AddressingType {
        self.addressing.addressing_type()
    }

    fn can_id(&self) -> u32 {
        self.addressing.can_id()
    }

    fn packet_type(&self) -> CanPacketType {
        self.packet_type
    }

    fn raw_frame_data(&self) -> &[u8] {
        self.data.as_slice()
    }
}
