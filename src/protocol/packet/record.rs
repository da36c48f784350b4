//! Historic packets: frames observed on the bus (sent or received), decoded
//! with the addressing context active at observation time.
use core::time::Duration;

use crate::error::{AddressingError, PacketError};
use crate::protocol::addressing::{decode_ai, AddressingFormat, AddressingType};
use crate::protocol::can::{
    can_frame::CanFrame,
    can_id::CanId,
    dlc::{is_fd_length, MAX_DATA_LENGTH},
};
use crate::protocol::packet::{
    validate_frame_data, CanPacket, CanPacketType, CanPacketView, FrameData,
    TransmissionDirection,
};

/// Read-only record of a packet that went through the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanPacketRecord {
    can_id: u32,
    is_extended_id: bool,
    data: FrameData,
    packet_type: CanPacketType,
    addressing_format: AddressingFormat,
    addressing_type: AddressingType,
    target_address: Option<u8>,
    source_address: Option<u8>,
    address_extension: Option<u8>,
    direction: TransmissionDirection,
    transmission_time: Duration,
}

impl CanPacketRecord {
    /// Decode an observed frame.
    ///
    /// Fails when the frame cannot carry a packet of `addressing_format`, or
    /// when its identifier implies another addressing type.
    pub fn new(
        frame: &CanFrame,
        direction: TransmissionDirection,
        addressing_type: AddressingType,
        addressing_format: AddressingFormat,
        transmission_time: Duration,
    ) -> Result<Self, PacketError> {
        let data = FrameData::from_slice(frame.data())?;
        let ai_len = addressing_format.ai_data_bytes();
        if data.len() <= ai_len {
            return Err(PacketError::Inconsistent {
                reason: "frame is too short for the addressing format",
            });
        }
        let decoded = decode_ai(
            addressing_format,
            frame.id.raw(),
            &data.as_slice()[..ai_len],
        )?;
        if decoded
            .addressing_type
            .is_some_and(|decoded_type| decoded_type != addressing_type)
        {
            return Err(PacketError::Addressing(AddressingError::Inconsistent {
                reason: "CAN ID encodes another addressing type",
            }));
        }
        let packet_type = validate_frame_data(data.as_slice(), ai_len)?;
        Ok(Self {
            can_id: frame.id.raw(),
            is_extended_id: frame.is_extended,
            data,
            packet_type,
            addressing_format,
            addressing_type,
            target_address: decoded.target_address,
            source_address: decoded.source_address,
            address_extension: decoded.address_extension,
            direction,
            transmission_time,
        })
    }

    /// Record of a packet built locally and confirmed on the bus.
    pub fn from_packet(
        packet: &CanPacket,
        direction: TransmissionDirection,
        transmission_time: Duration,
    ) -> Self {
        let addressing = packet.addressing();
        Self {
            can_id: addressing.can_id(),
            is_extended_id: addressing.is_extended_can_id(),
            data: *packet.frame_data(),
            packet_type: packet.packet_type(),
            addressing_format: addressing.format(),
            addressing_type: addressing.addressing_type(),
            target_address: addressing.target_address(),
            source_address: addressing.source_address(),
            address_extension: addressing.address_extension(),
            direction,
            transmission_time,
        }
    }

    pub fn direction(&self) -> TransmissionDirection {
        self.direction
    }

    pub fn transmission_time(&self) -> Duration {
        self.transmission_time
    }

    pub fn target_address(&self) -> Option<u8> {
        self.target_address
    }

    pub fn source_address(&self) -> Option<u8> {
        self.source_address
    }

    pub fn address_extension(&self) -> Option<u8> {
        self.address_extension
    }

    pub fn is_extended_id(&self) -> bool {
        self.is_extended_id
    }

    /// Frame as it appeared on the bus.
    pub fn frame(&self) -> CanFrame {
        let mut frame = CanFrame {
            id: CanId(self.can_id),
            is_extended: self.is_extended_id,
            is_fd: is_fd_length(self.data.len()),
            data: [0; MAX_DATA_LENGTH],
            len: self.data.len(),
            is_echo: self.direction == TransmissionDirection::Transmitted,
            timestamp: self.transmission_time,
        };
        frame.data[..self.data.len()].copy_from_slice(self.data.as_slice());
        frame
    }
}

impl CanPacketView for CanPacketRecord {
    fn addressing_format(&self) -> AddressingFormat {
        self.addressing_format
    }

    fn addressing_type(&self) -> AddressingType {
        self.addressing_type
    }

    fn can_id(&self) -> u32 {
        self.can_id
    }

    fn packet_type(&self) -> CanPacketType {
        self.packet_type
    }

    fn raw_frame_data(&self) -> &[u8] {
        self.data.as_slice()
    }
}
