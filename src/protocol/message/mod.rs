//! Diagnostic messages moved by the transport layer: [`UdsMessage`] to send,
//! [`UdsMessageRecord`] for a message that went through the bus.
use core::time::Duration;

use crate::error::PacketError;
use crate::protocol::addressing::AddressingType;
use crate::protocol::packet::{CanPacketRecord, CanPacketView, TransmissionDirection};
use crate::protocol::transport::segmentation::assembler::desegment;

/// Message (A_PDU payload) to transmit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdsMessage {
    payload: Vec<u8>,
    addressing_type: AddressingType,
}

impl UdsMessage {
    pub fn new(payload: impl Into<Vec<u8>>, addressing_type: AddressingType) -> Self {
        Self {
            payload: payload.into(),
            addressing_type,
        }
    }

    /// Physically addressed message.
    pub fn physical(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(payload, AddressingType::Physical)
    }

    /// Functionally addressed message.
    pub fn functional(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(payload, AddressingType::Functional)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn addressing_type(&self) -> AddressingType {
        self.addressing_type
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Message sent or received, together with the packets that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdsMessageRecord {
    packets: Vec<CanPacketRecord>,
    payload: Vec<u8>,
}

impl UdsMessageRecord {
    /// Validate that `packets` form one complete message (a Single Frame, or a
    /// First Frame followed by its Consecutive Frames) in a single direction.
    pub fn new(packets: Vec<CanPacketRecord>) -> Result<Self, PacketError> {
        let payload = desegment(&packets)?;
        let direction = packets[0].direction();
        if packets.iter().any(|packet| packet.direction() != direction) {
            return Err(PacketError::Inconsistent {
                reason: "message packets were not all sent in the same direction",
            });
        }
        Ok(Self { packets, payload })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn packets(&self) -> &[CanPacketRecord] {
        &self.packets
    }

    pub fn addressing_type(&self) -> AddressingType {
        self.packets[0].addressing_type()
    }

    pub fn direction(&self) -> TransmissionDirection {
        self.packets[0].direction()
    }

    /// Time of the first packet.
    pub fn transmission_start(&self) -> Duration {
        self.packets[0].transmission_time()
    }

    /// Time of the last packet.
    pub fn transmission_end(&self) -> Duration {
        self.packets[self.packets.len() - 1].transmission_time()
    }

    /// Message content, without the transport history.
    pub fn to_message(&self) -> UdsMessage {
        UdsMessage::new(self.payload.clone(), self.addressing_type())
    }
}
