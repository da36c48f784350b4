//! Packet generator for outgoing messages: a Single Frame when the payload
//! fits in one frame, otherwise a First Frame followed by Consecutive Frames.
use crate::error::PacketError;
use crate::protocol::addressing::{node::NodeAddressing, AddressingInformation, AddressingType};
use crate::protocol::can::dlc::{validate_dlc, MAX_CLASSIC_DLC};
use crate::protocol::message::UdsMessage;
use crate::protocol::packet::{
    consecutive_frame::{self, MAX_SEQUENCE_NUMBER},
    first_frame, single_frame, CanPacket, FrameOptions, PacketContent,
};

/// Frame layout shared by every packet of a node's messages.
#[derive(Debug, Clone, Copy)]
pub struct CanSegmenter {
    addressing: NodeAddressing,
    dlc: u8,
    use_data_optimization: bool,
    filler_byte: u8,
}

impl CanSegmenter {
    /// `dlc` is the base frame size; segmentation needs at least eight bytes.
    pub fn new(
        addressing: NodeAddressing,
        dlc: u8,
        use_data_optimization: bool,
        filler_byte: u8,
    ) -> Result<Self, PacketError> {
        if dlc < MAX_CLASSIC_DLC {
            return Err(PacketError::InvalidValue {
                field: "segmentation DLC",
                value: dlc as u32,
            });
        }
        validate_dlc(dlc)?;
        Ok(Self {
            addressing,
            dlc,
            use_data_optimization,
            filler_byte,
        })
    }

    pub fn addressing(&self) -> &NodeAddressing {
        &self.addressing
    }

    pub fn dlc(&self) -> u8 {
        self.dlc
    }

    /// DLC for packets that may be shorter than the base frame.
    fn padded_dlc(&self) -> Option<u8> {
        if self.use_data_optimization {
            None
        } else {
            Some(self.dlc)
        }
    }

    fn frame_options(&self, dlc: Option<u8>) -> FrameOptions {
        FrameOptions {
            dlc,
            filler_byte: self.filler_byte,
        }
    }

    /// Largest payload sent in a Single Frame with this layout.
    pub fn single_frame_capacity(
        &self,
        addressing_type: AddressingType,
    ) -> Result<usize, PacketError> {
        let ai_len = self.addressing.tx_for(addressing_type).format().ai_data_bytes();
        single_frame::max_payload(ai_len, self.dlc)
    }

    /// Lazily produce the packets of `message`.
    ///
    /// Functionally addressed messages must fit in a Single Frame.
    pub fn segment<'a>(
        &self,
        message: &'a UdsMessage,
    ) -> Result<PacketIterator<'a>, PacketError> {
        let payload = message.payload();
        if payload.is_empty() {
            return Err(PacketError::InvalidValue {
                field: "message length",
                value: 0,
            });
        }
        if u32::try_from(payload.len()).is_err() {
            return Err(PacketError::InvalidValue {
                field: "message length",
                value: u32::MAX,
            });
        }
        let single_frame = payload.len() <= self.single_frame_capacity(message.addressing_type())?;
        if !single_frame && message.addressing_type() == AddressingType::Functional {
            return Err(PacketError::Inconsistent {
                reason: "functionally addressed message does not fit in a Single Frame",
            });
        }
        Ok(PacketIterator {
            segmenter: *self,
            addressing: *self.addressing.tx_for(message.addressing_type()),
            payload,
            single_frame,
            bytes_sent: 0,
            sequence_number: 0,
        })
    }

    /// Eagerly produce every packet of `message`.
    pub fn segment_all(&self, message: &UdsMessage) -> Result<Vec<CanPacket>, PacketError> {
        self.segment(message)?.collect()
    }
}

/// Iterator returning the packets of one message as they are encoded.
pub struct PacketIterator<'a> {
    segmenter: CanSegmenter,
    addressing: AddressingInformation,
    payload: &'a [u8],
    single_frame: bool,
    bytes_sent: usize,
    sequence_number: u8,
}

impl PacketIterator<'_> {
    /// Payload bytes not yet handed out.
    pub fn remaining(&self) -> usize {
        self.payload.len() - self.bytes_sent
    }

    fn next_packet(&mut self) -> Result<CanPacket, PacketError> {
        let ai_len = self.addressing.format().ai_data_bytes();
        let total_len = self.payload.len();

        if self.single_frame {
            self.bytes_sent = total_len;
            return CanPacket::new(
                self.addressing,
                PacketContent::SingleFrame {
                    payload: self.payload,
                },
                self.segmenter.frame_options(self.segmenter.padded_dlc()),
            );
        }

        if self.bytes_sent == 0 {
            // First Frame: always a full base frame.
            let data_length = total_len as u32;
            let size = first_frame::payload_size(ai_len, self.segmenter.dlc, data_length)?;
            self.bytes_sent = size;
            self.sequence_number = 1;
            return CanPacket::new(
                self.addressing,
                PacketContent::FirstFrame {
                    data_length,
                    payload: &self.payload[..size],
                },
                self.segmenter.frame_options(Some(self.segmenter.dlc)),
            );
        }

        let capacity = consecutive_frame::max_payload(ai_len, self.segmenter.dlc)?;
        let size = capacity.min(total_len - self.bytes_sent);
        let chunk = &self.payload[self.bytes_sent..self.bytes_sent + size];
        let packet = CanPacket::new(
            self.addressing,
            PacketContent::ConsecutiveFrame {
                sequence_number: self.sequence_number,
                payload: chunk,
            },
            self.segmenter.frame_options(self.segmenter.padded_dlc()),
        )?;
        self.bytes_sent += size;
        self.sequence_number = (self.sequence_number + 1) & MAX_SEQUENCE_NUMBER;
        Ok(packet)
    }
}

impl Iterator for PacketIterator<'_> {
    type Item = Result<CanPacket, PacketError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes_sent >= self.payload.len() {
            return None;
        }
        let packet = self.next_packet();
        if packet.is_err() {
            // Stop after the first failure.
            self.bytes_sent = self.payload.len();
        }
        Some(packet)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
