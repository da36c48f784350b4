//! Incremental message assembler: rebuilds a message from a First Frame and
//! the Consecutive Frames that follow, or takes a Single Frame as is.
use crate::error::PacketError;
use crate::protocol::addressing::AddressingType;
use crate::protocol::packet::{consecutive_frame::MAX_SEQUENCE_NUMBER, CanPacketType, CanPacketView};

/// Upper bound of the capacity reserved from a First Frame; longer messages
/// grow the buffer as Consecutive Frames arrive.
const INITIAL_CAPACITY: usize = 4095;

//==================================================================================Enums and Structs
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessResult {
    /// Packet not part of a message in progress (Flow Control, stray
    /// Consecutive Frame, or a packet without payload).
    Ignored,
    /// Consecutive Frame with a sequence number other than the expected one;
    /// the assembly state is unchanged.
    UnexpectedSequenceNumber { expected: u8, received: u8 },
    /// Packet integrated but more Consecutive Frames are needed.
    FragmentConsumed,
    /// Message complete.
    MessageComplete(Vec<u8>),
}

/// Possible states of the assembly.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum AssemblyState {
    Idle,
    InProgress,
}

/// Reassembly state of one message.
#[derive(Debug, Clone)]
pub struct MessageAssembler {
    state: AssemblyState,
    buffer: Vec<u8>,
    expected_len: usize,
    next_sequence_number: u8,
}

impl Default for MessageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageAssembler {
    pub const fn new() -> Self {
        Self {
            state: AssemblyState::Idle,
            buffer: Vec::new(),
            expected_len: 0,
            next_sequence_number: 0,
        }
    }

    /// Drop any message in progress.
    pub fn reset(&mut self) {
        self.state = AssemblyState::Idle;
        self.buffer.clear();
        self.expected_len = 0;
        self.next_sequence_number = 0;
    }

    pub fn is_in_progress(&self) -> bool {
        self.state == AssemblyState::InProgress
    }

    /// Bytes still missing from the message in progress.
    pub fn remaining(&self) -> usize {
        self.expected_len.saturating_sub(self.buffer.len())
    }

    /// Sequence number the next Consecutive Frame must carry.
    pub fn expected_sequence_number(&self) -> u8 {
        self.next_sequence_number
    }

    //==================================================================================Process Functions
    /// Feed one packet.
    ///
    /// Single and First Frames always start over, dropping any message in
    /// progress. Consecutive Frame padding is trimmed with the number of bytes
    /// still expected.
    pub fn process<P: CanPacketView>(&mut self, packet: &P) -> ProcessResult {
        match packet.packet_type() {
            CanPacketType::SingleFrame => {
                self.reset();
                match packet.payload() {
                    Some(payload) => ProcessResult::MessageComplete(payload.to_vec()),
                    None => ProcessResult::Ignored,
                }
            }
            CanPacketType::FirstFrame => {
                self.reset();
                let (Some(data_length), Some(payload)) = (packet.data_length(), packet.payload())
                else {
                    return ProcessResult::Ignored;
                };
                self.expected_len = data_length as usize;
                self.buffer.reserve(self.expected_len.min(INITIAL_CAPACITY));
                self.buffer
                    .extend_from_slice(&payload[..payload.len().min(self.expected_len)]);
                self.next_sequence_number = 1;
                self.state = AssemblyState::InProgress;
                self.complete_or_consumed()
            }
            CanPacketType::ConsecutiveFrame => {
                if self.state != AssemblyState::InProgress {
                    return ProcessResult::Ignored;
                }
                let (Some(sequence_number), Some(payload)) =
                    (packet.sequence_number(), packet.payload())
                else {
                    return ProcessResult::Ignored;
                };
                if sequence_number != self.next_sequence_number {
                    return ProcessResult::UnexpectedSequenceNumber {
                        expected: self.next_sequence_number,
                        received: sequence_number,
                    };
                }
                let copy_len = payload.len().min(self.remaining());
                self.buffer.extend_from_slice(&payload[..copy_len]);
                self.next_sequence_number = (self.next_sequence_number + 1) & MAX_SEQUENCE_NUMBER;
                self.complete_or_consumed()
            }
            CanPacketType::FlowControl => ProcessResult::Ignored,
        }
    }

    fn complete_or_consumed(&mut self) -> ProcessResult {
        if self.buffer.len() >= self.expected_len {
            let payload = core::mem::take(&mut self.buffer);
            self.reset();
            ProcessResult::MessageComplete(payload)
        } else {
            ProcessResult::FragmentConsumed
        }
    }
}

//==================================================================================Desegmentation
/// Payload of a complete packet sequence.
///
/// The sequence must be a single Single Frame, or a physically addressed
/// First Frame followed by exactly the Consecutive Frames it announces.
pub fn desegment<P: CanPacketView>(packets: &[P]) -> Result<Vec<u8>, PacketError> {
    let first = packets.first().ok_or(PacketError::Inconsistent {
        reason: "no packets to desegment",
    })?;
    match first.packet_type() {
        CanPacketType::SingleFrame if packets.len() == 1 => {}
        CanPacketType::FirstFrame if first.addressing_type() == AddressingType::Physical => {}
        _ => {
            return Err(PacketError::Inconsistent {
                reason: "packets do not start a single message",
            })
        }
    }

    let mut assembler = MessageAssembler::new();
    let last = packets.len() - 1;
    for (index, packet) in packets.iter().enumerate() {
        if index > 0 && packet.packet_type() != CanPacketType::ConsecutiveFrame {
            return Err(PacketError::Inconsistent {
                reason: "message continues with a packet other than a Consecutive Frame",
            });
        }
        match assembler.process(packet) {
            ProcessResult::MessageComplete(payload) if index == last => return Ok(payload),
            ProcessResult::MessageComplete(_) => {
                return Err(PacketError::Inconsistent {
                    reason: "message completed before its last packet",
                })
            }
            ProcessResult::FragmentConsumed => {}
            ProcessResult::UnexpectedSequenceNumber { .. } => {
                return Err(PacketError::Inconsistent {
                    reason: "Consecutive Frame out of sequence",
                })
            }
            ProcessResult::Ignored => {
                return Err(PacketError::Inconsistent {
                    reason: "packet does not belong to the message",
                })
            }
        }
    }
    Err(PacketError::Inconsistent {
        reason: "message is incomplete",
    })
}

/// Whether `packets` form exactly one complete message.
pub fn is_desegmented_message<P: CanPacketView>(packets: &[P]) -> bool {
    desegment(packets).is_ok()
}
