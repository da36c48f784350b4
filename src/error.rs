//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (CAN identifier decoding,
//! addressing validation, packet encoding, transport timeouts, etc.).
use core::time::Duration;

use crate::protocol::addressing::{AddressingFormat, AddressingType};
use thiserror_no_std::Error;

//==================================================================================CAN_ID_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised while validating, encoding or decoding a CAN identifier.
pub enum CanIdError {
    /// Value does not fit in 29 bits.
    #[error("Value {can_id:#X} is not a valid CAN identifier")]
    NotCanId { can_id: u32 },
    /// Identifier width does not match what the addressing format requires.
    #[error("CAN identifier {can_id:#X} is not a {expected} identifier")]
    WrongWidth { can_id: u32, expected: &'static str },
    /// A 29-bit identifier that sits outside every known offset window.
    ///
    /// The identifier itself is legal; the offset table does not cover it.
    #[error("CAN identifier {can_id:#X} does not match any known {format:?} offset")]
    NotImplemented { can_id: u32, format: AddressingFormat },
    /// The format does not carry addressing information inside the identifier.
    #[error("{format:?} addressing does not encode addresses in the CAN identifier")]
    UnsupportedFormat { format: AddressingFormat },
    /// The identifier decodes to another addressing type than requested.
    #[error("CAN identifier {can_id:#X} is not usable for {addressing_type:?} addressing")]
    AddressingTypeMismatch {
        can_id: u32,
        addressing_type: AddressingType,
    },
}

//==================================================================================DLC_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised by the CAN data-length codec.
pub enum DlcError {
    /// DLC outside the 4-bit range.
    #[error("Invalid DLC value: {dlc}")]
    InvalidDlc { dlc: u8 },
    /// Byte count that no DLC represents (or that exceeds 64 bytes).
    #[error("Invalid number of CAN frame data bytes: {len}")]
    InvalidDataLength { len: usize },
}

//==================================================================================ADDRESSING_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised while validating addressing information.
pub enum AddressingError {
    /// A field that the addressing format does not use was provided.
    #[error("Argument `{argument}` is not used by {format:?} addressing")]
    UnusedArgument {
        argument: &'static str,
        format: AddressingFormat,
    },
    /// Individually valid values that contradict each other or the format.
    #[error("Inconsistent addressing arguments: {reason}")]
    Inconsistent { reason: &'static str },
    /// CAN identifier could not be validated or decoded.
    #[error(transparent)]
    CanId(#[from] CanIdError),
}

//==================================================================================PACKET_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised while encoding, decoding or rebuilding CAN packets.
pub enum PacketError {
    /// A single field is outside its legal range.
    #[error("Invalid {field} value: {value:#X}")]
    InvalidValue { field: &'static str, value: u32 },
    /// Several values are individually valid but contradict each other.
    #[error("Inconsistent packet arguments: {reason}")]
    Inconsistent { reason: &'static str },
    /// The requested change cannot be represented unambiguously.
    #[error("Ambiguous operation: {reason}")]
    Ambiguity { reason: &'static str },
    /// Addressing information rejected.
    #[error(transparent)]
    Addressing(#[from] AddressingError),
    /// Frame length rejected by the DLC codec.
    #[error(transparent)]
    Dlc(#[from] DlcError),
    /// CAN identifier rejected.
    #[error(transparent)]
    CanId(#[from] CanIdError),
}

//==================================================================================CONFIG_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised when a transport configuration is rejected.
pub enum ConfigError {
    /// Timeout values must be strictly positive.
    #[error("{parameter} timeout must be greater than zero")]
    ZeroTimeout { parameter: &'static str },
    /// Segmentation requires frames of at least eight bytes.
    #[error("DLC {dlc} is too small for segmentation (minimum 8)")]
    DlcTooSmall { dlc: u8 },
    /// DLC rejected by the data-length codec.
    #[error(transparent)]
    Dlc(#[from] DlcError),
}

//==================================================================================TRANSPORT_ERROR
/// Timing parameter (or caller deadline) whose expiry aborted an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeoutParameter {
    /// Transmission confirmation of a packet sent by the sender.
    NAs,
    /// Transmission confirmation of a packet sent by the receiver.
    NAr,
    /// Reception of a Flow Control after a First Frame or a completed block.
    NBs,
    /// Reception of the next Consecutive Frame.
    NCr,
    /// Caller deadline for the first packet of a message.
    ReceiveStart,
    /// Caller deadline for the whole message.
    ReceiveEnd,
}

#[derive(Error, Debug)]
/// Errors surfaced by the transport interface at packet or message granularity.
pub enum TransportError<E: core::fmt::Debug> {
    /// The CAN bus failed to send or receive.
    #[error("CAN bus error: {0:?}")]
    Bus(E),
    /// A timeout elapsed; no partial message is returned.
    #[error("{parameter:?} timeout exceeded ({timeout:?})")]
    Timeout {
        parameter: TimeoutParameter,
        timeout: Duration,
    },
    /// A Flow Control with Overflow flow status was exchanged.
    #[error("Flow Control with Overflow flow status")]
    Overflow,
    /// A new Single Frame or First Frame arrived while a transmission was in progress.
    #[error("Transmission interrupted by a new incoming message")]
    Interrupted,
    /// The listener required by the execution model is not running.
    #[error("No frame listener is active for this execution model")]
    ListenerInactive,
    /// Packet or message construction failed.
    #[error(transparent)]
    Packet(#[from] PacketError),
    /// Transport configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
