//! Non-fatal conditions reported while sending or receiving.
//!
//! Warnings never abort an operation. They are logged and, when an observer
//! is registered, handed to it.
use core::fmt;
use core::time::Duration;

use crate::error::PacketError;
use crate::protocol::packet::CanPacketType;

/// Frame listener variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    /// Thread polling a [`BlockingCanBus`](super::traits::blocking_bus::BlockingCanBus).
    Blocking,
    /// Future driven by the caller over a [`CanBus`](super::traits::can_bus::CanBus).
    Concurrent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportWarning {
    /// An incoming packet that the current step of the protocol does not expect.
    UnexpectedPacket {
        packet_type: CanPacketType,
        during: &'static str,
    },
    /// Consecutive Frame with a wrong sequence number; it was ignored.
    UnexpectedSequenceNumber { expected: u8, received: u8 },
    /// A Single Frame or First Frame restarted the reception in progress.
    ReceptionInterrupted { by: CanPacketType },
    /// A configured delay exceeds the value the peer's timeouts allow.
    TargetDelayExceeded {
        parameter: &'static str,
        delay: Duration,
        max: Duration,
    },
    /// A listener was stopped while frames it had delivered may be pending.
    ListenerSwitched { stopped: ListenerKind, delivered: usize },
    /// A frame addressed to this node that does not decode as a packet.
    MalformedFrame { can_id: u32, error: PacketError },
    /// The bus reported an error while listening.
    BusError { description: String },
}

impl TransportWarning {
    /// Short, stable name of the warning.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportWarning::UnexpectedPacket { .. } => "unexpected packet",
            TransportWarning::UnexpectedSequenceNumber { .. } => "unexpected sequence number",
            TransportWarning::ReceptionInterrupted { .. } => "reception interrupted",
            TransportWarning::TargetDelayExceeded { .. } => "target delay exceeded",
            TransportWarning::ListenerSwitched { .. } => "listener switched",
            TransportWarning::MalformedFrame { .. } => "malformed frame",
            TransportWarning::BusError { .. } => "bus error",
        }
    }
}

impl fmt::Display for TransportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportWarning::UnexpectedPacket {
                packet_type,
                during,
            } => write!(f, "Unexpected {packet_type:?} received while {during}"),
            TransportWarning::UnexpectedSequenceNumber { expected, received } => write!(
                f,
                "Consecutive Frame with sequence number {received} ignored (expected {expected})"
            ),
            TransportWarning::ReceptionInterrupted { by } => {
                write!(f, "Reception restarted by a new {by:?}")
            }
            TransportWarning::TargetDelayExceeded {
                parameter,
                delay,
                max,
            } => write!(f, "{parameter} = {delay:?} exceeds its maximum of {max:?}"),
            TransportWarning::ListenerSwitched { stopped, delivered } => write!(
                f,
                "{stopped:?} listener stopped after delivering {delivered} frame(s)"
            ),
            TransportWarning::MalformedFrame { can_id, error } => {
                write!(f, "Frame {can_id:#X} ignored: {error}")
            }
            TransportWarning::BusError { description } => {
                write!(f, "CAN bus error while listening: {description}")
            }
        }
    }
}

//==================================================================================WARNING_SINK
type WarningObserver = Box<dyn Fn(&TransportWarning) + Send + Sync>;

/// Destination of the warnings raised by one transport interface.
#[derive(Default)]
pub struct WarningSink {
    observer: Option<WarningObserver>,
}

impl fmt::Debug for WarningSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarningSink")
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl WarningSink {
    pub fn new() -> Self {
        Self { observer: None }
    }

    pub fn with_observer(observer: impl Fn(&TransportWarning) + Send + Sync + 'static) -> Self {
        Self {
            observer: Some(Box::new(observer)),
        }
    }

    pub fn emit(&self, warning: TransportWarning) {
        #[cfg(feature = "tracing")]
        ::tracing::warn!(kind = warning.kind(), "{}", warning);
        #[cfg(feature = "defmt")]
        ::defmt::warn!("ISO-TP warning: {}", warning.kind());

        if let Some(observer) = &self.observer {
            observer(&warning);
        }
    }
}
