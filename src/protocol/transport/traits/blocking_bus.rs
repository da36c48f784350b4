//! Blocking CAN bus abstraction, polled from a dedicated listener thread.
use core::time::Duration;

use crate::protocol::can::can_frame::CanFrame;

/// Contract to send and receive CAN frames from ordinary threads.
///
/// Echo requirements are the same as for [`CanBus`](super::can_bus::CanBus):
/// every transmitted frame must be observable through `recv` with `is_echo`
/// set.
pub trait BlockingCanBus: Send + Sync + 'static {
    type Error: core::fmt::Debug + Send;
    /// Emit a frame on the bus.
    fn send(&self, frame: &CanFrame) -> Result<(), Self::Error>;
    /// Wait at most `timeout` for the next observed frame.
    fn recv(&self, timeout: Duration) -> Result<Option<CanFrame>, Self::Error>;
}
