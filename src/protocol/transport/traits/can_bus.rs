//! Minimal abstraction for an asynchronous CAN bus. Allows the library to plug
//! into various implementations (embedded HAL, SocketCAN, simulated buses).
use crate::protocol::can::can_frame::CanFrame;
use futures_util::Future;

/// Contract to send and receive CAN frames asynchronously.
///
/// Both methods take `&self`: the concurrent listener receives while the
/// transport interface sends. Implementations must report every frame they
/// transmit back through [`recv`](CanBus::recv) with `is_echo` set, which is
/// how transmissions are confirmed.
pub trait CanBus {
    type Error: core::fmt::Debug;
    /// Emit a frame on the bus.
    fn send<'a>(&'a self, frame: &'a CanFrame)
        -> impl Future<Output = Result<(), Self::Error>> + 'a;
    /// Retrieve the next observed frame, waiting until one arrives.
    fn recv<'a>(&'a self) -> impl Future<Output = Result<CanFrame, Self::Error>> + 'a;
}
