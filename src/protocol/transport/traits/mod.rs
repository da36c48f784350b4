//! Abstraction traits used by the transport layer (asynchronous and blocking
//! CAN bus, timer).
pub mod blocking_bus;
pub mod can_bus;
pub mod korri_timer;
