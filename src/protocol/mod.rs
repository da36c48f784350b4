//! ISO 15765-2 protocol stack: addressing, CAN primitives, packets, messages,
//! and the transport layer moving them over a bus.
pub mod addressing;
pub mod can;
pub mod message;
pub mod packet;
pub mod transport;
