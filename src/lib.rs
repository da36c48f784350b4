//! `korri-isotp` library: ISO 15765-2 (CAN-TP) transport for diagnostic
//! (UDS) messages. The crate exposes addressing formats, CAN packet codecs,
//! message segmentation and reassembly, and a transport interface handling
//! flow control and timing over blocking or asynchronous CAN buses.
//==================================================================================
#[macro_use]
mod fmt;
//==================================================================================
/// Domain and low-level errors (CAN identifiers, addressing, packet
/// encoding, configuration, and transport failures).
pub mod error;
/// ISO-TP protocol implementation: addressing, packets, messages, and transport.
pub mod protocol;
//==================================================================================
