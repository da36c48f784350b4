//! CAN primitives: identifiers, data length codes, and raw frames.
pub mod can_frame;
pub mod can_id;
pub mod dlc;
