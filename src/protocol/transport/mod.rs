//! ISO-TP transport layer: segmentation, flow control, timing, and the bus
//! abstractions the transport interface runs on.
pub mod config;
pub mod frame_buffer;
pub mod interface;
pub mod listener;
pub mod segmentation;
pub mod traits;
pub mod warning;
