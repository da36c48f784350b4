//! Segmentation of diagnostic messages into CAN packets and reassembly of
//! packet sequences into messages.
pub mod assembler;
pub mod builder;

#[cfg(test)]
pub mod tests;
