//! In-memory representation of a classic CAN or CAN FD frame, as sent to
//! or observed on the bus.
use core::time::Duration;

use embedded_can::{ExtendedId, Id, StandardId};

use crate::error::DlcError;
use crate::protocol::can::{can_id::CanId, dlc};

#[derive(Clone, Debug, PartialEq, Eq)]
/// Raw CAN frame together with the bus metadata the transport layer relies on.
pub struct CanFrame {
    /// 11-bit or 29-bit identifier.
    pub id: CanId,
    /// Frame uses the 29-bit identifier format.
    pub is_extended: bool,
    /// Frame is a CAN FD frame.
    pub is_fd: bool,
    /// Data field buffer; only the first `len` bytes are meaningful.
    pub data: [u8; dlc::MAX_DATA_LENGTH],
    /// Number of valid data bytes.
    pub len: usize,
    /// The frame is the bus echo of a local transmission.
    pub is_echo: bool,
    /// Observation time, relative to the bus epoch.
    pub timestamp: Duration,
}

impl CanFrame {
    /// Build a frame carrying `data`; `None` when more than 64 bytes are given.
    pub fn new(id: CanId, data: &[u8]) -> Option<Self> {
        if data.len() > dlc::MAX_DATA_LENGTH {
            return None;
        }
        let mut buffer = [0u8; dlc::MAX_DATA_LENGTH];
        buffer[..data.len()].copy_from_slice(data);
        Some(Self {
            id,
            is_extended: id.is_extended(),
            is_fd: dlc::is_fd_length(data.len()),
            data: buffer,
            len: data.len(),
            is_echo: false,
            timestamp: Duration::ZERO,
        })
    }

    /// Mark the frame as the echo of a local transmission (or not).
    pub fn with_echo(mut self, is_echo: bool) -> Self {
        self.is_echo = is_echo;
        self
    }

    /// Attach an observation timestamp.
    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Populated data bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// DLC representing exactly the populated length.
    pub fn dlc_code(&self) -> Result<u8, DlcError> {
        dlc::encode(self.len)
    }

    /// Same identifier and data field, regardless of direction and timing.
    pub fn same_content(&self, other: &CanFrame) -> bool {
        self.id == other.id && self.is_extended == other.is_extended && self.data() == other.data()
    }
}

//==================================================================================EMBEDDED_CAN
impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        let (raw, is_extended) = match id.into() {
            Id::Standard(id) => (id.as_raw() as u32, false),
            Id::Extended(id) => (id.as_raw(), true),
        };
        let mut frame = CanFrame::new(CanId(raw), data)?;
        frame.is_extended = is_extended;
        Some(frame)
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        // ISO-TP never uses remote frames.
        None
    }

    fn is_extended(&self) -> bool {
        self.is_extended
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        if self.is_extended {
            Id::Extended(ExtendedId::new(self.id.raw()).unwrap_or(ExtendedId::ZERO))
        } else {
            Id::Standard(StandardId::new(self.id.raw() as u16).unwrap_or(StandardId::ZERO))
        }
    }

    fn dlc(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

//==================================================================================TESTS
#[cfg(test)]
mod tests {
    use super::*;
    use embedded_can::Frame;

    #[test]
    /// Identifier width and FD flag follow the identifier and data length.
    fn test_new_infers_flags() {
        let frame = CanFrame::new(CanId(0x7E0), &[0x02, 0x10, 0x03]).unwrap();
        assert!(!frame.is_extended);
        assert!(!frame.is_fd);
        assert_eq!(frame.data(), &[0x02, 0x10, 0x03]);
        assert_eq!(frame.dlc_code(), Ok(3));

        let frame = CanFrame::new(CanId(0x18DA_F110), &[0u8; 12]).unwrap();
        assert!(frame.is_extended);
        assert!(frame.is_fd);
        assert!(CanFrame::new(CanId(0x7E0), &[0u8; 65]).is_none());
    }

    #[test]
    /// Conversion through the `embedded_can::Frame` trait keeps id and data.
    fn test_embedded_can_bridge() {
        let id = ExtendedId::new(0x18DA_F110).unwrap();
        let frame = <CanFrame as Frame>::new(id, &[1, 2, 3]).unwrap();
        assert!(Frame::is_extended(&frame));
        assert_eq!(Frame::id(&frame), Id::Extended(id));
        assert_eq!(Frame::dlc(&frame), 3);
        assert!(<CanFrame as Frame>::new_remote(id, 3).is_none());
    }

    #[test]
    /// Echo flag and timestamp do not take part in content comparison.
    fn test_same_content_ignores_metadata() {
        let sent = CanFrame::new(CanId(0x7E0), &[0x30, 0, 0]).unwrap();
        let echo = sent
            .clone()
            .with_echo(true)
            .with_timestamp(Duration::from_millis(5));
        assert!(sent.same_content(&echo));
        assert_ne!(sent, echo);
    }
}
