//! Tests for the message segmenter (`PacketIterator`).
use super::*;
use crate::protocol::packet::{CanPacketType, CanPacketView};

fn normal_node() -> NodeAddressing {
    NodeAddressing::normal_11bit(0x7E8, 0x7E0, 0x7DF, 0x7DF).unwrap()
}

fn extended_node() -> NodeAddressing {
    NodeAddressing::new(
        AddressingInformation::extended(AddressingType::Physical, 0x6F1, 0xF1).unwrap(),
        AddressingInformation::extended(AddressingType::Physical, 0x6F0, 0x10).unwrap(),
        AddressingInformation::extended(AddressingType::Functional, 0x6F3, 0xF1).unwrap(),
        AddressingInformation::extended(AddressingType::Functional, 0x6F2, 0xFF).unwrap(),
    )
    .unwrap()
}

#[test]
/// Short payload: one Single Frame, padded to the base DLC.
fn test_single_frame_padded() {
    let segmenter = CanSegmenter::new(normal_node(), 8, false, 0xCC).unwrap();
    let packets = segmenter
        .segment_all(&UdsMessage::physical(vec![0x10, 0x03]))
        .unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].can_id(), 0x7E0);
    assert_eq!(
        packets[0].raw_frame_data(),
        &[0x02, 0x10, 0x03, 0xCC, 0xCC, 0xCC, 0xCC, 0xCC]
    );
}

#[test]
/// Data optimization sends the smallest frame.
fn test_single_frame_optimized() {
    let segmenter = CanSegmenter::new(normal_node(), 8, true, 0xCC).unwrap();
    let packets = segmenter
        .segment_all(&UdsMessage::functional(vec![0x3E, 0x80]))
        .unwrap();
    assert_eq!(packets[0].can_id(), 0x7DF);
    assert_eq!(packets[0].raw_frame_data(), &[0x02, 0x3E, 0x80]);
}

#[test]
/// 20 bytes, classic CAN: FF (6 bytes) then CF 1 (7 bytes) and CF 2 (7 bytes).
fn test_first_and_consecutive_frames() {
    let payload: Vec<u8> = (1..=20).collect();
    let message = UdsMessage::physical(payload.clone());
    let segmenter = CanSegmenter::new(normal_node(), 8, false, 0xCC).unwrap();
    let mut iter = segmenter.segment(&message).unwrap();

    let ff = iter.next().unwrap().unwrap();
    assert_eq!(ff.packet_type(), CanPacketType::FirstFrame);
    assert_eq!(ff.raw_frame_data(), &[0x10, 0x14, 1, 2, 3, 4, 5, 6]);
    assert_eq!(iter.remaining(), 14);

    let cf1 = iter.next().unwrap().unwrap();
    assert_eq!(cf1.raw_frame_data(), &[0x21, 7, 8, 9, 10, 11, 12, 13]);
    let cf2 = iter.next().unwrap().unwrap();
    assert_eq!(cf2.raw_frame_data(), &[0x22, 14, 15, 16, 17, 18, 19, 20]);
    assert!(iter.next().is_none());
}

#[test]
/// The last Consecutive Frame is padded unless data optimization is enabled.
fn test_last_consecutive_frame_sizing() {
    let payload: Vec<u8> = (0..10).collect();
    let message = UdsMessage::physical(payload);

    let padded = CanSegmenter::new(extended_node(), 8, false, 0xAA)
        .unwrap()
        .segment_all(&message)
        .unwrap();
    assert_eq!(padded.len(), 2);
    assert_eq!(padded[0].raw_frame_data(), &[0x10, 0x10, 0x0A, 0, 1, 2, 3, 4]);
    assert_eq!(
        padded[1].raw_frame_data(),
        &[0x10, 0x21, 5, 6, 7, 8, 9, 0xAA]
    );

    let optimized = CanSegmenter::new(extended_node(), 8, true, 0xAA)
        .unwrap()
        .segment_all(&message)
        .unwrap();
    assert_eq!(optimized[1].raw_frame_data(), &[0x10, 0x21, 5, 6, 7, 8, 9]);
}

#[test]
/// Sequence numbers start at 1 and wrap from 15 to 0.
fn test_sequence_number_wraps() {
    let message = UdsMessage::physical(vec![0x5A; 6 + 7 * 17]);
    let packets = CanSegmenter::new(normal_node(), 8, false, 0xCC)
        .unwrap()
        .segment_all(&message)
        .unwrap();
    assert_eq!(packets.len(), 18);
    let sequence_numbers: Vec<u8> = packets[1..]
        .iter()
        .map(|packet| packet.sequence_number().unwrap())
        .collect();
    assert_eq!(sequence_numbers[0], 1);
    assert_eq!(sequence_numbers[14], 15);
    assert_eq!(sequence_numbers[15], 0);
    assert_eq!(sequence_numbers[16], 1);
}

#[test]
/// CAN FD base frame: the Single Frame capacity is 62 bytes with normal addressing.
fn test_fd_frames() {
    let segmenter = CanSegmenter::new(normal_node(), 0xF, false, 0xCC).unwrap();
    let packets = segmenter
        .segment_all(&UdsMessage::physical(vec![1u8; 62]))
        .unwrap();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].dlc(), 0xF);
    assert_eq!(&packets[0].raw_frame_data()[..2], &[0x00, 62]);

    let packets = segmenter
        .segment_all(&UdsMessage::physical(vec![1u8; 100]))
        .unwrap();
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].payload().unwrap().len(), 62);
    assert_eq!(packets[1].raw_frame_data().len(), 64);
}

#[test]
fn test_rejects() {
    assert!(CanSegmenter::new(normal_node(), 7, false, 0xCC).is_err());
    assert!(CanSegmenter::new(normal_node(), 16, false, 0xCC).is_err());

    let segmenter = CanSegmenter::new(normal_node(), 8, false, 0xCC).unwrap();
    assert!(segmenter.segment(&UdsMessage::physical(Vec::new())).is_err());
    assert!(matches!(
        segmenter.segment(&UdsMessage::functional(vec![0u8; 8])),
        Err(PacketError::Inconsistent { .. })
    ));
}
