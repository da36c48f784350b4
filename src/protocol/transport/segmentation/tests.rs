//! Round trips combining the segmenter and the assembler.
use crate::protocol::addressing::{
    node::NodeAddressing, AddressingFormat, AddressingInformation, AddressingType,
};
use crate::protocol::message::UdsMessage;
use crate::protocol::transport::segmentation::{
    assembler::{MessageAssembler, ProcessResult},
    builder::CanSegmenter,
};

fn node(format: AddressingFormat) -> NodeAddressing {
    let phys = AddressingType::Physical;
    let func = AddressingType::Functional;
    let build = |addressing_type, can_id, ta, sa, ae| {
        AddressingInformation::new(format, addressing_type, can_id, ta, sa, ae).unwrap()
    };
    match format {
        AddressingFormat::Normal11bit => NodeAddressing::new(
            build(phys, Some(0x7E8), None, None, None),
            build(phys, Some(0x7E0), None, None, None),
            build(func, Some(0x7DE), None, None, None),
            build(func, Some(0x7DF), None, None, None),
        ),
        AddressingFormat::NormalFixed => NodeAddressing::new(
            build(phys, None, Some(0x10), Some(0xF1), None),
            build(phys, None, Some(0xF1), Some(0x10), None),
            build(func, None, Some(0x10), Some(0xF1), None),
            build(func, None, Some(0x33), Some(0x10), None),
        ),
        AddressingFormat::Extended => NodeAddressing::new(
            build(phys, Some(0x6F1), Some(0xF1), None, None),
            build(phys, Some(0x6F0), Some(0x10), None, None),
            build(func, Some(0x6F3), Some(0xF1), None, None),
            build(func, Some(0x6F2), Some(0xFF), None, None),
        ),
        AddressingFormat::Mixed11bit => NodeAddressing::new(
            build(phys, Some(0x701), None, None, Some(0x05)),
            build(phys, Some(0x700), None, None, Some(0x05)),
            build(func, Some(0x703), None, None, Some(0x05)),
            build(func, Some(0x702), None, None, Some(0x05)),
        ),
        AddressingFormat::Mixed29bit => NodeAddressing::new(
            build(phys, None, Some(0x10), Some(0xF1), Some(0x05)),
            build(phys, None, Some(0xF1), Some(0x10), Some(0x05)),
            build(func, None, Some(0x10), Some(0xF1), Some(0x05)),
            build(func, None, Some(0x33), Some(0x10), Some(0x05)),
        ),
    }
    .unwrap()
}

fn roundtrip(format: AddressingFormat, dlc: u8, optimized: bool, payload: &[u8]) -> Vec<u8> {
    let segmenter = CanSegmenter::new(node(format), dlc, optimized, 0xCC).unwrap();
    let message = UdsMessage::physical(payload.to_vec());
    let mut assembler = MessageAssembler::new();
    let mut result = None;

    for packet in segmenter.segment(&message).unwrap() {
        let packet = packet.unwrap();
        if let ProcessResult::MessageComplete(payload) = assembler.process(&packet) {
            result = Some(payload);
        }
    }
    result.expect("message complete")
}

#[test]
/// Every addressing format, classic and FD frames, padded and optimized.
fn test_roundtrip_all_formats() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(300).collect();
    for format in AddressingFormat::ALL {
        for dlc in [8, 0xA, 0xF] {
            for optimized in [false, true] {
                assert_eq!(
                    roundtrip(format, dlc, optimized, &payload),
                    payload,
                    "{format:?} dlc={dlc} optimized={optimized}"
                );
            }
        }
    }
}

#[test]
/// Payload lengths around the Single Frame / First Frame boundary.
fn test_roundtrip_boundaries() {
    for len in [1usize, 6, 7, 8, 13, 14, 15, 62, 63, 64, 4095] {
        let payload = vec![0xA5u8; len];
        assert_eq!(roundtrip(AddressingFormat::Normal11bit, 8, false, &payload), payload);
        assert_eq!(roundtrip(AddressingFormat::Mixed29bit, 0xF, true, &payload), payload);
    }
}

#[test]
/// Messages above 4095 bytes use the First Frame escape sequence.
fn test_roundtrip_escape_sequence() {
    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    assert_eq!(roundtrip(AddressingFormat::Extended, 8, false, &payload), payload);
    assert_eq!(roundtrip(AddressingFormat::Normal11bit, 0xF, false, &payload), payload);
}
