//! Consecutive Frame codec tests.
use super::*;
use crate::error::PacketError;

#[test]
fn test_encode_and_views() {
    let data = encode_valid(&[], 0x1, &[1, 2, 3, 4, 5, 6, 7], None, 0xCC).unwrap();
    assert_eq!(data.as_slice(), &[0x21, 1, 2, 3, 4, 5, 6, 7]);
    assert!(validate(data.as_slice(), 0).is_ok());
    assert_eq!(sequence_number(data.as_slice(), 0), Some(1));
    assert_eq!(payload(data.as_slice(), 0), Some(&[1, 2, 3, 4, 5, 6, 7][..]));
}

#[test]
/// The payload view keeps filler bytes: the codec cannot tell them apart.
fn test_padding_is_reported_as_payload() {
    let data = encode_valid(&[0xAE], 0xF, &[0x55, 0x66], Some(8), 0xCC).unwrap();
    assert_eq!(
        data.as_slice(),
        &[0xAE, 0x2F, 0x55, 0x66, 0xCC, 0xCC, 0xCC, 0xCC]
    );
    assert_eq!(sequence_number(data.as_slice(), 1), Some(0xF));
    assert_eq!(
        payload(data.as_slice(), 1),
        Some(&[0x55, 0x66, 0xCC, 0xCC, 0xCC, 0xCC][..])
    );
}

#[test]
fn test_rejects() {
    assert!(matches!(
        encode_valid(&[], 0x10, &[1], None, 0xCC),
        Err(PacketError::InvalidValue { .. })
    ));
    assert!(encode_valid(&[], 0x1, &[], None, 0xCC).is_err());
    assert!(encode_any(&[], 0x1, &[], None, 0xCC).is_ok());
    assert!(matches!(
        encode_valid(&[], 0x1, &[0u8; 8], Some(8), 0xCC),
        Err(PacketError::Inconsistent { .. })
    ));
    assert!(validate(&[0x21], 0).is_err());
    assert!(validate(&[0x31, 0x00], 0).is_err());
}

#[test]
fn test_capacity() {
    assert_eq!(max_payload(0, 8), Ok(7));
    assert_eq!(max_payload(1, 0xF), Ok(62));
    assert_eq!(min_dlc(0, 7), Ok(8));
    assert_eq!(min_dlc(0, 8), Ok(9));
}
