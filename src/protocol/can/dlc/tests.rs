//! DLC codec tests.
use super::*;

#[test]
/// Each DLC decodes to its table entry and encodes back.
fn test_table_is_a_bijection() {
    for dlc in 0..=MAX_DLC {
        let len = decode(dlc).unwrap();
        assert_eq!(encode(len), Ok(dlc));
    }
    assert_eq!(decode(9), Ok(12));
    assert_eq!(decode(0xF), Ok(64));
}

#[test]
fn test_invalid_values() {
    assert_eq!(decode(16), Err(DlcError::InvalidDlc { dlc: 16 }));
    assert_eq!(encode(9), Err(DlcError::InvalidDataLength { len: 9 }));
    assert_eq!(encode(65), Err(DlcError::InvalidDataLength { len: 65 }));
}

#[test]
/// Minimal DLC rounds up to the next representable length.
fn test_min_dlc() {
    assert_eq!(min_dlc(0), Ok(0));
    assert_eq!(min_dlc(5), Ok(5));
    assert_eq!(min_dlc(8), Ok(8));
    assert_eq!(min_dlc(9), Ok(9));
    assert_eq!(min_dlc(12), Ok(9));
    assert_eq!(min_dlc(13), Ok(10));
    assert_eq!(min_dlc(33), Ok(0xE));
    assert_eq!(min_dlc(64), Ok(0xF));
    assert!(min_dlc(65).is_err());
}

#[test]
fn test_validate_data_length() {
    assert!(validate_data_length(12, true).is_ok());
    assert!(validate_data_length(13, true).is_err());
    assert!(validate_data_length(13, false).is_ok());
    assert!(validate_data_length(65, false).is_err());
}
