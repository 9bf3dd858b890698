use hyperslab_common::error::ErrorKind;
use hyperslab_testkit::SelectionGen;

use super::{OPS, select, to_mask};
use crate::{CodecConfig, FormatVersion, SelectOp, Selection, SelectionType, UNLIMITED};

const VERSIONS: [FormatVersion; 3] = [FormatVersion::V1, FormatVersion::V2, FormatVersion::V3];

#[test]
fn test_random_round_trips_in_every_version() {
    let mut generator = SelectionGen::with_seed(5150);
    for round in 0..120 {
        let rank = 1 + round % 3;
        let extent = generator.extent(rank, 9);
        let mut sel = Selection::none(extent.clone());
        select(&mut sel, SelectOp::Set, &generator.hyperslab(&extent));
        if generator.bool() {
            let op = OPS[1 + generator.pick(OPS.len() - 1)];
            select(&mut sel, op, &generator.hyperslab(&extent));
        }
        let expected = to_mask(&sel);

        for low in VERSIONS {
            let config = CodecConfig::with_bounds(low, FormatVersion::V3).unwrap();
            let bytes = sel.encode_with(&config).unwrap();
            assert_eq!(bytes.len(), sel.serial_size_with(&config).unwrap());
            let decoded = Selection::decode(&bytes, extent.clone()).unwrap();
            assert_eq!(to_mask(&decoded), expected, "round {round} low bound {low:?}");
        }
    }
}

#[test]
fn test_regular_selection_echoes_parameters() {
    let sel = Selection::hyperslab(vec![20, 20], &[1, 2], Some(&[4, 5]), &[3, 2], Some(&[2, 3])).unwrap();
    for low in [FormatVersion::V2, FormatVersion::V3] {
        let config = CodecConfig::with_bounds(low, FormatVersion::V3).unwrap();
        let bytes = sel.encode_with(&config).unwrap();
        assert_eq!(bytes[4], low as u8);
        let decoded = Selection::decode(&bytes, vec![20, 20]).unwrap();
        assert_eq!(decoded.regular_hyperslab(), sel.regular_hyperslab());
    }
}

#[test]
fn test_version_selection() {
    let regular = Selection::hyperslab(vec![10], &[0], Some(&[2]), &[3], None).unwrap();
    let default = CodecConfig::default();
    assert_eq!(regular.encoding_version(&default).unwrap(), FormatVersion::V1);

    let huge = Selection::hyperslab(vec![u64::MAX - 1], &[1 << 40], None, &[2], None).unwrap();
    assert_eq!(huge.encoding_version(&default).unwrap(), FormatVersion::V2);

    let mut irregular = Selection::hyperslab(vec![10, 10], &[0, 0], None, &[2, 2], None).unwrap();
    irregular
        .select_hyperslab(SelectOp::Or, &[5, 5], None, &[1, 3], None)
        .unwrap();
    assert_eq!(irregular.encoding_version(&default).unwrap(), FormatVersion::V1);
    let v2 = CodecConfig::with_bounds(FormatVersion::V2, FormatVersion::V3).unwrap();
    assert_eq!(irregular.encoding_version(&v2).unwrap(), FormatVersion::V3);

    let mut far = Selection::hyperslab(vec![1 << 41], &[1 << 40], None, &[2], None).unwrap();
    far.select_hyperslab(SelectOp::Or, &[(1 << 40) + 5], None, &[1], None)
        .unwrap();
    assert_eq!(far.encoding_version(&default).unwrap(), FormatVersion::V3);
    let bytes = far.encode().unwrap();
    assert_eq!(bytes[9], 8);
    let decoded = Selection::decode(&bytes, vec![1 << 41]).unwrap();
    assert_eq!(decoded.num_elements(), 3);
    assert!(decoded.contains(&[(1 << 40) + 5]));
}

#[test]
fn test_encoding_overflow() {
    let v1 = CodecConfig::with_bounds(FormatVersion::V1, FormatVersion::V1).unwrap();
    let unlimited = Selection::hyperslab(vec![10], &[0], None, &[UNLIMITED], None).unwrap();
    let err = unlimited.encode_with(&v1).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::EncodingOverflow { .. }));
    assert!(unlimited.serial_size_with(&v1).is_err());
}

#[test]
fn test_encode_into_appends() {
    let sel = Selection::all(vec![4, 4]);
    let mut buf = vec![0xaa];
    sel.encode_into(&mut buf, &CodecConfig::default()).unwrap();
    assert_eq!(buf.len(), 1 + sel.serial_size().unwrap());
    let decoded = Selection::decode(&buf[1..], vec![4, 4]).unwrap();
    assert_eq!(decoded.select_type(), SelectionType::All);
}

#[test]
fn test_decode_errors() {
    assert!(matches!(
        Selection::decode(&[2, 0, 0], vec![4]).unwrap_err().kind(),
        ErrorKind::InvalidFormat { .. }
    ));

    // v2 regular hyperslab with a zero stride
    let mut bytes = vec![2, 0, 0, 0, 2, 0, 0, 0, 1, 36, 0, 0, 0, 1, 0, 0, 0];
    for v in [0u64, 0, 1, 1] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let err = Selection::decode(&bytes, vec![4]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidFormat { .. }));

    // v1 block with start above end
    let mut bytes = vec![2, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 16, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0];
    bytes.extend_from_slice(&[3, 0, 0, 0, 1, 0, 0, 0]);
    assert!(Selection::decode(&bytes, vec![4]).is_err());
    bytes[24] = 1;
    bytes[28] = 3;
    assert_eq!(Selection::decode(&bytes, vec![4]).unwrap().num_elements(), 3);
}
