use super::*;
use std::collections::BTreeMap;

fn dict(entries: &[(&[u8], Value)]) -> Value {
    let mut map = BTreeMap::new();
    for (key, value) in entries {
        map.insert(key.to_vec(), value.clone());
    }
    Value::Dict(map)
}

#[test]
fn test_encode_scalars() {
    assert_eq!(Value::from(0u64).encode(), b"i0e");
    assert_eq!(Value::from(42u64).encode(), b"i42e");
    assert_eq!(Value::from(-7i64).encode(), b"i-7e");
    assert_eq!(Value::from(u64::MAX).encode(), b"i18446744073709551615e");
    assert_eq!(Value::from(&b"spam"[..]).encode(), b"4:spam");
    assert_eq!(Value::from(Vec::new()).encode(), b"0:");
}

#[test]
fn test_encode_dict_sorted_by_key() {
    let value = dict(&[
        (b"T", Value::from(1u64)),
        (b"A", Value::from(&b"L"[..])),
        (b"L", Value::from(2u64)),
    ]);
    assert_eq!(value.encode(), b"d1:A1:L1:Li2e1:Ti1ee");
}

#[test]
fn test_encode_nested() {
    let value = Value::List(vec![
        Value::from(1u64),
        dict(&[(b"k", Value::List(vec![]))]),
    ]);
    assert_eq!(value.encode(), b"li1ed1:kleee");
}

#[test]
fn test_streaming_encoder_matches_value_encoding() {
    let mut enc = Encoder::new();
    enc.begin_dict();
    enc.dict_bytes(b"A", b"L");
    enc.dict_u64(b"L", 2);
    enc.dict_u64(b"T", 1);
    enc.end();
    let streamed = enc.into_bytes();

    let value = dict(&[
        (b"A", Value::from(&b"L"[..])),
        (b"L", Value::from(2u64)),
        (b"T", Value::from(1u64)),
    ]);
    assert_eq!(streamed, value.encode());
}

#[test]
fn test_decode_value_roundtrip() {
    let encoded = b"d1:ad1:bli1ei-2e3:xyzee1:ci0ee";
    let value = Value::decode(encoded).unwrap();
    assert_eq!(value.encode(), encoded);
    assert_eq!(value.get(b"c").and_then(Value::as_u64), Some(0));
}

#[test]
fn test_decode_accepts_unsorted_dict() {
    let value = Value::decode(b"d1:bi2e1:ai1ee").unwrap();
    // Re-encoding normalizes order
    assert_eq!(value.encode(), b"d1:ai1e1:bi2ee");
}

#[test]
fn test_decode_rejects_duplicate_keys() {
    let err = Value::decode(b"d1:ai1e1:ai2ee").unwrap_err();
    assert!(matches!(err, DecodeError::DuplicateKey { .. }));
}

#[test]
fn test_decode_rejects_noncanonical_integers() {
    for bad in [&b"i01e"[..], b"i-0e", b"ie", b"i-e", b"i+1e", b"i1-e", b"i1.5e"] {
        let err = Value::decode(bad).unwrap_err();
        assert!(
            matches!(err, DecodeError::InvalidInteger { .. }),
            "{:?} gave {:?}",
            String::from_utf8_lossy(bad),
            err
        );
    }
}

#[test]
fn test_decode_rejects_noncanonical_lengths() {
    assert!(matches!(
        Value::decode(b"01:a").unwrap_err(),
        DecodeError::InvalidLength { .. }
    ));
    assert!(matches!(
        Value::decode(b"99999999999999999999999:a").unwrap_err(),
        DecodeError::InvalidLength { .. }
    ));
}

#[test]
fn test_decode_length_exceeds_buffer() {
    let err = Value::decode(b"10:short").unwrap_err();
    assert!(matches!(err, DecodeError::UnexpectedEof { .. }));
    assert!(err.is_malformed());
}

#[test]
fn test_decode_integer_range() {
    assert_eq!(
        Value::decode(b"i-9223372036854775808e").unwrap(),
        Value::Integer(i64::MIN as i128)
    );
    assert!(Value::decode(b"i18446744073709551616e").is_err());
    assert!(Value::decode(b"i-9223372036854775809e").is_err());
}

#[test]
fn test_decode_trailing_data() {
    let err = Value::decode(b"i1ei2e").unwrap_err();
    assert_eq!(err, DecodeError::TrailingData { pos: 3, remaining: 3 });
}

#[test]
fn test_decode_depth_limit() {
    let mut deep = Vec::new();
    deep.extend(std::iter::repeat(b'l').take(MAX_DEPTH + 1));
    deep.extend(std::iter::repeat(b'e').take(MAX_DEPTH + 1));
    assert!(matches!(
        Value::decode(&deep).unwrap_err(),
        DecodeError::DepthExceeded { .. }
    ));

    let mut ok = Vec::new();
    ok.extend(std::iter::repeat(b'l').take(MAX_DEPTH));
    ok.extend(std::iter::repeat(b'e').take(MAX_DEPTH));
    assert!(Value::decode(&ok).is_ok());
}

#[test]
fn test_decode_invalid_token() {
    let err = Value::decode(b"x").unwrap_err();
    assert_eq!(err, DecodeError::InvalidToken { pos: 0, byte: b'x' });
}

#[test]
fn test_reader_key_driven_walk() {
    let buf = b"d1:Ai5e1:B3:abc1:Cli1eee";
    let mut r = Reader::new(buf);
    r.enter_dict().unwrap();

    assert_eq!(r.next_key().unwrap(), Some(&b"A"[..]));
    assert_eq!(r.take_u64().unwrap(), 5);
    assert_eq!(r.next_key().unwrap(), Some(&b"B"[..]));
    assert_eq!(r.take_bytes().unwrap(), b"abc");
    assert_eq!(r.next_key().unwrap(), Some(&b"C"[..]));
    r.skip_value().unwrap();
    assert_eq!(r.next_key().unwrap(), None);
    r.finish().unwrap();
}

#[test]
fn test_reader_type_mismatch() {
    let mut r = Reader::new(b"3:abc");
    let err = r.take_u64().unwrap_err();
    assert_eq!(
        err,
        DecodeError::TypeMismatch {
            pos: 0,
            expected: ValueKind::Integer,
            found: ValueKind::Bytes,
        }
    );
    assert!(!err.is_malformed());
}

#[test]
fn test_reader_negative_into_u64() {
    let mut r = Reader::new(b"i-1e");
    assert!(matches!(
        r.take_u64().unwrap_err(),
        DecodeError::InvalidInteger { .. }
    ));
    let mut r = Reader::new(b"i-1e");
    assert_eq!(r.take_i64().unwrap(), -1);
}

#[test]
fn test_reader_non_string_key() {
    let mut r = Reader::new(b"di1ei2ee");
    r.enter_dict().unwrap();
    assert!(matches!(
        r.next_key().unwrap_err(),
        DecodeError::InvalidToken { .. }
    ));
}

#[test]
fn test_every_prefix_is_truncated() {
    let encoded = b"d1:ad1:bli1ei-2e3:xyzee1:ci0ee";
    for cut in 0..encoded.len() {
        let err = Value::decode(&encoded[..cut]).unwrap_err();
        assert!(err.is_malformed(), "prefix {} gave {:?}", cut, err);
    }
}
