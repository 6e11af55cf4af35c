//! Decode failures must surface the precise error kind.
#![allow(unused_crate_dependencies)]

use std::collections::HashMap;

use dynssz::{
    DynSsz, FieldTags, SszError, StructBuilder, StructValue, TypeDef, TypeRef, UnionBuilder, Value,
};

fn ssz() -> DynSsz {
    DynSsz::new(HashMap::new())
}

fn decode_err(codec: &DynSsz, ty: &TypeRef, data: &[u8]) -> SszError {
    let mut target = Value::None;
    codec
        .unmarshal(ty, data, &mut target)
        .expect_err("decode must fail")
}

fn fixed_pair() -> TypeRef {
    StructBuilder::new("Pair")
        .field("a", &TypeDef::uint32())
        .field("b", &TypeDef::uint64())
        .build()
}

#[test]
fn truncated_container() {
    let codec = ssz();
    let err = decode_err(&codec, &fixed_pair(), &[0x01, 0x02, 0x03]);
    assert!(matches!(err, SszError::UnexpectedEof { .. }), "{err}");
}

#[test]
fn trailing_bytes_are_a_size_mismatch() {
    let codec = ssz();
    let err = decode_err(&codec, &fixed_pair(), &[0u8; 13]);
    assert!(matches!(err, SszError::SizeMismatch(_)), "{err}");
}

#[test]
fn non_boolean_byte() {
    let codec = ssz();
    let ty = StructBuilder::new("Flag")
        .field("on", &TypeDef::bool())
        .build();
    let err = decode_err(&codec, &ty, &[0x02]);
    assert!(matches!(err, SszError::InvalidValue(_)), "{err}");
}

#[test]
fn first_offset_must_match_fixed_length() {
    let codec = ssz();
    let bytes = TypeDef::slice(&TypeDef::uint8());
    let ty = StructBuilder::new("WithList")
        .field("tag", &TypeDef::uint8())
        .field_with("data", &bytes, FieldTags::new().max("16"))
        .build();
    // Fixed section is 5 bytes; an offset of 6 points past it.
    let err = decode_err(&codec, &ty, &[0x01, 0x06, 0x00, 0x00, 0x00, 0xaa]);
    assert!(matches!(err, SszError::Offset(_)), "{err}");
}

#[test]
fn decreasing_offsets() {
    let codec = ssz();
    let bytes = TypeDef::slice(&TypeDef::uint8());
    let ty = StructBuilder::new("TwoLists")
        .field_with("a", &bytes, FieldTags::new().max("16"))
        .field_with("b", &bytes, FieldTags::new().max("16"))
        .build();
    // The first offset is valid (8, the fixed length); the second regresses.
    let mut wire = Vec::new();
    wire.extend_from_slice(&8u32.to_le_bytes());
    wire.extend_from_slice(&7u32.to_le_bytes());
    wire.extend_from_slice(&[0xaa, 0xbb]);
    let err = decode_err(&codec, &ty, &wire);
    assert!(matches!(err, SszError::Offset(_)), "{err}");
}

#[test]
fn list_payload_not_a_multiple_of_element_size() {
    let codec = ssz();
    let shorts = TypeDef::slice(&TypeDef::uint16());
    let err = decode_err(&codec, &shorts, &[0x01, 0x02, 0x03]);
    assert!(matches!(err, SszError::Offset(_)), "{err}");
}

#[test]
fn bitvector_padding_bits_must_be_zero() {
    let codec = ssz();
    let bits = TypeDef::slice(&TypeDef::uint8());
    let ty = StructBuilder::new("Votes")
        .field_with(
            "bits",
            &bits,
            FieldTags::new().ty("bitvector").size("2").bitsize(12),
        )
        .build();
    let err = decode_err(&codec, &ty, &[0xff, 0x1f]);
    assert!(matches!(err, SszError::InvalidValue(_)), "{err}");

    // The same bytes with clear padding decode fine.
    let mut target = Value::None;
    codec.unmarshal(&ty, &[0xff, 0x0f], &mut target).unwrap();
}

#[test]
fn unknown_union_selector() {
    let codec = ssz();
    let union = UnionBuilder::new("Either")
        .variant("a", &TypeDef::uint32())
        .variant("b", &TypeDef::uint64())
        .build();
    let err = decode_err(&codec, &union, &[0x09, 0x00, 0x00, 0x00, 0x00]);
    assert!(
        matches!(err, SszError::InvalidUnionVariant { selector: 9 }),
        "{err}"
    );
}

#[test]
fn bitlist_over_capacity() {
    let codec = ssz();
    let ty = StructBuilder::new("Bits")
        .field_with("bits", &TypeDef::bitlist(), FieldTags::new().max("4"))
        .build();
    // Eight data bits with the sentinel in a second byte exceeds max=4.
    let err = decode_err(&codec, &ty, &[0x04, 0x00, 0x00, 0x00, 0xff, 0x01]);
    assert!(matches!(err, SszError::ListTooBig { len: 8, max: 4 }), "{err}");
}

#[test]
fn nil_top_level_pointer_target() {
    let codec = ssz();
    let ty = TypeDef::pointer(&TypeDef::uint64());
    let mut target = Value::None;
    let err = codec
        .unmarshal(&ty, &7u64.to_le_bytes(), &mut target)
        .expect_err("nil target");
    assert!(matches!(err, SszError::NilTarget), "{err}");

    // A pointer-shaped target works.
    let mut target = Value::Pointer(Box::new(Value::U64(0)));
    codec.unmarshal(&ty, &7u64.to_le_bytes(), &mut target).unwrap();
    assert_eq!(target, Value::Pointer(Box::new(Value::U64(7))));
}

#[test]
fn mismatched_pointer_target() {
    let codec = ssz();
    let inner = StructBuilder::new("Inner")
        .field("v", &TypeDef::uint64())
        .build();
    let ptr = TypeDef::pointer(&inner);
    let ty = StructBuilder::new("Outer").field("p", &ptr).build();

    // Pre-populate the pointer slot with a non-pointer value.
    let mut target = Value::Struct(StructValue::new().with_field("p", Value::Bool(false)));
    let err = codec
        .unmarshal(&ty, &7u64.to_le_bytes(), &mut target)
        .expect_err("bad slot");
    assert!(matches!(err, SszError::NotAPointer), "{err}");
}

#[test]
fn empty_buffer_for_static_type() {
    let codec = ssz();
    let err = decode_err(&codec, &TypeDef::uint64(), &[]);
    assert!(matches!(
        err,
        SszError::UnexpectedEof {
            needed: 8,
            available: 0
        }
    ));
}
