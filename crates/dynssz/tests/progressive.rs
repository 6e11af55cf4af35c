//! Progressive containers, lists and bitlists.
#![allow(unused_crate_dependencies)]

use std::collections::HashMap;

use dynssz::{DynSsz, FieldTags, SszError, StructBuilder, StructValue, TypeDef, Value};

fn ssz() -> DynSsz {
    DynSsz::new(HashMap::new())
}

#[test]
fn sparse_indices_leave_zero_chunks() {
    let codec = ssz();
    let ty = StructBuilder::new("Sparse")
        .field_with("f0", &TypeDef::uint64(), FieldTags::new().index(0))
        .field_with("f3", &TypeDef::uint16(), FieldTags::new().index(3))
        .build();
    let value = Value::Struct(
        StructValue::new()
            .with_field("f0", Value::U64(7))
            .with_field("f3", Value::U16(9)),
    );

    // The wire format ignores sparse indices entirely.
    let encoded = codec.marshal(&ty, &value).unwrap();
    assert_eq!(hex::encode(&encoded), "07000000000000000900");

    let root = codec.hash_tree_root(&ty, &value).unwrap();
    assert_eq!(
        hex::encode(root.as_slice()),
        "28f9e5306ce3cc9edfa32abd7c154a8d3e5e3c1a7c275a5d6f0ace847b3cec92"
    );

    let decoded = codec.decode(&ty, &encoded).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn progressive_requires_indices_on_every_field() {
    let codec = ssz();
    let inner = StructBuilder::new("PartiallyIndexed")
        .field_with("f0", &TypeDef::uint64(), FieldTags::new().index(0))
        .field("f1", &TypeDef::uint32())
        .build();
    let outer = StructBuilder::new("Holder")
        .field_with("p", &inner, FieldTags::new().ty("progressive_container"))
        .build();
    assert!(matches!(
        codec.validate_type(&outer),
        Err(SszError::TagParse(_))
    ));
}

#[test]
fn indices_must_strictly_increase() {
    let codec = ssz();
    let ty = StructBuilder::new("OutOfOrder")
        .field_with("f0", &TypeDef::uint64(), FieldTags::new().index(5))
        .field_with("f1", &TypeDef::uint32(), FieldTags::new().index(3))
        .build();
    assert!(matches!(
        codec.validate_type(&ty),
        Err(SszError::TagParse(_))
    ));

    let dup = StructBuilder::new("Duplicate")
        .field_with("f0", &TypeDef::uint64(), FieldTags::new().index(2))
        .field_with("f1", &TypeDef::uint32(), FieldTags::new().index(2))
        .build();
    assert!(matches!(
        codec.validate_type(&dup),
        Err(SszError::TagParse(_))
    ));
}

#[test]
fn progressive_list_root() {
    let codec = ssz();
    let longs = TypeDef::slice(&TypeDef::uint64());
    let ty = StructBuilder::new("Prog")
        .field_with("values", &longs, FieldTags::new().ty("progressive_list"))
        .build();
    let value = Value::Struct(StructValue::new().with_field(
        "values",
        Value::List((1u64..=5).map(Value::U64).collect()),
    ));
    let root = codec.hash_tree_root(&ty, &value).unwrap();
    assert_eq!(
        hex::encode(root.as_slice()),
        "41c97a718082c0afb68b596e0ba202c692191dfea64c3d680d2a06ad04cac0b6"
    );

    // Wire format matches a plain list.
    let encoded = codec.marshal(&ty, &value).unwrap();
    let decoded = codec.decode(&ty, &encoded).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn progressive_bitlist_root() {
    let codec = ssz();
    let ty = StructBuilder::new("ProgBits")
        .field_with(
            "bits",
            &TypeDef::bitlist(),
            FieldTags::new().ty("progressive_bitlist"),
        )
        .build();
    let value = Value::Struct(
        StructValue::new().with_field("bits", Value::bytes(vec![0b0001_1111])),
    );
    let root = codec.hash_tree_root(&ty, &value).unwrap();
    assert_eq!(
        hex::encode(root.as_slice()),
        "5a9fcd991b00096330602d6a5fa85bc4ae96e4888d7262fb56b0237f0b1d1247"
    );
}

#[test]
fn active_fields_have_one_bit_per_field() {
    // Verified through the root: flipping a declared index moves the root.
    let codec = ssz();
    let a = StructBuilder::new("A")
        .field_with("f0", &TypeDef::uint64(), FieldTags::new().index(0))
        .field_with("f1", &TypeDef::uint16(), FieldTags::new().index(1))
        .build();
    let b = StructBuilder::new("B")
        .field_with("f0", &TypeDef::uint64(), FieldTags::new().index(0))
        .field_with("f1", &TypeDef::uint16(), FieldTags::new().index(2))
        .build();
    let value = Value::Struct(
        StructValue::new()
            .with_field("f0", Value::U64(1))
            .with_field("f1", Value::U16(2)),
    );
    let root_a = codec.hash_tree_root(&a, &value).unwrap();
    let root_b = codec.hash_tree_root(&b, &value).unwrap();
    assert_ne!(root_a, root_b);
}
