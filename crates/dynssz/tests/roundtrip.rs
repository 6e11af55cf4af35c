//! Wire-format and hash-tree-root vectors, plus the round-trip laws.
#![allow(unused_crate_dependencies)]

use std::collections::HashMap;

use dynssz::{
    DynSsz, FieldTags, StructBuilder, StructValue, TypeDef, TypeRef, UnionBuilder, Value,
};

fn ssz() -> DynSsz {
    DynSsz::new(HashMap::new())
}

fn assert_roundtrip(codec: &DynSsz, ty: &TypeRef, value: &Value, wire: &str) {
    let encoded = codec.marshal(ty, value).unwrap();
    assert_eq!(hex::encode(&encoded), wire, "wire bytes");
    assert_eq!(codec.size(ty, value).unwrap(), encoded.len(), "size law");
    let decoded = codec.decode(ty, &encoded).unwrap();
    assert_eq!(&decoded, value, "round trip");
}

fn assert_root(codec: &DynSsz, ty: &TypeRef, value: &Value, root: &str) {
    let first = codec.hash_tree_root(ty, value).unwrap();
    assert_eq!(hex::encode(first.as_slice()), root, "hash tree root");
    // Purity: repeated calls and cloned values agree.
    let again = codec.hash_tree_root(ty, value).unwrap();
    assert_eq!(first, again);
    let cloned = value.clone();
    assert_eq!(first, codec.hash_tree_root(ty, &cloned).unwrap());
}

#[test]
fn fixed_five_field_container() {
    let codec = ssz();
    let ty = StructBuilder::new("Fixed5")
        .field("f1", &TypeDef::bool())
        .field("f2", &TypeDef::uint8())
        .field("f3", &TypeDef::uint16())
        .field("f4", &TypeDef::uint32())
        .field("f5", &TypeDef::uint64())
        .build();
    let value = Value::Struct(
        StructValue::new()
            .with_field("f1", Value::Bool(true))
            .with_field("f2", Value::U8(1))
            .with_field("f3", Value::U16(2))
            .with_field("f4", Value::U32(3))
            .with_field("f5", Value::U64(4)),
    );
    assert_roundtrip(&codec, &ty, &value, "0101020003000000040000000000000000");
    assert_root(
        &codec,
        &ty,
        &value,
        "03cf6524e0c5dee777f18d8a15b724aa70da9d9393e3a47434fe352eff0e7375",
    );
}

#[test]
fn mixed_container_with_list_and_sized_vector() {
    let codec = ssz();
    let bytes = TypeDef::slice(&TypeDef::uint8());
    let shorts = TypeDef::slice(&TypeDef::uint16());
    let ty = StructBuilder::new("Mixed")
        .field("f1", &TypeDef::bool())
        .field_with("f2", &bytes, FieldTags::new().max("10"))
        .field_with("f3", &shorts, FieldTags::new().size("5"))
        .field("f4", &TypeDef::uint32())
        .build();
    let value = Value::Struct(
        StructValue::new()
            .with_field("f1", Value::Bool(true))
            .with_field("f2", Value::bytes(vec![1, 1, 1, 1]))
            .with_field(
                "f3",
                Value::List(vec![
                    Value::U16(2),
                    Value::U16(2),
                    Value::U16(2),
                    Value::U16(2),
                    Value::U16(0),
                ]),
            )
            .with_field("f4", Value::U32(3)),
    );
    assert_roundtrip(
        &codec,
        &ty,
        &value,
        "0113000000020002000200020000000300000001010101",
    );
    assert_root(
        &codec,
        &ty,
        &value,
        "cb141fb9e033499344f568ea05a6a77ada886fc6e856ece01ae5a329e184fbd1",
    );
}

#[test]
fn union_inside_container() {
    let codec = ssz();
    let pair = TypeDef::array(&TypeDef::uint8(), 2);
    let union = UnionBuilder::new("Payload")
        .variant("word", &TypeDef::uint32())
        .variant("pair", &pair)
        .build();
    let ty = StructBuilder::new("WithUnion")
        .field("f1", &TypeDef::uint16())
        .field("f2", &union)
        .field("f3", &TypeDef::uint16())
        .build();
    let value = Value::Struct(
        StructValue::new()
            .with_field("f1", Value::U16(0x1337))
            .with_field("f2", Value::union(1, Value::bytes(vec![0x78, 0x56])))
            .with_field("f3", Value::U16(0x4242)),
    );
    assert_roundtrip(&codec, &ty, &value, "3713080000004242017856");
    assert_root(
        &codec,
        &ty,
        &value,
        "a667d80855a0a42d447357c8dc753ce188ed7d30daceee9bb7ecc592d729bbeb",
    );
}

#[test]
fn progressive_container_vector() {
    let codec = ssz();
    let ty = StructBuilder::new("Progressive")
        .field_with("f0", &TypeDef::uint64(), FieldTags::new().index(0))
        .field_with("f1", &TypeDef::uint32(), FieldTags::new().index(1))
        .field_with("f2", &TypeDef::bool(), FieldTags::new().index(2))
        .field_with("f3", &TypeDef::uint16(), FieldTags::new().index(3))
        .build();
    let value = Value::Struct(
        StructValue::new()
            .with_field("f0", Value::U64(12345))
            .with_field("f1", Value::U32(67890))
            .with_field("f2", Value::Bool(true))
            .with_field("f3", Value::U16(999)),
    );
    assert_roundtrip(&codec, &ty, &value, "39300000000000003209010001e703");
    assert_root(
        &codec,
        &ty,
        &value,
        "0e4ca0d5f6b209257cdaa08a60240a3043fb0ab891fa32f5d483d569605bb4df",
    );
}

#[test]
fn uint256_is_its_own_root() {
    let codec = ssz();
    let ty = TypeDef::uint256();
    let bytes: Vec<u8> = (0u8..32).collect();
    let mut le = [0u8; 32];
    le.copy_from_slice(&bytes);
    let value = Value::U256(dynssz::U256::from_le_bytes(le));
    let wire = hex::encode(&bytes);
    assert_roundtrip(&codec, &ty, &value, &wire);
    assert_root(&codec, &ty, &value, &wire);
}

#[test]
fn empty_bitlist_in_container() {
    let codec = ssz();
    let ty = StructBuilder::new("WithBits")
        .field_with("f1", &TypeDef::bitlist(), FieldTags::new().max("100"))
        .build();
    let value = Value::Struct(StructValue::new().with_field("f1", Value::bytes(vec![0x01])));
    assert_roundtrip(&codec, &ty, &value, "0400000001");

    // Without the sentinel the payload is unterminated.
    let bad = hex::decode("0400000000").unwrap();
    let mut target = Value::None;
    assert!(matches!(
        codec.unmarshal(&ty, &bad, &mut target),
        Err(dynssz::SszError::BitlistNotTerminated)
    ));
}

#[test]
fn bitlist_roots() {
    let codec = ssz();
    let ty = StructBuilder::new("Bits")
        .field_with("bits", &TypeDef::bitlist(), FieldTags::new().max("100"))
        .build();
    // Four data bits, sentinel at bit 4. The root of a single-field
    // container is the field root itself.
    let holder = Value::Struct(
        StructValue::new().with_field("bits", Value::bytes(vec![0b0001_1111])),
    );
    // Root of the container is merkleize([field root]) = the field root for a
    // single-field container.
    let root = codec.hash_tree_root(&ty, &holder).unwrap();
    assert_eq!(
        hex::encode(root.as_slice()),
        "4b07c3799db025f3aa92ced1e8545367a2b6e44960f479d3f9d62b61812892d5"
    );

    let empty = Value::Struct(StructValue::new().with_field("bits", Value::bytes(vec![0x01])));
    let root = codec.hash_tree_root(&ty, &empty).unwrap();
    assert_eq!(
        hex::encode(root.as_slice()),
        "f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b"
    );
}

#[test]
fn bounded_u64_list_root() {
    let codec = ssz();
    let longs = TypeDef::slice(&TypeDef::uint64());
    let ty = StructBuilder::new("Longs")
        .field_with("values", &longs, FieldTags::new().max("10"))
        .build();
    let value = Value::Struct(StructValue::new().with_field(
        "values",
        Value::List(vec![Value::U64(1), Value::U64(2), Value::U64(3)]),
    ));
    let root = codec.hash_tree_root(&ty, &value).unwrap();
    assert_eq!(
        hex::encode(root.as_slice()),
        "ed114baf42aac42d5c115ed017862e26138544d8e8fbd9b58466da9dfa0b2f55"
    );
}

#[test]
fn vector_of_containers() {
    let codec = ssz();
    let inner = StructBuilder::new("Inner")
        .field("a", &TypeDef::uint8())
        .field("b", &TypeDef::uint64())
        .build();
    let ty = TypeDef::array(&inner, 2);
    let value = Value::List(vec![
        Value::Struct(
            StructValue::new()
                .with_field("a", Value::U8(1))
                .with_field("b", Value::U64(2)),
        ),
        Value::Struct(
            StructValue::new()
                .with_field("a", Value::U8(3))
                .with_field("b", Value::U64(4)),
        ),
    ]);
    assert_roundtrip(&codec, &ty, &value, "010200000000000000030400000000000000");
    assert_root(
        &codec,
        &ty,
        &value,
        "bfe3c665d2e561f13b30606c580cb703b2041287e212ade110f0bfd8563e21bb",
    );
}

#[test]
fn short_vector_sources_are_zero_padded() {
    let codec = ssz();
    let bytes = TypeDef::slice(&TypeDef::uint8());
    let ty = StructBuilder::new("Padded")
        .field_with("root", &bytes, FieldTags::new().size("8"))
        .build();
    let value = Value::Struct(StructValue::new().with_field("root", Value::bytes(vec![0xaa, 0xbb])));
    let encoded = codec.marshal(&ty, &value).unwrap();
    assert_eq!(hex::encode(&encoded), "aabb000000000000");

    // Equality after decode is up to the trailing zero padding.
    let decoded = codec.decode(&ty, &encoded).unwrap();
    let padded = Value::Struct(StructValue::new().with_field(
        "root",
        Value::bytes(vec![0xaa, 0xbb, 0, 0, 0, 0, 0, 0]),
    ));
    assert_eq!(decoded, padded);
}

#[test]
fn oversized_list_is_rejected() {
    let codec = ssz();
    let bytes = TypeDef::slice(&TypeDef::uint8());
    let ty = StructBuilder::new("Bounded")
        .field_with("data", &bytes, FieldTags::new().max("3"))
        .build();
    let value = Value::Struct(StructValue::new().with_field("data", Value::bytes(vec![0; 4])));
    assert!(matches!(
        codec.marshal(&ty, &value),
        Err(dynssz::SszError::ListTooBig { len: 4, max: 3 })
    ));
}

#[test]
fn marshal_to_appends() {
    let codec = ssz();
    let ty = TypeDef::uint32();
    let mut buf = vec![0xff];
    codec.marshal_to(&ty, &Value::U32(0x01020304), &mut buf).unwrap();
    assert_eq!(hex::encode(&buf), "ff04030201");
}
