//! Registered user-method suites, wrappers, pointers and the odd primitives.
#![allow(unused_crate_dependencies)]

use std::collections::HashMap;

use dynssz::{
    DynSsz, FieldTags, SszError, SszOptions, SszVtable, StructBuilder, StructValue, TypeDef,
    Value,
};

fn ssz() -> DynSsz {
    DynSsz::new(HashMap::new())
}

/// An opaque blob: marshals its bytes as-is, hashes to a constant.
fn blob_vtable() -> SszVtable {
    SszVtable {
        fast_marshal: Some(|value, buf| {
            let bytes = value.as_bytes().ok_or(SszError::NilTarget)?;
            buf.extend_from_slice(bytes);
            Ok(())
        }),
        fast_unmarshal: Some(|target, data| {
            *target = Value::Bytes(data.to_vec());
            Ok(())
        }),
        fast_size: Some(|value| value.as_bytes().map(<[u8]>::len).ok_or(SszError::NilTarget)),
        fast_hash: Some(|_| Ok([0x42u8; 32])),
        ..SszVtable::default()
    }
}

#[test]
fn opaque_type_round_trips_through_its_vtable() {
    let codec = ssz();
    let blob = TypeDef::opaque("Blob", blob_vtable());
    let ty = StructBuilder::new("Carrier")
        .field("id", &TypeDef::uint16())
        .field("blob", &blob)
        .build();
    let value = Value::Struct(
        StructValue::new()
            .with_field("id", Value::U16(7))
            .with_field("blob", Value::bytes(vec![9, 8, 7])),
    );

    let encoded = codec.marshal(&ty, &value).unwrap();
    // Fixed: u16 + 4-byte offset, then the blob payload verbatim.
    assert_eq!(hex::encode(&encoded), "070006000000090807");

    let decoded = codec.decode(&ty, &encoded).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn registered_hasher_wins_unless_disabled() {
    let blob = TypeDef::opaque("Blob", blob_vtable());
    let value = Value::bytes(vec![1, 2, 3]);

    let codec = ssz();
    let root = codec.hash_tree_root(&blob, &value).unwrap();
    assert_eq!(root.into_inner(), [0x42u8; 32]);

    // Registered hashers on a struct type follow the fast-path gate.
    let fancy = StructBuilder::new("Fancy")
        .field("v", &TypeDef::uint64())
        .vtable(SszVtable {
            fast_hash: Some(|_| Ok([0x11u8; 32])),
            ..SszVtable::default()
        })
        .build();
    let fancy_value = Value::Struct(StructValue::new().with_field("v", Value::U64(5)));

    let fast = ssz().hash_tree_root(&fancy, &fancy_value).unwrap();
    assert_eq!(fast.into_inner(), [0x11u8; 32]);

    let slow = DynSsz::with_options(
        HashMap::new(),
        SszOptions {
            no_fast_hash: true,
            ..SszOptions::default()
        },
    );
    let walked = slow.hash_tree_root(&fancy, &fancy_value).unwrap();
    // The reflective walk hashes the single u64 chunk.
    let mut expected = [0u8; 32];
    expected[..8].copy_from_slice(&5u64.to_le_bytes());
    assert_eq!(walked.into_inner(), expected);
}

#[test]
fn spec_aware_methods_take_over_under_dynamic_shapes() {
    // A struct whose field size is spec-driven: the spec-blind hasher must
    // not be used, the spec-aware one is.
    let mut specs = HashMap::new();
    specs.insert("N".to_string(), dynssz::SpecValue::U64(16));
    let codec = DynSsz::new(specs);

    let bytes = TypeDef::slice(&TypeDef::uint8());
    let ty = StructBuilder::new("Resized")
        .field_with("root", &bytes, FieldTags::new().size("32").dyn_size("N"))
        .vtable(SszVtable {
            fast_hash: Some(|_| Ok([0xaau8; 32])),
            dyn_hash: Some(|_, _| Ok([0xbbu8; 32])),
            ..SszVtable::default()
        })
        .build();
    let value = Value::Struct(StructValue::new().with_field("root", Value::bytes(vec![0; 16])));
    let root = codec.hash_tree_root(&ty, &value).unwrap();
    assert_eq!(root.into_inner(), [0xbbu8; 32]);
}

#[test]
fn user_method_errors_are_wrapped() {
    let broken = TypeDef::opaque(
        "Broken",
        SszVtable {
            fast_size: Some(|_| Err(SszError::InvalidValue("nope".into()))),
            fast_marshal: Some(|_, _| Err(SszError::InvalidValue("nope".into()))),
            ..SszVtable::default()
        },
    );
    let err = ssz().size(&broken, &Value::bytes(vec![])).unwrap_err();
    assert!(matches!(err, SszError::UserMethod { method: "fast_size", .. }), "{err}");
}

#[test]
fn type_wrapper_is_transparent() {
    let codec = ssz();
    let root = TypeDef::wrapper(
        "Root",
        &TypeDef::slice(&TypeDef::uint8()),
        FieldTags::new().size("32"),
    );
    let ty = StructBuilder::new("Header")
        .field("slot", &TypeDef::uint64())
        .field("root", &root)
        .build();
    let value = Value::Struct(
        StructValue::new()
            .with_field("slot", Value::U64(1))
            .with_field("root", Value::wrapped(Value::bytes(vec![0xcd; 32]))),
    );

    let encoded = codec.marshal(&ty, &value).unwrap();
    assert_eq!(encoded.len(), 40);
    assert_eq!(&encoded[8..], &[0xcd; 32][..]);

    let decoded = codec.decode(&ty, &encoded).unwrap();
    assert_eq!(decoded, value);

    // The wrapper also accepts the bare inner value on encode.
    let bare = Value::Struct(
        StructValue::new()
            .with_field("slot", Value::U64(1))
            .with_field("root", Value::bytes(vec![0xcd; 32])),
    );
    assert_eq!(codec.marshal(&ty, &bare).unwrap(), encoded);
}

#[test]
fn nil_pointers_encode_as_zero() {
    let codec = ssz();
    let inner = StructBuilder::new("Inner")
        .field("v", &TypeDef::uint32())
        .build();
    let ptr = TypeDef::pointer(&inner);
    let ty = StructBuilder::new("Outer")
        .field("p", &ptr)
        .field("tail", &TypeDef::uint8())
        .build();

    let value = Value::Struct(
        StructValue::new()
            .with_field("p", Value::None)
            .with_field("tail", Value::U8(0xee)),
    );
    let encoded = codec.marshal(&ty, &value).unwrap();
    assert_eq!(hex::encode(&encoded), "00000000ee");

    // Decoding allocates the pointee.
    let decoded = codec.decode(&ty, &encoded).unwrap();
    let fields = decoded.as_struct().unwrap();
    assert_eq!(
        fields.get("p"),
        Some(&Value::Pointer(Box::new(Value::Struct(
            StructValue::new().with_field("v", Value::U32(0))
        ))))
    );

    // Sizing a nil pointer matches its zero value.
    assert_eq!(codec.size(&ty, &value).unwrap(), 5);
}

#[test]
fn time_values_ride_as_unix_seconds() {
    let codec = ssz();
    let ty = StructBuilder::new("Stamped")
        .field("at", &TypeDef::time())
        .build();
    let value = Value::Struct(StructValue::new().with_field("at", Value::Time(1_700_000_000)));

    let encoded = codec.marshal(&ty, &value).unwrap();
    assert_eq!(encoded, 1_700_000_000u64.to_le_bytes());

    let decoded = codec.decode(&ty, &encoded).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn uint128_accepts_limb_backing() {
    let codec = ssz();
    let ty = TypeDef::uint128();

    let limbs = Value::List(vec![Value::U64(0x1111), Value::U64(0x2222)]);
    let encoded = codec.marshal(&ty, &limbs).unwrap();
    let mut expected = [0u8; 16];
    expected[..8].copy_from_slice(&0x1111u64.to_le_bytes());
    expected[8..].copy_from_slice(&0x2222u64.to_le_bytes());
    assert_eq!(encoded, expected);

    // Byte backing encodes verbatim.
    let bytes = Value::bytes(expected.to_vec());
    assert_eq!(codec.marshal(&ty, &bytes).unwrap(), expected);

    // Decoding always lands in the canonical form.
    let decoded = codec.decode(&ty, &encoded).unwrap();
    match decoded {
        Value::U128(v) => assert_eq!(v.to_le_bytes::<16>(), expected),
        other => panic!("expected U128, got {other:?}"),
    }
}

#[test]
fn sixteen_byte_array_is_a_uint128() {
    let codec = ssz();
    let ty = TypeDef::array(&TypeDef::uint8(), 16);
    let desc = codec.get_descriptor(&ty, None).unwrap();
    // A 16-byte array stays a byte vector unless hinted.
    assert_eq!(desc.ssz_type, dynssz::SszType::Vector);

    let hinted = StructBuilder::new("Holder")
        .field_with("v", &ty, FieldTags::new().ty("uint128"))
        .build();
    let desc = codec.get_descriptor(&hinted, None).unwrap();
    let field = &desc.container.as_ref().unwrap().fields[0];
    assert_eq!(field.desc.ssz_type, dynssz::SszType::Uint128);
    assert_eq!(field.desc.size, 16);
}
