//! Instance-level surface: explicit hashers and the process default.
#![allow(unused_crate_dependencies)]

use std::collections::HashMap;
use std::sync::Arc;

use dynssz::{
    DynSsz, SpecValue, StructBuilder, StructValue, TypeDef, Value, default_instance,
    set_default_instance, standard_pool,
};

#[test]
fn hash_tree_root_with_leaves_root_in_hasher() {
    let codec = DynSsz::new(HashMap::new());
    let ty = StructBuilder::new("Pair")
        .field("a", &TypeDef::uint64())
        .field("b", &TypeDef::uint64())
        .build();
    let value = Value::Struct(
        StructValue::new()
            .with_field("a", Value::U64(1))
            .with_field("b", Value::U64(2)),
    );

    let mut hasher = standard_pool().get();
    codec.hash_tree_root_with(&ty, &value, &mut hasher).unwrap();
    let root = hasher.hash_root().unwrap();
    assert_eq!(root, codec.hash_tree_root(&ty, &value).unwrap());
}

#[test]
fn default_instance_is_replaceable() {
    let ty = TypeDef::uint16();

    // Init-on-first-use, no presets.
    let encoded = default_instance().marshal(&ty, &Value::U16(7)).unwrap();
    assert_eq!(encoded, vec![7, 0]);

    // Replace-on-setter.
    let mut specs = HashMap::new();
    specs.insert("X".to_string(), SpecValue::U64(1));
    set_default_instance(Arc::new(DynSsz::new(specs)));
    let replaced = default_instance();
    assert_eq!(replaced.marshal(&ty, &Value::U16(9)).unwrap(), vec![9, 0]);
}
