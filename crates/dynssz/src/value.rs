//! Dynamic value model.
//!
//! Values passed to the codec are trees of [`Value`]; the matching
//! [`TypeDef`](crate::typedef::TypeDef) supplies the schema. Byte arrays,
//! byte slices, strings and bitfields all live in [`Value::Bytes`] so the
//! walkers can route them through bulk copies.

use dynssz_primitives::{U128, U256};

use crate::descriptor::{SszType, TypeDescriptor};

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A nil pointer.
    None,
    /// A boolean.
    Bool(bool),
    /// An 8-bit unsigned integer.
    U8(u8),
    /// A 16-bit unsigned integer.
    U16(u16),
    /// A 32-bit unsigned integer.
    U32(u32),
    /// A 64-bit unsigned integer.
    U64(u64),
    /// A 128-bit unsigned integer.
    U128(U128),
    /// A 256-bit unsigned integer.
    U256(U256),
    /// A byte array, byte slice, string or bitfield.
    Bytes(Vec<u8>),
    /// A sequence of non-byte elements.
    List(Vec<Value>),
    /// An ordered set of named fields.
    Struct(StructValue),
    /// A tagged union value.
    Union(UnionValue),
    /// A non-nil pointer.
    Pointer(Box<Value>),
    /// A point in time, stored as Unix seconds.
    Time(u64),
}

/// Ordered named fields of a struct value. Lookup is by name, which is how
/// schema views bind to runtime values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructValue {
    fields: Vec<(String, Value)>,
}

/// A tagged union value: a selector and the selected variant's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionValue {
    /// Zero-based variant selector.
    pub selector: u8,
    /// The variant's data; `None` models nil data and is rejected by the
    /// walkers.
    pub data: Option<Box<Value>>,
}

impl StructValue {
    /// An empty struct value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field append.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Look up a field by name, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Replace a field, appending it if absent.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Mutable access to a field, inserting `default` if absent.
    pub(crate) fn entry(&mut self, name: &str, default: Value) -> &mut Value {
        if self.get(name).is_none() {
            self.fields.push((name.to_string(), default));
        }
        self.get_mut(name).expect("field just ensured")
    }

    /// Iterate fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` when no fields are present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Value {
    /// A byte value from anything byte-like.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    /// A non-nil pointer to `value`.
    pub fn pointer(value: Value) -> Self {
        Value::Pointer(Box::new(value))
    }

    /// A union value with non-nil data.
    pub fn union(selector: u8, data: Value) -> Self {
        Value::Union(UnionValue {
            selector,
            data: Some(Box::new(data)),
        })
    }

    /// A wrapper value: the single `data` field of a type wrapper.
    pub fn wrapped(data: Value) -> Self {
        Value::Struct(StructValue::new().with_field("data", data))
    }

    /// The struct fields, if this is a struct value.
    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// The struct fields, mutably.
    pub fn as_struct_mut(&mut self) -> Option<&mut StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// The raw bytes, if this is a byte value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// `true` for [`Value::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// The zero value of a descriptor, used for vector padding and for view
    /// fields absent from the runtime value.
    ///
    /// The zero of a pointer-kinded descriptor is the nil pointer; the
    /// walkers substitute the pointee's zero when they meet it.
    pub fn zero_of(desc: &TypeDescriptor) -> Value {
        if desc.is_pointer {
            return Value::None;
        }
        Self::zero_content_of(desc)
    }

    /// The zero value of a descriptor's content, ignoring pointer
    /// indirection. This is what the walkers substitute for a nil pointer.
    pub(crate) fn zero_content_of(desc: &TypeDescriptor) -> Value {
        match desc.ssz_type {
            SszType::Bool => Value::Bool(false),
            SszType::Uint8 => Value::U8(0),
            SszType::Uint16 => Value::U16(0),
            SszType::Uint32 => Value::U32(0),
            SszType::Uint64 => {
                if desc.is_time {
                    Value::Time(0)
                } else {
                    Value::U64(0)
                }
            }
            SszType::Uint128 => Value::U128(U128::ZERO),
            SszType::Uint256 => Value::U256(U256::ZERO),
            SszType::Vector => {
                let elem = desc.elem.as_ref().expect("vector has an element type");
                if desc.is_byte_array {
                    Value::Bytes(vec![0u8; desc.length as usize])
                } else {
                    Value::List(vec![Value::zero_of(elem); desc.length as usize])
                }
            }
            SszType::BitVector => Value::Bytes(vec![0u8; desc.size as usize]),
            SszType::List | SszType::ProgressiveList => {
                let byte_kinded = desc
                    .elem
                    .as_ref()
                    .is_some_and(|e| e.ssz_type == SszType::Uint8);
                if byte_kinded {
                    Value::Bytes(Vec::new())
                } else {
                    Value::List(Vec::new())
                }
            }
            // The empty bitlist still carries its sentinel byte.
            SszType::BitList | SszType::ProgressiveBitList => Value::Bytes(vec![0x01]),
            SszType::Container | SszType::ProgressiveContainer => {
                let mut fields = StructValue::new();
                if let Some(container) = &desc.container {
                    for field in &container.fields {
                        fields.set(field.name.clone(), Value::zero_of(&field.desc));
                    }
                }
                Value::Struct(fields)
            }
            SszType::CompatibleUnion => {
                let data = desc
                    .union_variants
                    .as_ref()
                    .and_then(|v| v.first())
                    .map(|v| Box::new(Value::zero_of(v)));
                Value::Union(UnionValue { selector: 0, data })
            }
            SszType::TypeWrapper => {
                let elem = desc.elem.as_ref().expect("wrapper has an inner type");
                Value::wrapped(Value::zero_of(elem))
            }
            SszType::Custom => Value::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_value_lookup() {
        let mut s = StructValue::new().with_field("a", Value::U8(1));
        assert_eq!(s.get("a"), Some(&Value::U8(1)));
        assert_eq!(s.get("b"), None);
        s.set("a", Value::U8(2));
        assert_eq!(s.get("a"), Some(&Value::U8(2)));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn entry_inserts_default() {
        let mut s = StructValue::new();
        *s.entry("x", Value::U64(0)) = Value::U64(9);
        assert_eq!(s.get("x"), Some(&Value::U64(9)));
    }

    #[test]
    fn union_helper() {
        let u = Value::union(1, Value::U32(5));
        match u {
            Value::Union(UnionValue { selector, data }) => {
                assert_eq!(selector, 1);
                assert_eq!(*data.unwrap(), Value::U32(5));
            }
            _ => panic!("expected union"),
        }
    }
}
