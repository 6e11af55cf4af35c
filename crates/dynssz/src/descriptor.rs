//! Optimized type descriptors.
//!
//! A [`TypeDescriptor`] records every SSZ-layout decision for a type once —
//! static versus dynamic size, element layout, bitfield framing, union
//! variants, wrapper indirection — so the three walkers dispatch on plain
//! data. Descriptors are immutable after construction and cached by the
//! builder.

use std::sync::Arc;

use crate::typedef::SszVtable;

/// The closed set of SSZ kinds a descriptor can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SszType {
    /// Boolean, one byte on the wire.
    Bool,
    /// Unsigned 8-bit integer.
    Uint8,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Unsigned 32-bit integer.
    Uint32,
    /// Unsigned 64-bit integer.
    Uint64,
    /// Unsigned 128-bit integer.
    Uint128,
    /// Unsigned 256-bit integer.
    Uint256,
    /// Fixed-length collection.
    Vector,
    /// Bounded variable-length collection.
    List,
    /// Packed fixed-length bitfield.
    BitVector,
    /// Bounded sentinel-terminated bitfield.
    BitList,
    /// List with progressive merkleization.
    ProgressiveList,
    /// Bitlist with progressive merkleization.
    ProgressiveBitList,
    /// Ordered fixed set of fields.
    Container,
    /// Sparse-indexed container with active-fields mix-in.
    ProgressiveContainer,
    /// Tagged variant with a one-byte selector.
    CompatibleUnion,
    /// Transparent indirection to an annotated inner type.
    TypeWrapper,
    /// Delegates to user-provided marshal/hash methods.
    Custom,
}

impl SszType {
    /// Parse a closed-set type name as it appears in `ssz-type` tags.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "uint128" => Self::Uint128,
            "uint256" => Self::Uint256,
            "vector" => Self::Vector,
            "list" => Self::List,
            "bitvector" => Self::BitVector,
            "bitlist" => Self::BitList,
            "progressive_list" => Self::ProgressiveList,
            "progressive_bitlist" => Self::ProgressiveBitList,
            "container" => Self::Container,
            "progressive_container" => Self::ProgressiveContainer,
            "compatible_union" => Self::CompatibleUnion,
            "type_wrapper" => Self::TypeWrapper,
            "custom" => Self::Custom,
            _ => return None,
        })
    }

    /// The tag-syntax name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Uint128 => "uint128",
            Self::Uint256 => "uint256",
            Self::Vector => "vector",
            Self::List => "list",
            Self::BitVector => "bitvector",
            Self::BitList => "bitlist",
            Self::ProgressiveList => "progressive_list",
            Self::ProgressiveBitList => "progressive_bitlist",
            Self::Container => "container",
            Self::ProgressiveContainer => "progressive_container",
            Self::CompatibleUnion => "compatible_union",
            Self::TypeWrapper => "type_wrapper",
            Self::Custom => "custom",
        }
    }

    /// Encoded width of a primitive, `None` for composites.
    pub fn primitive_size(self) -> Option<u32> {
        Some(match self {
            Self::Bool | Self::Uint8 => 1,
            Self::Uint16 => 2,
            Self::Uint32 => 4,
            Self::Uint64 => 8,
            Self::Uint128 => 16,
            Self::Uint256 => 32,
            _ => return None,
        })
    }

    /// `true` for the packed-capable primitive kinds.
    pub fn is_primitive(self) -> bool {
        self.primitive_size().is_some()
    }
}

/// Host-side value category recorded alongside the SSZ kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Boolean.
    Bool,
    /// Unsigned 8-bit integer.
    Uint8,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Unsigned 32-bit integer.
    Uint32,
    /// Unsigned 64-bit integer.
    Uint64,
    /// 128-bit integer wrapper.
    Uint128,
    /// 256-bit integer wrapper.
    Uint256,
    /// Fixed-length sequence.
    Array,
    /// Variable-length sequence.
    Slice,
    /// Struct with named fields.
    Struct,
    /// Byte string.
    String,
    /// Time value.
    Time,
    /// Nilable indirection.
    Pointer,
    /// Tagged union.
    Union,
    /// Transparent wrapper.
    Wrapper,
    /// Vtable-only type.
    Opaque,
}

/// One declared field inside a container descriptor.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// The field's descriptor.
    pub desc: Arc<TypeDescriptor>,
    /// Sparse index; meaningful only inside progressive containers.
    pub ssz_index: u16,
}

/// A variable-length field's place inside its container's fixed section.
#[derive(Debug, Clone, Copy)]
pub struct DynamicField {
    /// Index into [`ContainerDescriptor::fields`].
    pub field: usize,
    /// Byte offset inside the fixed section where the 4-byte offset lives.
    pub header_offset: u32,
    /// Zero-based position among the dynamic fields.
    pub position: u16,
}

/// Field layout of a container.
#[derive(Debug, Clone)]
pub struct ContainerDescriptor {
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// The variable-length fields, in declaration order.
    pub dynamic: Vec<DynamicField>,
    /// Length of the fixed section, including 4-byte offset slots.
    pub fixed_size: u32,
}

/// Which user-method suites the source type registered.
#[derive(Debug, Clone, Default)]
pub struct Compatibility {
    /// The registered vtable, when any slot is present.
    pub vtable: Option<Arc<SszVtable>>,
    /// Fast marshal is available.
    pub fast_marshal: bool,
    /// Fast unmarshal is available.
    pub fast_unmarshal: bool,
    /// Fast size is available.
    pub fast_size: bool,
    /// Fast hash-tree-root is available.
    pub fast_hash: bool,
    /// Spec-aware marshal is available.
    pub dyn_marshal: bool,
    /// Spec-aware unmarshal is available.
    pub dyn_unmarshal: bool,
    /// Spec-aware size is available.
    pub dyn_size: bool,
    /// Spec-aware hash-tree-root is available.
    pub dyn_hash: bool,
}

impl Compatibility {
    /// Record the presence flags of `vtable`.
    pub(crate) fn from_vtable(vtable: Option<&SszVtable>) -> Self {
        match vtable {
            None => Self::default(),
            Some(vt) => Self {
                vtable: Some(Arc::new(*vt)),
                fast_marshal: vt.fast_marshal.is_some(),
                fast_unmarshal: vt.fast_unmarshal.is_some(),
                fast_size: vt.fast_size.is_some(),
                fast_hash: vt.fast_hash.is_some(),
                dyn_marshal: vt.dyn_marshal.is_some(),
                dyn_unmarshal: vt.dyn_unmarshal.is_some(),
                dyn_size: vt.dyn_size.is_some(),
                dyn_hash: vt.dyn_hash.is_some(),
            },
        }
    }
}

/// Every SSZ-layout decision for one type, resolved once.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// The SSZ kind driving all walker dispatch.
    pub ssz_type: SszType,
    /// Host-side category of the source type.
    pub kind: Kind,
    /// Identity of the source type definition.
    pub type_id: u64,
    /// Diagnostic name of the source type.
    pub type_name: String,
    /// Static encoded byte length; `0` when dynamic.
    pub size: u32,
    /// Element count for vectors and bitvectors; byte count for
    /// `uint128`/`uint256`.
    pub length: u32,
    /// Capacity of lists: declared max × element unit in bytes (1 for byte
    /// elements, the primitive width for packed primitives, 32 for composite
    /// elements); bit capacity for bitlists.
    pub limit: u64,
    /// Declared bit length of a bitvector whose byte length rounds up.
    pub bit_size: u32,
    /// Element descriptor for collections, inner descriptor for wrappers.
    pub elem: Option<Arc<TypeDescriptor>>,
    /// Field layout for containers.
    pub container: Option<ContainerDescriptor>,
    /// Variant descriptors of a compatible union, indexed by selector.
    pub union_variants: Option<Vec<Arc<TypeDescriptor>>>,
    /// The original spec expression behind a dynamic size, if any.
    pub size_expr: Option<String>,
    /// The original spec expression behind a dynamic max, if any.
    pub max_expr: Option<String>,
    /// Itself or transitively variable-length.
    pub is_dynamic: bool,
    /// A list/bitlist capacity was declared.
    pub has_limit: bool,
    /// An explicit `ssz-bitsize` was declared.
    pub has_bit_size: bool,
    /// A spec value overrode the default size.
    pub has_dynamic_size: bool,
    /// A spec value overrode the default max.
    pub has_dynamic_max: bool,
    /// The source type was a single pointer indirection.
    pub is_pointer: bool,
    /// The collection's elements are bytes.
    pub is_byte_array: bool,
    /// The source type is a byte string.
    pub is_string: bool,
    /// The source type is a time value.
    pub is_time: bool,
    /// Registered user-method suites.
    pub compat: Compatibility,
}

impl TypeDescriptor {
    /// The byte unit one element contributes toward the list `limit`: the
    /// primitive width for packed primitives, 1 implicitly for bits, 32 for
    /// composite elements (one chunk per element root).
    pub fn elem_unit(&self) -> u64 {
        match &self.elem {
            Some(elem) => elem.ssz_type.primitive_size().map_or(32, u64::from),
            None => 1,
        }
    }

    /// Declared element capacity of a list (bit capacity for bitlists).
    pub fn max_len(&self) -> Option<u64> {
        if !self.has_limit {
            return None;
        }
        match self.ssz_type {
            SszType::BitList | SszType::ProgressiveBitList => Some(self.limit),
            _ => Some(self.limit / self.elem_unit()),
        }
    }

    /// The merkleization chunk capacity: `ceil(limit/32)` byte-wise, with the
    /// bitlist's bit capacity converted to bytes first. `0` (no padding) when
    /// no limit was declared.
    pub fn chunk_limit(&self) -> u64 {
        if !self.has_limit {
            return 0;
        }
        match self.ssz_type {
            SszType::BitList | SszType::ProgressiveBitList => self.limit.div_ceil(8).div_ceil(32),
            _ => self.limit.div_ceil(32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_roundtrip() {
        for ty in [
            SszType::Bool,
            SszType::Uint64,
            SszType::Vector,
            SszType::ProgressiveContainer,
            SszType::CompatibleUnion,
            SszType::Custom,
        ] {
            assert_eq!(SszType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(SszType::from_name("float32"), None);
    }

    #[test]
    fn primitive_sizes() {
        assert_eq!(SszType::Bool.primitive_size(), Some(1));
        assert_eq!(SszType::Uint256.primitive_size(), Some(32));
        assert_eq!(SszType::List.primitive_size(), None);
        assert!(SszType::Uint128.is_primitive());
        assert!(!SszType::Container.is_primitive());
    }
}
