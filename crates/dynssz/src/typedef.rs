//! Runtime type descriptions.
//!
//! Rust has no runtime field tagging, so user types are described once as
//! [`TypeDef`] graphs through builder APIs, with per-field annotations kept as
//! the original tag strings. The descriptor builder introspects these graphs
//! exactly as a reflective implementation would introspect the host type.

use std::sync::{Arc, LazyLock};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::DynSsz;
use crate::error::SszError;
use crate::value::Value;

/// Shared handle to a type description.
pub type TypeRef = Arc<TypeDef>;

static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed)
}

/// The host-side category of a type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    /// Boolean.
    Bool,
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// 128-bit unsigned integer.
    U128,
    /// 256-bit unsigned integer.
    U256,
    /// A point in time; serialized as a `uint64` of Unix seconds.
    Time,
    /// A dynamically sized byte string.
    String,
    /// The well-known bitlist type: bytes with a sentinel bit.
    BitList,
    /// A fixed-length sequence.
    Array {
        /// Element type.
        elem: TypeRef,
        /// Declared length.
        len: usize,
    },
    /// A variable-length sequence.
    Slice {
        /// Element type.
        elem: TypeRef,
    },
    /// A nilable single indirection.
    Pointer {
        /// Pointee type.
        elem: TypeRef,
    },
    /// A struct with named, annotated fields.
    Struct {
        /// Fields in declaration order.
        fields: Vec<FieldDef>,
    },
    /// A tagged union; declaration order assigns zero-based selectors.
    Union {
        /// Variants in declaration order.
        variants: Vec<FieldDef>,
    },
    /// A transparent wrapper carrying annotations for its inner type.
    Wrapper {
        /// The single annotated inner field.
        inner: Box<FieldDef>,
    },
    /// A type handled entirely through its registered vtable.
    Opaque,
}

/// A named, annotated field of a struct, union or wrapper.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name; schema views bind to runtime values through it.
    pub name: String,
    /// Field type.
    pub ty: TypeRef,
    /// Raw tag annotations.
    pub tags: FieldTags,
}

/// Raw per-field tag annotations, kept as the original tag-string syntax.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTags {
    /// `ssz-size:"a,b,…"` — per-nesting-level declared sizes.
    pub ssz_size: Option<String>,
    /// `ssz-max:"a,b,…"` — per-nesting-level list capacities.
    pub ssz_max: Option<String>,
    /// `dynssz-size:"…"` — spec-expression sizes with literal fallback.
    pub dynssz_size: Option<String>,
    /// `dynssz-max:"…"` — spec-expression capacities with literal fallback.
    pub dynssz_max: Option<String>,
    /// `ssz-type:"…"` — forced SSZ types per nesting level.
    pub ssz_type: Option<String>,
    /// `ssz-index:"N"` — sparse index inside a progressive container.
    pub ssz_index: Option<String>,
    /// `ssz-bitsize:"N"` — effective bit count of a rounded-up bitvector.
    pub ssz_bitsize: Option<String>,
}

impl FieldTags {
    /// No annotations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `ssz-size`.
    pub fn size(mut self, value: &str) -> Self {
        self.ssz_size = Some(value.to_string());
        self
    }

    /// Set `ssz-max`.
    pub fn max(mut self, value: &str) -> Self {
        self.ssz_max = Some(value.to_string());
        self
    }

    /// Set `dynssz-size`.
    pub fn dyn_size(mut self, value: &str) -> Self {
        self.dynssz_size = Some(value.to_string());
        self
    }

    /// Set `dynssz-max`.
    pub fn dyn_max(mut self, value: &str) -> Self {
        self.dynssz_max = Some(value.to_string());
        self
    }

    /// Set `ssz-type`.
    pub fn ty(mut self, value: &str) -> Self {
        self.ssz_type = Some(value.to_string());
        self
    }

    /// Set `ssz-index`.
    pub fn index(mut self, value: u16) -> Self {
        self.ssz_index = Some(value.to_string());
        self
    }

    /// Set `ssz-bitsize`.
    pub fn bitsize(mut self, value: u32) -> Self {
        self.ssz_bitsize = Some(value.to_string());
        self
    }

    /// `true` when no annotation is present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Signature of a registered fast marshal method.
pub type FastMarshalFn = fn(&Value, &mut Vec<u8>) -> Result<(), SszError>;
/// Signature of a registered fast unmarshal method.
pub type FastUnmarshalFn = fn(&mut Value, &[u8]) -> Result<(), SszError>;
/// Signature of a registered fast sizer.
pub type FastSizeFn = fn(&Value) -> Result<usize, SszError>;
/// Signature of a registered fast hasher.
pub type FastHashFn = fn(&Value) -> Result<[u8; 32], SszError>;
/// Signature of a registered spec-aware marshal method.
pub type DynMarshalFn = fn(&DynSsz, &Value, &mut Vec<u8>) -> Result<(), SszError>;
/// Signature of a registered spec-aware unmarshal method.
pub type DynUnmarshalFn = fn(&DynSsz, &mut Value, &[u8]) -> Result<(), SszError>;
/// Signature of a registered spec-aware sizer.
pub type DynSizeFn = fn(&DynSsz, &Value) -> Result<usize, SszError>;
/// Signature of a registered spec-aware hasher.
pub type DynHashFn = fn(&DynSsz, &Value) -> Result<[u8; 32], SszError>;

/// Optional user-method suite attached to a type at registration.
///
/// This is the capability-record rendition of interface probing: the
/// descriptor records which slots are present and the walkers consult those
/// flags before descending.
#[derive(Debug, Clone, Copy, Default)]
pub struct SszVtable {
    /// Marshal without spec awareness.
    pub fast_marshal: Option<FastMarshalFn>,
    /// Unmarshal without spec awareness.
    pub fast_unmarshal: Option<FastUnmarshalFn>,
    /// Size without spec awareness.
    pub fast_size: Option<FastSizeFn>,
    /// Hash-tree-root without spec awareness.
    pub fast_hash: Option<FastHashFn>,
    /// Spec-aware marshal.
    pub dyn_marshal: Option<DynMarshalFn>,
    /// Spec-aware unmarshal.
    pub dyn_unmarshal: Option<DynUnmarshalFn>,
    /// Spec-aware size.
    pub dyn_size: Option<DynSizeFn>,
    /// Spec-aware hash-tree-root.
    pub dyn_hash: Option<DynHashFn>,
}

/// A registered runtime type description.
#[derive(Debug)]
pub struct TypeDef {
    id: u64,
    name: String,
    kind: TypeKind,
    vtable: Option<SszVtable>,
}

impl TypeDef {
    fn make(name: String, kind: TypeKind) -> TypeRef {
        Arc::new(Self {
            id: next_id(),
            name,
            kind,
            vtable: None,
        })
    }

    /// Unique identity of this definition; the descriptor cache key.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host-side kind.
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// The registered user-method suite, if any.
    pub fn vtable(&self) -> Option<&SszVtable> {
        self.vtable.as_ref()
    }

    /// The interned `bool` definition.
    pub fn bool() -> TypeRef {
        static DEF: LazyLock<TypeRef> =
            LazyLock::new(|| TypeDef::make("bool".into(), TypeKind::Bool));
        Arc::clone(&DEF)
    }

    /// The interned `uint8` definition.
    pub fn uint8() -> TypeRef {
        static DEF: LazyLock<TypeRef> = LazyLock::new(|| TypeDef::make("uint8".into(), TypeKind::U8));
        Arc::clone(&DEF)
    }

    /// The interned `uint16` definition.
    pub fn uint16() -> TypeRef {
        static DEF: LazyLock<TypeRef> =
            LazyLock::new(|| TypeDef::make("uint16".into(), TypeKind::U16));
        Arc::clone(&DEF)
    }

    /// The interned `uint32` definition.
    pub fn uint32() -> TypeRef {
        static DEF: LazyLock<TypeRef> =
            LazyLock::new(|| TypeDef::make("uint32".into(), TypeKind::U32));
        Arc::clone(&DEF)
    }

    /// The interned `uint64` definition.
    pub fn uint64() -> TypeRef {
        static DEF: LazyLock<TypeRef> =
            LazyLock::new(|| TypeDef::make("uint64".into(), TypeKind::U64));
        Arc::clone(&DEF)
    }

    /// The interned `uint128` definition.
    pub fn uint128() -> TypeRef {
        static DEF: LazyLock<TypeRef> =
            LazyLock::new(|| TypeDef::make("uint128".into(), TypeKind::U128));
        Arc::clone(&DEF)
    }

    /// The interned `uint256` definition.
    pub fn uint256() -> TypeRef {
        static DEF: LazyLock<TypeRef> =
            LazyLock::new(|| TypeDef::make("uint256".into(), TypeKind::U256));
        Arc::clone(&DEF)
    }

    /// The interned time definition (`uint64` Unix seconds on the wire).
    pub fn time() -> TypeRef {
        static DEF: LazyLock<TypeRef> =
            LazyLock::new(|| TypeDef::make("time".into(), TypeKind::Time));
        Arc::clone(&DEF)
    }

    /// The interned dynamic byte-string definition.
    pub fn string() -> TypeRef {
        static DEF: LazyLock<TypeRef> =
            LazyLock::new(|| TypeDef::make("string".into(), TypeKind::String));
        Arc::clone(&DEF)
    }

    /// The interned well-known bitlist definition.
    pub fn bitlist() -> TypeRef {
        static DEF: LazyLock<TypeRef> =
            LazyLock::new(|| TypeDef::make("bitlist".into(), TypeKind::BitList));
        Arc::clone(&DEF)
    }

    /// A fixed-length sequence of `elem`.
    pub fn array(elem: &TypeRef, len: usize) -> TypeRef {
        Self::make(
            format!("[{len}]{}", elem.name()),
            TypeKind::Array {
                elem: Arc::clone(elem),
                len,
            },
        )
    }

    /// A variable-length sequence of `elem`.
    pub fn slice(elem: &TypeRef) -> TypeRef {
        Self::make(
            format!("[]{}", elem.name()),
            TypeKind::Slice {
                elem: Arc::clone(elem),
            },
        )
    }

    /// A nilable pointer to `elem`.
    pub fn pointer(elem: &TypeRef) -> TypeRef {
        Self::make(
            format!("*{}", elem.name()),
            TypeKind::Pointer {
                elem: Arc::clone(elem),
            },
        )
    }

    /// A transparent wrapper named `name` carrying `tags` for `inner`.
    pub fn wrapper(name: &str, inner: &TypeRef, tags: FieldTags) -> TypeRef {
        Self::make(
            name.to_string(),
            TypeKind::Wrapper {
                inner: Box::new(FieldDef {
                    name: "data".to_string(),
                    ty: Arc::clone(inner),
                    tags,
                }),
            },
        )
    }

    /// An opaque type handled entirely through `vtable`.
    pub fn opaque(name: &str, vtable: SszVtable) -> TypeRef {
        Arc::new(Self {
            id: next_id(),
            name: name.to_string(),
            kind: TypeKind::Opaque,
            vtable: Some(vtable),
        })
    }
}

/// Builder for struct definitions.
#[derive(Debug)]
pub struct StructBuilder {
    name: String,
    fields: Vec<FieldDef>,
    vtable: Option<SszVtable>,
}

impl StructBuilder {
    /// Start a struct named `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            vtable: None,
        }
    }

    /// Append an untagged field.
    pub fn field(self, name: &str, ty: &TypeRef) -> Self {
        self.field_with(name, ty, FieldTags::new())
    }

    /// Append a field with tag annotations.
    pub fn field_with(mut self, name: &str, ty: &TypeRef, tags: FieldTags) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            ty: Arc::clone(ty),
            tags,
        });
        self
    }

    /// Attach a user-method suite.
    pub fn vtable(mut self, vtable: SszVtable) -> Self {
        self.vtable = Some(vtable);
        self
    }

    /// Finish the definition.
    pub fn build(self) -> TypeRef {
        Arc::new(TypeDef {
            id: next_id(),
            name: self.name,
            kind: TypeKind::Struct {
                fields: self.fields,
            },
            vtable: self.vtable,
        })
    }
}

/// Builder for compatible-union definitions. Declaration order assigns
/// zero-based selectors.
#[derive(Debug)]
pub struct UnionBuilder {
    name: String,
    variants: Vec<FieldDef>,
}

impl UnionBuilder {
    /// Start a union named `name`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variants: Vec::new(),
        }
    }

    /// Append an untagged variant.
    pub fn variant(self, name: &str, ty: &TypeRef) -> Self {
        self.variant_with(name, ty, FieldTags::new())
    }

    /// Append a variant with tag annotations.
    pub fn variant_with(mut self, name: &str, ty: &TypeRef, tags: FieldTags) -> Self {
        self.variants.push(FieldDef {
            name: name.to_string(),
            ty: Arc::clone(ty),
            tags,
        });
        self
    }

    /// Finish the definition.
    pub fn build(self) -> TypeRef {
        Arc::new(TypeDef {
            id: next_id(),
            name: self.name,
            kind: TypeKind::Union {
                variants: self.variants,
            },
            vtable: None,
        })
    }
}
