// Modified in 2025 from the original version
// Original source licensed under the Apache License 2.0
#![cfg_attr(test, allow(unused_crate_dependencies))]

//! Runtime-reflective SimpleSerialize (SSZ) codec.
//!
//! Unlike statically generated SSZ codecs, field sizes and list bounds here
//! may depend on preset parameters ("spec values") supplied at construction,
//! so one binary serves mainnet, minimal and experimental presets. Types are
//! registered once as [`TypeDef`] graphs carrying the familiar tag syntax,
//! values travel as [`Value`] trees, and the codec serializes, deserializes,
//! and Merkle-hashes them.
//!
//! ```
//! use std::collections::HashMap;
//! use dynssz::{DynSsz, FieldTags, StructBuilder, TypeDef, StructValue, Value};
//!
//! let checkpoint = StructBuilder::new("Checkpoint")
//!     .field("epoch", &TypeDef::uint64())
//!     .field_with("root", &TypeDef::slice(&TypeDef::uint8()), FieldTags::new().size("32"))
//!     .build();
//!
//! let ssz = DynSsz::new(HashMap::new());
//! let value = Value::Struct(
//!     StructValue::new()
//!         .with_field("epoch", Value::U64(3))
//!         .with_field("root", Value::bytes(vec![0xaa; 32])),
//! );
//!
//! let encoded = ssz.marshal(&checkpoint, &value).unwrap();
//! assert_eq!(encoded.len(), 40);
//!
//! let mut decoded = Value::None;
//! ssz.unmarshal(&checkpoint, &encoded, &mut decoded).unwrap();
//! assert_eq!(decoded, value);
//!
//! let root = ssz.hash_tree_root(&checkpoint, &value).unwrap();
//! assert_eq!(root, ssz.hash_tree_root(&checkpoint, &value).unwrap());
//! ```

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, OnceLock, RwLock};

use tracing::trace;

mod bitlist;
mod builder;
mod cursor;
mod decode;
mod descriptor;
mod encode;
mod error;
mod hashing;
mod pool;
mod size;
mod specs;
mod stream;
mod tags;
mod treeify;
mod typedef;
mod value;

pub use descriptor::{
    Compatibility, ContainerDescriptor, DynamicField, FieldDescriptor, Kind, SszType,
    TypeDescriptor,
};
pub use dynssz_hash::{
    Hasher, HasherPool, Sha256Backend, StandardBackend, TreeNode, VectorizedBackend,
    standard_pool, vectorized_pool,
};
pub use dynssz_primitives::{FixedBytes, Hash256, U128, U256};
pub use error::SszError;
pub use specs::SpecValue;
pub use typedef::{
    FieldDef, FieldTags, SszVtable, StructBuilder, TypeDef, TypeKind, TypeRef, UnionBuilder,
};
pub use value::{StructValue, UnionValue, Value};

use crate::cursor::{Cursor, SliceCursor};
use crate::pool::OffsetPool;
use crate::size::value_size;
use crate::specs::SpecResolver;

/// Which SHA-256 backend an instance merkleizes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashBackend {
    /// The block-wise optimized routine; dispatches to CPU-accelerated code
    /// where available.
    #[default]
    Vectorized,
    /// The portable `sha2` compressor.
    Standard,
}

/// Construction options for a [`DynSsz`] instance.
#[derive(Debug, Clone, Default)]
pub struct SszOptions {
    /// Never delegate to registered spec-blind marshal/unmarshal/size
    /// methods; spec-aware ones still apply.
    pub no_fast_path: bool,
    /// Never delegate to registered hashers outside custom types.
    pub no_fast_hash: bool,
    /// Emit per-operation trace events.
    pub verbose: bool,
    /// Capacity of the streaming adapters' buffer; 0 selects the default.
    pub buffer_size: usize,
    /// Merkleization backend.
    pub hash_backend: HashBackend,
}

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// A dynamic SSZ codec instance.
///
/// Holds the preset parameters, the descriptor cache and the instance
/// options. All operations take `&self`; the caches are internally locked,
/// so one instance serves parallel threads.
#[derive(Debug)]
pub struct DynSsz {
    pub(crate) specs: SpecResolver,
    pub(crate) type_cache: RwLock<HashMap<(u64, u64), Arc<TypeDescriptor>>>,
    pub(crate) offset_pool: OffsetPool,
    pub(crate) options: SszOptions,
}

impl DynSsz {
    /// An instance over the given preset parameters.
    pub fn new(specs: HashMap<String, SpecValue>) -> Self {
        Self::with_options(specs, SszOptions::default())
    }

    /// An instance with explicit options.
    pub fn with_options(specs: HashMap<String, SpecValue>, options: SszOptions) -> Self {
        Self {
            specs: SpecResolver::new(specs),
            type_cache: RwLock::new(HashMap::new()),
            offset_pool: OffsetPool::new(),
            options,
        }
    }

    /// The options this instance was built with.
    pub fn options(&self) -> &SszOptions {
        &self.options
    }

    /// Serialize `value` to SSZ bytes.
    pub fn marshal(&self, ty: &TypeRef, value: &Value) -> Result<Vec<u8>, SszError> {
        let desc = self.get_descriptor(ty, None)?;
        self.marshal_desc(&desc, value)
    }

    /// Serialize `value`, appending to `buf`.
    pub fn marshal_to(
        &self,
        ty: &TypeRef,
        value: &Value,
        buf: &mut Vec<u8>,
    ) -> Result<(), SszError> {
        let desc = self.get_descriptor(ty, None)?;
        self.marshal_to_desc(&desc, value, buf)
    }

    /// Serialize `value` into an I/O sink without buffering dynamic payloads.
    pub fn marshal_stream<W: Write>(
        &self,
        ty: &TypeRef,
        value: &Value,
        sink: &mut W,
    ) -> Result<(), SszError> {
        let desc = self.get_descriptor(ty, None)?;
        self.marshal_stream_desc(&desc, value, sink)
    }

    /// The exact encoded byte length of `value`.
    pub fn size(&self, ty: &TypeRef, value: &Value) -> Result<usize, SszError> {
        let desc = self.get_descriptor(ty, None)?;
        value_size(self, &desc, value)
    }

    /// Deserialize `data` into `target`.
    ///
    /// Struct targets are merged by field name, which keeps runtime-only
    /// fields intact under schema views; other target shapes are replaced.
    pub fn unmarshal(
        &self,
        ty: &TypeRef,
        data: &[u8],
        target: &mut Value,
    ) -> Result<(), SszError> {
        let desc = self.get_descriptor(ty, None)?;
        self.unmarshal_desc(&desc, data, target)
    }

    /// Deserialize `data` into a fresh value.
    pub fn decode(&self, ty: &TypeRef, data: &[u8]) -> Result<Value, SszError> {
        let desc = self.get_descriptor(ty, None)?;
        let mut target = if desc.is_pointer {
            Value::Pointer(Box::new(Value::zero_content_of(&desc)))
        } else {
            Value::zero_of(&desc)
        };
        self.unmarshal_desc(&desc, data, &mut target)?;
        Ok(target)
    }

    /// Deserialize from an I/O source. `declared_size` bounds the value when
    /// known; without it, statically sized types stream against their
    /// descriptor size and dynamic types fall back to draining the source.
    pub fn unmarshal_stream<R: Read>(
        &self,
        ty: &TypeRef,
        source: R,
        declared_size: Option<usize>,
        target: &mut Value,
    ) -> Result<(), SszError> {
        let desc = self.get_descriptor(ty, None)?;
        self.unmarshal_stream_desc(&desc, source, declared_size, target)
    }

    /// The 32-byte Merkle hash-tree root of `value`.
    pub fn hash_tree_root(&self, ty: &TypeRef, value: &Value) -> Result<Hash256, SszError> {
        let desc = self.get_descriptor(ty, None)?;
        self.hash_tree_root_desc(&desc, value)
    }

    /// Hash `value` into a caller-supplied [`Hasher`]; the root remains in
    /// the hasher as its single pending chunk.
    pub fn hash_tree_root_with(
        &self,
        ty: &TypeRef,
        value: &Value,
        hasher: &mut Hasher,
    ) -> Result<(), SszError> {
        let desc = self.get_descriptor(ty, None)?;
        self.hash_value(&desc, value, hasher, false)
    }

    /// The full Merkle tree of `value`, for navigation and proof extraction.
    pub fn get_tree(&self, ty: &TypeRef, value: &Value) -> Result<Arc<TreeNode>, SszError> {
        let desc = self.get_descriptor(ty, None)?;
        self.treeify_value(&desc, value)
    }

    /// Bind a schema view for fork-dependent layouts: the view's structure
    /// drives the wire shape while values stay in the runtime type.
    pub fn with_view(&self, view: &TypeRef) -> ViewCodec<'_> {
        ViewCodec {
            ssz: self,
            view: Arc::clone(view),
        }
    }

    pub(crate) fn marshal_desc(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
    ) -> Result<Vec<u8>, SszError> {
        let expected = value_size(self, desc, value)?;
        let mut buf = Vec::with_capacity(expected);
        encode::marshal_value(self, desc, value, &mut buf)?;
        if buf.len() != expected {
            return Err(SszError::SizeMismatch(format!(
                "{}: encoded {} bytes, size walker computed {expected}",
                desc.type_name,
                buf.len()
            )));
        }
        if self.options.verbose {
            trace!(type_name = %desc.type_name, size = buf.len(), "marshal");
        }
        Ok(buf)
    }

    pub(crate) fn marshal_to_desc(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
        buf: &mut Vec<u8>,
    ) -> Result<(), SszError> {
        let expected = value_size(self, desc, value)?;
        let before = buf.len();
        encode::marshal_value(self, desc, value, buf)?;
        if buf.len() - before != expected {
            return Err(SszError::SizeMismatch(format!(
                "{}: encoded {} bytes, size walker computed {expected}",
                desc.type_name,
                buf.len() - before
            )));
        }
        Ok(())
    }

    pub(crate) fn unmarshal_desc(
        &self,
        desc: &TypeDescriptor,
        data: &[u8],
        target: &mut Value,
    ) -> Result<(), SszError> {
        if desc.is_pointer && target.is_none() {
            return Err(SszError::NilTarget);
        }
        if self.options.verbose {
            trace!(type_name = %desc.type_name, size = data.len(), "unmarshal");
        }
        let mut cur = SliceCursor::new(data);
        self.decode_value(desc, &mut cur, target)?;
        let leftover = cur.remaining().unwrap_or(0);
        if leftover != 0 {
            return Err(SszError::SizeMismatch(format!(
                "{}: {leftover} trailing bytes after decoding",
                desc.type_name
            )));
        }
        Ok(())
    }

    pub(crate) fn hash_tree_root_desc(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
    ) -> Result<Hash256, SszError> {
        let mut hasher = self.hasher_pool().get();
        self.hash_value(desc, value, &mut hasher, false)?;
        let root = hasher.hash_root()?;
        if self.options.verbose {
            trace!(type_name = %desc.type_name, root = %root, "hash_tree_root");
        }
        Ok(root)
    }

    pub(crate) fn backend(&self) -> &'static dyn dynssz_hash::Sha256Backend {
        match self.options.hash_backend {
            HashBackend::Standard => &dynssz_hash::StandardBackend,
            HashBackend::Vectorized => &dynssz_hash::VectorizedBackend,
        }
    }

    pub(crate) fn hasher_pool(&self) -> &'static HasherPool {
        match self.options.hash_backend {
            HashBackend::Standard => standard_pool(),
            HashBackend::Vectorized => vectorized_pool(),
        }
    }

    pub(crate) fn buffer_capacity(&self) -> usize {
        if self.options.buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            self.options.buffer_size
        }
    }
}

/// A per-call schema-view binding over a codec instance.
///
/// All operations shape the wire format after the view type while reading
/// and writing values of the runtime type, matched by field name; view
/// fields absent from a value encode as zero.
#[derive(Debug)]
pub struct ViewCodec<'a> {
    ssz: &'a DynSsz,
    view: TypeRef,
}

impl ViewCodec<'_> {
    /// As [`DynSsz::marshal`], shaped by the view.
    pub fn marshal(&self, ty: &TypeRef, value: &Value) -> Result<Vec<u8>, SszError> {
        let desc = self.ssz.get_descriptor(ty, Some(&self.view))?;
        self.ssz.marshal_desc(&desc, value)
    }

    /// As [`DynSsz::size`], shaped by the view.
    pub fn size(&self, ty: &TypeRef, value: &Value) -> Result<usize, SszError> {
        let desc = self.ssz.get_descriptor(ty, Some(&self.view))?;
        value_size(self.ssz, &desc, value)
    }

    /// As [`DynSsz::unmarshal`], shaped by the view.
    pub fn unmarshal(
        &self,
        ty: &TypeRef,
        data: &[u8],
        target: &mut Value,
    ) -> Result<(), SszError> {
        let desc = self.ssz.get_descriptor(ty, Some(&self.view))?;
        self.ssz.unmarshal_desc(&desc, data, target)
    }

    /// As [`DynSsz::hash_tree_root`], shaped by the view.
    pub fn hash_tree_root(&self, ty: &TypeRef, value: &Value) -> Result<Hash256, SszError> {
        let desc = self.ssz.get_descriptor(ty, Some(&self.view))?;
        self.ssz.hash_tree_root_desc(&desc, value)
    }

    /// As [`DynSsz::get_tree`], shaped by the view.
    pub fn get_tree(&self, ty: &TypeRef, value: &Value) -> Result<Arc<TreeNode>, SszError> {
        let desc = self.ssz.get_descriptor(ty, Some(&self.view))?;
        self.ssz.treeify_value(&desc, value)
    }
}

static DEFAULT_INSTANCE: OnceLock<RwLock<Arc<DynSsz>>> = OnceLock::new();

fn default_cell() -> &'static RwLock<Arc<DynSsz>> {
    DEFAULT_INSTANCE.get_or_init(|| RwLock::new(Arc::new(DynSsz::new(HashMap::new()))))
}

/// The process-wide default instance, created on first use with no preset
/// parameters.
pub fn default_instance() -> Arc<DynSsz> {
    Arc::clone(&default_cell().read().expect("default instance poisoned"))
}

/// Replace the process-wide default instance.
pub fn set_default_instance(instance: Arc<DynSsz>) {
    *default_cell().write().expect("default instance poisoned") = instance;
}
