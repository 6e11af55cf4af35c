//! Descriptor construction.
//!
//! Introspects [`TypeDef`](crate::typedef::TypeDef) graphs and resolves every
//! SSZ-layout decision into a [`TypeDescriptor`]. Hint-free descriptors are
//! cached by `(type id, view id)`; requests carrying tag hints describe a
//! field-specific shape and are built uncached.

use std::sync::Arc;

use itertools::Itertools;
use tracing::debug;

use crate::DynSsz;
use crate::descriptor::{
    Compatibility, ContainerDescriptor, DynamicField, FieldDescriptor, Kind, SszType,
    TypeDescriptor,
};
use crate::error::SszError;
use crate::tags::{self, MaxHint, MaxHints, SizeHint, SizeHints, TypeHints};
use crate::typedef::{FieldTags, TypeDef, TypeKind, TypeRef};

/// Hints flowing from a field's tags into the descriptor of its type; one
/// level is consumed per collection nesting.
#[derive(Debug, Clone, Default)]
pub(crate) struct FieldHints {
    pub(crate) sizes: SizeHints,
    pub(crate) maxes: MaxHints,
    pub(crate) types: TypeHints,
    pub(crate) bit_size: Option<u32>,
}

impl FieldHints {
    fn is_empty(&self) -> bool {
        self.sizes.is_empty()
            && self.maxes.is_empty()
            && self.types.is_empty()
            && self.bit_size.is_none()
    }

    /// Hints for the next nesting level.
    fn tail(&self) -> FieldHints {
        FieldHints {
            sizes: self.sizes.iter().skip(1).cloned().collect(),
            maxes: self.maxes.iter().skip(1).cloned().collect(),
            types: self.types.iter().skip(1).cloned().collect(),
            bit_size: None,
        }
    }

    fn size(&self) -> Option<&SizeHint> {
        self.sizes.first()
    }

    fn max(&self) -> Option<&MaxHint> {
        self.maxes.first()
    }

    fn ty(&self) -> Option<SszType> {
        self.types.first().copied().flatten()
    }
}

fn kind_of(def: &TypeDef) -> Kind {
    match def.kind() {
        TypeKind::Bool => Kind::Bool,
        TypeKind::U8 => Kind::Uint8,
        TypeKind::U16 => Kind::Uint16,
        TypeKind::U32 => Kind::Uint32,
        TypeKind::U64 => Kind::Uint64,
        TypeKind::U128 => Kind::Uint128,
        TypeKind::U256 => Kind::Uint256,
        TypeKind::Time => Kind::Time,
        TypeKind::String => Kind::String,
        TypeKind::BitList | TypeKind::Slice { .. } => Kind::Slice,
        TypeKind::Array { .. } => Kind::Array,
        TypeKind::Pointer { .. } => Kind::Pointer,
        TypeKind::Struct { .. } => Kind::Struct,
        TypeKind::Union { .. } => Kind::Union,
        TypeKind::Wrapper { .. } => Kind::Wrapper,
        TypeKind::Opaque => Kind::Opaque,
    }
}

/// A blank descriptor to be filled in by one construction branch.
fn blank(def: &TypeDef, ssz_type: SszType) -> TypeDescriptor {
    TypeDescriptor {
        ssz_type,
        kind: kind_of(def),
        type_id: def.id(),
        type_name: def.name().to_string(),
        size: 0,
        length: 0,
        limit: 0,
        bit_size: 0,
        elem: None,
        container: None,
        union_variants: None,
        size_expr: None,
        max_expr: None,
        is_dynamic: false,
        has_limit: false,
        has_bit_size: false,
        has_dynamic_size: false,
        has_dynamic_max: false,
        is_pointer: false,
        is_byte_array: false,
        is_string: false,
        is_time: false,
        compat: Compatibility::from_vtable(def.vtable()),
    }
}

impl DynSsz {
    /// Resolve (and cache) the descriptor for `ty`, optionally shaped by a
    /// schema `view` type. The view's structural layout drives the SSZ shape
    /// while values keep living in the runtime type, bound by field name.
    pub fn get_descriptor(
        &self,
        ty: &TypeRef,
        view: Option<&TypeRef>,
    ) -> Result<Arc<TypeDescriptor>, SszError> {
        let source = view.unwrap_or(ty);
        let key = (ty.id(), view.map_or(0, |v| v.id()));
        if let Some(cached) = self
            .type_cache
            .read()
            .expect("descriptor cache poisoned")
            .get(&key)
        {
            return Ok(Arc::clone(cached));
        }
        debug!(type_name = source.name(), "descriptor cache miss");
        let desc = Arc::new(self.build_descriptor(source, &FieldHints::default())?);
        // Concurrent misses may both build; the last writer wins and all
        // results are observably equal.
        self.type_cache
            .write()
            .expect("descriptor cache poisoned")
            .insert(key, Arc::clone(&desc));
        Ok(desc)
    }

    /// Validate that `ty` can be represented in SSZ.
    pub fn validate_type(&self, ty: &TypeRef) -> Result<(), SszError> {
        self.get_descriptor(ty, None).map(drop)
    }

    /// Drop every cached descriptor.
    pub fn flush_cache(&self) {
        self.type_cache
            .write()
            .expect("descriptor cache poisoned")
            .clear();
        self.specs.flush();
    }

    /// Drop cached descriptors built for `ty` (under any view).
    pub fn remove_cached(&self, ty: &TypeRef) {
        self.type_cache
            .write()
            .expect("descriptor cache poisoned")
            .retain(|(id, _), _| *id != ty.id());
    }

    pub(crate) fn field_hints(&self, tags: &FieldTags) -> Result<FieldHints, SszError> {
        Ok(FieldHints {
            sizes: tags::parse_size_hints(tags, &self.specs)?,
            maxes: tags::parse_max_hints(tags, &self.specs)?,
            types: tags::parse_type_hints(tags)?,
            bit_size: tags::parse_bitsize(tags)?,
        })
    }

    fn child_descriptor(
        &self,
        def: &TypeRef,
        hints: &FieldHints,
    ) -> Result<Arc<TypeDescriptor>, SszError> {
        if hints.is_empty() {
            self.get_descriptor(def, None)
        } else {
            Ok(Arc::new(self.build_descriptor(def, hints)?))
        }
    }

    pub(crate) fn build_descriptor(
        &self,
        def: &TypeRef,
        hints: &FieldHints,
    ) -> Result<TypeDescriptor, SszError> {
        // A single pointer level is transparent; deeper indirection is not
        // representable.
        if let TypeKind::Pointer { elem } = def.kind() {
            if matches!(elem.kind(), TypeKind::Pointer { .. }) {
                return Err(SszError::UnsupportedType(format!(
                    "{}: multiple pointer levels",
                    def.name()
                )));
            }
            let mut desc = self.build_descriptor(elem, hints)?;
            desc.is_pointer = true;
            desc.type_id = def.id();
            desc.type_name = def.name().to_string();
            return Ok(desc);
        }

        let ssz_type = self.determine_ssz_type(def, hints)?;
        match ssz_type {
            SszType::Bool => self.build_primitive(def, SszType::Bool),
            SszType::Uint8 => self.build_primitive(def, SszType::Uint8),
            SszType::Uint16 => self.build_primitive(def, SszType::Uint16),
            SszType::Uint32 => self.build_primitive(def, SszType::Uint32),
            SszType::Uint64 => self.build_primitive(def, SszType::Uint64),
            SszType::Uint128 => self.build_big_uint(def, SszType::Uint128),
            SszType::Uint256 => self.build_big_uint(def, SszType::Uint256),
            SszType::Vector => self.build_vector(def, hints),
            SszType::List | SszType::ProgressiveList => self.build_list(def, hints, ssz_type),
            SszType::BitVector => self.build_bitvector(def, hints),
            SszType::BitList | SszType::ProgressiveBitList => {
                self.build_bitlist(def, hints, ssz_type)
            }
            SszType::Container | SszType::ProgressiveContainer => {
                self.build_container(def, ssz_type)
            }
            SszType::CompatibleUnion => self.build_union(def),
            SszType::TypeWrapper => self.build_wrapper(def, hints),
            SszType::Custom => self.build_custom(def),
        }
    }

    /// Priority order: explicit `ssz-type` hint, well-known types, inference
    /// from the host kind.
    fn determine_ssz_type(
        &self,
        def: &TypeRef,
        hints: &FieldHints,
    ) -> Result<SszType, SszError> {
        if let Some(forced) = hints.ty() {
            return Ok(forced);
        }
        Ok(match def.kind() {
            TypeKind::Bool => SszType::Bool,
            TypeKind::U8 => SszType::Uint8,
            TypeKind::U16 => SszType::Uint16,
            TypeKind::U32 => SszType::Uint32,
            TypeKind::U64 | TypeKind::Time => SszType::Uint64,
            TypeKind::U128 => SszType::Uint128,
            TypeKind::U256 => SszType::Uint256,
            TypeKind::BitList => SszType::BitList,
            TypeKind::Array { .. } => SszType::Vector,
            TypeKind::Slice { .. } | TypeKind::String => {
                match hints.size() {
                    Some(hint) if !hint.dynamic => SszType::Vector,
                    _ => SszType::List,
                }
            }
            TypeKind::Struct { fields } => {
                // A struct whose every field carries a sparse index is a
                // progressive container; a top-level one has no parent field
                // to carry the hint.
                if !fields.is_empty() && fields.iter().all(|f| f.tags.ssz_index.is_some()) {
                    SszType::ProgressiveContainer
                } else {
                    SszType::Container
                }
            }
            TypeKind::Union { .. } => SszType::CompatibleUnion,
            TypeKind::Wrapper { .. } => SszType::TypeWrapper,
            TypeKind::Opaque => SszType::Custom,
            TypeKind::Pointer { .. } => unreachable!("pointers are dereferenced above"),
        })
    }

    fn build_primitive(
        &self,
        def: &TypeRef,
        ssz_type: SszType,
    ) -> Result<TypeDescriptor, SszError> {
        let compatible = matches!(
            (ssz_type, def.kind()),
            (SszType::Bool, TypeKind::Bool)
                | (SszType::Uint8, TypeKind::U8)
                | (SszType::Uint16, TypeKind::U16)
                | (SszType::Uint32, TypeKind::U32)
                | (SszType::Uint64, TypeKind::U64)
                | (SszType::Uint64, TypeKind::Time)
        );
        if !compatible {
            return Err(SszError::UnsupportedType(format!(
                "{}: host kind does not match ssz type {}",
                def.name(),
                ssz_type.name()
            )));
        }
        let mut desc = blank(def, ssz_type);
        desc.size = ssz_type.primitive_size().expect("primitive has a size");
        desc.is_time = matches!(def.kind(), TypeKind::Time);
        Ok(desc)
    }

    fn build_big_uint(&self, def: &TypeRef, ssz_type: SszType) -> Result<TypeDescriptor, SszError> {
        let bytes = ssz_type.primitive_size().expect("big uint has a size");
        let compatible = match (ssz_type, def.kind()) {
            (SszType::Uint128, TypeKind::U128) | (SszType::Uint256, TypeKind::U256) => true,
            // 16/32-byte arrays and matching u64-limb arrays also qualify.
            (_, TypeKind::Array { elem, len }) => match elem.kind() {
                TypeKind::U8 => *len as u32 == bytes,
                TypeKind::U64 => *len as u32 * 8 == bytes,
                _ => false,
            },
            _ => false,
        };
        if !compatible {
            return Err(SszError::UnsupportedType(format!(
                "{}: not representable as {}",
                def.name(),
                ssz_type.name()
            )));
        }
        let mut desc = blank(def, ssz_type);
        desc.size = bytes;
        desc.length = bytes;
        Ok(desc)
    }

    fn build_vector(&self, def: &TypeRef, hints: &FieldHints) -> Result<TypeDescriptor, SszError> {
        let (elem_def, declared_len) = match def.kind() {
            TypeKind::Array { elem, len } => (Arc::clone(elem), Some(*len)),
            TypeKind::Slice { elem } => (Arc::clone(elem), None),
            TypeKind::String => (TypeDef::uint8(), None),
            _ => {
                return Err(SszError::UnsupportedType(format!(
                    "{}: vectors require an array, or a slice with a size hint",
                    def.name()
                )));
            }
        };

        let hint = hints.size().filter(|h| !h.dynamic);
        let length = match (declared_len, hint) {
            (Some(len), Some(h)) if h.value != len as u64 => {
                return Err(SszError::TagParse(format!(
                    "{}: ssz-size {} conflicts with array length {len}",
                    def.name(),
                    h.value
                )));
            }
            (Some(len), _) => len as u64,
            (None, Some(h)) => h.value,
            (None, None) => {
                return Err(SszError::UnsupportedType(format!(
                    "{}: slice-backed vector needs a size hint",
                    def.name()
                )));
            }
        };

        let elem = self.child_descriptor(&elem_def, &hints.tail())?;
        let mut desc = blank(def, SszType::Vector);
        desc.length = u32::try_from(length).map_err(|_| {
            SszError::UnsupportedType(format!("{}: vector length {length} too large", def.name()))
        })?;
        desc.is_byte_array = elem.ssz_type == SszType::Uint8;
        desc.is_string = matches!(def.kind(), TypeKind::String);
        desc.is_dynamic = elem.is_dynamic;
        desc.size = if elem.is_dynamic {
            0
        } else {
            u32::try_from(u64::from(elem.size) * length).map_err(|_| {
                SszError::UnsupportedType(format!(
                    "{}: vector of {length} elements exceeds the offset range",
                    def.name()
                ))
            })?
        };
        if let Some(h) = hint {
            desc.has_dynamic_size = h.from_spec;
            desc.size_expr = h.expr.clone();
        }
        desc.has_dynamic_size |= elem.has_dynamic_size;
        desc.has_dynamic_max |= elem.has_dynamic_max;
        desc.elem = Some(elem);
        Ok(desc)
    }

    fn build_bitvector(
        &self,
        def: &TypeRef,
        hints: &FieldHints,
    ) -> Result<TypeDescriptor, SszError> {
        let declared_bytes = match def.kind() {
            TypeKind::Array { elem, len } if matches!(elem.kind(), TypeKind::U8) => Some(*len),
            TypeKind::Slice { elem } if matches!(elem.kind(), TypeKind::U8) => None,
            TypeKind::String | TypeKind::BitList => None,
            _ => {
                return Err(SszError::UnsupportedType(format!(
                    "{}: bitvectors require byte storage",
                    def.name()
                )));
            }
        };
        let hint_bytes = hints.size().filter(|h| !h.dynamic).map(|h| h.value);
        let bytes = match declared_bytes.map(|b| b as u64).or(hint_bytes) {
            Some(b) => b,
            None => match hints.bit_size {
                Some(bits) => u64::from(bits).div_ceil(8),
                None => {
                    return Err(SszError::UnsupportedType(format!(
                        "{}: bitvector needs a size or bitsize hint",
                        def.name()
                    )));
                }
            },
        };
        let bit_size = match hints.bit_size {
            Some(bits) => {
                if u64::from(bits).div_ceil(8) != bytes {
                    return Err(SszError::TagParse(format!(
                        "{}: ssz-bitsize {bits} does not fit {bytes} bytes",
                        def.name()
                    )));
                }
                bits
            }
            None => (bytes * 8) as u32,
        };

        let mut desc = blank(def, SszType::BitVector);
        desc.size = bytes as u32;
        desc.length = bytes as u32;
        desc.bit_size = bit_size;
        desc.has_bit_size = hints.bit_size.is_some();
        desc.is_byte_array = true;
        if let Some(h) = hints.size().filter(|h| !h.dynamic) {
            desc.has_dynamic_size = h.from_spec;
            desc.size_expr = h.expr.clone();
        }
        Ok(desc)
    }

    fn build_list(
        &self,
        def: &TypeRef,
        hints: &FieldHints,
        ssz_type: SszType,
    ) -> Result<TypeDescriptor, SszError> {
        let elem_def = match def.kind() {
            TypeKind::Slice { elem } => Arc::clone(elem),
            TypeKind::String => TypeDef::uint8(),
            _ => {
                return Err(SszError::UnsupportedType(format!(
                    "{}: lists require a slice or string host",
                    def.name()
                )));
            }
        };
        let elem = self.child_descriptor(&elem_def, &hints.tail())?;
        let mut desc = blank(def, ssz_type);
        desc.is_byte_array = elem.ssz_type == SszType::Uint8;
        desc.is_string = matches!(def.kind(), TypeKind::String);
        desc.is_dynamic = true;
        let unit = elem.ssz_type.primitive_size().map_or(32u64, u64::from);
        if let Some(max) = hints.max().filter(|m| !m.unbounded) {
            desc.limit = max.value * unit;
            desc.has_limit = true;
            desc.has_dynamic_max = max.from_spec;
            desc.max_expr = max.expr.clone();
        }
        desc.has_dynamic_size |= elem.has_dynamic_size;
        desc.has_dynamic_max |= elem.has_dynamic_max;
        desc.elem = Some(elem);
        Ok(desc)
    }

    fn build_bitlist(
        &self,
        def: &TypeRef,
        hints: &FieldHints,
        ssz_type: SszType,
    ) -> Result<TypeDescriptor, SszError> {
        let byte_backed = match def.kind() {
            TypeKind::BitList | TypeKind::String => true,
            TypeKind::Slice { elem } => matches!(elem.kind(), TypeKind::U8),
            _ => false,
        };
        if !byte_backed {
            return Err(SszError::UnsupportedType(format!(
                "{}: bitlists require byte storage",
                def.name()
            )));
        }
        let mut desc = blank(def, ssz_type);
        desc.is_byte_array = true;
        desc.is_dynamic = true;
        if let Some(max) = hints.max().filter(|m| !m.unbounded) {
            desc.limit = max.value;
            desc.has_limit = true;
            desc.has_dynamic_max = max.from_spec;
            desc.max_expr = max.expr.clone();
        }
        Ok(desc)
    }

    fn build_container(
        &self,
        def: &TypeRef,
        ssz_type: SszType,
    ) -> Result<TypeDescriptor, SszError> {
        let TypeKind::Struct { fields } = def.kind() else {
            return Err(SszError::UnsupportedType(format!(
                "{}: containers require a struct host",
                def.name()
            )));
        };

        let progressive = ssz_type == SszType::ProgressiveContainer;
        let mut descriptors = Vec::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            let field_hints = self.field_hints(&field.tags)?;
            let field_desc = self.child_descriptor(&field.ty, &field_hints)?;
            let index = tags::parse_ssz_index(&field.tags)?;
            if progressive && index.is_none() {
                return Err(SszError::TagParse(format!(
                    "{}.{}: progressive container fields require ssz-index",
                    def.name(),
                    field.name
                )));
            }
            descriptors.push(FieldDescriptor {
                name: field.name.clone(),
                desc: field_desc,
                ssz_index: index.unwrap_or(position as u16),
            });
        }

        if progressive {
            let ordered = descriptors
                .iter()
                .tuple_windows()
                .all(|(a, b)| a.ssz_index < b.ssz_index);
            if !ordered {
                return Err(SszError::TagParse(format!(
                    "{}: ssz-index values must be strictly increasing",
                    def.name()
                )));
            }
        }

        let mut fixed_size = 0u32;
        let mut dynamic = Vec::new();
        let mut has_dynamic_size = false;
        let mut has_dynamic_max = false;
        for (i, field) in descriptors.iter().enumerate() {
            has_dynamic_size |= field.desc.has_dynamic_size;
            has_dynamic_max |= field.desc.has_dynamic_max;
            if field.desc.is_dynamic {
                dynamic.push(DynamicField {
                    field: i,
                    header_offset: fixed_size,
                    position: dynamic.len() as u16,
                });
                fixed_size += 4;
            } else {
                fixed_size += field.desc.size;
            }
        }

        let mut desc = blank(def, ssz_type);
        desc.is_dynamic = !dynamic.is_empty();
        desc.size = if dynamic.is_empty() { fixed_size } else { 0 };
        desc.has_dynamic_size = has_dynamic_size;
        desc.has_dynamic_max = has_dynamic_max;
        desc.container = Some(ContainerDescriptor {
            fields: descriptors,
            dynamic,
            fixed_size,
        });
        Ok(desc)
    }

    fn build_union(&self, def: &TypeRef) -> Result<TypeDescriptor, SszError> {
        let TypeKind::Union { variants } = def.kind() else {
            return Err(SszError::UnsupportedType(format!(
                "{}: compatible unions require a union host",
                def.name()
            )));
        };
        if variants.is_empty() || variants.len() > 128 {
            return Err(SszError::UnsupportedType(format!(
                "{}: unions need between 1 and 128 variants",
                def.name()
            )));
        }
        let mut built = Vec::with_capacity(variants.len());
        let mut has_dynamic_size = false;
        let mut has_dynamic_max = false;
        for variant in variants {
            let hints = self.field_hints(&variant.tags)?;
            let vdesc = self.child_descriptor(&variant.ty, &hints)?;
            has_dynamic_size |= vdesc.has_dynamic_size;
            has_dynamic_max |= vdesc.has_dynamic_max;
            built.push(vdesc);
        }
        let mut desc = blank(def, SszType::CompatibleUnion);
        desc.is_dynamic = true;
        desc.has_dynamic_size = has_dynamic_size;
        desc.has_dynamic_max = has_dynamic_max;
        desc.union_variants = Some(built);
        Ok(desc)
    }

    fn build_wrapper(&self, def: &TypeRef, hints: &FieldHints) -> Result<TypeDescriptor, SszError> {
        let TypeKind::Wrapper { inner } = def.kind() else {
            return Err(SszError::UnsupportedType(format!(
                "{}: type wrappers require a wrapper host",
                def.name()
            )));
        };
        // Use-site hints take precedence over the wrapper's own annotations.
        let inner_hints = if hints.is_empty() {
            self.field_hints(&inner.tags)?
        } else {
            hints.clone()
        };
        let elem = self.child_descriptor(&inner.ty, &inner_hints)?;
        let mut desc = blank(def, SszType::TypeWrapper);
        desc.size = elem.size;
        desc.is_dynamic = elem.is_dynamic;
        desc.has_dynamic_size = elem.has_dynamic_size;
        desc.has_dynamic_max = elem.has_dynamic_max;
        desc.elem = Some(elem);
        Ok(desc)
    }

    fn build_custom(&self, def: &TypeRef) -> Result<TypeDescriptor, SszError> {
        let mut desc = blank(def, SszType::Custom);
        if desc.compat.vtable.is_none() {
            return Err(SszError::UnsupportedType(format!(
                "{}: custom types need a registered method suite",
                def.name()
            )));
        }
        desc.is_dynamic = true;
        Ok(desc)
    }
}
