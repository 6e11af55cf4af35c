//! Hash-tree-root computation.
//!
//! The walker appends chunks to a [`Hasher`] and reduces each composite's
//! region in place. Primitives inside vectors and lists are packed
//! (`pack = true`, no padding between elements); a primitive standing alone
//! as a container field fills its own right-zero-padded chunk.

use dynssz_hash::Hasher;

use crate::DynSsz;
use crate::bitlist::parse_bitlist;
use crate::descriptor::{Kind, SszType, TypeDescriptor};
use crate::error::SszError;
use crate::size::{deref_value, shape_mismatch, wrapped_value};
use crate::value::Value;

impl DynSsz {
    pub(crate) fn hash_value(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
        h: &mut Hasher,
        pack: bool,
    ) -> Result<(), SszError> {
        let mut scratch = None;
        let value = deref_value(desc, value, &mut scratch);

        // Registered hashers short-circuit the walk: the spec-blind one only
        // when no spec value reshaped this subtree.
        let compat = &desc.compat;
        if !self.options.no_fast_hash {
            let dynamic_shape = desc.has_dynamic_size || desc.has_dynamic_max;
            if dynamic_shape && compat.dyn_hash {
                let f = compat.vtable.as_deref().expect("flag implies vtable").dyn_hash;
                let root = f.expect("flag implies slot")(self, value)
                    .map_err(|e| SszError::user("dyn_hash", e))?;
                h.put_root(&root);
                return Ok(());
            }
            if !dynamic_shape && compat.fast_hash {
                let f = compat.vtable.as_deref().expect("flag implies vtable").fast_hash;
                let root = f.expect("flag implies slot")(value)
                    .map_err(|e| SszError::user("fast_hash", e))?;
                h.put_root(&root);
                return Ok(());
            }
        }

        match desc.ssz_type {
            SszType::Bool => {
                let Value::Bool(v) = value else {
                    return Err(shape_mismatch(desc, value));
                };
                if pack {
                    h.append_u8(*v as u8);
                } else {
                    h.put_bool(*v);
                }
            }
            SszType::Uint8 => {
                let Value::U8(v) = value else {
                    return Err(shape_mismatch(desc, value));
                };
                if pack {
                    h.append_u8(*v);
                } else {
                    h.put_u8(*v);
                }
            }
            SszType::Uint16 => {
                let Value::U16(v) = value else {
                    return Err(shape_mismatch(desc, value));
                };
                if pack {
                    h.append_u16(*v);
                } else {
                    h.put_u16(*v);
                }
            }
            SszType::Uint32 => {
                let Value::U32(v) = value else {
                    return Err(shape_mismatch(desc, value));
                };
                if pack {
                    h.append_u32(*v);
                } else {
                    h.put_u32(*v);
                }
            }
            SszType::Uint64 => {
                let v = match value {
                    Value::U64(v) | Value::Time(v) => *v,
                    _ => return Err(shape_mismatch(desc, value)),
                };
                if pack {
                    h.append_u64(v);
                } else {
                    h.put_u64(v);
                }
            }
            SszType::Uint128 => {
                let bytes = crate::encode::u128_bytes(desc, value)?;
                if pack {
                    h.append(&bytes);
                } else {
                    h.put_bytes(&bytes);
                }
            }
            SszType::Uint256 => {
                let bytes = crate::encode::u256_bytes(desc, value)?;
                if pack {
                    h.append(&bytes);
                } else {
                    h.put_bytes(&bytes);
                }
            }
            SszType::Vector => self.hash_vector(desc, value, h)?,
            SszType::BitVector => {
                let bytes = value.as_bytes().ok_or_else(|| shape_mismatch(desc, value))?;
                let size = desc.size as usize;
                if bytes.len() > size {
                    return Err(SszError::ListTooBig {
                        len: bytes.len(),
                        max: size,
                    });
                }
                let start = h.index();
                let mut padded = bytes.to_vec();
                padded.resize(size, 0);
                h.put_bytes(&padded);
                h.merkleize_with_limit(start, (size as u64).div_ceil(32))?;
            }
            SszType::List => self.hash_list(desc, value, h, false)?,
            SszType::ProgressiveList => self.hash_list(desc, value, h, true)?,
            SszType::BitList | SszType::ProgressiveBitList => {
                let bytes = value.as_bytes().ok_or_else(|| shape_mismatch(desc, value))?;
                let (data, bits) = parse_bitlist(bytes)?;
                if desc.has_limit && bits > desc.limit {
                    return Err(SszError::ListTooBig {
                        len: bits as usize,
                        max: desc.limit as usize,
                    });
                }
                let start = h.index();
                h.put_bytes(&data);
                if desc.ssz_type == SszType::ProgressiveBitList {
                    h.merkleize_progressive_with_mixin(start, bits)?;
                } else {
                    h.merkleize_with_mixin(start, bits, desc.chunk_limit())?;
                }
            }
            SszType::Container => {
                let container = desc.container.as_ref().expect("container descriptor");
                let fields = value.as_struct().ok_or_else(|| shape_mismatch(desc, value))?;
                let start = h.index();
                for field in &container.fields {
                    let zero;
                    let field_value = match fields.get(&field.name) {
                        Some(v) => v,
                        None => {
                            zero = Value::zero_of(&field.desc);
                            &zero
                        }
                    };
                    self.hash_value(&field.desc, field_value, h, false)?;
                }
                h.merkleize(start)?;
            }
            SszType::ProgressiveContainer => self.hash_progressive_container(desc, value, h)?,
            SszType::CompatibleUnion => {
                let variants = desc.union_variants.as_ref().expect("union descriptor");
                let union = match value {
                    Value::Union(u) => u,
                    _ => return Err(shape_mismatch(desc, value)),
                };
                let variant = variants
                    .get(union.selector as usize)
                    .ok_or(SszError::InvalidUnionVariant {
                        selector: union.selector,
                    })?;
                let data = union.data.as_deref().ok_or(SszError::InvalidUnionVariant {
                    selector: union.selector,
                })?;
                let start = h.index();
                self.hash_value(variant, data, h, false)?;
                h.merkleize_with_selector_mixin(start, union.selector)?;
            }
            SszType::TypeWrapper => {
                let elem = desc.elem.as_ref().expect("wrapper has an inner type");
                let zero;
                let inner = match wrapped_value(value) {
                    Some(v) => v,
                    None => {
                        zero = Value::zero_of(elem);
                        &zero
                    }
                };
                self.hash_value(elem, inner, h, pack)?;
            }
            // Custom types have no reflective fallback; their vtable applies
            // even when the fast path is disabled.
            SszType::Custom => {
                let vtable = compat.vtable.as_deref().expect("custom types carry a vtable");
                if let Some(f) = vtable.dyn_hash {
                    let root = f(self, value).map_err(|e| SszError::user("dyn_hash", e))?;
                    h.put_root(&root);
                } else if let Some(f) = vtable.fast_hash {
                    let root = f(value).map_err(|e| SszError::user("fast_hash", e))?;
                    h.put_root(&root);
                } else {
                    return Err(SszError::UnsupportedType(format!(
                        "{}: custom type registers no hasher",
                        desc.type_name
                    )));
                }
            }
        }
        Ok(())
    }

    fn hash_vector(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
        h: &mut Hasher,
    ) -> Result<(), SszError> {
        let elem = desc.elem.as_ref().expect("vector has an element type");
        let length = desc.length as usize;
        let start = h.index();

        if desc.is_byte_array {
            let bytes = value.as_bytes().ok_or_else(|| shape_mismatch(desc, value))?;
            if bytes.len() > length && desc.kind != Kind::Array {
                return Err(SszError::ListTooBig {
                    len: bytes.len(),
                    max: length,
                });
            }
            let mut padded = bytes[..bytes.len().min(length)].to_vec();
            padded.resize(length, 0);
            h.put_bytes(&padded);
            h.merkleize_with_limit(start, (length as u64).div_ceil(32))?;
            return Ok(());
        }

        let items = match value {
            Value::List(items) => items.as_slice(),
            _ => return Err(shape_mismatch(desc, value)),
        };
        if items.len() > length && desc.kind != Kind::Array {
            return Err(SszError::ListTooBig {
                len: items.len(),
                max: length,
            });
        }
        let zero = Value::zero_of(elem);

        if elem.ssz_type.is_primitive() {
            for i in 0..length {
                self.hash_value(elem, items.get(i).unwrap_or(&zero), h, true)?;
            }
            h.fill_up_to_32();
            let byte_len = length as u64 * u64::from(elem.size);
            h.merkleize_with_limit(start, byte_len.div_ceil(32))?;
        } else {
            for i in 0..length {
                self.hash_value(elem, items.get(i).unwrap_or(&zero), h, false)?;
            }
            h.merkleize_with_limit(start, length as u64)?;
        }
        Ok(())
    }

    fn hash_list(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
        h: &mut Hasher,
        progressive: bool,
    ) -> Result<(), SszError> {
        let elem = desc.elem.as_ref().expect("list has an element type");
        let start = h.index();
        let max_len = desc.max_len();

        let count = if desc.is_byte_array {
            let bytes = value.as_bytes().ok_or_else(|| shape_mismatch(desc, value))?;
            if let Some(max) = max_len
                && bytes.len() as u64 > max
            {
                return Err(SszError::ListTooBig {
                    len: bytes.len(),
                    max: max as usize,
                });
            }
            h.put_bytes(bytes);
            bytes.len() as u64
        } else {
            let items = match value {
                Value::List(items) => items.as_slice(),
                _ => return Err(shape_mismatch(desc, value)),
            };
            if let Some(max) = max_len
                && items.len() as u64 > max
            {
                return Err(SszError::ListTooBig {
                    len: items.len(),
                    max: max as usize,
                });
            }
            let pack = elem.ssz_type.is_primitive();
            for item in items {
                self.hash_value(elem, item, h, pack)?;
            }
            if pack {
                h.fill_up_to_32();
            }
            items.len() as u64
        };

        if progressive {
            h.merkleize_progressive_with_mixin(start, count)?;
        } else {
            h.merkleize_with_mixin(start, count, desc.chunk_limit())?;
        }
        Ok(())
    }

    fn hash_progressive_container(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
        h: &mut Hasher,
    ) -> Result<(), SszError> {
        let container = desc.container.as_ref().expect("container descriptor");
        let fields = value.as_struct().ok_or_else(|| shape_mismatch(desc, value))?;
        let start = h.index();

        if let Some(max_index) = container.fields.last().map(|f| f.ssz_index) {
            let mut declared = container.fields.iter().peekable();
            for index in 0..=max_index {
                if declared.peek().is_some_and(|f| f.ssz_index == index) {
                    let field = declared.next().expect("peeked");
                    let zero;
                    let field_value = match fields.get(&field.name) {
                        Some(v) => v,
                        None => {
                            zero = Value::zero_of(&field.desc);
                            &zero
                        }
                    };
                    self.hash_value(&field.desc, field_value, h, false)?;
                } else {
                    // A skipped sparse index contributes a zero chunk.
                    h.put_u8(0);
                }
            }
        }

        h.merkleize_progressive_with_active_fields(start, &active_fields(desc))?;
        Ok(())
    }
}

/// The active-fields bitvector of a progressive container: one bit per
/// declared `ssz-index`; the highest declared bit doubles as the length
/// delimiter.
pub(crate) fn active_fields(desc: &TypeDescriptor) -> Vec<u8> {
    let container = desc.container.as_ref().expect("container descriptor");
    let Some(max_index) = container.fields.last().map(|f| f.ssz_index) else {
        return Vec::new();
    };
    let mut bits = vec![0u8; max_index as usize / 8 + 1];
    for field in &container.fields {
        bits[field.ssz_index as usize / 8] |= 1 << (field.ssz_index % 8);
    }
    bits
}
