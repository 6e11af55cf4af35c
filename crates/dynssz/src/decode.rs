//! Decoding.
//!
//! The decode walker reconstructs values through a [`Cursor`], validating
//! every dynamic offset: the first offset of a region must equal its fixed
//! section length, offsets never decrease, and no offset leaves the region.
//! Each dynamic payload is decoded under a pushed limit that must come back
//! empty.
//!
//! Struct targets are merged by field name — the schema view may describe
//! fewer fields than the runtime value holds — while every other target
//! shape is replaced.

use dynssz_primitives::{u128_from_le_slice, u256_from_le_slice};

use crate::DynSsz;
use crate::bitlist::bitlist_len;
use crate::cursor::Cursor;
use crate::descriptor::{SszType, TypeDescriptor};
use crate::error::SszError;
use crate::value::{StructValue, UnionValue, Value};

impl DynSsz {
    pub(crate) fn decode_value(
        &self,
        desc: &TypeDescriptor,
        cur: &mut dyn Cursor,
        target: &mut Value,
    ) -> Result<(), SszError> {
        if desc.is_pointer {
            return match target {
                Value::Pointer(inner) => self.decode_content(desc, cur, inner),
                Value::None => {
                    let mut fresh = Value::zero_content_of(desc);
                    self.decode_content(desc, cur, &mut fresh)?;
                    *target = Value::Pointer(Box::new(fresh));
                    Ok(())
                }
                _ => Err(SszError::NotAPointer),
            };
        }
        self.decode_content(desc, cur, target)
    }

    fn decode_content(
        &self,
        desc: &TypeDescriptor,
        cur: &mut dyn Cursor,
        target: &mut Value,
    ) -> Result<(), SszError> {
        match desc.ssz_type {
            SszType::Bool => *target = Value::Bool(cur.decode_bool()?),
            SszType::Uint8 => *target = Value::U8(cur.decode_u8()?),
            SszType::Uint16 => *target = Value::U16(cur.decode_u16()?),
            SszType::Uint32 => *target = Value::U32(cur.decode_u32()?),
            SszType::Uint64 => {
                let v = cur.decode_u64()?;
                *target = if desc.is_time {
                    Value::Time(v)
                } else {
                    Value::U64(v)
                };
            }
            SszType::Uint128 => {
                let mut buf = [0u8; 16];
                cur.decode_bytes_into(&mut buf)?;
                *target = Value::U128(u128_from_le_slice(&buf).expect("16 bytes"));
            }
            SszType::Uint256 => {
                let mut buf = [0u8; 32];
                cur.decode_bytes_into(&mut buf)?;
                *target = Value::U256(u256_from_le_slice(&buf).expect("32 bytes"));
            }
            SszType::Vector => self.decode_vector(desc, cur, target)?,
            SszType::BitVector => {
                let bytes = cur.decode_bytes(desc.size as usize)?;
                let stray = desc.bit_size % 8;
                if stray != 0
                    && let Some(last) = bytes.last()
                    && last & !((1u8 << stray) - 1) != 0
                {
                    return Err(SszError::InvalidValue(format!(
                        "{}: bitvector padding bits beyond bit {} are set",
                        desc.type_name, desc.bit_size
                    )));
                }
                *target = Value::Bytes(bytes);
            }
            SszType::List | SszType::ProgressiveList => self.decode_list(desc, cur, target)?,
            SszType::BitList | SszType::ProgressiveBitList => {
                let total = bounded_remaining(desc, cur)?;
                let bytes = cur.decode_bytes(total)?;
                let bits = bitlist_len(&bytes)?;
                if desc.has_limit && bits > desc.limit {
                    return Err(SszError::ListTooBig {
                        len: bits as usize,
                        max: desc.limit as usize,
                    });
                }
                *target = Value::Bytes(bytes);
            }
            SszType::Container | SszType::ProgressiveContainer => {
                self.decode_container(desc, cur, target)?
            }
            SszType::CompatibleUnion => self.decode_union(desc, cur, target)?,
            SszType::TypeWrapper => {
                let elem = desc.elem.as_ref().expect("wrapper has an inner type");
                if target.as_struct().is_none() {
                    *target = Value::Struct(StructValue::new());
                }
                let fields = target.as_struct_mut().expect("just ensured");
                let slot = fields.entry("data", Value::zero_of(elem));
                self.decode_value(elem, cur, slot)?;
            }
            SszType::Custom => {
                let total = bounded_remaining(desc, cur)?;
                let bytes = cur.decode_bytes(total)?;
                let compat = &desc.compat;
                let vtable = compat.vtable.as_deref().expect("custom types carry a vtable");
                let prefer_dyn = !cur.can_seek() || self.options.no_fast_path;
                if (prefer_dyn || !compat.fast_unmarshal) && compat.dyn_unmarshal {
                    let f = vtable.dyn_unmarshal.expect("flag implies slot");
                    f(self, target, &bytes).map_err(|e| SszError::user("dyn_unmarshal", e))?;
                } else if compat.fast_unmarshal {
                    let f = vtable.fast_unmarshal.expect("flag implies slot");
                    f(target, &bytes).map_err(|e| SszError::user("fast_unmarshal", e))?;
                } else {
                    return Err(SszError::UnsupportedType(format!(
                        "{}: custom type registers no unmarshaler",
                        desc.type_name
                    )));
                }
            }
        }
        Ok(())
    }

    fn decode_vector(
        &self,
        desc: &TypeDescriptor,
        cur: &mut dyn Cursor,
        target: &mut Value,
    ) -> Result<(), SszError> {
        let elem = desc.elem.as_ref().expect("vector has an element type");
        let length = desc.length as usize;

        if desc.is_byte_array && !elem.is_dynamic {
            let mut bytes = vec![0u8; length];
            cur.decode_bytes_into(&mut bytes)?;
            *target = Value::Bytes(bytes);
            return Ok(());
        }

        if !elem.is_dynamic {
            let mut items = vec![Value::zero_of(elem); length];
            for item in items.iter_mut() {
                let before = cur.position();
                self.decode_value(elem, cur, item)?;
                if cur.position() - before != elem.size as usize {
                    return Err(SszError::SizeMismatch(format!(
                        "{}: element consumed {} bytes, descriptor declares {}",
                        desc.type_name,
                        cur.position() - before,
                        elem.size
                    )));
                }
            }
            *target = Value::List(items);
            return Ok(());
        }

        // Dynamic elements: a table of `length` offsets, then the payloads.
        let total = bounded_remaining(desc, cur)?;
        let mut offsets = self.offset_pool.get();
        for _ in 0..length {
            offsets.push(cur.decode_offset()? as u32);
        }
        if offsets.first().copied().unwrap_or(0) as usize != 4 * length {
            return Err(SszError::Offset(format!(
                "{}: first element offset must equal the offset table length {}",
                desc.type_name,
                4 * length
            )));
        }
        validate_offsets(&offsets, total, &desc.type_name)?;

        let mut items = vec![Value::zero_of(elem); length];
        for (i, item) in items.iter_mut().enumerate() {
            let begin = offsets[i] as usize;
            let end = offsets
                .get(i + 1)
                .map(|o| *o as usize)
                .unwrap_or(total);
            cur.push_limit(end - begin)?;
            self.decode_value(elem, cur, item)?;
            let leftover = cur.pop_limit();
            if leftover != 0 {
                return Err(SszError::SizeMismatch(format!(
                    "{}: element {i} left {leftover} bytes unconsumed",
                    desc.type_name
                )));
            }
        }
        *target = Value::List(items);
        Ok(())
    }

    fn decode_list(
        &self,
        desc: &TypeDescriptor,
        cur: &mut dyn Cursor,
        target: &mut Value,
    ) -> Result<(), SszError> {
        let elem = desc.elem.as_ref().expect("list has an element type");
        let total = bounded_remaining(desc, cur)?;
        let max_len = desc.max_len();

        if desc.is_byte_array && !elem.is_dynamic {
            if let Some(max) = max_len
                && total as u64 > max
            {
                return Err(SszError::ListTooBig {
                    len: total,
                    max: max as usize,
                });
            }
            let bytes = cur.decode_bytes(total)?;
            *target = Value::Bytes(bytes);
            return Ok(());
        }

        if !elem.is_dynamic {
            let elem_size = elem.size as usize;
            if total % elem_size != 0 {
                return Err(SszError::Offset(format!(
                    "{}: payload of {total} bytes is not a multiple of the element size {elem_size}",
                    desc.type_name
                )));
            }
            let count = total / elem_size;
            if let Some(max) = max_len
                && count as u64 > max
            {
                return Err(SszError::ListTooBig {
                    len: count,
                    max: max as usize,
                });
            }
            let mut items = vec![Value::zero_of(elem); count];
            for item in items.iter_mut() {
                self.decode_value(elem, cur, item)?;
            }
            *target = Value::List(items);
            return Ok(());
        }

        if total == 0 {
            *target = Value::List(Vec::new());
            return Ok(());
        }

        // The first offset fixes the element count.
        let first = cur.decode_offset()?;
        if first % 4 != 0 || first == 0 || first > total {
            return Err(SszError::Offset(format!(
                "{}: first offset {first} does not frame an offset table",
                desc.type_name
            )));
        }
        let count = first / 4;
        if let Some(max) = max_len
            && count as u64 > max
        {
            return Err(SszError::ListTooBig {
                len: count,
                max: max as usize,
            });
        }
        let mut offsets = self.offset_pool.get();
        offsets.push(first as u32);
        for _ in 1..count {
            offsets.push(cur.decode_offset()? as u32);
        }
        validate_offsets(&offsets, total, &desc.type_name)?;

        let mut items = vec![Value::zero_of(elem); count];
        for (i, item) in items.iter_mut().enumerate() {
            let begin = offsets[i] as usize;
            let end = offsets
                .get(i + 1)
                .map(|o| *o as usize)
                .unwrap_or(total);
            cur.push_limit(end - begin)?;
            self.decode_value(elem, cur, item)?;
            let leftover = cur.pop_limit();
            if leftover != 0 {
                return Err(SszError::SizeMismatch(format!(
                    "{}: element {i} left {leftover} bytes unconsumed",
                    desc.type_name
                )));
            }
        }
        *target = Value::List(items);
        Ok(())
    }

    fn decode_container(
        &self,
        desc: &TypeDescriptor,
        cur: &mut dyn Cursor,
        target: &mut Value,
    ) -> Result<(), SszError> {
        let container = desc.container.as_ref().expect("container descriptor");
        if target.as_struct().is_none() {
            *target = Value::Struct(StructValue::new());
        }
        let start = cur.position();
        let mut offsets = self.offset_pool.get();

        // Fixed section: statics decoded in place. On a seekable cursor the
        // dynamic header slots are skipped and read back by position;
        // otherwise the offsets are collected as they stream past.
        for field in &container.fields {
            if field.desc.is_dynamic {
                if cur.can_seek() {
                    cur.skip(4)?;
                } else {
                    offsets.push(cur.decode_offset()? as u32);
                }
                continue;
            }
            let before = cur.position();
            let fields = target.as_struct_mut().expect("struct target ensured");
            let slot = fields.entry(&field.name, Value::zero_of(&field.desc));
            self.decode_value(&field.desc, cur, slot)?;
            if cur.position() - before != field.desc.size as usize {
                return Err(SszError::SizeMismatch(format!(
                    "{}.{}: field consumed {} bytes, descriptor declares {}",
                    desc.type_name,
                    field.name,
                    cur.position() - before,
                    field.desc.size
                )));
            }
        }
        if cur.can_seek() {
            for dynamic in &container.dynamic {
                offsets.push(cur.decode_offset_at(start + dynamic.header_offset as usize)? as u32);
            }
        }

        if container.dynamic.is_empty() {
            return Ok(());
        }

        let rest = cur.remaining().ok_or_else(|| {
            SszError::Offset(format!(
                "{}: dynamic container needs a bounded region",
                desc.type_name
            ))
        })?;
        let total = container.fixed_size as usize + rest;

        if offsets[0] as usize != container.fixed_size as usize {
            return Err(SszError::Offset(format!(
                "{}: first offset {} must equal the fixed section length {}",
                desc.type_name, offsets[0], container.fixed_size
            )));
        }
        validate_offsets(&offsets, total, &desc.type_name)?;

        for (i, dynamic) in container.dynamic.iter().enumerate() {
            let field = &container.fields[dynamic.field];
            let begin = offsets[i] as usize;
            let end = offsets
                .get(i + 1)
                .map(|o| *o as usize)
                .unwrap_or(total);
            cur.push_limit(end - begin)?;
            let fields = target.as_struct_mut().expect("struct target ensured");
            let slot = fields.entry(&field.name, Value::zero_of(&field.desc));
            self.decode_value(&field.desc, cur, slot)?;
            let leftover = cur.pop_limit();
            if leftover != 0 {
                return Err(SszError::SizeMismatch(format!(
                    "{}.{}: field left {leftover} bytes unconsumed",
                    desc.type_name, field.name
                )));
            }
        }
        Ok(())
    }

    fn decode_union(
        &self,
        desc: &TypeDescriptor,
        cur: &mut dyn Cursor,
        target: &mut Value,
    ) -> Result<(), SszError> {
        let variants = desc.union_variants.as_ref().expect("union descriptor");
        let selector = cur.decode_u8()?;
        let variant = variants
            .get(selector as usize)
            .ok_or(SszError::InvalidUnionVariant { selector })?;

        let mut data = Value::zero_of(variant);
        self.decode_value(variant, cur, &mut data)?;
        *target = Value::Union(UnionValue {
            selector,
            data: Some(Box::new(data)),
        });
        Ok(())
    }
}

/// The bounded remaining bytes of the current region; open-ended regions
/// cannot frame a dynamic value.
fn bounded_remaining(desc: &TypeDescriptor, cur: &mut dyn Cursor) -> Result<usize, SszError> {
    cur.remaining().ok_or_else(|| {
        SszError::Offset(format!(
            "{}: dynamic value needs a bounded region",
            desc.type_name
        ))
    })
}

/// Offsets must be monotonic non-decreasing and stay inside the region.
fn validate_offsets(offsets: &[u32], total: usize, type_name: &str) -> Result<(), SszError> {
    let mut prev: Option<u32> = None;
    for offset in offsets {
        if let Some(prev) = prev
            && *offset < prev
        {
            return Err(SszError::Offset(format!(
                "{type_name}: offsets are decreasing ({offset} after {prev})"
            )));
        }
        if *offset as usize > total {
            return Err(SszError::Offset(format!(
                "{type_name}: offset {offset} exceeds the region of {total} bytes"
            )));
        }
        prev = Some(*offset);
    }
    Ok(())
}
