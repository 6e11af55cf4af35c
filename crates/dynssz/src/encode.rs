//! Encoding.
//!
//! Every container is laid out fixed-section-first: static fields in place,
//! a 4-byte offset slot per dynamic field, then the dynamic payloads in
//! declaration order. Offsets are measured from the start of the container's
//! own encoding, so the first dynamic payload sits exactly at the
//! fixed-section length.

use crate::DynSsz;
use crate::bitlist::bitlist_len;
use crate::descriptor::{Kind, SszType, TypeDescriptor};
use crate::error::SszError;
use crate::size::{deref_value, shape_mismatch, wrapped_value};
use crate::value::Value;

fn write_offset_at(buf: &mut [u8], pos: usize, offset: usize) -> Result<(), SszError> {
    let offset = u32::try_from(offset)
        .map_err(|_| SszError::Offset(format!("offset {offset} exceeds the 4-byte range")))?;
    buf[pos..pos + 4].copy_from_slice(&offset.to_le_bytes());
    Ok(())
}

pub(crate) fn u128_bytes(desc: &TypeDescriptor, value: &Value) -> Result<[u8; 16], SszError> {
    match value {
        Value::U128(v) => Ok(v.to_le_bytes::<16>()),
        Value::Bytes(b) if b.len() == 16 => {
            let mut out = [0u8; 16];
            out.copy_from_slice(b);
            Ok(out)
        }
        // u64-limb backing: each limb little-endian, low limb first.
        Value::List(limbs) if limbs.len() == 2 => {
            let mut out = [0u8; 16];
            for (i, limb) in limbs.iter().enumerate() {
                let Value::U64(v) = limb else {
                    return Err(shape_mismatch(desc, value));
                };
                out[i * 8..(i + 1) * 8].copy_from_slice(&v.to_le_bytes());
            }
            Ok(out)
        }
        _ => Err(shape_mismatch(desc, value)),
    }
}

pub(crate) fn u256_bytes(desc: &TypeDescriptor, value: &Value) -> Result<[u8; 32], SszError> {
    match value {
        Value::U256(v) => Ok(v.to_le_bytes::<32>()),
        Value::Bytes(b) if b.len() == 32 => {
            let mut out = [0u8; 32];
            out.copy_from_slice(b);
            Ok(out)
        }
        Value::List(limbs) if limbs.len() == 4 => {
            let mut out = [0u8; 32];
            for (i, limb) in limbs.iter().enumerate() {
                let Value::U64(v) = limb else {
                    return Err(shape_mismatch(desc, value));
                };
                out[i * 8..(i + 1) * 8].copy_from_slice(&v.to_le_bytes());
            }
            Ok(out)
        }
        _ => Err(shape_mismatch(desc, value)),
    }
}

/// Check that bits beyond `bit_size` in the final byte are zero.
fn check_bitvector_padding(desc: &TypeDescriptor, bytes: &[u8]) -> Result<(), SszError> {
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
    Ok(())
}

pub(crate) fn marshal_value(
    d: &DynSsz,
    desc: &TypeDescriptor,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Result<(), SszError> {
    let mut scratch = None;
    let value = deref_value(desc, value, &mut scratch);

    match desc.ssz_type {
        SszType::Bool => match value {
            Value::Bool(v) => buf.push(*v as u8),
            _ => return Err(shape_mismatch(desc, value)),
        },
        SszType::Uint8 => match value {
            Value::U8(v) => buf.push(*v),
            _ => return Err(shape_mismatch(desc, value)),
        },
        SszType::Uint16 => match value {
            Value::U16(v) => buf.extend_from_slice(&v.to_le_bytes()),
            _ => return Err(shape_mismatch(desc, value)),
        },
        SszType::Uint32 => match value {
            Value::U32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            _ => return Err(shape_mismatch(desc, value)),
        },
        SszType::Uint64 => match value {
            Value::U64(v) | Value::Time(v) => buf.extend_from_slice(&v.to_le_bytes()),
            _ => return Err(shape_mismatch(desc, value)),
        },
        SszType::Uint128 => buf.extend_from_slice(&u128_bytes(desc, value)?),
        SszType::Uint256 => buf.extend_from_slice(&u256_bytes(desc, value)?),
        SszType::Vector => marshal_vector(d, desc, value, buf)?,
        SszType::BitVector => {
            let bytes = value.as_bytes().ok_or_else(|| shape_mismatch(desc, value))?;
            let size = desc.size as usize;
            if bytes.len() > size {
                return Err(SszError::ListTooBig {
                    len: bytes.len(),
                    max: size,
                });
            }
            // Short sources are zero-padded; only a full-width source holds
            // the byte the padding bits live in.
            if bytes.len() == size {
                check_bitvector_padding(desc, bytes)?;
            }
            buf.extend_from_slice(bytes);
            buf.resize(buf.len() + size - bytes.len(), 0);
        }
        SszType::List | SszType::ProgressiveList => marshal_list(d, desc, value, buf)?,
        SszType::BitList | SszType::ProgressiveBitList => {
            let bytes = value.as_bytes().ok_or_else(|| shape_mismatch(desc, value))?;
            // The sentinel is the source's responsibility; verify it exists.
            let bits = bitlist_len(bytes)?;
            if desc.has_limit && bits > desc.limit {
                return Err(SszError::ListTooBig {
                    len: bits as usize,
                    max: desc.limit as usize,
                });
            }
            buf.extend_from_slice(bytes);
        }
        SszType::Container | SszType::ProgressiveContainer => {
            marshal_container(d, desc, value, buf)?
        }
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
            buf.push(union.selector);
            marshal_value(d, variant, data, buf)?;
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
            marshal_value(d, elem, inner, buf)?;
        }
        SszType::Custom => {
            let compat = &desc.compat;
            let vtable = compat.vtable.as_deref().expect("custom types carry a vtable");
            let prefer_dyn =
                desc.has_dynamic_size || desc.has_dynamic_max || d.options.no_fast_path;
            if (prefer_dyn || !compat.fast_marshal) && compat.dyn_marshal {
                let f = vtable.dyn_marshal.expect("flag implies slot");
                f(d, value, buf).map_err(|e| SszError::user("dyn_marshal", e))?;
            } else if compat.fast_marshal {
                let f = vtable.fast_marshal.expect("flag implies slot");
                f(value, buf).map_err(|e| SszError::user("fast_marshal", e))?;
            } else {
                return Err(SszError::UnsupportedType(format!(
                    "{}: custom type registers no marshaler",
                    desc.type_name
                )));
            }
        }
    }
    Ok(())
}

fn marshal_vector(
    d: &DynSsz,
    desc: &TypeDescriptor,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Result<(), SszError> {
    let elem = desc.elem.as_ref().expect("vector has an element type");
    let length = desc.length as usize;

    if desc.is_byte_array {
        let bytes = value.as_bytes().ok_or_else(|| shape_mismatch(desc, value))?;
        if bytes.len() > length {
            // Arrays carry their length in the type; extra source bytes are
            // truncated. Slices declared the length via tags, so overflow is
            // an error.
            if desc.kind != Kind::Array {
                return Err(SszError::ListTooBig {
                    len: bytes.len(),
                    max: length,
                });
            }
            buf.extend_from_slice(&bytes[..length]);
        } else {
            buf.extend_from_slice(bytes);
            buf.resize(buf.len() + length - bytes.len(), 0);
        }
        return Ok(());
    }

    let items = match value {
        Value::List(items) => items.as_slice(),
        _ => return Err(shape_mismatch(desc, value)),
    };
    let items = if items.len() > length {
        if desc.kind != Kind::Array {
            return Err(SszError::ListTooBig {
                len: items.len(),
                max: length,
            });
        }
        &items[..length]
    } else {
        items
    };
    let zero = Value::zero_of(elem);

    if !elem.is_dynamic {
        for i in 0..length {
            marshal_value(d, elem, items.get(i).unwrap_or(&zero), buf)?;
        }
        return Ok(());
    }

    // Dynamic elements: N offset slots, then N payloads.
    let base = buf.len();
    buf.resize(base + 4 * length, 0);
    for i in 0..length {
        let offset = buf.len() - base;
        write_offset_at(buf, base + 4 * i, offset)?;
        marshal_value(d, elem, items.get(i).unwrap_or(&zero), buf)?;
    }
    Ok(())
}

fn marshal_list(
    d: &DynSsz,
    desc: &TypeDescriptor,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Result<(), SszError> {
    let elem = desc.elem.as_ref().expect("list has an element type");
    let max_len = desc.max_len();

    if desc.is_byte_array {
        let bytes = value.as_bytes().ok_or_else(|| shape_mismatch(desc, value))?;
        if let Some(max) = max_len
            && bytes.len() as u64 > max
        {
            return Err(SszError::ListTooBig {
                len: bytes.len(),
                max: max as usize,
            });
        }
        buf.extend_from_slice(bytes);
        return Ok(());
    }

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

    if !elem.is_dynamic {
        for item in items {
            marshal_value(d, elem, item, buf)?;
        }
        return Ok(());
    }

    let base = buf.len();
    buf.resize(base + 4 * items.len(), 0);
    for (i, item) in items.iter().enumerate() {
        let offset = buf.len() - base;
        write_offset_at(buf, base + 4 * i, offset)?;
        marshal_value(d, elem, item, buf)?;
    }
    Ok(())
}

fn marshal_container(
    d: &DynSsz,
    desc: &TypeDescriptor,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Result<(), SszError> {
    let container = desc.container.as_ref().expect("container descriptor");
    let fields = value.as_struct().ok_or_else(|| shape_mismatch(desc, value))?;
    let base = buf.len();

    // Fixed section: statics in place, placeholder slots for dynamics.
    for field in &container.fields {
        if field.desc.is_dynamic {
            buf.resize(buf.len() + 4, 0);
            continue;
        }
        let zero;
        let field_value = match fields.get(&field.name) {
            Some(v) => v,
            None => {
                zero = Value::zero_of(&field.desc);
                &zero
            }
        };
        let before = buf.len();
        marshal_value(d, &field.desc, field_value, buf)?;
        if buf.len() - before != field.desc.size as usize {
            return Err(SszError::SizeMismatch(format!(
                "{}.{}: encoded {} bytes, descriptor declares {}",
                desc.type_name,
                field.name,
                buf.len() - before,
                field.desc.size
            )));
        }
    }

    // Dynamic payloads in declaration order, offsets patched as we go.
    for dynamic in &container.dynamic {
        let field = &container.fields[dynamic.field];
        let zero;
        let field_value = match fields.get(&field.name) {
            Some(v) => v,
            None => {
                zero = Value::zero_of(&field.desc);
                &zero
            }
        };
        let offset = buf.len() - base;
        write_offset_at(buf, base + dynamic.header_offset as usize, offset)?;
        marshal_value(d, &field.desc, field_value, buf)?;
    }
    Ok(())
}
