//! Size computation.
//!
//! [`value_size`] returns the exact encoded byte length of a value, and
//! [`build_size_tree`] the per-node size tree the streaming encoder uses to
//! resolve offsets without buffering payloads.

use crate::DynSsz;
use crate::descriptor::{SszType, TypeDescriptor};
use crate::error::SszError;
use crate::value::Value;

/// Follow one pointer level, substituting the zero value for nil.
pub(crate) fn deref_value<'a>(
    desc: &TypeDescriptor,
    value: &'a Value,
    scratch: &'a mut Option<Value>,
) -> &'a Value {
    match value {
        Value::Pointer(inner) => inner,
        Value::None if desc.ssz_type != SszType::Custom => {
            scratch.insert(Value::zero_content_of(desc))
        }
        other => other,
    }
}

/// The inner value of a wrapper, whether it arrives as a `data` field or as
/// the bare inner value.
pub(crate) fn wrapped_value(value: &Value) -> Option<&Value> {
    match value {
        Value::Struct(s) => s.get("data"),
        other => Some(other),
    }
}

pub(crate) fn shape_mismatch(desc: &TypeDescriptor, value: &Value) -> SszError {
    SszError::InvalidValue(format!(
        "value {value:?} does not fit a {} descriptor for {}",
        desc.ssz_type.name(),
        desc.type_name
    ))
}

/// Exact encoded byte length of `value` under `desc`.
pub(crate) fn value_size(
    d: &DynSsz,
    desc: &TypeDescriptor,
    value: &Value,
) -> Result<usize, SszError> {
    let mut scratch = None;
    let value = deref_value(desc, value, &mut scratch);

    if !desc.is_dynamic {
        return Ok(desc.size as usize);
    }

    match desc.ssz_type {
        SszType::Vector => {
            // Only vectors of dynamic elements reach here.
            let elem = desc.elem.as_ref().expect("vector has an element type");
            let items = match value {
                Value::List(items) => items.as_slice(),
                _ => return Err(shape_mismatch(desc, value)),
            };
            let zero = Value::zero_of(elem);
            let mut total = 0usize;
            for i in 0..desc.length as usize {
                total += 4 + value_size(d, elem, items.get(i).unwrap_or(&zero))?;
            }
            Ok(total)
        }
        SszType::List | SszType::ProgressiveList => {
            let elem = desc.elem.as_ref().expect("list has an element type");
            match value {
                Value::Bytes(bytes) if desc.is_byte_array => Ok(bytes.len()),
                Value::List(items) => {
                    if elem.is_dynamic {
                        let mut total = 0usize;
                        for item in items {
                            total += 4 + value_size(d, elem, item)?;
                        }
                        Ok(total)
                    } else {
                        Ok(items.len() * elem.size as usize)
                    }
                }
                _ => Err(shape_mismatch(desc, value)),
            }
        }
        SszType::BitList | SszType::ProgressiveBitList => match value {
            Value::Bytes(bytes) => Ok(bytes.len()),
            _ => Err(shape_mismatch(desc, value)),
        },
        SszType::Container | SszType::ProgressiveContainer => {
            let container = desc.container.as_ref().expect("container descriptor");
            let fields = value.as_struct().ok_or_else(|| shape_mismatch(desc, value))?;
            let mut total = container.fixed_size as usize;
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
                total += value_size(d, &field.desc, field_value)?;
            }
            Ok(total)
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
            Ok(1 + value_size(d, variant, data)?)
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
            value_size(d, elem, inner)
        }
        SszType::Custom => {
            let compat = &desc.compat;
            let vtable = compat.vtable.as_deref().expect("custom types carry a vtable");
            let prefer_dyn =
                desc.has_dynamic_size || desc.has_dynamic_max || d.options.no_fast_path;
            if prefer_dyn && compat.dyn_size {
                let f = vtable.dyn_size.expect("flag implies slot");
                f(d, value).map_err(|e| SszError::user("dyn_size", e))
            } else if compat.fast_size {
                let f = vtable.fast_size.expect("flag implies slot");
                f(value).map_err(|e| SszError::user("fast_size", e))
            } else if compat.dyn_size {
                let f = vtable.dyn_size.expect("flag implies slot");
                f(d, value).map_err(|e| SszError::user("dyn_size", e))
            } else {
                Err(SszError::UnsupportedType(format!(
                    "{}: custom type registers no sizer",
                    desc.type_name
                )))
            }
        }
        _ => unreachable!("static kinds return early"),
    }
}

/// A node of the size tree the streaming encoder walks: the encoded size of
/// one value plus, where offsets must be emitted, the sizes of its parts.
#[derive(Debug, Clone)]
pub(crate) struct SizeNode {
    pub(crate) size: usize,
    /// Containers: one child per field. Dynamic-element collections: one
    /// child per (padded) element. Empty otherwise.
    pub(crate) children: Vec<SizeNode>,
}

impl SizeNode {
    fn leaf(size: usize) -> Self {
        Self {
            size,
            children: Vec::new(),
        }
    }
}

/// Precompute the size tree for `value`; pass 1 of the streaming encoder.
pub(crate) fn build_size_tree(
    d: &DynSsz,
    desc: &TypeDescriptor,
    value: &Value,
) -> Result<SizeNode, SszError> {
    let mut scratch = None;
    let value = deref_value(desc, value, &mut scratch);

    if !desc.is_dynamic {
        return Ok(SizeNode::leaf(desc.size as usize));
    }

    match desc.ssz_type {
        SszType::Vector => {
            let elem = desc.elem.as_ref().expect("vector has an element type");
            let items = match value {
                Value::List(items) => items.as_slice(),
                _ => return Err(shape_mismatch(desc, value)),
            };
            let zero = Value::zero_of(elem);
            let mut children = Vec::with_capacity(desc.length as usize);
            let mut total = 4 * desc.length as usize;
            for i in 0..desc.length as usize {
                let child = build_size_tree(d, elem, items.get(i).unwrap_or(&zero))?;
                total += child.size;
                children.push(child);
            }
            Ok(SizeNode {
                size: total,
                children,
            })
        }
        SszType::List | SszType::ProgressiveList => {
            let elem = desc.elem.as_ref().expect("list has an element type");
            match value {
                Value::Bytes(bytes) if desc.is_byte_array => Ok(SizeNode::leaf(bytes.len())),
                Value::List(items) if !elem.is_dynamic => {
                    Ok(SizeNode::leaf(items.len() * elem.size as usize))
                }
                Value::List(items) => {
                    let mut children = Vec::with_capacity(items.len());
                    let mut total = 4 * items.len();
                    for item in items {
                        let child = build_size_tree(d, elem, item)?;
                        total += child.size;
                        children.push(child);
                    }
                    Ok(SizeNode {
                        size: total,
                        children,
                    })
                }
                _ => Err(shape_mismatch(desc, value)),
            }
        }
        SszType::BitList | SszType::ProgressiveBitList => match value {
            Value::Bytes(bytes) => Ok(SizeNode::leaf(bytes.len())),
            _ => Err(shape_mismatch(desc, value)),
        },
        SszType::Container | SszType::ProgressiveContainer => {
            let container = desc.container.as_ref().expect("container descriptor");
            let fields = value.as_struct().ok_or_else(|| shape_mismatch(desc, value))?;
            let mut children = Vec::with_capacity(container.fields.len());
            let mut total = container.fixed_size as usize;
            for field in &container.fields {
                let zero;
                let field_value = match fields.get(&field.name) {
                    Some(v) => v,
                    None => {
                        zero = Value::zero_of(&field.desc);
                        &zero
                    }
                };
                let child = build_size_tree(d, &field.desc, field_value)?;
                if field.desc.is_dynamic {
                    total += child.size;
                }
                children.push(child);
            }
            Ok(SizeNode {
                size: total,
                children,
            })
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
            let child = build_size_tree(d, variant, data)?;
            Ok(SizeNode {
                size: 1 + child.size,
                children: vec![child],
            })
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
            build_size_tree(d, elem, inner)
        }
        SszType::Custom => Ok(SizeNode::leaf(value_size(d, desc, value)?)),
        _ => unreachable!("static kinds return early"),
    }
}
