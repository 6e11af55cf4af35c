//! Merkle tree construction.
//!
//! Walks a value exactly like the hashing walker but keeps every tree node,
//! so callers can navigate by generalized index and extract proofs. The root
//! hash of the returned tree equals `hash_tree_root`.

use std::sync::Arc;

use dynssz_hash::{
    TreeNode, mix_in_aux_node, mix_in_length_node, tree_from_chunks,
    tree_from_chunks_progressive, tree_from_nodes, tree_from_nodes_progressive,
};

use crate::DynSsz;
use crate::bitlist::parse_bitlist;
use crate::descriptor::{Kind, SszType, TypeDescriptor};
use crate::encode::marshal_value;
use crate::error::SszError;
use crate::hashing::active_fields;
use crate::size::{deref_value, shape_mismatch, wrapped_value};
use crate::value::Value;

fn leaf_chunk(bytes: &[u8]) -> Arc<TreeNode> {
    let mut chunk = [0u8; 32];
    chunk[..bytes.len().min(32)].copy_from_slice(&bytes[..bytes.len().min(32)]);
    TreeNode::leaf(chunk)
}

impl DynSsz {
    pub(crate) fn treeify_value(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
    ) -> Result<Arc<TreeNode>, SszError> {
        let backend = self.backend();
        let mut scratch = None;
        let value = deref_value(desc, value, &mut scratch);

        let compat = &desc.compat;
        if !self.options.no_fast_hash {
            let dynamic_shape = desc.has_dynamic_size || desc.has_dynamic_max;
            if dynamic_shape && compat.dyn_hash {
                let f = compat.vtable.as_deref().expect("flag implies vtable").dyn_hash;
                let root = f.expect("flag implies slot")(self, value)
                    .map_err(|e| SszError::user("dyn_hash", e))?;
                return Ok(TreeNode::leaf(root));
            }
            if !dynamic_shape && compat.fast_hash {
                let f = compat.vtable.as_deref().expect("flag implies vtable").fast_hash;
                let root = f.expect("flag implies slot")(value)
                    .map_err(|e| SszError::user("fast_hash", e))?;
                return Ok(TreeNode::leaf(root));
            }
        }

        Ok(match desc.ssz_type {
            SszType::Bool
            | SszType::Uint8
            | SszType::Uint16
            | SszType::Uint32
            | SszType::Uint64
            | SszType::Uint128
            | SszType::Uint256 => {
                let mut packed = Vec::with_capacity(32);
                marshal_value(self, desc, value, &mut packed)?;
                leaf_chunk(&packed)
            }
            SszType::Vector => self.treeify_vector(desc, value)?,
            SszType::BitVector => {
                let bytes = value.as_bytes().ok_or_else(|| shape_mismatch(desc, value))?;
                let size = desc.size as usize;
                let mut padded = bytes[..bytes.len().min(size)].to_vec();
                padded.resize(size, 0);
                tree_from_chunks(backend, &padded, (size as u64).div_ceil(32))?
            }
            SszType::List | SszType::ProgressiveList => self.treeify_list(desc, value)?,
            SszType::BitList | SszType::ProgressiveBitList => {
                let bytes = value.as_bytes().ok_or_else(|| shape_mismatch(desc, value))?;
                let (data, bits) = parse_bitlist(bytes)?;
                if desc.has_limit && bits > desc.limit {
                    return Err(SszError::ListTooBig {
                        len: bits as usize,
                        max: desc.limit as usize,
                    });
                }
                let content = if desc.ssz_type == SszType::ProgressiveBitList {
                    tree_from_chunks_progressive(backend, &data, 1)?
                } else {
                    tree_from_chunks(backend, &data, desc.chunk_limit())?
                };
                mix_in_length_node(backend, content, bits)
            }
            SszType::Container => {
                let container = desc.container.as_ref().expect("container descriptor");
                let fields = value.as_struct().ok_or_else(|| shape_mismatch(desc, value))?;
                let mut nodes = Vec::with_capacity(container.fields.len());
                for field in &container.fields {
                    let zero;
                    let field_value = match fields.get(&field.name) {
                        Some(v) => v,
                        None => {
                            zero = Value::zero_of(&field.desc);
                            &zero
                        }
                    };
                    nodes.push(self.treeify_value(&field.desc, field_value)?);
                }
                tree_from_nodes(backend, &nodes, 0)?
            }
            SszType::ProgressiveContainer => {
                let container = desc.container.as_ref().expect("container descriptor");
                let fields = value.as_struct().ok_or_else(|| shape_mismatch(desc, value))?;
                let mut nodes = Vec::new();
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
                            nodes.push(self.treeify_value(&field.desc, field_value)?);
                        } else {
                            nodes.push(TreeNode::leaf([0u8; 32]));
                        }
                    }
                }
                let content = tree_from_nodes_progressive(backend, &nodes, 1)?;
                let mut aux = [0u8; 32];
                let bits = active_fields(desc);
                aux[..bits.len().min(32)].copy_from_slice(&bits[..bits.len().min(32)]);
                mix_in_aux_node(backend, content, aux)
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
                let content = self.treeify_value(variant, data)?;
                let mut aux = [0u8; 32];
                aux[0] = union.selector;
                mix_in_aux_node(backend, content, aux)
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
                self.treeify_value(elem, inner)?
            }
            SszType::Custom => {
                let vtable = compat.vtable.as_deref().expect("custom types carry a vtable");
                if let Some(f) = vtable.dyn_hash {
                    TreeNode::leaf(f(self, value).map_err(|e| SszError::user("dyn_hash", e))?)
                } else if let Some(f) = vtable.fast_hash {
                    TreeNode::leaf(f(value).map_err(|e| SszError::user("fast_hash", e))?)
                } else {
                    return Err(SszError::UnsupportedType(format!(
                        "{}: custom type registers no hasher",
                        desc.type_name
                    )));
                }
            }
        })
    }

    fn treeify_vector(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
    ) -> Result<Arc<TreeNode>, SszError> {
        let backend = self.backend();
        let elem = desc.elem.as_ref().expect("vector has an element type");
        let length = desc.length as usize;

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
            return Ok(tree_from_chunks(
                backend,
                &padded,
                (length as u64).div_ceil(32),
            )?);
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
            let mut packed = Vec::with_capacity(length * elem.size as usize);
            for i in 0..length {
                marshal_value(self, elem, items.get(i).unwrap_or(&zero), &mut packed)?;
            }
            let byte_len = length as u64 * u64::from(elem.size);
            Ok(tree_from_chunks(backend, &packed, byte_len.div_ceil(32))?)
        } else {
            let mut nodes = Vec::with_capacity(length);
            for i in 0..length {
                nodes.push(self.treeify_value(elem, items.get(i).unwrap_or(&zero))?);
            }
            Ok(tree_from_nodes(backend, &nodes, length as u64)?)
        }
    }

    fn treeify_list(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
    ) -> Result<Arc<TreeNode>, SszError> {
        let backend = self.backend();
        let elem = desc.elem.as_ref().expect("list has an element type");
        let progressive = desc.ssz_type == SszType::ProgressiveList;
        let max_len = desc.max_len();

        let (content, count) = if desc.is_byte_array {
            let bytes = value.as_bytes().ok_or_else(|| shape_mismatch(desc, value))?;
            if let Some(max) = max_len
                && bytes.len() as u64 > max
            {
                return Err(SszError::ListTooBig {
                    len: bytes.len(),
                    max: max as usize,
                });
            }
            let content = if progressive {
                tree_from_chunks_progressive(backend, bytes, 1)?
            } else {
                tree_from_chunks(backend, bytes, desc.chunk_limit())?
            };
            (content, bytes.len() as u64)
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
            let content = if elem.ssz_type.is_primitive() {
                let mut packed = Vec::with_capacity(items.len() * elem.size as usize);
                for item in items {
                    marshal_value(self, elem, item, &mut packed)?;
                }
                if progressive {
                    tree_from_chunks_progressive(backend, &packed, 1)?
                } else {
                    tree_from_chunks(backend, &packed, desc.chunk_limit())?
                }
            } else {
                let mut nodes = Vec::with_capacity(items.len());
                for item in items {
                    nodes.push(self.treeify_value(elem, item)?);
                }
                if progressive {
                    tree_from_nodes_progressive(backend, &nodes, 1)?
                } else {
                    tree_from_nodes(backend, &nodes, desc.chunk_limit())?
                }
            };
            (content, items.len() as u64)
        };

        Ok(mix_in_length_node(backend, content, count))
    }
}
