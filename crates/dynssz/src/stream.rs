//! Streaming adapters.
//!
//! The streaming encoder runs two passes: pass 1 computes a size tree
//! mirroring the descriptor (see [`crate::size::build_size_tree`]), pass 2
//! emits bytes, resolving every dynamic offset from the tree so payloads are
//! never buffered. The streaming decoder is the ordinary decode walker over
//! a [`StreamCursor`], whose limit stack gives each nested dynamic region its
//! exact byte boundary.

use std::io::{BufReader, BufWriter, Read, Write};

use crate::DynSsz;
use crate::cursor::{Cursor, StreamCursor};
use crate::descriptor::{SszType, TypeDescriptor};
use crate::encode::marshal_value;
use crate::error::SszError;
use crate::size::{SizeNode, build_size_tree, deref_value, shape_mismatch, wrapped_value};
use crate::value::Value;

fn write_offset(w: &mut dyn Write, offset: usize) -> Result<(), SszError> {
    let offset = u32::try_from(offset)
        .map_err(|_| SszError::Offset(format!("offset {offset} exceeds the 4-byte range")))?;
    w.write_all(&offset.to_le_bytes())?;
    Ok(())
}

impl DynSsz {
    /// Encode `value` into `sink` without buffering dynamic payloads.
    pub(crate) fn marshal_stream_desc(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
        sink: &mut dyn Write,
    ) -> Result<(), SszError> {
        let tree = build_size_tree(self, desc, value)?;
        let mut writer = BufWriter::with_capacity(self.buffer_capacity(), sink);
        self.write_value(desc, value, &tree, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Decode from `source`. `declared` bounds the value when the caller
    /// knows its size; without it, statically sized types stream against
    /// their descriptor size and dynamic types fall back to buffering.
    pub(crate) fn unmarshal_stream_desc<R: Read>(
        &self,
        desc: &TypeDescriptor,
        source: R,
        declared: Option<usize>,
        target: &mut Value,
    ) -> Result<(), SszError> {
        if desc.is_pointer && target.is_none() {
            return Err(SszError::NilTarget);
        }
        if declared.is_none() && desc.is_dynamic {
            // Only sized streaming is supported for dynamic layouts; an
            // unbounded source is drained first.
            let mut data = Vec::new();
            let mut reader = BufReader::with_capacity(self.buffer_capacity(), source);
            reader.read_to_end(&mut data)?;
            return self.unmarshal_desc(desc, &data, target);
        }

        let bound = declared.unwrap_or(desc.size as usize);
        let reader = BufReader::with_capacity(self.buffer_capacity(), source);
        let mut cur = StreamCursor::new(reader, Some(bound));
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

    fn write_value(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
        node: &SizeNode,
        w: &mut dyn Write,
    ) -> Result<(), SszError> {
        let mut scratch = None;
        let value = deref_value(desc, value, &mut scratch);

        match desc.ssz_type {
            // Leaf kinds reuse the in-memory encoder through a bounded
            // scratch buffer.
            SszType::Bool
            | SszType::Uint8
            | SszType::Uint16
            | SszType::Uint32
            | SszType::Uint64
            | SszType::Uint128
            | SszType::Uint256
            | SszType::BitVector
            | SszType::BitList
            | SszType::ProgressiveBitList
            | SszType::Custom => {
                let mut buf = Vec::with_capacity(node.size);
                marshal_value(self, desc, value, &mut buf)?;
                w.write_all(&buf)?;
            }
            SszType::Vector => self.write_vector(desc, value, node, w)?,
            SszType::List | SszType::ProgressiveList => self.write_list(desc, value, node, w)?,
            SszType::Container | SszType::ProgressiveContainer => {
                self.write_container(desc, value, node, w)?
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
                w.write_all(&[union.selector])?;
                let child = node
                    .children
                    .first()
                    .cloned()
                    .unwrap_or(SizeNode {
                        size: variant.size as usize,
                        children: Vec::new(),
                    });
                self.write_value(variant, data, &child, w)?;
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
                self.write_value(elem, inner, node, w)?;
            }
        }
        Ok(())
    }

    fn write_vector(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
        node: &SizeNode,
        w: &mut dyn Write,
    ) -> Result<(), SszError> {
        let elem = desc.elem.as_ref().expect("vector has an element type");
        let length = desc.length as usize;

        if desc.is_byte_array {
            // Bounded enough to reuse the in-memory path.
            let mut buf = Vec::with_capacity(node.size);
            marshal_value(self, desc, value, &mut buf)?;
            w.write_all(&buf)?;
            return Ok(());
        }

        let items = match value {
            Value::List(items) => items.as_slice(),
            _ => return Err(shape_mismatch(desc, value)),
        };
        let zero = Value::zero_of(elem);

        if !elem.is_dynamic {
            let leaf = SizeNode {
                size: elem.size as usize,
                children: Vec::new(),
            };
            for i in 0..length {
                self.write_value(elem, items.get(i).unwrap_or(&zero), &leaf, w)?;
            }
            return Ok(());
        }

        // Offset table from the precomputed element sizes, then payloads.
        let mut offset = 4 * length;
        for child in &node.children {
            write_offset(w, offset)?;
            offset += child.size;
        }
        for (i, child) in node.children.iter().enumerate() {
            self.write_value(elem, items.get(i).unwrap_or(&zero), child, w)?;
        }
        Ok(())
    }

    fn write_list(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
        node: &SizeNode,
        w: &mut dyn Write,
    ) -> Result<(), SszError> {
        let elem = desc.elem.as_ref().expect("list has an element type");

        if desc.is_byte_array {
            let mut buf = Vec::with_capacity(node.size);
            marshal_value(self, desc, value, &mut buf)?;
            w.write_all(&buf)?;
            return Ok(());
        }

        let items = match value {
            Value::List(items) => items.as_slice(),
            _ => return Err(shape_mismatch(desc, value)),
        };
        if let Some(max) = desc.max_len()
            && items.len() as u64 > max
        {
            return Err(SszError::ListTooBig {
                len: items.len(),
                max: max as usize,
            });
        }

        if !elem.is_dynamic {
            let leaf = SizeNode {
                size: elem.size as usize,
                children: Vec::new(),
            };
            for item in items {
                self.write_value(elem, item, &leaf, w)?;
            }
            return Ok(());
        }

        let mut offset = 4 * items.len();
        for child in &node.children {
            write_offset(w, offset)?;
            offset += child.size;
        }
        for (item, child) in items.iter().zip(&node.children) {
            self.write_value(elem, item, child, w)?;
        }
        Ok(())
    }

    fn write_container(
        &self,
        desc: &TypeDescriptor,
        value: &Value,
        node: &SizeNode,
        w: &mut dyn Write,
    ) -> Result<(), SszError> {
        let container = desc.container.as_ref().expect("container descriptor");
        let fields = value.as_struct().ok_or_else(|| shape_mismatch(desc, value))?;

        // A static container arrives as a leaf node; synthesize per-field
        // leaves since every field size is in the descriptor.
        let synthesized: Vec<SizeNode>;
        let children: &[SizeNode] = if node.children.len() == container.fields.len() {
            &node.children
        } else {
            synthesized = container
                .fields
                .iter()
                .map(|f| SizeNode {
                    size: f.desc.size as usize,
                    children: Vec::new(),
                })
                .collect();
            &synthesized
        };

        // Offsets for the dynamic fields, in declaration order.
        let mut dynamic_offsets = Vec::with_capacity(container.dynamic.len());
        let mut running = container.fixed_size as usize;
        for dynamic in &container.dynamic {
            dynamic_offsets.push(running);
            running += children[dynamic.field].size;
        }

        let mut next_dynamic = 0usize;
        for (i, field) in container.fields.iter().enumerate() {
            if field.desc.is_dynamic {
                write_offset(w, dynamic_offsets[next_dynamic])?;
                next_dynamic += 1;
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
            self.write_value(&field.desc, field_value, &children[i], w)?;
        }

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
            self.write_value(&field.desc, field_value, &children[dynamic.field], w)?;
        }
        Ok(())
    }
}
