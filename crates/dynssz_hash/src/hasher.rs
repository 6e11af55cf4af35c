// Modified in 2025 from the original version
// Original source licensed under the Apache License 2.0

//! Scratch-buffer hasher.
//!
//! The walkers append 32-byte chunks (or packed primitive bytes) to the
//! buffer, then reduce a region `[start..]` to a single chunk with one of the
//! `merkleize*` methods. A composite's parent keeps appending after the
//! reduction, so a full hash-tree-root walk leaves exactly one chunk behind.
//!
//! `put_*` methods write a fresh right-zero-padded chunk (a standalone leaf);
//! `append_*` methods write packed bytes for primitives inside vectors and
//! lists, to be aligned later with [`Hasher::fill_up_to_32`].

use dynssz_primitives::Hash256;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    BYTES_PER_CHUNK, Sha256Backend, merkleize::merkleize_chunks,
    merkleize::merkleize_progressive, mix_in_aux, mix_in_length, mix_in_selector,
};

/// Hash accumulator state violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HasherError {
    /// `hash_root` requires the buffer to hold exactly one chunk.
    #[error("hash_root called with {0} bytes in the buffer, expected 32")]
    UnexpectedBufferLength(usize),

    /// More chunks were supplied than the merkleization limit allows.
    #[error("{chunks} chunks exceed the merkleization limit {limit}")]
    TooManyChunks {
        /// Chunks present in the region being reduced.
        chunks: u64,
        /// The declared chunk capacity.
        limit: u64,
    },

    /// A merkleize region start beyond the end of the buffer.
    #[error("merkleize region starts at {start} but the buffer holds {len} bytes")]
    RegionOutOfBounds {
        /// Requested region start.
        start: usize,
        /// Buffer length.
        len: usize,
    },
}

/// Scratch buffer type: small values stay on the stack.
type Scratch = SmallVec<[u8; 8 * BYTES_PER_CHUNK]>;

/// A chunk-accumulating hasher over a selected SHA-256 backend.
pub struct Hasher {
    buf: Scratch,
    backend: &'static dyn Sha256Backend,
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher")
            .field("buffered", &self.buf.len())
            .finish()
    }
}

impl Hasher {
    /// A fresh hasher over `backend`.
    pub fn new(backend: &'static dyn Sha256Backend) -> Self {
        Self {
            buf: Scratch::new(),
            backend,
        }
    }

    /// Clear the buffer, keeping its allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Current buffer length; callers record this before descending into a
    /// composite and pass it back to a `merkleize*` call.
    pub fn index(&self) -> usize {
        self.buf.len()
    }

    /// The backend this hasher reduces with.
    pub fn backend(&self) -> &'static dyn Sha256Backend {
        self.backend
    }

    /// Append raw bytes without alignment.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a packed little-endian `u8`.
    pub fn append_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Append a packed little-endian `u16`.
    pub fn append_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a packed little-endian `u32`.
    pub fn append_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a packed little-endian `u64`.
    pub fn append_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write `value` as a standalone right-zero-padded chunk.
    pub fn put_u8(&mut self, value: u8) {
        self.append_u8(value);
        self.fill_up_to_32();
    }

    /// Write `value` as a standalone chunk.
    pub fn put_u16(&mut self, value: u16) {
        self.append_u16(value);
        self.fill_up_to_32();
    }

    /// Write `value` as a standalone chunk.
    pub fn put_u32(&mut self, value: u32) {
        self.append_u32(value);
        self.fill_up_to_32();
    }

    /// Write `value` as a standalone chunk.
    pub fn put_u64(&mut self, value: u64) {
        self.append_u64(value);
        self.fill_up_to_32();
    }

    /// Write a boolean as a standalone chunk.
    pub fn put_bool(&mut self, value: bool) {
        self.put_u8(value as u8);
    }

    /// Append `bytes` and align to the next chunk boundary.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.append(bytes);
        self.fill_up_to_32();
    }

    /// Append a precomputed 32-byte root.
    pub fn put_root(&mut self, root: &[u8; 32]) {
        self.append(root);
    }

    /// Zero-pad the buffer to the next 32-byte boundary.
    pub fn fill_up_to_32(&mut self) {
        let rem = self.buf.len() % BYTES_PER_CHUNK;
        if rem != 0 {
            self.buf.resize(self.buf.len() + BYTES_PER_CHUNK - rem, 0);
        }
    }

    fn region(&mut self, start: usize) -> Result<&[u8], HasherError> {
        if start > self.buf.len() {
            return Err(HasherError::RegionOutOfBounds {
                start,
                len: self.buf.len(),
            });
        }
        self.fill_up_to_32();
        Ok(&self.buf[start..])
    }

    fn replace_region(&mut self, start: usize, root: [u8; 32]) {
        self.buf.truncate(start);
        self.buf.extend_from_slice(&root);
    }

    /// Binary-merkleize `[start..]` with no capacity padding.
    pub fn merkleize(&mut self, start: usize) -> Result<(), HasherError> {
        self.merkleize_with_limit(start, 0)
    }

    /// Binary-merkleize `[start..]` into a tree of `limit` chunks.
    pub fn merkleize_with_limit(&mut self, start: usize, limit: u64) -> Result<(), HasherError> {
        let root = merkleize_chunks(self.backend, self.region(start)?, limit)?;
        self.replace_region(start, root);
        Ok(())
    }

    /// Binary-merkleize `[start..]` with `limit` chunk capacity, then mix in
    /// `length`. Used for lists and bitlists.
    pub fn merkleize_with_mixin(
        &mut self,
        start: usize,
        length: u64,
        limit: u64,
    ) -> Result<(), HasherError> {
        let root = merkleize_chunks(self.backend, self.region(start)?, limit)?;
        let mixed = mix_in_length(self.backend, &root, length);
        self.replace_region(start, mixed);
        Ok(())
    }

    /// Binary-merkleize `[start..]`, then mix in a union selector. Used for
    /// compatible unions, whose region holds the selected variant's root.
    pub fn merkleize_with_selector_mixin(
        &mut self,
        start: usize,
        selector: u8,
    ) -> Result<(), HasherError> {
        let root = merkleize_chunks(self.backend, self.region(start)?, 0)?;
        let mixed = mix_in_selector(self.backend, &root, selector);
        self.replace_region(start, mixed);
        Ok(())
    }

    /// Progressive-merkleize `[start..]`.
    pub fn merkleize_progressive(&mut self, start: usize) -> Result<(), HasherError> {
        let root = merkleize_progressive(self.backend, self.region(start)?, 1)?;
        self.replace_region(start, root);
        Ok(())
    }

    /// Progressive-merkleize `[start..]`, then mix in `length`. Used for
    /// progressive lists and progressive bitlists.
    pub fn merkleize_progressive_with_mixin(
        &mut self,
        start: usize,
        length: u64,
    ) -> Result<(), HasherError> {
        let root = merkleize_progressive(self.backend, self.region(start)?, 1)?;
        let mixed = mix_in_length(self.backend, &root, length);
        self.replace_region(start, mixed);
        Ok(())
    }

    /// Progressive-merkleize `[start..]`, then mix in the active-fields
    /// bitvector (right-zero-padded to one chunk). Used for progressive
    /// containers.
    pub fn merkleize_progressive_with_active_fields(
        &mut self,
        start: usize,
        active_fields: &[u8],
    ) -> Result<(), HasherError> {
        let root = merkleize_progressive(self.backend, self.region(start)?, 1)?;
        let mut aux = [0u8; 32];
        aux[..active_fields.len().min(32)]
            .copy_from_slice(&active_fields[..active_fields.len().min(32)]);
        let mixed = mix_in_aux(self.backend, &root, &aux);
        self.replace_region(start, mixed);
        Ok(())
    }

    /// Consume the single remaining chunk as the final root.
    pub fn hash_root(&mut self) -> Result<Hash256, HasherError> {
        if self.buf.len() != BYTES_PER_CHUNK {
            return Err(HasherError::UnexpectedBufferLength(self.buf.len()));
        }
        let root = Hash256::from_slice(&self.buf);
        self.buf.clear();
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StandardBackend;

    fn hasher() -> Hasher {
        Hasher::new(&StandardBackend)
    }

    #[test]
    fn put_pads_to_chunk() {
        let mut h = hasher();
        h.put_u64(4);
        assert_eq!(h.index(), 32);
        h.put_bool(true);
        assert_eq!(h.index(), 64);
    }

    #[test]
    fn append_packs() {
        let mut h = hasher();
        h.append_u16(2);
        h.append_u16(2);
        assert_eq!(h.index(), 4);
        h.fill_up_to_32();
        assert_eq!(h.index(), 32);
    }

    #[test]
    fn five_field_container_root() {
        // {bool, u8, u16, u32, u64} = {true, 1, 2, 3, 4}, the reference
        // five-field container vector.
        let mut h = hasher();
        h.put_bool(true);
        h.put_u8(1);
        h.put_u16(2);
        h.put_u32(3);
        h.put_u64(4);
        h.merkleize(0).unwrap();
        let root = h.hash_root().unwrap();
        assert_eq!(
            root.to_string(),
            "0x03cf6524e0c5dee777f18d8a15b724aa70da9d9393e3a47434fe352eff0e7375"
        );
    }

    #[test]
    fn selector_mixin_matches_manual_pair_hash() {
        let mut h = hasher();
        h.put_u32(0x5678);
        h.merkleize_with_selector_mixin(0, 1).unwrap();
        let root = h.hash_root().unwrap();

        let mut variant = [0u8; 32];
        variant[..4].copy_from_slice(&0x5678u32.to_le_bytes());
        let mut selector = [0u8; 32];
        selector[0] = 1;
        assert_eq!(
            root.into_inner(),
            StandardBackend.hash32_concat(&variant, &selector)
        );
    }

    #[test]
    fn hash_root_rejects_unreduced_buffer() {
        let mut h = hasher();
        h.put_u64(1);
        h.put_u64(2);
        assert_eq!(h.hash_root(), Err(HasherError::UnexpectedBufferLength(64)));
    }

    #[test]
    fn nested_region_reduction() {
        // Outer container with one u64 field and one 2-chunk inner composite.
        let mut h = hasher();
        h.put_u64(7);
        let inner = h.index();
        h.put_u64(1);
        h.put_u64(2);
        h.merkleize(inner).unwrap();
        assert_eq!(h.index(), 64);
        h.merkleize(0).unwrap();
        let root = h.hash_root().unwrap();

        let b = StandardBackend;
        let mut c0 = [0u8; 32];
        c0[..8].copy_from_slice(&7u64.to_le_bytes());
        let mut c1 = [0u8; 32];
        c1[..8].copy_from_slice(&1u64.to_le_bytes());
        let mut c2 = [0u8; 32];
        c2[..8].copy_from_slice(&2u64.to_le_bytes());
        let expect = b.hash32_concat(&c0, &b.hash32_concat(&c1, &c2));
        assert_eq!(root.into_inner(), expect);
    }
}
