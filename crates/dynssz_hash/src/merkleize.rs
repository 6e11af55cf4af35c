// Modified in 2025 from the original version
// Original source licensed under the Apache License 2.0

//! Chunk merkleization.
//!
//! Binary merkleization pads the chunk sequence to the depth implied by
//! `limit` using precomputed zero hashes, so padding subtrees are never
//! hashed. Progressive merkleization grows subtree capacity by a factor of
//! four per level, which keeps generalized indices stable as a collection
//! grows.

use crate::{BYTES_PER_CHUNK, HasherError, Sha256Backend, zero_hash};

/// Reduce `data` (a packed chunk sequence, not necessarily 32-byte aligned)
/// to a single 32-byte root.
///
/// `limit` is the chunk capacity of the virtual tree; `0` means "exactly the
/// chunks present". Supplying more chunks than `limit` is a caller bug and
/// reported as [`HasherError::TooManyChunks`].
pub fn merkleize_chunks(
    backend: &dyn Sha256Backend,
    data: &[u8],
    limit: u64,
) -> Result<[u8; 32], HasherError> {
    let chunk_count = data.len().div_ceil(BYTES_PER_CHUNK) as u64;
    let limit = if limit == 0 { chunk_count } else { limit };
    if chunk_count > limit {
        return Err(HasherError::TooManyChunks {
            chunks: chunk_count,
            limit,
        });
    }
    if limit == 0 {
        return Ok([0u8; 32]);
    }
    if limit == 1 {
        let mut root = [0u8; 32];
        root[..data.len()].copy_from_slice(data);
        return Ok(root);
    }

    let depth = depth_for_limit(limit);
    if chunk_count == 0 {
        return Ok(zero_hash(depth));
    }

    let mut layer = data.to_vec();
    // Align the final chunk.
    layer.resize(chunk_count as usize * BYTES_PER_CHUNK, 0);

    for level in 0..depth {
        if (layer.len() / BYTES_PER_CHUNK) % 2 == 1 {
            layer.extend_from_slice(&zero_hash(level));
        }
        let mut next = Vec::with_capacity(layer.len() / 2);
        backend.hash_layer(&layer, &mut next);
        layer = next;
    }

    let mut root = [0u8; 32];
    root.copy_from_slice(&layer);
    Ok(root)
}

/// Reduce `data` with the progressive algorithm: the first `base` chunks form
/// a binary-merkleized right subtree and the remainder recurses as the left
/// subtree with four times the capacity. An empty sequence reduces to the
/// zero chunk.
pub fn merkleize_progressive(
    backend: &dyn Sha256Backend,
    data: &[u8],
    base: u64,
) -> Result<[u8; 32], HasherError> {
    if data.is_empty() {
        return Ok([0u8; 32]);
    }
    let split = (base as usize).saturating_mul(BYTES_PER_CHUNK).min(data.len());
    let (right, rest) = data.split_at(split);
    let right_root = merkleize_chunks(backend, right, base)?;
    let left_root = merkleize_progressive(backend, rest, base * 4)?;
    Ok(backend.hash32_concat(&left_root, &right_root))
}

/// `hash(root ‖ length_u64_le ‖ 24 zero bytes)`, the list length mix-in.
pub fn mix_in_length(backend: &dyn Sha256Backend, root: &[u8; 32], length: u64) -> [u8; 32] {
    let mut chunk = [0u8; BYTES_PER_CHUNK];
    chunk[..8].copy_from_slice(&length.to_le_bytes());
    backend.hash32_concat(root, &chunk)
}

/// `hash(root ‖ selector-as-uint8-chunk)`, the union selector mix-in.
pub fn mix_in_selector(backend: &dyn Sha256Backend, root: &[u8; 32], selector: u8) -> [u8; 32] {
    let mut chunk = [0u8; BYTES_PER_CHUNK];
    chunk[0] = selector;
    backend.hash32_concat(root, &chunk)
}

/// `hash(root ‖ aux)` for an arbitrary auxiliary chunk, e.g. the
/// active-fields bitvector of a progressive container.
pub fn mix_in_aux(backend: &dyn Sha256Backend, root: &[u8; 32], aux: &[u8; 32]) -> [u8; 32] {
    backend.hash32_concat(root, aux)
}

/// Depth of the smallest binary tree holding `limit` chunks.
pub(crate) fn depth_for_limit(limit: u64) -> usize {
    debug_assert!(limit > 0);
    64 - (limit - 1).leading_zeros() as usize
}
