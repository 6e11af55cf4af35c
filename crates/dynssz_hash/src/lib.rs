// Modified in 2025 from the original version
// Original source licensed under the Apache License 2.0

//! Merkleization engine for the dynamic SSZ codec.
//!
//! Provides the SHA-256 backends, the zero-hash table, binary and progressive
//! chunk merkleization, a scratch-buffer [`Hasher`] with the mix-in reducers
//! the descriptor walkers need, pooled hasher instances, and Merkle
//! [`TreeNode`] construction for proof generation.

use std::sync::LazyLock;

use digest::Digest;
use dynssz_primitives::Hash256;

mod hasher;
mod merkleize;
mod pool;
mod tree;

pub use hasher::{Hasher, HasherError};
pub use merkleize::{
    merkleize_chunks, merkleize_progressive, mix_in_aux, mix_in_length, mix_in_selector,
};
pub use pool::{HasherPool, PooledHasher, standard_pool, vectorized_pool};
pub use tree::{
    TreeNode, mix_in_aux_node, mix_in_length_node, tree_from_chunks, tree_from_chunks_progressive,
    tree_from_nodes, tree_from_nodes_progressive,
};

/// Number of bytes in a Merkle chunk.
pub const BYTES_PER_CHUNK: usize = 32;

/// Maximum depth for which zero hashes are precomputed.
pub const ZERO_HASHES_MAX_INDEX: usize = 48;

/// Precomputed roots of all-zero subtrees, indexed by depth.
pub static ZERO_HASHES: LazyLock<Vec<Hash256>> = LazyLock::new(|| {
    let mut hashes = vec![Hash256::ZERO; ZERO_HASHES_MAX_INDEX + 1];
    for i in 0..ZERO_HASHES_MAX_INDEX {
        let above = StandardBackend.hash32_concat(hashes[i].as_slice(), hashes[i].as_slice());
        hashes[i + 1] = Hash256::from_slice(&above);
    }
    hashes
});

/// Root of the all-zero subtree of the given depth.
pub fn zero_hash(depth: usize) -> [u8; 32] {
    ZERO_HASHES[depth].into_inner()
}

/// A SHA-256 compression provider.
///
/// Two implementations exist: [`StandardBackend`] over the portable `sha2`
/// compressor and [`VectorizedBackend`] over the block-wise optimized routine
/// from `ethereum_hashing`. Both produce identical output; selection is a
/// per-instance throughput choice.
pub trait Sha256Backend: Send + Sync {
    /// Hash an arbitrary byte string into 32 bytes.
    fn hash_fixed(&self, data: &[u8]) -> [u8; 32];

    /// Hash the concatenation of two 32-byte nodes.
    fn hash32_concat(&self, left: &[u8], right: &[u8]) -> [u8; 32] {
        let mut input = [0u8; 64];
        input[..32].copy_from_slice(left);
        input[32..].copy_from_slice(right);
        self.hash_fixed(&input)
    }

    /// Hash each adjacent 64-byte block of `input` into a 32-byte digest
    /// appended to `output`. `input.len()` must be a multiple of 64.
    fn hash_layer(&self, input: &[u8], output: &mut Vec<u8>) {
        for block in input.chunks_exact(2 * BYTES_PER_CHUNK) {
            output.extend_from_slice(&self.hash_fixed(block));
        }
    }
}

/// Portable SHA-256 backend over the `sha2` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardBackend;

impl Sha256Backend for StandardBackend {
    fn hash_fixed(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = sha2::Sha256::new();
        hasher.update(data);
        let mut output = [0u8; 32];
        output.copy_from_slice(&hasher.finalize());
        output
    }
}

/// Vectorized SHA-256 backend over the block-wise `ethereum_hashing` routine,
/// which dispatches to an accelerated implementation where the CPU supports
/// one.
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorizedBackend;

impl Sha256Backend for VectorizedBackend {
    fn hash_fixed(&self, data: &[u8]) -> [u8; 32] {
        ethereum_hashing::hash_fixed(data)
    }

    fn hash32_concat(&self, left: &[u8], right: &[u8]) -> [u8; 32] {
        ethereum_hashing::hash32_concat(left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hash_table() {
        assert_eq!(zero_hash(0), [0u8; 32]);
        assert_eq!(
            zero_hash(1),
            StandardBackend.hash32_concat(&[0u8; 32], &[0u8; 32])
        );
        assert_eq!(ZERO_HASHES.len(), ZERO_HASHES_MAX_INDEX + 1);
    }

    #[test]
    fn backends_agree() {
        let data = b"dynamic ssz merkleization";
        assert_eq!(
            StandardBackend.hash_fixed(data),
            VectorizedBackend.hash_fixed(data)
        );
        let a = [0x11u8; 32];
        let b = [0x22u8; 32];
        assert_eq!(
            StandardBackend.hash32_concat(&a, &b),
            VectorizedBackend.hash32_concat(&a, &b)
        );
    }

    #[test]
    fn hash_layer_matches_pairwise() {
        let input: Vec<u8> = (0u8..128).collect();
        let mut batched = Vec::new();
        StandardBackend.hash_layer(&input, &mut batched);
        let mut pairwise = Vec::new();
        pairwise.extend_from_slice(&StandardBackend.hash32_concat(&input[..32], &input[32..64]));
        pairwise.extend_from_slice(&StandardBackend.hash32_concat(&input[64..96], &input[96..]));
        assert_eq!(batched, pairwise);
    }
}
