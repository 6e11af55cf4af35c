// Modified in 2025 from the original version
// Original source licensed under the Apache License 2.0

//! Merkle tree construction.
//!
//! [`tree_from_chunks`] and [`tree_from_chunks_progressive`] build the same
//! trees the merkleization reducers hash, but keep every node, so callers can
//! navigate by generalized index and extract single-leaf proofs. All-zero
//! padding subtrees are shared, memoized instances.

use std::sync::{Arc, Mutex};

use dynssz_primitives::Hash256;

use crate::{
    BYTES_PER_CHUNK, HasherError, Sha256Backend, StandardBackend, merkleize::depth_for_limit,
};

/// A node of a Merkle tree. Leaves hold a chunk; branches hold the hash of
/// their children.
#[derive(Debug, Clone)]
pub struct TreeNode {
    hash: Hash256,
    children: Option<(Arc<TreeNode>, Arc<TreeNode>)>,
}

impl TreeNode {
    /// A leaf holding `chunk`.
    pub fn leaf(chunk: [u8; 32]) -> Arc<Self> {
        Arc::new(Self {
            hash: Hash256::from(chunk),
            children: None,
        })
    }

    /// A branch over two children; the hash is computed eagerly.
    pub fn branch(
        backend: &dyn Sha256Backend,
        left: Arc<TreeNode>,
        right: Arc<TreeNode>,
    ) -> Arc<Self> {
        let hash = backend.hash32_concat(left.hash.as_slice(), right.hash.as_slice());
        Arc::new(Self {
            hash: Hash256::from(hash),
            children: Some((left, right)),
        })
    }

    /// This node's root hash.
    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    /// Left child, if this is a branch.
    pub fn left(&self) -> Option<&Arc<TreeNode>> {
        self.children.as_ref().map(|(l, _)| l)
    }

    /// Right child, if this is a branch.
    pub fn right(&self) -> Option<&Arc<TreeNode>> {
        self.children.as_ref().map(|(_, r)| r)
    }

    /// `true` for leaves.
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Navigate to the node at `gindex` (1 is this node, 2/3 its children,
    /// and so on). Returns `None` when the path leaves the tree.
    pub fn get(&self, gindex: u64) -> Option<&TreeNode> {
        if gindex == 0 {
            return None;
        }
        let mut node = self;
        let bits = 63 - gindex.leading_zeros() as u64;
        for shift in (0..bits).rev() {
            let (left, right) = node.children.as_ref()?;
            node = if gindex >> shift & 1 == 0 { left } else { right };
        }
        Some(node)
    }

    /// Sibling hashes along the path to `gindex`, ordered leaf-side first,
    /// as a single-leaf Merkle proof.
    pub fn proof(&self, gindex: u64) -> Option<Vec<Hash256>> {
        if gindex == 0 {
            return None;
        }
        let mut node = self;
        let mut witnesses = Vec::new();
        let bits = 63 - gindex.leading_zeros() as u64;
        for shift in (0..bits).rev() {
            let (left, right) = node.children.as_ref()?;
            if gindex >> shift & 1 == 0 {
                witnesses.push(right.hash);
                node = left;
            } else {
                witnesses.push(left.hash);
                node = right;
            }
        }
        witnesses.reverse();
        Some(witnesses)
    }
}

/// Memoized all-zero subtrees by depth.
static ZERO_TREES: Mutex<Vec<Option<Arc<TreeNode>>>> = Mutex::new(Vec::new());

/// The shared all-zero subtree of `depth`.
pub(crate) fn zero_tree(depth: usize) -> Arc<TreeNode> {
    let mut cache = ZERO_TREES.lock().expect("zero tree lock poisoned");
    if cache.len() <= depth {
        cache.resize(depth + 1, None);
    }
    if let Some(node) = &cache[depth] {
        return Arc::clone(node);
    }
    // Build every level up to `depth`; each depends on the one below.
    if cache[0].is_none() {
        cache[0] = Some(TreeNode::leaf([0u8; 32]));
    }
    for d in 1..=depth {
        if cache[d].is_none() {
            let below = Arc::clone(cache[d - 1].as_ref().expect("lower level built"));
            cache[d] = Some(TreeNode::branch(&StandardBackend, Arc::clone(&below), below));
        }
    }
    Arc::clone(cache[depth].as_ref().expect("level just built"))
}

fn leaf_from(data: &[u8]) -> Arc<TreeNode> {
    let mut chunk = [0u8; 32];
    let len = data.len().min(32);
    chunk[..len].copy_from_slice(&data[..len]);
    TreeNode::leaf(chunk)
}

fn build_subtree(backend: &dyn Sha256Backend, data: &[u8], depth: usize) -> Arc<TreeNode> {
    if data.is_empty() {
        return zero_tree(depth);
    }
    if depth == 0 {
        return leaf_from(data);
    }
    let half = BYTES_PER_CHUNK << (depth - 1);
    let (left_data, right_data) = if data.len() <= half {
        (data, &[][..])
    } else {
        data.split_at(half)
    };
    let left = build_subtree(backend, left_data, depth - 1);
    let right = build_subtree(backend, right_data, depth - 1);
    TreeNode::branch(backend, left, right)
}

/// Build the Merkle tree over a packed chunk sequence, padded to `limit`
/// chunks. Mirrors [`crate::merkleize_chunks`] exactly, including the
/// `limit == 0` and single-chunk special cases.
pub fn tree_from_chunks(
    backend: &dyn Sha256Backend,
    data: &[u8],
    limit: u64,
) -> Result<Arc<TreeNode>, HasherError> {
    let chunk_count = data.len().div_ceil(BYTES_PER_CHUNK) as u64;
    let limit = if limit == 0 { chunk_count } else { limit };
    if chunk_count > limit {
        return Err(HasherError::TooManyChunks {
            chunks: chunk_count,
            limit,
        });
    }
    if limit == 0 {
        return Ok(TreeNode::leaf([0u8; 32]));
    }
    if limit == 1 {
        return Ok(leaf_from(data));
    }
    Ok(build_subtree(backend, data, depth_for_limit(limit)))
}

/// Build the progressive Merkle tree over a packed chunk sequence. Mirrors
/// [`crate::merkleize_progressive`].
pub fn tree_from_chunks_progressive(
    backend: &dyn Sha256Backend,
    data: &[u8],
    base: u64,
) -> Result<Arc<TreeNode>, HasherError> {
    if data.is_empty() {
        return Ok(TreeNode::leaf([0u8; 32]));
    }
    let split = (base as usize)
        .saturating_mul(BYTES_PER_CHUNK)
        .min(data.len());
    let (right_data, rest) = data.split_at(split);
    let right = tree_from_chunks(backend, right_data, base)?;
    let left = tree_from_chunks_progressive(backend, rest, base * 4)?;
    Ok(TreeNode::branch(backend, left, right))
}

fn build_node_subtree(
    backend: &dyn Sha256Backend,
    nodes: &[Arc<TreeNode>],
    depth: usize,
) -> Arc<TreeNode> {
    if nodes.is_empty() {
        return zero_tree(depth);
    }
    if depth == 0 {
        return Arc::clone(&nodes[0]);
    }
    let half = 1usize << (depth - 1);
    let (left_nodes, right_nodes) = if nodes.len() <= half {
        (nodes, &[][..])
    } else {
        nodes.split_at(half)
    };
    let left = build_node_subtree(backend, left_nodes, depth - 1);
    let right = build_node_subtree(backend, right_nodes, depth - 1);
    TreeNode::branch(backend, left, right)
}

/// Build the Merkle tree over precomputed subtree nodes (one per composite
/// element or container field), padded to `limit` leaves.
pub fn tree_from_nodes(
    backend: &dyn Sha256Backend,
    nodes: &[Arc<TreeNode>],
    limit: u64,
) -> Result<Arc<TreeNode>, HasherError> {
    let count = nodes.len() as u64;
    let limit = if limit == 0 { count } else { limit };
    if count > limit {
        return Err(HasherError::TooManyChunks {
            chunks: count,
            limit,
        });
    }
    if limit == 0 {
        return Ok(TreeNode::leaf([0u8; 32]));
    }
    if limit == 1 {
        return Ok(nodes
            .first()
            .map(Arc::clone)
            .unwrap_or_else(|| TreeNode::leaf([0u8; 32])));
    }
    Ok(build_node_subtree(backend, nodes, depth_for_limit(limit)))
}

/// Build the progressive Merkle tree over precomputed subtree nodes. Mirrors
/// [`crate::merkleize_progressive`] with one leaf per node.
pub fn tree_from_nodes_progressive(
    backend: &dyn Sha256Backend,
    nodes: &[Arc<TreeNode>],
    base: u64,
) -> Result<Arc<TreeNode>, HasherError> {
    if nodes.is_empty() {
        return Ok(TreeNode::leaf([0u8; 32]));
    }
    let split = (base as usize).min(nodes.len());
    let (right_nodes, rest) = nodes.split_at(split);
    let right = tree_from_nodes(backend, right_nodes, base)?;
    let left = tree_from_nodes_progressive(backend, rest, base * 4)?;
    Ok(TreeNode::branch(backend, left, right))
}

/// Mix a list length over a content tree: `branch(content, leaf(length))`.
pub fn mix_in_length_node(
    backend: &dyn Sha256Backend,
    content: Arc<TreeNode>,
    length: u64,
) -> Arc<TreeNode> {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&length.to_le_bytes());
    TreeNode::branch(backend, content, TreeNode::leaf(chunk))
}

/// Mix an auxiliary chunk over a content tree: `branch(content, leaf(aux))`.
pub fn mix_in_aux_node(
    backend: &dyn Sha256Backend,
    content: Arc<TreeNode>,
    aux: [u8; 32],
) -> Arc<TreeNode> {
    TreeNode::branch(backend, content, TreeNode::leaf(aux))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{merkleize_chunks, merkleize_progressive, zero_hash};

    fn packed(chunks: &[[u8; 32]]) -> Vec<u8> {
        chunks.iter().flat_map(|c| c.iter().copied()).collect()
    }

    fn chunk(data: &[u8]) -> [u8; 32] {
        let mut c = [0u8; 32];
        c[..data.len()].copy_from_slice(data);
        c
    }

    #[test]
    fn tree_root_matches_merkleize() {
        let chunks: Vec<[u8; 32]> = (0u8..5).map(|i| chunk(&[i + 1])).collect();
        let data = packed(&chunks);
        for limit in [0u64, 8, 16] {
            let tree = tree_from_chunks(&StandardBackend, &data, limit).unwrap();
            let root = merkleize_chunks(&StandardBackend, &data, limit).unwrap();
            assert_eq!(tree.hash().into_inner(), root, "limit {limit}");
        }
    }

    #[test]
    fn progressive_tree_root_matches_merkleize() {
        let chunks: Vec<[u8; 32]> = (0u8..7).map(|i| chunk(&[i + 1])).collect();
        let data = packed(&chunks);
        let tree = tree_from_chunks_progressive(&StandardBackend, &data, 1).unwrap();
        let root = merkleize_progressive(&StandardBackend, &data, 1).unwrap();
        assert_eq!(tree.hash().into_inner(), root);
    }

    #[test]
    fn zero_subtrees_match_zero_hashes() {
        for depth in 0..6 {
            assert_eq!(zero_tree(depth).hash().into_inner(), zero_hash(depth));
        }
    }

    #[test]
    fn gindex_navigation() {
        let chunks: Vec<[u8; 32]> = (0u8..4).map(|i| chunk(&[i + 1])).collect();
        let data = packed(&chunks);
        let tree = tree_from_chunks(&StandardBackend, &data, 4).unwrap();
        // Leaves of a depth-2 tree live at gindices 4..8.
        for (i, c) in chunks.iter().enumerate() {
            let node = tree.get(4 + i as u64).unwrap();
            assert!(node.is_leaf());
            assert_eq!(node.hash().into_inner(), *c);
        }
        assert_eq!(tree.get(1).unwrap().hash(), tree.hash());
        assert!(tree.get(16).is_none());
    }

    #[test]
    fn proof_verifies() {
        let chunks: Vec<[u8; 32]> = (0u8..4).map(|i| chunk(&[i + 1])).collect();
        let data = packed(&chunks);
        let tree = tree_from_chunks(&StandardBackend, &data, 4).unwrap();

        let gindex = 5u64; // second leaf
        let proof = tree.proof(gindex).unwrap();
        let mut acc = chunks[1];
        let mut index = gindex;
        for witness in &proof {
            acc = if index % 2 == 0 {
                StandardBackend.hash32_concat(&acc, witness.as_slice())
            } else {
                StandardBackend.hash32_concat(witness.as_slice(), &acc)
            };
            index /= 2;
        }
        assert_eq!(acc, tree.hash().into_inner());
    }

    #[test]
    fn node_tree_matches_chunk_tree() {
        let chunks: Vec<[u8; 32]> = (0u8..5).map(|i| chunk(&[i + 1])).collect();
        let data = packed(&chunks);
        let nodes: Vec<_> = chunks.iter().map(|c| TreeNode::leaf(*c)).collect();
        for limit in [0u64, 8] {
            let from_nodes = tree_from_nodes(&StandardBackend, &nodes, limit).unwrap();
            let from_chunks = tree_from_chunks(&StandardBackend, &data, limit).unwrap();
            assert_eq!(from_nodes.hash(), from_chunks.hash(), "limit {limit}");
        }
        let prog_nodes = tree_from_nodes_progressive(&StandardBackend, &nodes, 1).unwrap();
        let prog_chunks = tree_from_chunks_progressive(&StandardBackend, &data, 1).unwrap();
        assert_eq!(prog_nodes.hash(), prog_chunks.hash());
    }

    #[test]
    fn length_mixin_node() {
        let content = TreeNode::leaf(chunk(&[0xaa]));
        let node = mix_in_length_node(&StandardBackend, content, 3);
        let expect = crate::mix_in_length(&StandardBackend, &chunk(&[0xaa]), 3);
        assert_eq!(node.hash().into_inner(), expect);
    }
}
