//! Per-voter state: leaves, the sparse Merkle tree committing to them, and
//! the constrained Merkle path used to open and rewrite a leaf.

mod leaf;
mod tree;
mod zeroes;

pub use leaf::{transition_allowed, transition_allowed_var, LeafStatus, StateLeaf, StateLeafVar, TRANSITIONS};
pub use tree::{MerklePathVar, MerkleProof, MerkleTreeError, StateTree};
pub use zeroes::get_merkle_zeroes;
