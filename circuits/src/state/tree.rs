use core::borrow::Borrow;
use std::collections::BTreeMap;

use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{Namespace, SynthesisError};
use thiserror::Error;

use crate::config::MAX_STATE_TREE_DEPTH;
use crate::hash::{poseidon_hash, PoseidonError, PoseidonGadget};
use crate::state::{get_merkle_zeroes, StateLeaf};
use crate::Fr;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleTreeError
{
    /// The tree is full and cannot be inserted.
    #[error("tree is full")]
    TreeAlreadyFull,

    /// The tree has already been merged.
    #[error("tree has already been merged")]
    TreeAlreadyMerged,

    /// The hash function did not succeed.
    #[error("hash function failed")]
    HashFailed,

    /// The merge operation failed.
    #[error("merge failed")]
    MergeFailed,

    #[error("leaf index {0} is out of range")]
    LeafIndexOutOfRange(u64),

    #[error("unsupported tree depth {0}")]
    InvalidDepth(u8),
}

impl From<PoseidonError> for MerkleTreeError
{
    fn from(_: PoseidonError) -> Self
    {
        MerkleTreeError::HashFailed
    }
}

/// A binary sparse Merkle tree of fixed depth over [`StateLeaf`] hashes.
///
/// Only nodes on paths to occupied leaves are stored; every other node is
/// the matching empty-subtree root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateTree
{
    depth: u8,

    /// `(level, index)` to node hash, leaves at level 0.
    nodes: BTreeMap<(u8, u64), Fr>,

    zeroes: Vec<Fr>,

    leaves: Vec<StateLeaf>,
}

impl StateTree
{
    pub fn new(depth: u8) -> Result<Self, MerkleTreeError>
    {
        if depth == 0 || depth > MAX_STATE_TREE_DEPTH { Err(MerkleTreeError::InvalidDepth(depth))? }

        Ok(StateTree {
            depth,
            nodes: BTreeMap::new(),
            zeroes: get_merkle_zeroes(depth)?,
            leaves: Vec::new(),
        })
    }

    pub fn depth(&self) -> u8
    {
        self.depth
    }

    pub fn capacity(&self) -> u64
    {
        1u64 << self.depth
    }

    pub fn len(&self) -> usize
    {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.leaves.is_empty()
    }

    pub fn root(&self) -> Fr
    {
        self.node(self.depth, 0)
    }

    pub fn leaf(&self, index: u64) -> Option<&StateLeaf>
    {
        self.leaves.get(usize::try_from(index).ok()?)
    }

    pub fn leaves(&self) -> &[StateLeaf]
    {
        &self.leaves
    }

    /// Appends a leaf at the next free index and returns that index.
    pub fn insert(&mut self, leaf: StateLeaf) -> Result<u64, MerkleTreeError>
    {
        let index = self.leaves.len() as u64;
        if index >= self.capacity() { Err(MerkleTreeError::TreeAlreadyFull)? }

        self.write(index, leaf.hash()?)?;
        self.leaves.push(leaf);
        Ok(index)
    }

    /// Replaces an occupied leaf.
    pub fn update(&mut self, index: u64, leaf: StateLeaf) -> Result<(), MerkleTreeError>
    {
        let Some(slot) = usize::try_from(index).ok().filter(|&i| i < self.leaves.len())
        else { Err(MerkleTreeError::LeafIndexOutOfRange(index))? };

        self.write(index, leaf.hash()?)?;
        self.leaves[slot] = leaf;
        Ok(())
    }

    /// The authentication path of any position in the tree, occupied or not.
    pub fn proof(&self, index: u64) -> Result<MerkleProof, MerkleTreeError>
    {
        if index >= self.capacity() { Err(MerkleTreeError::LeafIndexOutOfRange(index))? }

        let siblings = (0..self.depth)
            .map(|level| self.node(level, (index >> level) ^ 1))
            .collect();

        Ok(MerkleProof { leaf_index: index, siblings })
    }

    fn node(&self, level: u8, index: u64) -> Fr
    {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or(self.zeroes[usize::from(level)])
    }

    fn write(&mut self, index: u64, leaf_hash: Fr) -> Result<(), MerkleTreeError>
    {
        let mut position = index;
        let mut current = leaf_hash;
        self.nodes.insert((0, position), current);

        for level in 0..self.depth
        {
            let sibling = self.node(level, position ^ 1);
            current = if position & 1 == 0
            {
                poseidon_hash(&[current, sibling])?
            }
            else
            {
                poseidon_hash(&[sibling, current])?
            };
            position >>= 1;
            self.nodes.insert((level + 1, position), current);
        }

        Ok(())
    }
}

/// Siblings from the leaf level upwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleProof
{
    pub leaf_index: u64,
    pub siblings: Vec<Fr>,
}

impl MerkleProof
{
    /// A path of the right length for blank circuit slots.
    pub fn empty(depth: u8) -> Self
    {
        MerkleProof {
            leaf_index: 0,
            siblings: vec![Fr::from(0u64); usize::from(depth)],
        }
    }

    pub fn compute_root(&self, leaf_hash: Fr) -> Result<Fr, PoseidonError>
    {
        let mut current = leaf_hash;
        for (level, sibling) in self.siblings.iter().enumerate()
        {
            current = if (self.leaf_index >> level) & 1 == 0
            {
                poseidon_hash(&[current, *sibling])?
            }
            else
            {
                poseidon_hash(&[*sibling, current])?
            };
        }
        Ok(current)
    }

    pub fn verify(&self, root: &Fr, leaf_hash: Fr) -> bool
    {
        self.compute_root(leaf_hash).map_or(false, |computed| computed == *root)
    }
}

/// A Merkle path in the constraint system. The index is carried as bits,
/// so it is bounded by the depth without a separate range check.
#[derive(Clone, Debug)]
pub struct MerklePathVar
{
    pub index_bits: Vec<Boolean<Fr>>,
    pub siblings: Vec<FpVar<Fr>>,
}

impl MerklePathVar
{
    /// The leaf index as a field element.
    pub fn index(&self) -> FpVar<Fr>
    {
        let mut index = FpVar::zero();
        let mut coeff = Fr::from(1u64);
        for bit in &self.index_bits
        {
            index += FpVar::from(bit.clone()) * coeff;
            coeff += coeff;
        }
        index
    }

    pub fn compute_root(
        &self,
        leaf_hash: &FpVar<Fr>,
        hasher: &PoseidonGadget,
    ) -> Result<FpVar<Fr>, SynthesisError>
    {
        let mut current = leaf_hash.clone();
        for (is_right, sibling) in self.index_bits.iter().zip(&self.siblings)
        {
            let left = is_right.select(sibling, &current)?;
            let right = is_right.select(&current, sibling)?;
            current = hasher.hash(&[left, right])?;
        }
        Ok(current)
    }
}

/// The path length is taken from the value, so the value must be available
/// in setup mode as well.
impl AllocVar<MerkleProof, Fr> for MerklePathVar
{
    fn new_variable<T: Borrow<MerkleProof>>(
        cs: impl Into<Namespace<Fr>>,
        f: impl FnOnce() -> Result<T, SynthesisError>,
        mode: AllocationMode,
    ) -> Result<Self, SynthesisError>
    {
        let ns = cs.into();
        let cs = ns.cs();
        let value = f()?;
        let proof = value.borrow();

        let index_bits = (0..proof.siblings.len())
            .map(|level| Boolean::new_variable(cs.clone(), || Ok((proof.leaf_index >> level) & 1 == 1), mode))
            .collect::<Result<Vec<_>, _>>()?;
        let siblings = proof
            .siblings
            .iter()
            .map(|sibling| FpVar::new_variable(cs.clone(), || Ok(*sibling), mode))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MerklePathVar { index_bits, siblings })
    }
}
