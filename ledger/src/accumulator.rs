use anon_maci_circuits::hash::{poseidon_hash, PoseidonError};
use anon_maci_circuits::state::get_merkle_zeroes;
use anon_maci_circuits::{fr_from_bytes, fr_to_bytes, HashBytes, MerkleTreeError};
use codec::{Decode, Encode};

/// The binary accumulator of registration leaves.
///
/// Leaves are hashed into full subtrees as soon as possible, so each
/// insertion does amortized constant work and only the frontier is stored.
#[derive(Clone, Debug, Encode, Decode, Eq, PartialEq)]
pub struct RegistrationTree
{
    /// The true depth of the tree (i.e., consisting of non-zero leaves).
    pub depth: u8,

    /// The maximal depth of the tree.
    pub full_depth: u8,

    /// The number of non-nil leaves.
    pub count: u32,

    /// The (depth, hash) pairs of the incrementally merged subtrees.
    pub hashes: Vec<(u8, HashBytes)>,

    /// The root of the tree of maximal depth which contains the
    /// leaves of `hashes` and zeros elsewhere.
    pub root: Option<HashBytes>,
}

pub trait AmortizedIncrementalMerkleTree: Sized
{
    /// The error type for the hash function.
    type HashError;

    /// Create a new tree.
    fn new(full_depth: u8) -> Self;

    /// Inserts a new leaf into the tree.
    fn insert(self, leaf: HashBytes) -> Result<Self, MerkleTreeError>;

    /// Compute the root of the tree of full depth.
    fn merge(self) -> Result<Self, MerkleTreeError>;

    /// Hash function used to compute roots.
    fn hash(left: &HashBytes, right: &HashBytes) -> Result<HashBytes, Self::HashError>;
}

impl AmortizedIncrementalMerkleTree for RegistrationTree
{
    type HashError = PoseidonError;

    fn new(full_depth: u8) -> RegistrationTree
    {
        RegistrationTree {
            full_depth,
            depth: 0,
            count: 0,
            hashes: Vec::new(),
            root: None,
        }
    }

    /// Consumes a new leaf and produces the resultant partially merged merkle tree.
    ///
    /// -`leaf`: A new right-most leaf to insert into the tree.
    ///
    fn insert(mut self, leaf: HashBytes) -> Result<Self, MerkleTreeError>
    {
        // Ensure that the tree is not full (or merged).
        if self.root.is_some() { Err(MerkleTreeError::TreeAlreadyFull)? }

        self.count += 1;
        self.hashes.push((0, leaf));

        // Combine the two right-most nodes while they root subtrees of equal depth.
        while let [.., (left_depth, left), (right_depth, right)] = self.hashes[..]
        {
            if left_depth != right_depth { break; }

            let Ok(hash) = Self::hash(&left, &right) else { Err(MerkleTreeError::HashFailed)? };

            self.hashes.truncate(self.hashes.len() - 2);
            self.hashes.push((left_depth + 1, hash));

            if self.depth < left_depth + 1 { self.depth = left_depth + 1; }
        }

        // If tree is full update the `root` property.
        if let [(depth, hash)] = self.hashes[..]
        {
            if depth == self.full_depth
            {
                self.root = Some(hash);
                self.hashes.clear();
            }
        }

        Ok(self)
    }

    /// Obtain the root of the tree, wherein the remaining leaves take on zero values.
    fn merge(mut self) -> Result<Self, MerkleTreeError>
    {
        // Ensure the tree is not already merged.
        if self.root.is_some() { Err(MerkleTreeError::TreeAlreadyMerged)? }

        let Ok(zeroes) = get_merkle_zeroes(self.full_depth) else { Err(MerkleTreeError::HashFailed)? };

        // An empty tree is all zeroes.
        if self.hashes.is_empty()
        {
            self.root = Some(fr_to_bytes(&zeroes[usize::from(self.full_depth)]));
            return Ok(self);
        }

        loop
        {
            let Some(&(depth, hash)) = self.hashes.last() else { Err(MerkleTreeError::MergeFailed)? };

            if self.hashes.len() == 1 && depth == self.full_depth { break; }
            if depth >= self.full_depth { Err(MerkleTreeError::MergeFailed)? }

            // A right-most subtree is combined with its left sibling if one of
            // equal depth exists, and with an empty subtree otherwise.
            let size = self.hashes.len();
            let (left, right, consumed) = match self.hashes[..]
            {
                [.., (left_depth, left), _] if left_depth == depth => (left, hash, 2),
                _ => (hash, fr_to_bytes(&zeroes[usize::from(depth)]), 1),
            };

            let Ok(parent) = Self::hash(&left, &right) else { Err(MerkleTreeError::HashFailed)? };
            self.hashes.truncate(size - consumed);
            self.hashes.push((depth + 1, parent));
        }

        self.root = Some(self.hashes[0].1);
        self.hashes.clear();
        self.depth = self.full_depth;

        Ok(self)
    }

    /// Poseidon hash function with circom domain tag.
    fn hash(left: &HashBytes, right: &HashBytes) -> Result<HashBytes, Self::HashError>
    {
        let decode = |bytes: &HashBytes| fr_from_bytes(bytes).ok_or(PoseidonError::InputLargerThanModulus);
        Ok(fr_to_bytes(&poseidon_hash(&[decode(left)?, decode(right)?])?))
    }
}
