use ark_relations::r1cs::SynthesisError;
use light_poseidon::PoseidonError;
use thiserror::Error;

use crate::state::{LeafStatus, MerkleTreeError};
use crate::{fr_to_u64, Fr};

/// Reasons a registration or batch is rejected.
///
/// Native processors return these while building a witness; the matching
/// constraints independently make a forged witness unsatisfiable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitError
{
    /// A key fails the curve or subgroup check.
    #[error("invalid point for {0}")]
    InvalidPoint(&'static str),

    /// The re-randomization scalar fails its range or threshold check.
    #[error("re-randomization scalar is out of range or below the threshold")]
    WeakRandomness,

    /// The batch is empty, over capacity, or does not fill the fixed slot count.
    #[error("batch size {size} violates capacity {capacity}")]
    BatchSizeViolation { size: usize, capacity: usize },

    /// A padding slot is not the canonical all-zero entry.
    #[error("padding slot {slot} is not canonical")]
    MalformedPadding { slot: usize },

    /// A deactivation request is not in the allowed transition table.
    #[error("illegal transition {from:?} -> {to} in slot {slot}")]
    IllegalTransition { slot: usize, from: LeafStatus, to: String },

    /// A nullifier appears twice.
    #[error("duplicate nullifier")]
    DuplicateNullifier,

    /// A vote spends more credits than the leaf holds.
    #[error("insufficient credits in slot {slot}")]
    InsufficientCredits { slot: usize },

    /// A message targets a deactivated leaf.
    #[error("slot {slot} targets a deactivated leaf")]
    DeactivatedLeaf { slot: usize },

    /// A message is out of order.
    #[error("slot {slot} has sequence {found}, expected {expected}")]
    SequenceViolation { slot: usize, expected: u64, found: u64 },

    /// A message targets a leaf which has not been registered.
    #[error("slot {slot} targets unknown leaf {index}")]
    UnknownLeaf { slot: usize, index: String },

    /// A deactivation names a key other than the leaf's current key.
    #[error("slot {slot} key does not match the target leaf")]
    KeyMismatch { slot: usize },

    /// A vote or key change with a non-zero payload tail.
    #[error("slot {slot} carries a malformed payload")]
    MalformedMessage { slot: usize },

    /// A message kind the processor does not handle.
    #[error("slot {slot} carries an unsupported message kind")]
    UnsupportedMessage { slot: usize },

    #[error("merkle tree error: {0}")]
    Merkle(#[from] MerkleTreeError),

    #[error("poseidon hash failed: {0}")]
    Hash(String),

    #[error("constraint synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    /// The witness does not satisfy the constraint system.
    #[error("constraint system is unsatisfied at {0}")]
    Unsatisfied(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<PoseidonError> for CircuitError
{
    fn from(error: PoseidonError) -> Self
    {
        CircuitError::Hash(error.to_string())
    }
}

/// Renders a field element for an error message, as an integer when small.
pub(crate) fn describe(value: &Fr) -> String
{
    fr_to_u64(value).map_or_else(|| value.to_string(), |v| v.to_string())
}
