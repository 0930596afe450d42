use anon_maci_circuits::{CircuitError, MerkleTreeError, MessageKind};
use ark_relations::r1cs::SynthesisError;
use ark_serialize::SerializationError;
use thiserror::Error;

/// Reasons a submission is refused. A refused submission leaves the ledger
/// untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError
{
    /// The nullifier has already been consumed, or repeats within a batch.
    #[error("duplicate nullifier")]
    DuplicateNullifier,

    /// The proof was built against a root other than the current one.
    #[error("stale root: proof is against {found}, ledger is at {expected}")]
    StaleRoot { expected: String, found: String },

    /// The batch does not start at the next expected sequence number.
    #[error("sequence mismatch: expected {expected}, found {found}")]
    SequenceMismatch { expected: u64, found: u64 },

    /// The proof does not verify against its public inputs.
    #[error("invalid proof")]
    InvalidProof,

    /// The proof was made for another coordinator's key.
    #[error("coordinator key mismatch")]
    CoordinatorKeyMismatch,

    /// Registrations have been merged; no more keys may be added.
    #[error("registration is closed")]
    RegistrationClosed,

    /// Batches cannot be accepted before registrations are merged.
    #[error("registrations have not been merged")]
    RegistrationsNotMerged,

    /// The batch commits to messages other than the ones published for its
    /// sequence range.
    #[error("message chain mismatch: proof commits to {found}, published messages give {expected}")]
    ChainMismatch { expected: String, found: String },

    /// The batch covers sequence numbers nobody has published yet.
    #[error("{published} messages published, batch needs {required}")]
    MessagesNotPublished { published: u64, required: u64 },

    /// The message kind belongs to the other stream.
    #[error("{0:?} message published on the wrong stream")]
    WrongStream(MessageKind),

    /// A message with an all-zero payload reads as padding.
    #[error("message payload is empty")]
    EmptyMessage,

    #[error("merkle tree error: {0}")]
    Merkle(#[from] MerkleTreeError),

    #[error("proof backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Circuit(#[from] CircuitError),
}

impl From<codec::Error> for LedgerError
{
    fn from(error: codec::Error) -> Self
    {
        LedgerError::Serialization(error.to_string())
    }
}

impl From<serde_json::Error> for LedgerError
{
    fn from(error: serde_json::Error) -> Self
    {
        LedgerError::Serialization(error.to_string())
    }
}

impl From<SerializationError> for LedgerError
{
    fn from(error: SerializationError) -> Self
    {
        LedgerError::Serialization(error.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError
{
    #[error("constraint synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Key material could not be encoded or decoded.
    #[error("malformed key material: {0}")]
    MalformedKey(String),
}

impl From<SerializationError> for BackendError
{
    fn from(error: SerializationError) -> Self
    {
        BackendError::MalformedKey(error.to_string())
    }
}
