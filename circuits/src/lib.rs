//! Constraint core of an anonymous MACI deployment.
//!
//! Three circuits are defined here: key registration and rotation
//! ([`AddNewKeyCircuit`]), batch message processing
//! ([`ProcessMessagesCircuit`]) and key deactivation
//! ([`ProcessDeactivateCircuit`]). Each has a native processor which builds
//! the witness and reports violations as [`CircuitError`], and a
//! [`ConstraintSynthesizer`](ark_relations::r1cs::ConstraintSynthesizer)
//! which makes any forged witness unsatisfiable.

pub mod config;
pub mod curve;
pub mod error;
pub mod hash;
pub mod message;
pub mod nullifier;
pub mod process;
pub mod registry;
pub mod state;
pub mod validator;


/// The BN254 scalar field every constraint is expressed over.
pub type Fr = ark_bn254::Fr;

/// A big-endian field element encoding.
pub type HashBytes = [u8; 32];

pub use config::ProtocolConfig;
pub use curve::{Point, PointVar};
pub use error::CircuitError;
pub use message::{Message, MessageKind, PAYLOAD_LEN};
pub use process::{
    Batch,
    BatchStatus,
    DeactivationBatch,
    DeactivationProcessor,
    MessageBatchProcessor,
    ProcessDeactivateCircuit,
    ProcessMessagesCircuit
};
pub use registry::{AddNewKeyCircuit, AddNewKeyRequest, EncryptedCredential, KeyRegistry, Registration};
pub use state::{LeafStatus, MerkleProof, MerkleTreeError, StateLeaf, StateTree};

use ark_ff::{BigInteger, PrimeField};

/// Encodes a field element as 32 big-endian bytes.
pub fn fr_to_bytes(value: &Fr) -> HashBytes
{
    let bytes = value.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Decodes 32 big-endian bytes, rejecting encodings at or above the modulus.
pub fn fr_from_bytes(bytes: &HashBytes) -> Option<Fr>
{
    let value = Fr::from_be_bytes_mod_order(bytes);
    (fr_to_bytes(&value) == *bytes).then_some(value)
}

/// Reads a field element as a `u64`, if it fits.
pub fn fr_to_u64(value: &Fr) -> Option<u64>
{
    let bigint = value.into_bigint();
    if bigint.num_bits() > 64 { return None; }
    Some(bigint.as_ref()[0])
}
