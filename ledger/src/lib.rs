//! Acceptor for anonymous MACI proofs.
//!
//! The [`Ledger`] holds the registration accumulator, the current state
//! root, the [`NullifierSet`], and one sequence counter and [`MessageLog`]
//! per message stream.
//! Every submission is checked against that state and its proof verified
//! through a [`ProofBackend`] before anything is applied.

pub mod accumulator;
pub mod backend;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod log;
pub mod nullifier;

#[cfg(test)]
mod tests;

pub use anon_maci_circuits::{Fr, HashBytes};

pub use accumulator::{AmortizedIncrementalMerkleTree, RegistrationTree};
pub use backend::{Groth16Backend, ProofBackend};
pub use error::{BackendError, LedgerError};
pub use keys::{ProofData, VerifyKey, VerifyingKeys};
pub use ledger::{
    CredentialBytes,
    DeactivationSubmission,
    KeySubmission,
    Ledger,
    LedgerEvent,
    LedgerState,
    MessageSubmission,
    Phase
};
pub use log::MessageLog;
pub use nullifier::NullifierSet;
