//! Batch processors. Each folds a fixed-capacity batch into the state tree,
//! producing the new root together with a circuit whose public inputs
//! commit to the transition.

mod deactivate;
mod messages;

pub use deactivate::{DeactivationBatch, DeactivationProcessor, DeactivationSlot, ProcessDeactivateCircuit};
pub use messages::{Batch, MessageBatchProcessor, MessageSlot, ProcessMessagesCircuit};

use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem};

use crate::error::CircuitError;
use crate::Fr;

/// `Pending → Verified | Rejected`. Only a verified batch carries a root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum BatchStatus
{
    #[default]
    Pending,

    Verified { old_root: Fr, new_root: Fr },

    Rejected(CircuitError),
}

impl BatchStatus
{
    pub fn is_verified(&self) -> bool
    {
        matches!(self, BatchStatus::Verified { .. })
    }

    pub fn new_root(&self) -> Option<Fr>
    {
        match self
        {
            BatchStatus::Verified { new_root, .. } => Some(*new_root),
            _ => None,
        }
    }
}

/// Synthesizes `circuit` against its own witness and reports the first
/// unsatisfied constraint, if any.
pub fn check_constraints<C: ConstraintSynthesizer<Fr>>(circuit: C) -> Result<(), CircuitError>
{
    let cs = ConstraintSystem::<Fr>::new_ref();
    circuit.generate_constraints(cs.clone())?;
    if !cs.is_satisfied()?
    {
        let location = cs.which_is_unsatisfied()?.unwrap_or_default();
        Err(CircuitError::Unsatisfied(location))?
    }
    Ok(())
}
