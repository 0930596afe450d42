use core::borrow::Borrow;

use ark_ff::{One, Zero};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{Namespace, SynthesisError};
use serde::{Deserialize, Serialize};

use crate::curve::{Point, PointVar};
use crate::hash::{poseidon_hash, PoseidonError, PoseidonGadget};
use crate::{fr_to_u64, Fr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeafStatus
{
    Active = 0,
    Deactivated = 1,
}

impl LeafStatus
{
    pub fn from_flag(deactivated: bool) -> Self
    {
        if deactivated { LeafStatus::Deactivated } else { LeafStatus::Active }
    }

    pub fn is_deactivated(&self) -> bool
    {
        *self == LeafStatus::Deactivated
    }

    pub fn as_fr(&self) -> Fr
    {
        Fr::from(*self as u64)
    }

    /// Decodes a requested status; anything but `0` or `1` is `None`.
    pub fn from_fr(value: &Fr) -> Option<Self>
    {
        match fr_to_u64(value)?
        {
            0 => Some(LeafStatus::Active),
            1 => Some(LeafStatus::Deactivated),
            _ => None,
        }
    }
}

/// `(current, requested, allowed)`. Pairs absent from the table are denied.
pub const TRANSITIONS: [(LeafStatus, LeafStatus, bool); 4] = [
    (LeafStatus::Active, LeafStatus::Deactivated, true),
    (LeafStatus::Deactivated, LeafStatus::Deactivated, true),
    (LeafStatus::Deactivated, LeafStatus::Active, false),
    (LeafStatus::Active, LeafStatus::Active, false),
];

pub fn transition_allowed(current: LeafStatus, requested: &Fr) -> bool
{
    let Some(requested) = LeafStatus::from_fr(requested) else { return false };
    TRANSITIONS
        .iter()
        .any(|&(from, to, allowed)| allowed && from == current && to == requested)
}

/// Constrained lookup in [`TRANSITIONS`]: true iff some allowed row matches
/// both the current flag and the requested status exactly.
pub fn transition_allowed_var(
    deactivated: &Boolean<Fr>,
    requested: &FpVar<Fr>,
) -> Result<Boolean<Fr>, SynthesisError>
{
    let mut rows = Vec::new();
    for (from, to, allowed) in TRANSITIONS
    {
        if !allowed { continue; }
        let from_matches = deactivated.is_eq(&Boolean::constant(from.is_deactivated()))?;
        let to_matches = requested.is_eq(&FpVar::constant(to.as_fr()))?;
        rows.push(from_matches.and(&to_matches)?);
    }
    if rows.is_empty() { return Ok(Boolean::FALSE); }
    Boolean::kary_or(&rows)
}

/// A voter's entry in the state tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLeaf
{
    /// The key currently authorised to act for this leaf.
    pub public_key: Point,

    /// Credits left to spend on votes.
    pub credit_balance: u64,

    /// Set once by a deactivation and never cleared.
    pub deactivated: bool,

    /// Sequence number of the last message applied to this leaf.
    pub last_update_seq: u64,
}

impl StateLeaf
{
    pub fn new(public_key: Point, credit_balance: u64) -> Self
    {
        StateLeaf {
            public_key,
            credit_balance,
            deactivated: false,
            last_update_seq: 0,
        }
    }

    pub fn status(&self) -> LeafStatus
    {
        LeafStatus::from_flag(self.deactivated)
    }

    /// `Poseidon(x, y, creditBalance, deactivated, lastUpdateSeq)`.
    pub fn hash(&self) -> Result<Fr, PoseidonError>
    {
        poseidon_hash(&[
            self.public_key.x,
            self.public_key.y,
            Fr::from(self.credit_balance),
            if self.deactivated { Fr::one() } else { Fr::zero() },
            Fr::from(self.last_update_seq),
        ])
    }
}

#[derive(Clone, Debug)]
pub struct StateLeafVar
{
    pub public_key: PointVar,
    pub credit_balance: FpVar<Fr>,
    pub deactivated: Boolean<Fr>,
    pub last_update_seq: FpVar<Fr>,
}

impl StateLeafVar
{
    pub fn hash(&self, hasher: &PoseidonGadget) -> Result<FpVar<Fr>, SynthesisError>
    {
        hasher.hash(&[
            self.public_key.x.clone(),
            self.public_key.y.clone(),
            self.credit_balance.clone(),
            FpVar::from(self.deactivated.clone()),
            self.last_update_seq.clone(),
        ])
    }
}

impl AllocVar<StateLeaf, Fr> for StateLeafVar
{
    fn new_variable<T: Borrow<StateLeaf>>(
        cs: impl Into<Namespace<Fr>>,
        f: impl FnOnce() -> Result<T, SynthesisError>,
        mode: AllocationMode,
    ) -> Result<Self, SynthesisError>
    {
        let ns = cs.into();
        let cs = ns.cs();
        let leaf = f().map(|l| *l.borrow());

        Ok(StateLeafVar {
            public_key: PointVar::new_variable(cs.clone(), || leaf.map(|l| l.public_key), mode)?,
            credit_balance: FpVar::new_variable(cs.clone(), || leaf.map(|l| Fr::from(l.credit_balance)), mode)?,
            deactivated: Boolean::new_variable(cs.clone(), || leaf.map(|l| l.deactivated), mode)?,
            last_update_seq: FpVar::new_variable(cs, || leaf.map(|l| Fr::from(l.last_update_seq)), mode)?,
        })
    }
}
