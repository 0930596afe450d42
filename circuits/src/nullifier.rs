//! Nullifiers: `Poseidon(domainTag, x, y, counter)`, one tag per action kind
//! so a registration and a deactivation of the same key never collide.

use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;

use crate::curve::{Point, PointVar};
use crate::hash::{poseidon_hash, PoseidonError, PoseidonGadget};
use crate::Fr;

/// ASCII `register`.
pub const REGISTRATION_TAG: u64 = 0x7265_6769_7374_6572;

/// ASCII `deactiva`.
pub const DEACTIVATION_TAG: u64 = 0x6465_6163_7469_7661;

pub fn nullifier(tag: u64, key: &Point, counter: Fr) -> Result<Fr, PoseidonError>
{
    poseidon_hash(&[Fr::from(tag), key.x, key.y, counter])
}

pub fn registration_nullifier(key: &Point, action_counter: u64) -> Result<Fr, PoseidonError>
{
    nullifier(REGISTRATION_TAG, key, Fr::from(action_counter))
}

pub fn deactivation_nullifier(key: &Point, nonce: Fr) -> Result<Fr, PoseidonError>
{
    nullifier(DEACTIVATION_TAG, key, nonce)
}

pub fn nullifier_var(
    hasher: &PoseidonGadget,
    tag: u64,
    key: &PointVar,
    counter: &FpVar<Fr>,
) -> Result<FpVar<Fr>, SynthesisError>
{
    hasher.hash(&[
        FpVar::constant(Fr::from(tag)),
        key.x.clone(),
        key.y.clone(),
        counter.clone(),
    ])
}

/// Requires every pair of active nullifiers to differ.
pub fn enforce_distinct(
    nullifiers: &[FpVar<Fr>],
    active: &[Boolean<Fr>],
) -> Result<(), SynthesisError>
{
    if nullifiers.len() != active.len() { return Err(SynthesisError::Unsatisfiable); }

    for i in 0..nullifiers.len()
    {
        for j in i + 1..nullifiers.len()
        {
            let both = active[i].and(&active[j])?;
            nullifiers[i].conditional_enforce_not_equal(&nullifiers[j], &both)?;
        }
    }
    Ok(())
}
