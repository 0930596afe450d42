//! Key registration and rotation (`addNewKey`).
//!
//! A voter proves that their new key is a valid subgroup point and that the
//! credential they present is a fresh re-randomization, under the
//! coordinator's key, of their previous credential (or of the base
//! credential on first registration). The randomness must be large enough
//! that the output is unlinkable to the input.

use ark_ff::{PrimeField, Zero};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::ns;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProtocolConfig;
use crate::curve::{Point, PointVar};
use crate::error::CircuitError;
use crate::hash::PoseidonGadget;
use crate::nullifier::{nullifier_var, registration_nullifier, REGISTRATION_TAG};
use crate::validator::{
    point_on_curve,
    point_on_curve_var,
    randomness_check,
    range_check_var,
    subgroup_check,
    subgroup_check_var,
    threshold_offset
};
use crate::Fr;

/// An ElGamal ciphertext over BabyJubjub.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedCredential
{
    pub c1: Point,
    pub c2: Point,
}

impl EncryptedCredential
{
    /// `(identity, identity)`, the credential re-randomized on first registration.
    pub fn base() -> Self
    {
        EncryptedCredential::default()
    }

    /// `(c1 + r·Base8, c2 + r·coordinator)`.
    pub fn rerandomize(&self, random_val: &Fr, coordinator_public_key: &Point) -> Self
    {
        let r = random_val.into_bigint();
        EncryptedCredential {
            c1: self.c1.add(&Point::base8().mul(&r)),
            c2: self.c2.add(&coordinator_public_key.mul(&r)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddNewKeyRequest
{
    pub new_public_key: Point,
    pub coordinator_public_key: Point,
    pub random_val: Fr,

    /// `None` on first registration.
    pub previous_credential: Option<EncryptedCredential>,

    pub action_counter: u64,
}

/// The output of an accepted `addNewKey`: the caller must insert the
/// nullifier into its nullifier set before acting on the credential.
#[derive(Clone, Debug)]
pub struct Registration
{
    pub credential: EncryptedCredential,
    pub nullifier: Fr,
    pub circuit: AddNewKeyCircuit,
}

pub struct KeyRegistry
{
    config: ProtocolConfig,
}

impl KeyRegistry
{
    pub fn new(config: ProtocolConfig) -> Result<Self, CircuitError>
    {
        config.validate()?;
        Ok(KeyRegistry { config })
    }

    pub fn config(&self) -> &ProtocolConfig
    {
        &self.config
    }

    /// Validates a request and builds the witness proving it.
    pub fn add_new_key(&self, request: &AddNewKeyRequest) -> Result<Registration, CircuitError>
    {
        // Check that the randomness is in range and above the threshold.
        if !randomness_check(
            &request.random_val,
            self.config.randomness_threshold_bits,
            self.config.full_scalar_bits,
        )
        {
            Err(CircuitError::WeakRandomness)?
        }

        // Check that both keys are usable subgroup points.
        if !subgroup_check(&request.coordinator_public_key)
        {
            Err(CircuitError::InvalidPoint("coordinator public key"))?
        }
        if !subgroup_check(&request.new_public_key)
        {
            Err(CircuitError::InvalidPoint("new public key"))?
        }

        let previous = request.previous_credential.unwrap_or_default();
        if !point_on_curve(&previous.c1) || !point_on_curve(&previous.c2)
        {
            Err(CircuitError::InvalidPoint("previous credential"))?
        }

        let credential = previous.rerandomize(&request.random_val, &request.coordinator_public_key);
        let nullifier = registration_nullifier(&request.new_public_key, request.action_counter)?;

        debug!(
            target: "anon_maci::registry",
            action_counter = request.action_counter,
            rotation = request.previous_credential.is_some(),
            "built addNewKey witness"
        );

        Ok(Registration {
            credential,
            nullifier,
            circuit: AddNewKeyCircuit {
                config: self.config.clone(),
                coordinator_public_key: request.coordinator_public_key,
                new_public_key: request.new_public_key,
                credential,
                action_counter: request.action_counter,
                nullifier,
                random_val: request.random_val,
                previous_credential: previous,
            },
        })
    }
}

/// Public inputs in order: `coordinator.x, coordinator.y, new.x, new.y,
/// c1'.x, c1'.y, c2'.x, c2'.y, actionCounter, nullifier`.
#[derive(Clone, Debug)]
pub struct AddNewKeyCircuit
{
    pub config: ProtocolConfig,

    pub coordinator_public_key: Point,
    pub new_public_key: Point,
    pub credential: EncryptedCredential,
    pub action_counter: u64,
    pub nullifier: Fr,

    /// Private.
    pub random_val: Fr,

    /// Private.
    pub previous_credential: EncryptedCredential,
}

impl AddNewKeyCircuit
{
    /// A circuit of the right shape for key generation.
    pub fn blank(config: &ProtocolConfig) -> Self
    {
        AddNewKeyCircuit {
            config: config.clone(),
            coordinator_public_key: Point::base8(),
            new_public_key: Point::base8(),
            credential: EncryptedCredential::base(),
            action_counter: 0,
            nullifier: Fr::zero(),
            random_val: Fr::zero(),
            previous_credential: EncryptedCredential::base(),
        }
    }

    pub fn public_inputs(&self) -> Vec<Fr>
    {
        vec![
            self.coordinator_public_key.x,
            self.coordinator_public_key.y,
            self.new_public_key.x,
            self.new_public_key.y,
            self.credential.c1.x,
            self.credential.c1.y,
            self.credential.c2.x,
            self.credential.c2.y,
            Fr::from(self.action_counter),
            self.nullifier,
        ]
    }
}

impl ConstraintSynthesizer<Fr> for AddNewKeyCircuit
{
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError>
    {
        let coordinator = PointVar::new_input(ns!(cs, "coordinator_public_key"), || Ok(self.coordinator_public_key))?;
        let new_key = PointVar::new_input(ns!(cs, "new_public_key"), || Ok(self.new_public_key))?;
        let c1_out = PointVar::new_input(ns!(cs, "c1"), || Ok(self.credential.c1))?;
        let c2_out = PointVar::new_input(ns!(cs, "c2"), || Ok(self.credential.c2))?;
        let action_counter = FpVar::new_input(ns!(cs, "action_counter"), || Ok(Fr::from(self.action_counter)))?;
        let nullifier = FpVar::new_input(ns!(cs, "nullifier"), || Ok(self.nullifier))?;

        let random_val = FpVar::new_witness(ns!(cs, "random_val"), || Ok(self.random_val))?;
        let c1_in = PointVar::new_witness(ns!(cs, "previous_c1"), || Ok(self.previous_credential.c1))?;
        let c2_in = PointVar::new_witness(ns!(cs, "previous_c2"), || Ok(self.previous_credential.c2))?;

        // randomVal fits in full_scalar_bits and exceeds 2^threshold.
        let (in_range, random_bits) = range_check_var(&random_val, self.config.full_scalar_bits)?;
        in_range.enforce_equal(&Boolean::TRUE)?;
        let shifted = &random_val - threshold_offset(self.config.randomness_threshold_bits);
        let (above_threshold, _) = range_check_var(&shifted, self.config.full_scalar_bits)?;
        above_threshold.enforce_equal(&Boolean::TRUE)?;

        let coordinator_ok = subgroup_check_var(&coordinator)?;
        coordinator_ok.enforce_equal(&Boolean::TRUE)?;
        subgroup_check_var(&new_key)?.enforce_equal(&Boolean::TRUE)?;
        let c1_ok = point_on_curve_var(&c1_in)?;
        let c2_ok = point_on_curve_var(&c2_in)?;
        c1_ok.enforce_equal(&Boolean::TRUE)?;
        c2_ok.enforce_equal(&Boolean::TRUE)?;

        // Arithmetic only ever sees curve points, whatever the witness.
        let identity = PointVar::identity();
        let coordinator = PointVar::conditionally_select(
            &coordinator_ok,
            &coordinator,
            &PointVar::constant(Point::base8()),
        )?;
        let c1_in = PointVar::conditionally_select(&c1_ok, &c1_in, &identity)?;
        let c2_in = PointVar::conditionally_select(&c2_ok, &c2_in, &identity)?;

        let c1 = c1_in.add(&PointVar::fixed_base_mul_le(&Point::base8(), &random_bits)?)?;
        let c2 = c2_in.add(&coordinator.scalar_mul_le(&random_bits)?)?;
        c1.enforce_equal(&c1_out)?;
        c2.enforce_equal(&c2_out)?;

        let hasher = PoseidonGadget::new_circom(4).map_err(|_| SynthesisError::Unsatisfiable)?;
        nullifier_var(&hasher, REGISTRATION_TAG, &new_key, &action_counter)?.enforce_equal(&nullifier)?;

        Ok(())
    }
}
