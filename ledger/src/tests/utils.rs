use anon_maci_circuits::hash::{poseidon_hash, PoseidonGadget};
use anon_maci_circuits::{AddNewKeyRequest, Fr, KeyRegistry, Point, ProtocolConfig, StateLeaf, StateTree};
use ark_ff::{Field, PrimeField};
use ark_r1cs_std::alloc::AllocVar;
use ark_r1cs_std::eq::EqGadget;
use ark_r1cs_std::fields::fp::FpVar;
use ark_relations::ns;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystem, ConstraintSystemRef, SynthesisError};

use crate::backend::ProofBackend;
use crate::error::BackendError;
use crate::keys::VerifyingKeys;
use crate::ledger::{KeySubmission, Ledger};

/// A deployment small enough to synthesize every circuit quickly.
pub fn small_config() -> ProtocolConfig
{
    ProtocolConfig {
        state_tree_depth: 4,
        max_batch_size: 4,
        ..ProtocolConfig::default()
    }
}

pub fn public_key(seed: u64) -> Point
{
    Point::base8().mul(&Fr::from(seed).into_bigint())
}

pub fn coordinator_key() -> Point
{
    public_key(99)
}

/// The synthesized witness stands in for a proof: it verifies iff every
/// constraint held and the public inputs match.
#[derive(Clone, Debug)]
pub struct WitnessProof
{
    pub satisfied: bool,
    pub inputs: Vec<Fr>,
}

pub struct TransparentBackend;

impl ProofBackend for TransparentBackend
{
    type ProvingKey = ();
    type VerifyingKey = ();
    type Proof = WitnessProof;

    fn setup<C>(&mut self, _circuit: C) -> Result<((), ()), BackendError>
    where
        C: ConstraintSynthesizer<Fr>,
    {
        Ok(((), ()))
    }

    fn prove<C>(&mut self, _key: &(), circuit: C) -> Result<WitnessProof, BackendError>
    where
        C: ConstraintSynthesizer<Fr>,
    {
        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone())?;
        let satisfied = cs.is_satisfied()?;
        let inputs = cs.borrow().map(|cs| cs.instance_assignment[1..].to_vec()).unwrap_or_default();

        Ok(WitnessProof { satisfied, inputs })
    }

    fn verify(&self, _key: &(), proof: &WitnessProof, public_inputs: &[Fr]) -> Result<bool, BackendError>
    {
        Ok(proof.satisfied && proof.inputs == public_inputs)
    }
}

pub fn transparent_ledger(config: ProtocolConfig) -> Ledger<TransparentBackend>
{
    let keys = VerifyingKeys { add_new_key: (), process_messages: (), process_deactivate: () };
    Ledger::new(config, coordinator_key(), TransparentBackend, keys).unwrap()
}

pub fn registration_request(seed: u64, action_counter: u64) -> AddNewKeyRequest
{
    AddNewKeyRequest {
        new_public_key: public_key(seed),
        coordinator_public_key: coordinator_key(),
        random_val: Fr::from(2u64).pow([240u64]) + Fr::from(seed),
        previous_credential: None,
        action_counter,
    }
}

/// A proven registration of the key for `seed`.
pub fn key_submission(config: &ProtocolConfig, seed: u64, action_counter: u64) -> KeySubmission<WitnessProof>
{
    let registry = KeyRegistry::new(config.clone()).unwrap();
    let registration = registry.add_new_key(&registration_request(seed, action_counter)).unwrap();
    let proof = TransparentBackend.prove(&(), registration.circuit.clone()).unwrap();

    KeySubmission::new(&registration.circuit, proof)
}

/// The coordinator's view of the same registrations.
pub fn registered_tree(config: &ProtocolConfig, seeds: &[u64]) -> StateTree
{
    let mut tree = StateTree::new(config.state_tree_depth).unwrap();
    for seed in seeds
    {
        tree.insert(StateLeaf::new(public_key(*seed), config.initial_credit_balance)).unwrap();
    }
    tree
}

/// Knowledge of a two-element Poseidon preimage. Small enough to run a real
/// Groth16 setup in every test run.
#[derive(Clone, Debug)]
pub struct PreimageCircuit
{
    pub preimage: [Fr; 2],
    pub image: Fr,
}

impl PreimageCircuit
{
    pub fn new(a: u64, b: u64) -> Self
    {
        let preimage = [Fr::from(a), Fr::from(b)];
        let image = poseidon_hash(&preimage).unwrap();
        PreimageCircuit { preimage, image }
    }
}

impl ConstraintSynthesizer<Fr> for PreimageCircuit
{
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError>
    {
        let image = FpVar::new_input(ns!(cs, "image"), || Ok(self.image))?;
        let preimage = self
            .preimage
            .iter()
            .map(|value| FpVar::new_witness(ns!(cs, "preimage"), || Ok(*value)))
            .collect::<Result<Vec<_>, _>>()?;

        let hasher = PoseidonGadget::new_circom(2).map_err(|_| SynthesisError::Unsatisfiable)?;
        hasher.hash(&preimage)?.enforce_equal(&image)
    }
}
