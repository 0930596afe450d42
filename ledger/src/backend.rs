use anon_maci_circuits::Fr;
use ark_bn254::Bn254;
use ark_crypto_primitives::snark::SNARK;
use ark_groth16::{prepare_verifying_key, Groth16, Proof, ProvingKey, VerifyingKey};
use ark_relations::r1cs::ConstraintSynthesizer;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::BackendError;

/// A proof system able to set up, prove and verify the circuits.
///
/// The ledger only ever calls [`verify`](ProofBackend::verify); the other two
/// methods belong to the coordinator.
pub trait ProofBackend
{
    type ProvingKey;
    type VerifyingKey;
    type Proof;

    /// Circuit-specific key generation. `circuit` only needs its shape, so a
    /// blank circuit of the right capacity suffices.
    fn setup<C>(&mut self, circuit: C) -> Result<(Self::ProvingKey, Self::VerifyingKey), BackendError>
    where
        C: ConstraintSynthesizer<Fr>;

    fn prove<C>(&mut self, key: &Self::ProvingKey, circuit: C) -> Result<Self::Proof, BackendError>
    where
        C: ConstraintSynthesizer<Fr>;

    fn verify(
        &self,
        key: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &[Fr],
    ) -> Result<bool, BackendError>;
}

/// Groth16 over BN254.
pub struct Groth16Backend
{
    rng: StdRng,
}

impl Groth16Backend
{
    /// A deterministic backend, for reproducible keys in tests.
    pub fn new(seed: u64) -> Self
    {
        Groth16Backend { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self
    {
        Groth16Backend { rng: StdRng::from_entropy() }
    }
}

impl ProofBackend for Groth16Backend
{
    type ProvingKey = ProvingKey<Bn254>;
    type VerifyingKey = VerifyingKey<Bn254>;
    type Proof = Proof<Bn254>;

    fn setup<C>(&mut self, circuit: C) -> Result<(Self::ProvingKey, Self::VerifyingKey), BackendError>
    where
        C: ConstraintSynthesizer<Fr>,
    {
        Ok(Groth16::<Bn254>::circuit_specific_setup(circuit, &mut self.rng)?)
    }

    fn prove<C>(&mut self, key: &Self::ProvingKey, circuit: C) -> Result<Self::Proof, BackendError>
    where
        C: ConstraintSynthesizer<Fr>,
    {
        Ok(Groth16::<Bn254>::prove(key, circuit, &mut self.rng)?)
    }

    fn verify(
        &self,
        key: &Self::VerifyingKey,
        proof: &Self::Proof,
        public_inputs: &[Fr],
    ) -> Result<bool, BackendError>
    {
        let prepared = prepare_verifying_key(key);
        Ok(Groth16::<Bn254>::verify_with_processed_vk(&prepared, public_inputs, proof)?)
    }
}
