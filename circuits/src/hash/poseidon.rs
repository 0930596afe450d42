use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;
use light_poseidon::parameters::bn254_x5::get_poseidon_parameters;
use light_poseidon::{Poseidon, PoseidonError, PoseidonHasher, PoseidonParameters, MAX_X5_LEN};

use crate::Fr;

/// Poseidon with the circom BN254 parameters and a zero domain tag.
pub fn poseidon_hash(inputs: &[Fr]) -> Result<Fr, PoseidonError>
{
    let mut hasher = Poseidon::<Fr>::new_circom(inputs.len())?;
    hasher.hash(inputs)
}

/// In-circuit Poseidon permutation, round for round identical to
/// [`Poseidon::new_circom`] so native and constrained digests agree.
pub struct PoseidonGadget
{
    params: PoseidonParameters<Fr>,
    domain_tag: Fr,
}

impl PoseidonGadget
{
    pub fn new_circom(nr_inputs: usize) -> Result<Self, PoseidonError>
    {
        let width = nr_inputs + 1;
        if width > MAX_X5_LEN
        {
            return Err(PoseidonError::InvalidWidthCircom {
                width,
                max_limit: MAX_X5_LEN,
            });
        }

        let params = get_poseidon_parameters::<Fr>(
            width.try_into().map_err(|_| PoseidonError::U64Tou8)?,
        )?;

        Ok(PoseidonGadget {
            params,
            domain_tag: Fr::from(0u64),
        })
    }

    /// The number of inputs accepted by [`PoseidonGadget::hash`].
    pub fn arity(&self) -> usize
    {
        self.params.width - 1
    }

    fn apply_ark(&self, state: &mut [FpVar<Fr>], round: usize)
    {
        state.iter_mut().enumerate().for_each(|(i, a)| {
            *a += self.params.ark[round * self.params.width + i];
        });
    }

    fn apply_sbox_full(&self, state: &mut [FpVar<Fr>]) -> Result<(), SynthesisError>
    {
        for a in state.iter_mut()
        {
            *a = a.pow_by_constant([self.params.alpha])?;
        }
        Ok(())
    }

    fn apply_sbox_partial(&self, state: &mut [FpVar<Fr>]) -> Result<(), SynthesisError>
    {
        state[0] = state[0].pow_by_constant([self.params.alpha])?;
        Ok(())
    }

    fn apply_mds(&self, state: &mut Vec<FpVar<Fr>>)
    {
        let next: Vec<FpVar<Fr>> = (0..state.len())
            .map(|i| {
                state
                    .iter()
                    .enumerate()
                    .fold(FpVar::zero(), |acc, (j, a)| acc + a * self.params.mds[i][j])
            })
            .collect();
        *state = next;
    }

    pub fn hash(&self, inputs: &[FpVar<Fr>]) -> Result<FpVar<Fr>, SynthesisError>
    {
        // Arity is fixed by construction; a mismatch is a circuit bug.
        if inputs.len() != self.arity() { return Err(SynthesisError::Unsatisfiable); }

        let mut state = Vec::with_capacity(self.params.width);
        state.push(FpVar::constant(self.domain_tag));
        state.extend(inputs.iter().cloned());

        let all_rounds = self.params.full_rounds + self.params.partial_rounds;
        let half_rounds = self.params.full_rounds / 2;

        for round in 0..half_rounds
        {
            self.apply_ark(&mut state, round);
            self.apply_sbox_full(&mut state)?;
            self.apply_mds(&mut state);
        }

        for round in half_rounds..half_rounds + self.params.partial_rounds
        {
            self.apply_ark(&mut state, round);
            self.apply_sbox_partial(&mut state)?;
            self.apply_mds(&mut state);
        }

        for round in half_rounds + self.params.partial_rounds..all_rounds
        {
            self.apply_ark(&mut state, round);
            self.apply_sbox_full(&mut state)?;
            self.apply_mds(&mut state);
        }

        Ok(state.swap_remove(0))
    }
}

/// The hashers a circuit needs, built once per synthesis.
pub struct PoseidonGadgets
{
    /// Merkle nodes and the message chain.
    pub two: PoseidonGadget,

    /// Nullifiers.
    pub four: PoseidonGadget,

    /// State leaves.
    pub five: PoseidonGadget,

    /// Messages.
    pub seven: PoseidonGadget,
}

impl PoseidonGadgets
{
    pub fn new() -> Result<Self, SynthesisError>
    {
        let build = |n| PoseidonGadget::new_circom(n).map_err(|_| SynthesisError::Unsatisfiable);
        Ok(PoseidonGadgets {
            two: build(2)?,
            four: build(4)?,
            five: build(5)?,
            seven: build(7)?,
        })
    }
}
