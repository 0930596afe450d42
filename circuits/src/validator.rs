//! Field and point predicates shared by every circuit.
//!
//! Each predicate has a native form, used while building witnesses, and a
//! constrained form returning a [`Boolean`] which the caller asserts.

use ark_ff::{BigInteger, Field, One, PrimeField};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::SynthesisError;

use crate::config::FIELD_BITS;
use crate::curve::{Point, PointVar};
use crate::Fr;

/// Whether `value` fits in `bits` bits.
pub fn range_check(value: &Fr, bits: u32) -> bool
{
    value.into_bigint().num_bits() <= bits
}

pub fn point_on_curve(point: &Point) -> bool
{
    point.is_on_curve()
}

/// On the curve, not the identity, and in the prime-order subgroup.
pub fn subgroup_check(point: &Point) -> bool
{
    point.is_in_subgroup()
}

/// `2^bits + 1`. A value exceeds `2^bits` iff subtracting this leaves no
/// wraparound.
pub fn threshold_offset(bits: u32) -> Fr
{
    Fr::from(2u64).pow([u64::from(bits)]) + Fr::one()
}

/// Native form of the randomness requirement: `value` fits in `full_bits`
/// and exceeds `2^threshold_bits`.
pub fn randomness_check(value: &Fr, threshold_bits: u32, full_bits: u32) -> bool
{
    range_check(value, full_bits) && range_check(&(*value - threshold_offset(threshold_bits)), full_bits)
}

/// Decomposes `value` into its unique canonical bits and tests that every
/// bit at or above `bits` is zero. Also returns the low `bits` bits.
pub fn range_check_var(
    value: &FpVar<Fr>,
    bits: u32,
) -> Result<(Boolean<Fr>, Vec<Boolean<Fr>>), SynthesisError>
{
    let mut decomposition = value.to_bits_le()?;
    if bits >= FIELD_BITS { return Ok((Boolean::TRUE, decomposition)); }

    let in_range = Boolean::kary_or(&decomposition[bits as usize..])?.not();
    decomposition.truncate(bits as usize);
    Ok((in_range, decomposition))
}

/// Asserts that `value` fits in `bits` bits with a witnessed decomposition.
/// Cheaper than [`range_check_var`] when no predicate is needed.
pub fn enforce_bit_length(value: &FpVar<Fr>, bits: u32) -> Result<(), SynthesisError>
{
    if bits >= FIELD_BITS { return Ok(()); }

    if let FpVar::Constant(c) = value
    {
        if range_check(c, bits) { return Ok(()); }
        Err(SynthesisError::Unsatisfiable)?
    }

    let cs = value.cs();
    let assigned = value.value();
    let mut sum = FpVar::zero();
    let mut coeff = Fr::one();
    for i in 0..bits as usize
    {
        let bit = Boolean::new_witness(cs.clone(), || assigned.map(|v| v.into_bigint().get_bit(i)))?;
        sum += FpVar::from(bit) * coeff;
        coeff.double_in_place();
    }
    sum.enforce_equal(value)
}

pub fn point_on_curve_var(point: &PointVar) -> Result<Boolean<Fr>, SynthesisError>
{
    point.is_on_curve()
}

/// Subgroup membership via a cofactor-clearing hint: the prover supplies
/// `Q = 8⁻¹·P`, and `Q` on the curve with `8·Q == P` puts `P` in the
/// subgroup. `x ≠ 0` excludes the identity and the point of order two.
pub fn subgroup_check_var(point: &PointVar) -> Result<Boolean<Fr>, SynthesisError>
{
    if point.is_constant()
    {
        return Ok(Boolean::constant(subgroup_check(&point.value()?)));
    }

    let hint = PointVar::new_witness(point.cs(), || point.value().map(|p| p.cofactor_hint()))?;
    let hint_on_curve = hint.is_on_curve()?;
    let hint = PointVar::conditionally_select(&hint_on_curve, &hint, &PointVar::identity())?;
    let cleared = hint.double()?.double()?.double()?;

    Boolean::kary_and(&[
        point.is_on_curve()?,
        hint_on_curve,
        cleared.is_eq(point)?,
        point.x.is_zero()?.not(),
    ])
}
