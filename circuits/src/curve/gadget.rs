use core::borrow::Borrow;

use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{ConstraintSystemRef, Namespace, SynthesisError};

use crate::curve::{Point, COEFF_A, COEFF_D};
use crate::Fr;

/// A BabyJubjub point in the constraint system.
///
/// Allocation does not check curve membership. Arithmetic on a point which
/// is not on the curve may fail witness generation, so externally supplied
/// points are validated and replaced by a known-good point before use.
#[derive(Clone, Debug)]
pub struct PointVar
{
    pub x: FpVar<Fr>,
    pub y: FpVar<Fr>,
}

impl PointVar
{
    pub fn new(x: FpVar<Fr>, y: FpVar<Fr>) -> Self
    {
        PointVar { x, y }
    }

    pub fn constant(point: Point) -> Self
    {
        PointVar {
            x: FpVar::constant(point.x),
            y: FpVar::constant(point.y),
        }
    }

    pub fn identity() -> Self
    {
        PointVar::constant(Point::identity())
    }

    /// Twisted Edwards addition:
    ///
    /// ```text
    /// x3 = (x1·y2 + y1·x2) / (1 + d·x1·x2·y1·y2)
    /// y3 = (y1·y2 − a·x1·x2) / (1 − d·x1·x2·y1·y2)
    /// ```
    pub fn add(&self, other: &PointVar) -> Result<PointVar, SynthesisError>
    {
        let beta = &self.x * &other.y;
        let gamma = &self.y * &other.x;
        let delta = (&self.y - &self.x * COEFF_A) * (&other.x + &other.y);
        let tau = (&beta * &gamma) * COEFF_D;

        let x = (&beta + &gamma).mul_by_inverse(&(FpVar::one() + &tau))?;
        let y = (delta + &beta * COEFF_A - &gamma).mul_by_inverse(&(FpVar::one() - &tau))?;

        Ok(PointVar { x, y })
    }

    pub fn double(&self) -> Result<PointVar, SynthesisError>
    {
        self.add(self)
    }

    /// Whether `a·x² + y² == 1 + d·x²·y²`.
    pub fn is_on_curve(&self) -> Result<Boolean<Fr>, SynthesisError>
    {
        let x2 = self.x.square()?;
        let y2 = self.y.square()?;
        let lhs = &x2 * COEFF_A + &y2;
        let rhs = FpVar::one() + (&x2 * &y2) * COEFF_D;
        lhs.is_eq(&rhs)
    }

    /// Variable-base multiplication by little-endian scalar bits.
    pub fn scalar_mul_le(&self, bits: &[Boolean<Fr>]) -> Result<PointVar, SynthesisError>
    {
        let mut acc = PointVar::identity();
        let mut base = self.clone();
        for (i, bit) in bits.iter().enumerate()
        {
            let sum = acc.add(&base)?;
            acc = bit.select(&sum, &acc)?;
            if i + 1 < bits.len() { base = base.double()?; }
        }
        Ok(acc)
    }

    /// Multiplication of a constant base by little-endian scalar bits. The
    /// doublings are computed natively, so each bit costs one addition.
    pub fn fixed_base_mul_le(base: &Point, bits: &[Boolean<Fr>]) -> Result<PointVar, SynthesisError>
    {
        let mut acc = PointVar::identity();
        let mut power = *base;
        for bit in bits
        {
            let sum = acc.add(&PointVar::constant(power))?;
            acc = bit.select(&sum, &acc)?;
            power = power.double();
        }
        Ok(acc)
    }
}

impl R1CSVar<Fr> for PointVar
{
    type Value = Point;

    fn cs(&self) -> ConstraintSystemRef<Fr>
    {
        self.x.cs().or(self.y.cs())
    }

    fn value(&self) -> Result<Point, SynthesisError>
    {
        Ok(Point::new(self.x.value()?, self.y.value()?))
    }
}

impl AllocVar<Point, Fr> for PointVar
{
    fn new_variable<T: Borrow<Point>>(
        cs: impl Into<Namespace<Fr>>,
        f: impl FnOnce() -> Result<T, SynthesisError>,
        mode: AllocationMode,
    ) -> Result<Self, SynthesisError>
    {
        let ns = cs.into();
        let cs = ns.cs();
        let point = f().map(|p| *p.borrow());
        let x = FpVar::new_variable(cs.clone(), || point.map(|p| p.x), mode)?;
        let y = FpVar::new_variable(cs, || point.map(|p| p.y), mode)?;
        Ok(PointVar { x, y })
    }
}

impl CondSelectGadget<Fr> for PointVar
{
    fn conditionally_select(
        cond: &Boolean<Fr>,
        true_value: &Self,
        false_value: &Self,
    ) -> Result<Self, SynthesisError>
    {
        Ok(PointVar {
            x: FpVar::conditionally_select(cond, &true_value.x, &false_value.x)?,
            y: FpVar::conditionally_select(cond, &true_value.y, &false_value.y)?,
        })
    }
}

impl EqGadget<Fr> for PointVar
{
    fn is_eq(&self, other: &Self) -> Result<Boolean<Fr>, SynthesisError>
    {
        self.x.is_eq(&other.x)?.and(&self.y.is_eq(&other.y)?)
    }

    fn conditional_enforce_equal(
        &self,
        other: &Self,
        should_enforce: &Boolean<Fr>,
    ) -> Result<(), SynthesisError>
    {
        self.x.conditional_enforce_equal(&other.x, should_enforce)?;
        self.y.conditional_enforce_equal(&other.y, should_enforce)
    }
}

#[cfg(test)]
mod tests
{
    use ark_ff::{BigInteger, PrimeField};
    use ark_relations::r1cs::ConstraintSystem;

    use super::*;

    #[test]
    fn addition_matches_native()
    {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let p = Point::base8();
        let q = Point::generator();
        let pv = PointVar::new_witness(cs.clone(), || Ok(p)).unwrap();
        let qv = PointVar::new_witness(cs.clone(), || Ok(q)).unwrap();

        assert_eq!(pv.add(&qv).unwrap().value().unwrap(), p.add(&q));
        assert_eq!(pv.double().unwrap().value().unwrap(), p.double());
        assert!(pv.is_on_curve().unwrap().value().unwrap());
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn scalar_multiplication_matches_native()
    {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let scalar = Fr::from(0xdead_beef_u64);
        let bits: Vec<Boolean<Fr>> = scalar
            .into_bigint()
            .to_bits_le()
            .into_iter()
            .take(40)
            .map(|b| Boolean::new_witness(cs.clone(), || Ok(b)).unwrap())
            .collect();

        let expected = Point::base8().mul(&scalar.into_bigint());
        let base = PointVar::new_witness(cs.clone(), || Ok(Point::base8())).unwrap();

        assert_eq!(base.scalar_mul_le(&bits).unwrap().value().unwrap(), expected);
        assert_eq!(PointVar::fixed_base_mul_le(&Point::base8(), &bits).unwrap().value().unwrap(), expected);
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn off_curve_point_is_detected()
    {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let p = PointVar::new_witness(cs.clone(), || Ok(Point::new(Fr::from(1u64), Fr::from(2u64)))).unwrap();
        assert!(!p.is_on_curve().unwrap().value().unwrap());
        assert!(cs.is_satisfied().unwrap());
    }
}
