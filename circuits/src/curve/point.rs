use ark_ff::{BigInteger, BigInteger256, Field, One, Zero};
use serde::{Deserialize, Serialize};

use crate::curve::{BASE8_X, BASE8_Y, COEFF_A, COEFF_D, COFACTOR_INVERSE, GENERATOR_X, GENERATOR_Y, SUBGROUP_ORDER};
use crate::{fr_from_bytes, fr_to_bytes, Fr, HashBytes};

/// An affine BabyJubjub point. Not necessarily on the curve: values arrive
/// from untrusted input and are validated before use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point
{
    #[serde(with = "fr_decimal")]
    pub x: Fr,

    #[serde(with = "fr_decimal")]
    pub y: Fr,
}

impl Default for Point
{
    fn default() -> Self
    {
        Point::identity()
    }
}

impl Point
{
    pub const fn new(x: Fr, y: Fr) -> Self
    {
        Point { x, y }
    }

    /// The neutral element `(0, 1)`.
    pub fn identity() -> Self
    {
        Point { x: Fr::zero(), y: Fr::one() }
    }

    /// Generator of the prime-order subgroup.
    pub const fn base8() -> Self
    {
        Point { x: BASE8_X, y: BASE8_Y }
    }

    /// Generator of the full group; `8 * generator == base8`.
    pub const fn generator() -> Self
    {
        Point { x: GENERATOR_X, y: GENERATOR_Y }
    }

    pub fn is_identity(&self) -> bool
    {
        self.x.is_zero() && self.y.is_one()
    }

    pub fn is_on_curve(&self) -> bool
    {
        let x2 = self.x.square();
        let y2 = self.y.square();
        COEFF_A * x2 + y2 == Fr::one() + COEFF_D * x2 * y2
    }

    /// Unified addition. Complete for points on the curve; the result for
    /// off-curve inputs is meaningless but never panics.
    pub fn add(&self, other: &Point) -> Point
    {
        let beta = self.x * other.y;
        let gamma = self.y * other.x;
        let tau = COEFF_D * beta * gamma;
        let x = (beta + gamma) * (Fr::one() + tau).inverse().unwrap_or_else(Fr::zero);
        let y = (self.y * other.y - COEFF_A * self.x * other.x)
            * (Fr::one() - tau).inverse().unwrap_or_else(Fr::zero);
        Point { x, y }
    }

    pub fn double(&self) -> Point
    {
        self.add(self)
    }

    pub fn neg(&self) -> Point
    {
        Point { x: -self.x, y: self.y }
    }

    /// Multiplies by a non-negative integer, least significant bit first.
    pub fn mul(&self, scalar: &BigInteger256) -> Point
    {
        let mut acc = Point::identity();
        let mut base = *self;
        let bits = scalar.num_bits() as usize;
        for i in 0..bits
        {
            if scalar.get_bit(i) { acc = acc.add(&base); }
            base = base.double();
        }
        acc
    }

    /// On the curve, not the identity (nor the order-two point sharing
    /// `x == 0`), and annihilated by the subgroup order.
    pub fn is_in_subgroup(&self) -> bool
    {
        self.is_on_curve() && !self.x.is_zero() && self.mul(&SUBGROUP_ORDER).is_identity()
    }

    /// `8⁻¹ · self`, the witness for the in-circuit subgroup check.
    /// Off-curve points get the identity, which fails that check.
    pub fn cofactor_hint(&self) -> Point
    {
        if !self.is_on_curve() { return Point::identity(); }
        self.mul(&COFACTOR_INVERSE)
    }

    /// Canonical big-endian encodings of both coordinates.
    pub fn to_bytes(&self) -> (HashBytes, HashBytes)
    {
        (fr_to_bytes(&self.x), fr_to_bytes(&self.y))
    }

    /// Decodes a point, rejecting non-canonical coordinates. Curve
    /// membership is not checked here.
    pub fn from_bytes(x: &HashBytes, y: &HashBytes) -> Option<Point>
    {
        Some(Point { x: fr_from_bytes(x)?, y: fr_from_bytes(y)? })
    }
}

/// Field elements as decimal strings, the notation circom tooling uses.
pub(crate) mod fr_decimal
{
    use std::str::FromStr;

    use ark_ff::PrimeField;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::Fr;

    pub fn serialize<S: Serializer>(value: &Fr, serializer: S) -> Result<S::Ok, S::Error>
    {
        serializer.serialize_str(&value.into_bigint().to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fr, D::Error>
    {
        let s = String::deserialize(deserializer)?;
        Fr::from_str(&s).map_err(|_| D::Error::custom(format!("invalid field element: {s}")))
    }
}
