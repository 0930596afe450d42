use ark_ff::{BigInt, BigInteger256, MontFp};

use crate::Fr;

pub const COEFF_A: Fr = MontFp!("168700");

pub const COEFF_D: Fr = MontFp!("168696");

/// The full group has order `COFACTOR * SUBGROUP_ORDER`.
pub const COFACTOR: u64 = 8;

/// Order `l` of the prime subgroup generated by `Base8`.
pub const SUBGROUP_ORDER: BigInteger256 =
    BigInt!("2736030358979909402780800718157159386076813972158567259200215660948447373041");

/// `8⁻¹ mod l`; multiplying a subgroup point by it undoes three doublings.
pub const COFACTOR_INVERSE: BigInteger256 =
    BigInt!("2394026564107420727433200628387514462817212225638746351800188703329891451411");

pub const BASE8_X: Fr =
    MontFp!("5299619240641551281634865583518297030282874472190772894086521144482721001553");

pub const BASE8_Y: Fr =
    MontFp!("16950150798460657717958625567821834550301663161624707787222815936182638968203");

pub const GENERATOR_X: Fr =
    MontFp!("995203441582195749578291179787384436505546430278305826713579947235728471134");

pub const GENERATOR_Y: Fr =
    MontFp!("5472060717959818805561601436314318772137091100104008585924551046643952123905");
