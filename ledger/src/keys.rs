//! Byte formats for Groth16 key material, and import from the decimal-string
//! JSON that snarkjs emits.

use ark_bn254::{Bn254, Fq, Fq2, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ff::{BigInteger256, PrimeField};
use ark_groth16::{Proof, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use codec::{Decode, Encode};
use num_bigint::BigUint;
use num_traits::Num;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// A zk verification key.
#[derive(Clone, Debug, Encode, Decode, Eq, PartialEq)]
pub struct VerifyKey
{
    pub alpha_g1: Vec<u8>,
    pub beta_g2: Vec<u8>,
    pub gamma_g2: Vec<u8>,
    pub delta_g2: Vec<u8>,
    pub gamma_abc_g1: Vec<Vec<u8>>,
}

/// A serialized groth16 proof.
#[derive(Clone, Debug, Encode, Decode, Eq, PartialEq)]
pub struct ProofData
{
    pub pi_a: Vec<u8>,
    pub pi_b: Vec<u8>,
    pub pi_c: Vec<u8>,
}

/// One verifying key per circuit.
#[derive(Clone, Debug, Encode, Decode, Eq, PartialEq)]
pub struct VerifyingKeys<K>
{
    /// The verifying key for the key registration circuit.
    pub add_new_key: K,

    /// The verifying key for the message processing circuit.
    pub process_messages: K,

    /// The verifying key for the deactivation circuit.
    pub process_deactivate: K,
}

#[derive(Serialize, Deserialize)]
pub struct VerifyingKeyBigNumber
{
    pub vk_alpha_1: [String; 3],
    pub vk_beta_2: [[String; 2]; 3],
    pub vk_gamma_2: [[String; 2]; 3],
    pub vk_delta_2: [[String; 2]; 3],
    #[serde(rename = "IC")]
    pub ic: Vec<[String; 3]>,
}

#[derive(Serialize, Deserialize)]
pub struct ProofBigNumber
{
    pub pi_a: [String; 3],
    pub pi_b: [[String; 2]; 3],
    pub pi_c: [String; 3],
}

fn serialize_point_to_bytes<T: CanonicalSerialize>(point: &T) -> Result<Vec<u8>, LedgerError>
{
    let mut bytes = Vec::new();
    point.serialize_uncompressed(&mut bytes)?;
    Ok(bytes)
}

fn fq_from_str(s: &str) -> Result<Fq, LedgerError>
{
    let malformed = || LedgerError::Serialization(format!("invalid base field element: {s}"));
    let value = BigUint::from_str_radix(s, 10).map_err(|_| malformed())?;
    let bigint = BigInteger256::try_from(value).map_err(|_| malformed())?;
    Fq::from_bigint(bigint).ok_or_else(malformed)
}

fn g1_bn_to_affine(els: &[String; 3]) -> Result<G1Affine, LedgerError>
{
    let point = G1Affine::from(G1Projective::new_unchecked(
        fq_from_str(&els[0])?,
        fq_from_str(&els[1])?,
        fq_from_str(&els[2])?,
    ));

    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve()
    {
        Err(LedgerError::Serialization("G1 point is not in the prime-order subgroup".into()))?
    }
    Ok(point)
}

fn g2_bn_to_affine(els: &[[String; 2]; 3]) -> Result<G2Affine, LedgerError>
{
    let x = Fq2::new(fq_from_str(&els[0][0])?, fq_from_str(&els[0][1])?);
    let y = Fq2::new(fq_from_str(&els[1][0])?, fq_from_str(&els[1][1])?);
    let z = Fq2::new(fq_from_str(&els[2][0])?, fq_from_str(&els[2][1])?);
    let point = G2Affine::from(G2Projective::new_unchecked(x, y, z));

    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve()
    {
        Err(LedgerError::Serialization("G2 point is not in the prime-order subgroup".into()))?
    }
    Ok(point)
}

impl VerifyKey
{
    pub fn from_verifying_key(vk: &VerifyingKey<Bn254>) -> Result<Self, LedgerError>
    {
        Ok(VerifyKey {
            alpha_g1: serialize_point_to_bytes(&vk.alpha_g1)?,
            beta_g2: serialize_point_to_bytes(&vk.beta_g2)?,
            gamma_g2: serialize_point_to_bytes(&vk.gamma_g2)?,
            delta_g2: serialize_point_to_bytes(&vk.delta_g2)?,
            gamma_abc_g1: vk
                .gamma_abc_g1
                .iter()
                .map(serialize_point_to_bytes)
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn to_verifying_key(&self) -> Result<VerifyingKey<Bn254>, LedgerError>
    {
        Ok(VerifyingKey {
            alpha_g1: G1Affine::deserialize_uncompressed(&*self.alpha_g1)?,
            beta_g2: G2Affine::deserialize_uncompressed(&*self.beta_g2)?,
            gamma_g2: G2Affine::deserialize_uncompressed(&*self.gamma_g2)?,
            delta_g2: G2Affine::deserialize_uncompressed(&*self.delta_g2)?,
            gamma_abc_g1: self
                .gamma_abc_g1
                .iter()
                .map(|bytes| G1Affine::deserialize_uncompressed(&**bytes))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Imports a snarkjs `verification_key.json`.
    pub fn from_snarkjs_json(json: &str) -> Result<Self, LedgerError>
    {
        let vk: VerifyingKeyBigNumber = serde_json::from_str(json)?;

        Self::from_verifying_key(&VerifyingKey {
            alpha_g1: g1_bn_to_affine(&vk.vk_alpha_1)?,
            beta_g2: g2_bn_to_affine(&vk.vk_beta_2)?,
            gamma_g2: g2_bn_to_affine(&vk.vk_gamma_2)?,
            delta_g2: g2_bn_to_affine(&vk.vk_delta_2)?,
            gamma_abc_g1: vk.ic.iter().map(g1_bn_to_affine).collect::<Result<_, _>>()?,
        })
    }
}

impl ProofData
{
    pub fn from_proof(proof: &Proof<Bn254>) -> Result<Self, LedgerError>
    {
        Ok(ProofData {
            pi_a: serialize_point_to_bytes(&proof.a)?,
            pi_b: serialize_point_to_bytes(&proof.b)?,
            pi_c: serialize_point_to_bytes(&proof.c)?,
        })
    }

    pub fn to_proof(&self) -> Result<Proof<Bn254>, LedgerError>
    {
        Ok(Proof {
            a: G1Affine::deserialize_uncompressed(&*self.pi_a)?,
            b: G2Affine::deserialize_uncompressed(&*self.pi_b)?,
            c: G1Affine::deserialize_uncompressed(&*self.pi_c)?,
        })
    }

    /// Imports a snarkjs `proof.json`.
    pub fn from_snarkjs_json(json: &str) -> Result<Self, LedgerError>
    {
        let proof: ProofBigNumber = serde_json::from_str(json)?;

        Self::from_proof(&Proof {
            a: g1_bn_to_affine(&proof.pi_a)?,
            b: g2_bn_to_affine(&proof.pi_b)?,
            c: g1_bn_to_affine(&proof.pi_c)?,
        })
    }
}
