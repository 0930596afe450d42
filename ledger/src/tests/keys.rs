use ark_bn254::{Fq, Fq2, G1Affine, G2Affine};
use ark_ff::PrimeField;
use num_bigint::BigUint;
use serde_json::json;

use super::utils::PreimageCircuit;
use crate::backend::{Groth16Backend, ProofBackend};
use crate::error::LedgerError;
use crate::keys::{ProofData, VerifyKey};

fn decimal(value: &Fq) -> String
{
    BigUint::from(value.into_bigint()).to_string()
}

fn g1_json(point: &G1Affine) -> serde_json::Value
{
    json!([decimal(&point.x), decimal(&point.y), "1"])
}

fn fq2_json(value: &Fq2) -> serde_json::Value
{
    json!([decimal(&value.c0), decimal(&value.c1)])
}

fn g2_json(point: &G2Affine) -> serde_json::Value
{
    json!([fq2_json(&point.x), fq2_json(&point.y), ["1", "0"]])
}

#[test]
fn verifying_key_bytes_round_trip()
{
    let mut backend = Groth16Backend::new(1);
    let (_, vk) = backend.setup(PreimageCircuit::new(1, 2)).unwrap();

    let encoded = VerifyKey::from_verifying_key(&vk).unwrap();
    assert_eq!(encoded.gamma_abc_g1.len(), 2);
    assert_eq!(encoded.to_verifying_key().unwrap(), vk);
}

#[test]
fn snarkjs_verifying_key_matches_arkworks()
{
    let mut backend = Groth16Backend::new(2);
    let (_, vk) = backend.setup(PreimageCircuit::new(1, 2)).unwrap();

    let document = json!({
        "protocol": "groth16",
        "curve": "bn128",
        "nPublic": 1,
        "vk_alpha_1": g1_json(&vk.alpha_g1),
        "vk_beta_2": g2_json(&vk.beta_g2),
        "vk_gamma_2": g2_json(&vk.gamma_g2),
        "vk_delta_2": g2_json(&vk.delta_g2),
        "IC": vk.gamma_abc_g1.iter().map(g1_json).collect::<Vec<_>>(),
    });

    let imported = VerifyKey::from_snarkjs_json(&document.to_string()).unwrap();
    assert_eq!(imported, VerifyKey::from_verifying_key(&vk).unwrap());
}

#[test]
fn snarkjs_proof_matches_arkworks()
{
    let mut backend = Groth16Backend::new(3);
    let circuit = PreimageCircuit::new(5, 6);
    let (pk, _) = backend.setup(circuit.clone()).unwrap();
    let proof = backend.prove(&pk, circuit).unwrap();

    let document = json!({
        "pi_a": g1_json(&proof.a),
        "pi_b": g2_json(&proof.b),
        "pi_c": g1_json(&proof.c),
        "protocol": "groth16",
    });

    let imported = ProofData::from_snarkjs_json(&document.to_string()).unwrap();
    assert_eq!(imported.to_proof().unwrap(), proof);
}

#[test]
fn off_curve_points_are_rejected()
{
    let document = json!({
        "pi_a": ["1", "3", "1"],
        "pi_b": [["1", "0"], ["1", "0"], ["1", "0"]],
        "pi_c": ["1", "2", "1"],
    });

    let outcome = ProofData::from_snarkjs_json(&document.to_string());
    assert!(matches!(outcome, Err(LedgerError::Serialization(_))));
}

#[test]
fn non_decimal_coordinates_are_rejected()
{
    let document = json!({
        "pi_a": ["0x01", "2", "1"],
        "pi_b": [["1", "0"], ["1", "0"], ["1", "0"]],
        "pi_c": ["1", "2", "1"],
    });

    let outcome = ProofData::from_snarkjs_json(&document.to_string());
    assert!(matches!(outcome, Err(LedgerError::Serialization(_))));
}

#[test]
fn truncated_bytes_are_rejected()
{
    let proof = ProofData { pi_a: vec![0u8; 3], pi_b: Vec::new(), pi_c: Vec::new() };
    assert!(matches!(proof.to_proof(), Err(LedgerError::Serialization(_))));
}
