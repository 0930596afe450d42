use ark_ff::{Field, One};

use super::utils::{public_key, small_config};
use crate::curve::Point;
use crate::nullifier::registration_nullifier;
use crate::process::check_constraints;
use crate::registry::{AddNewKeyRequest, EncryptedCredential, KeyRegistry};
use crate::{CircuitError, Fr};

fn strong_randomness() -> Fr
{
    Fr::from(2u64).pow([240u64]) + Fr::from(12345u64)
}

fn request(previous: Option<EncryptedCredential>) -> AddNewKeyRequest
{
    AddNewKeyRequest {
        new_public_key: public_key(7),
        coordinator_public_key: public_key(99),
        random_val: strong_randomness(),
        previous_credential: previous,
        action_counter: 1,
    }
}

#[test]
fn fresh_registration_is_satisfied()
{
    let registry = KeyRegistry::new(small_config()).unwrap();
    let registration = registry.add_new_key(&request(None)).unwrap();

    let expected = EncryptedCredential::base().rerandomize(&strong_randomness(), &public_key(99));
    assert_eq!(registration.credential, expected);
    assert_eq!(registration.nullifier, registration_nullifier(&public_key(7), 1).unwrap());
    assert_eq!(registration.circuit.public_inputs().len(), 10);
    assert_eq!(registration.circuit.public_inputs()[9], registration.nullifier);

    check_constraints(registration.circuit).unwrap();
}

#[test]
fn rotation_rerandomizes_previous_credential()
{
    let registry = KeyRegistry::new(small_config()).unwrap();
    let first = registry.add_new_key(&request(None)).unwrap();

    let mut rotate = request(Some(first.credential));
    rotate.new_public_key = public_key(8);
    rotate.random_val = strong_randomness() + Fr::one();
    let second = registry.add_new_key(&rotate).unwrap();

    assert_ne!(second.credential, first.credential);
    assert_ne!(second.nullifier, first.nullifier);
    check_constraints(second.circuit).unwrap();
}

#[test]
fn weak_randomness_is_rejected()
{
    let registry = KeyRegistry::new(small_config()).unwrap();

    for random_val in [Fr::from(0u64), Fr::from(2u64).pow([200u64]), Fr::from(2u64).pow([253u64]), -Fr::one()]
    {
        let mut weak = request(None);
        weak.random_val = random_val;
        assert_eq!(registry.add_new_key(&weak).unwrap_err(), CircuitError::WeakRandomness);
    }
}

#[test]
fn invalid_keys_are_rejected()
{
    let registry = KeyRegistry::new(small_config()).unwrap();
    let order_two = Point::new(Fr::from(0u64), -Fr::one());

    let mut bad = request(None);
    bad.new_public_key = order_two;
    assert_eq!(registry.add_new_key(&bad).unwrap_err(), CircuitError::InvalidPoint("new public key"));

    let mut bad = request(None);
    bad.new_public_key = Point::identity();
    assert!(matches!(registry.add_new_key(&bad), Err(CircuitError::InvalidPoint(_))));

    let mut bad = request(None);
    bad.coordinator_public_key = Point::base8().add(&order_two);
    assert_eq!(
        registry.add_new_key(&bad).unwrap_err(),
        CircuitError::InvalidPoint("coordinator public key")
    );

    let mut bad = request(Some(EncryptedCredential {
        c1: Point::new(Fr::from(1u64), Fr::from(2u64)),
        c2: Point::identity(),
    }));
    bad.action_counter = 2;
    assert_eq!(registry.add_new_key(&bad).unwrap_err(), CircuitError::InvalidPoint("previous credential"));
}

/// A prover who skips the native checks still cannot satisfy the circuit.
#[test]
fn forged_witnesses_are_unsatisfied()
{
    let registry = KeyRegistry::new(small_config()).unwrap();
    let registration = registry.add_new_key(&request(None)).unwrap();

    let mut weak = registration.circuit.clone();
    weak.random_val = Fr::from(5u64);
    weak.credential = EncryptedCredential::base().rerandomize(&weak.random_val, &public_key(99));
    assert!(matches!(check_constraints(weak), Err(CircuitError::Unsatisfied(_))));

    let mut outside = registration.circuit.clone();
    outside.new_public_key = Point::base8().add(&Point::new(Fr::from(0u64), -Fr::one()));
    outside.nullifier = registration_nullifier(&outside.new_public_key, 1).unwrap();
    assert!(matches!(check_constraints(outside), Err(CircuitError::Unsatisfied(_))));

    let mut coordinator = registration.circuit.clone();
    coordinator.coordinator_public_key = public_key(99).add(&Point::new(Fr::from(0u64), -Fr::one()));
    coordinator.credential =
        EncryptedCredential::base().rerandomize(&coordinator.random_val, &coordinator.coordinator_public_key);
    assert!(matches!(check_constraints(coordinator), Err(CircuitError::Unsatisfied(_))));

    let mut wrong_output = registration.circuit.clone();
    wrong_output.credential.c2 = Point::base8();
    assert!(matches!(check_constraints(wrong_output), Err(CircuitError::Unsatisfied(_))));

    let mut wrong_nullifier = registration.circuit;
    wrong_nullifier.action_counter = 2;
    assert!(matches!(check_constraints(wrong_nullifier), Err(CircuitError::Unsatisfied(_))));
}
