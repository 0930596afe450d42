use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::ConstraintSystem;
use proptest::prelude::*;

use crate::message::{Message, MessageKind, MessageVar, PAYLOAD_LEN};
use crate::state::{StateLeaf, StateTree};
use crate::validator::{range_check, range_check_var};
use crate::{fr_from_bytes, fr_to_bytes, Fr, Point};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Empty iff every element is zero, natively and in-circuit.
    #[test]
    fn emptiness_is_a_conjunction(payload in prop::array::uniform5(prop_oneof![Just(0u64), any::<u64>()]))
    {
        let message = Message {
            kind: MessageKind::Padding,
            payload: payload.map(Fr::from),
            sequence: 0,
        };
        prop_assert_eq!(message.is_empty(), payload.iter().all(|e| *e == 0));

        let cs = ConstraintSystem::<Fr>::new_ref();
        let var = MessageVar::new_witness(cs.clone(), || Ok(message)).unwrap();
        prop_assert_eq!(var.payload_is_empty().unwrap().value().unwrap(), message.is_empty());
        prop_assert_eq!(var.payload.len(), PAYLOAD_LEN);
        prop_assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn range_check_agrees_with_u64_bounds(value in any::<u64>(), bits in 0u32..64)
    {
        let expected = bits == 64 || value < (1u64 << bits);
        prop_assert_eq!(range_check(&Fr::from(value), bits), expected);

        let cs = ConstraintSystem::<Fr>::new_ref();
        let var = FpVar::new_witness(cs.clone(), || Ok(Fr::from(value))).unwrap();
        let (in_range, _) = range_check_var(&var, bits).unwrap();
        prop_assert_eq!(in_range.value().unwrap(), expected);
    }

    #[test]
    fn negated_values_never_fit(value in 1u64..)
    {
        prop_assert!(!range_check(&-Fr::from(value), 253));
    }

    #[test]
    fn canonical_bytes_round_trip(value in any::<u64>())
    {
        let fr = Fr::from(value);
        prop_assert_eq!(fr_from_bytes(&fr_to_bytes(&fr)), Some(fr));
    }

    #[test]
    fn every_leaf_opens_against_the_root(balances in prop::collection::vec(any::<u64>(), 1..12))
    {
        let mut tree = StateTree::new(4).unwrap();
        for balance in &balances
        {
            tree.insert(StateLeaf::new(Point::base8(), *balance)).unwrap();
        }

        for index in 0..balances.len() as u64
        {
            let leaf = tree.leaf(index).unwrap();
            prop_assert!(tree.proof(index).unwrap().verify(&tree.root(), leaf.hash().unwrap()));
        }
    }
}

#[test]
fn bytes_at_or_above_modulus_are_rejected()
{
    assert_eq!(fr_from_bytes(&[0xff; 32]), None);
}
