use anon_maci_circuits::Fr;
use proptest::prelude::*;

use crate::error::LedgerError;
use crate::nullifier::NullifierSet;

#[test]
fn second_insert_is_rejected()
{
    let mut set = NullifierSet::new();
    set.insert(Fr::from(7u64)).unwrap();

    assert_eq!(set.insert(Fr::from(7u64)), Err(LedgerError::DuplicateNullifier));
    assert_eq!(set.len(), 1);
    assert!(set.contains(&Fr::from(7u64)));
}

#[test]
fn batch_with_repeat_inserts_nothing()
{
    let mut set = NullifierSet::new();
    let batch = [Fr::from(1u64), Fr::from(2u64), Fr::from(1u64)];

    assert_eq!(set.insert_batch(&batch), Err(LedgerError::DuplicateNullifier));
    assert!(set.is_empty());
}

#[test]
fn batch_overlapping_existing_inserts_nothing()
{
    let mut set = NullifierSet::new();
    set.insert(Fr::from(3u64)).unwrap();

    assert_eq!(set.insert_batch(&[Fr::from(4u64), Fr::from(3u64)]), Err(LedgerError::DuplicateNullifier));
    assert!(!set.contains(&Fr::from(4u64)));
    assert_eq!(set.len(), 1);
}

proptest! {
    #[test]
    fn set_accepts_each_value_once(values in prop::collection::vec(any::<u64>(), 0..32))
    {
        let mut set = NullifierSet::new();
        let mut accepted = std::collections::BTreeSet::new();

        for value in &values
        {
            let outcome = set.insert(Fr::from(*value));
            prop_assert_eq!(outcome.is_ok(), accepted.insert(*value));
        }
        prop_assert_eq!(set.len(), accepted.len());
    }
}
