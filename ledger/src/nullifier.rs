use std::collections::BTreeSet;

use anon_maci_circuits::{fr_to_bytes, Fr, HashBytes};
use codec::{Decode, Encode};

use crate::error::LedgerError;

/// Every nullifier consumed so far. Append-only.
#[derive(Clone, Debug, Default, Encode, Decode, Eq, PartialEq)]
pub struct NullifierSet
{
    consumed: BTreeSet<HashBytes>,
}

impl NullifierSet
{
    pub fn new() -> Self
    {
        NullifierSet::default()
    }

    pub fn contains(&self, nullifier: &Fr) -> bool
    {
        self.consumed.contains(&fr_to_bytes(nullifier))
    }

    pub fn len(&self) -> usize
    {
        self.consumed.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.consumed.is_empty()
    }

    pub fn insert(&mut self, nullifier: Fr) -> Result<(), LedgerError>
    {
        if !self.consumed.insert(fr_to_bytes(&nullifier)) { Err(LedgerError::DuplicateNullifier)? }
        Ok(())
    }

    /// Fails if any nullifier is already consumed or repeats within `batch`.
    pub fn check_batch(&self, batch: &[Fr]) -> Result<(), LedgerError>
    {
        let mut fresh = BTreeSet::new();
        for nullifier in batch
        {
            let bytes = fr_to_bytes(nullifier);
            if self.consumed.contains(&bytes) || !fresh.insert(bytes) { Err(LedgerError::DuplicateNullifier)? }
        }
        Ok(())
    }

    /// Inserts all of `batch`, or nothing if [`check_batch`](Self::check_batch) fails.
    pub fn insert_batch(&mut self, batch: &[Fr]) -> Result<(), LedgerError>
    {
        self.check_batch(batch)?;
        self.consumed.extend(batch.iter().map(fr_to_bytes));
        Ok(())
    }
}
