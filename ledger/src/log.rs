use anon_maci_circuits::message::chain_link;
use anon_maci_circuits::{fr_from_bytes, fr_to_bytes, CircuitError, Fr, HashBytes, Message};
use ark_ff::Zero;
use codec::{Decode, Encode};

use crate::error::LedgerError;

/// The hashes of every message published on one stream, in sequence order.
///
/// Message `seq` sits at position `seq - 1`. A batch covering
/// `start..start + count` must commit to exactly these hashes, in this order.
#[derive(Clone, Debug, Default, Encode, Decode, Eq, PartialEq)]
pub struct MessageLog
{
    hashes: Vec<HashBytes>,
}

impl MessageLog
{
    pub fn new() -> Self
    {
        MessageLog::default()
    }

    pub fn len(&self) -> u64
    {
        self.hashes.len() as u64
    }

    pub fn is_empty(&self) -> bool
    {
        self.hashes.is_empty()
    }

    /// The sequence number the next published message must carry.
    pub fn next_sequence(&self) -> u64
    {
        self.len() + 1
    }

    pub fn hash_at(&self, sequence: u64) -> Option<HashBytes>
    {
        let position = usize::try_from(sequence.checked_sub(1)?).ok()?;
        self.hashes.get(position).copied()
    }

    /// Appends `message`, returning its hash.
    pub fn append(&mut self, message: &Message) -> Result<HashBytes, LedgerError>
    {
        let expected = self.next_sequence();
        if message.sequence != expected
        {
            Err(LedgerError::SequenceMismatch { expected, found: message.sequence })?
        }
        if message.is_empty() { Err(LedgerError::EmptyMessage)? }

        let hash = fr_to_bytes(&message.hash().map_err(CircuitError::from)?);
        self.hashes.push(hash);
        Ok(hash)
    }

    /// The chain over `count` messages from `start`, as a batch proof binds it.
    pub fn chain(&self, start: u64, count: u64) -> Result<Fr, LedgerError>
    {
        let required = start.saturating_sub(1).saturating_add(count);
        if start == 0 || required > self.len()
        {
            Err(LedgerError::MessagesNotPublished { published: self.len(), required })?
        }

        let range = (start - 1) as usize..required as usize;
        self.hashes[range].iter().try_fold(Fr::zero(), |chain, bytes| -> Result<Fr, LedgerError> {
            let Some(hash) = fr_from_bytes(bytes)
            else {
                Err(LedgerError::Serialization("non-canonical message hash".to_string()))?
            };
            Ok(chain_link(chain, hash).map_err(CircuitError::from)?)
        })
    }
}
