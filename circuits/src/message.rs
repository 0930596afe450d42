use core::borrow::Borrow;

use ark_ff::Zero;
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{Namespace, SynthesisError};
use serde::{Deserialize, Serialize};

use crate::curve::Point;
use crate::hash::{poseidon_hash, PoseidonError, PoseidonGadget};
use crate::{fr_to_u64, Fr};

/// Payload elements carried by every message.
pub const PAYLOAD_LEN: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind
{
    Padding = 0,
    Vote = 1,
    KeyChange = 2,
    Deactivate = 3,
}

impl MessageKind
{
    pub fn as_fr(&self) -> Fr
    {
        Fr::from(*self as u64)
    }
}

/// A command against the state tree.
///
/// | kind         | payload                                   |
/// |--------------|-------------------------------------------|
/// | `Vote`       | `[stateIndex, option, weight, 0, 0]`      |
/// | `KeyChange`  | `[stateIndex, newX, newY, 0, 0]`          |
/// | `Deactivate` | `[stateIndex, keyX, keyY, status, nonce]` |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message
{
    pub kind: MessageKind,
    pub payload: [Fr; PAYLOAD_LEN],
    pub sequence: u64,
}

impl Default for Message
{
    fn default() -> Self
    {
        Message::padding()
    }
}

impl Message
{
    /// The canonical padding entry: every field zero.
    pub fn padding() -> Self
    {
        Message {
            kind: MessageKind::Padding,
            payload: [Fr::zero(); PAYLOAD_LEN],
            sequence: 0,
        }
    }

    pub fn vote(state_index: u64, option: u64, weight: u64, sequence: u64) -> Self
    {
        Message {
            kind: MessageKind::Vote,
            payload: [Fr::from(state_index), Fr::from(option), Fr::from(weight), Fr::zero(), Fr::zero()],
            sequence,
        }
    }

    pub fn key_change(state_index: u64, new_key: &Point, sequence: u64) -> Self
    {
        Message {
            kind: MessageKind::KeyChange,
            payload: [Fr::from(state_index), new_key.x, new_key.y, Fr::zero(), Fr::zero()],
            sequence,
        }
    }

    pub fn deactivate(state_index: u64, key: &Point, requested_status: u64, nonce: u64, sequence: u64) -> Self
    {
        Message {
            kind: MessageKind::Deactivate,
            payload: [Fr::from(state_index), key.x, key.y, Fr::from(requested_status), Fr::from(nonce)],
            sequence,
        }
    }

    /// True iff every payload element is zero.
    pub fn is_empty(&self) -> bool
    {
        self.payload.iter().all(Zero::is_zero)
    }

    pub fn is_canonical_padding(&self) -> bool
    {
        self.kind == MessageKind::Padding && self.sequence == 0 && self.is_empty()
    }

    pub fn state_index(&self) -> Option<u64>
    {
        fr_to_u64(&self.payload[0])
    }

    /// `Poseidon(kind, sequence, payload[0..5])`.
    pub fn hash(&self) -> Result<Fr, PoseidonError>
    {
        let mut inputs = Vec::with_capacity(PAYLOAD_LEN + 2);
        inputs.push(self.kind.as_fr());
        inputs.push(Fr::from(self.sequence));
        inputs.extend_from_slice(&self.payload);
        poseidon_hash(&inputs)
    }
}

/// One step of the chain: `Poseidon(chain, messageHash)`.
pub fn chain_link(chain: Fr, message_hash: Fr) -> Result<Fr, PoseidonError>
{
    poseidon_hash(&[chain, message_hash])
}

/// Folds messages into `chain_{k+1} = Poseidon(chain_k, hash(m_k))` from
/// `chain_0 = 0`.
pub fn chain_hash<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Result<Fr, PoseidonError>
{
    messages
        .into_iter()
        .try_fold(Fr::zero(), |chain, message| chain_link(chain, message.hash()?))
}

#[derive(Clone, Debug)]
pub struct MessageVar
{
    pub kind: FpVar<Fr>,
    pub sequence: FpVar<Fr>,
    pub payload: Vec<FpVar<Fr>>,
}

impl MessageVar
{
    pub fn hash(&self, hasher: &PoseidonGadget) -> Result<FpVar<Fr>, SynthesisError>
    {
        let mut inputs = Vec::with_capacity(PAYLOAD_LEN + 2);
        inputs.push(self.kind.clone());
        inputs.push(self.sequence.clone());
        inputs.extend(self.payload.iter().cloned());
        hasher.hash(&inputs)
    }

    /// The running product of per-element zero indicators over the whole
    /// payload, so any non-zero element makes the message non-empty.
    pub fn payload_is_empty(&self) -> Result<Boolean<Fr>, SynthesisError>
    {
        let mut empty = Boolean::TRUE;
        for element in &self.payload
        {
            empty = empty.and(&element.is_zero()?)?;
        }
        Ok(empty)
    }

    pub fn is_canonical_padding(&self) -> Result<Boolean<Fr>, SynthesisError>
    {
        Boolean::kary_and(&[
            self.kind.is_zero()?,
            self.sequence.is_zero()?,
            self.payload_is_empty()?,
        ])
    }
}

impl AllocVar<Message, Fr> for MessageVar
{
    fn new_variable<T: Borrow<Message>>(
        cs: impl Into<Namespace<Fr>>,
        f: impl FnOnce() -> Result<T, SynthesisError>,
        mode: AllocationMode,
    ) -> Result<Self, SynthesisError>
    {
        let ns = cs.into();
        let cs = ns.cs();
        let message = f().map(|m| *m.borrow());

        let kind = FpVar::new_variable(cs.clone(), || message.map(|m| m.kind.as_fr()), mode)?;
        let sequence = FpVar::new_variable(cs.clone(), || message.map(|m| Fr::from(m.sequence)), mode)?;
        let payload = (0..PAYLOAD_LEN)
            .map(|i| FpVar::new_variable(cs.clone(), || message.map(|m| m.payload[i]), mode))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MessageVar { kind, sequence, payload })
    }
}
