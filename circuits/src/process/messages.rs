use ark_ff::{One, Zero};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::ns;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use tracing::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::curve::{Point, PointVar};
use crate::error::{describe, CircuitError};
use crate::hash::PoseidonGadgets;
use crate::message::{chain_hash, Message, MessageKind, MessageVar};
use crate::process::{check_constraints, BatchStatus};
use crate::state::{MerklePathVar, MerkleProof, StateLeaf, StateLeafVar, StateTree};
use crate::validator::{enforce_bit_length, subgroup_check, subgroup_check_var};
use crate::{fr_to_u64, Fr};

/// Credit balances and vote weights are `u64`.
const CREDIT_BITS: u32 = 64;

/// Sequence numbers are `u64`.
const SEQUENCE_BITS: u32 = 64;

/// A fixed-capacity batch: `batch_size` real messages followed by padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch
{
    pub slots: Vec<Message>,
    pub batch_size: usize,
    pub start_sequence: u64,
}

impl Batch
{
    /// Pads `messages` with canonical padding up to `capacity`.
    pub fn new(messages: Vec<Message>, capacity: usize, start_sequence: u64) -> Self
    {
        let batch_size = messages.len();
        let mut slots = messages;
        if slots.len() < capacity { slots.resize(capacity, Message::padding()); }
        Batch { slots, batch_size, start_sequence }
    }

    /// The real messages, in order.
    pub fn messages(&self) -> &[Message]
    {
        &self.slots[..self.batch_size.min(self.slots.len())]
    }
}

/// One slot of the witness: the message and the leaf it targets as it was
/// before the message was applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageSlot
{
    pub message: Message,
    pub leaf: StateLeaf,
    pub proof: MerkleProof,
}

impl MessageSlot
{
    pub fn padding(depth: u8) -> Self
    {
        MessageSlot {
            message: Message::padding(),
            leaf: StateLeaf::default(),
            proof: MerkleProof::empty(depth),
        }
    }
}

/// `processMessages`. Public inputs in order: `oldRoot, newRoot, batchSize,
/// startSequence, messageChainHash`.
#[derive(Clone, Debug)]
pub struct ProcessMessagesCircuit
{
    pub config: ProtocolConfig,
    pub old_root: Fr,
    pub new_root: Fr,
    pub batch_size: u64,
    pub start_sequence: u64,
    pub message_chain_hash: Fr,
    pub slots: Vec<MessageSlot>,
}

impl ProcessMessagesCircuit
{
    /// A circuit of the right shape for key generation.
    pub fn blank(config: &ProtocolConfig) -> Self
    {
        ProcessMessagesCircuit {
            config: config.clone(),
            old_root: Fr::zero(),
            new_root: Fr::zero(),
            batch_size: 0,
            start_sequence: 0,
            message_chain_hash: Fr::zero(),
            slots: vec![MessageSlot::padding(config.state_tree_depth); config.max_batch_size],
        }
    }

    pub fn public_inputs(&self) -> Vec<Fr>
    {
        vec![
            self.old_root,
            self.new_root,
            Fr::from(self.batch_size),
            Fr::from(self.start_sequence),
            self.message_chain_hash,
        ]
    }
}

impl ConstraintSynthesizer<Fr> for ProcessMessagesCircuit
{
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError>
    {
        if self.slots.len() != self.config.max_batch_size { return Err(SynthesisError::Unsatisfiable); }

        let hashers = PoseidonGadgets::new()?;

        let old_root = FpVar::new_input(ns!(cs, "old_root"), || Ok(self.old_root))?;
        let new_root = FpVar::new_input(ns!(cs, "new_root"), || Ok(self.new_root))?;
        let batch_size = FpVar::new_input(ns!(cs, "batch_size"), || Ok(Fr::from(self.batch_size)))?;
        let start_sequence = FpVar::new_input(ns!(cs, "start_sequence"), || Ok(Fr::from(self.start_sequence)))?;
        let message_chain_hash = FpVar::new_input(ns!(cs, "message_chain_hash"), || Ok(self.message_chain_hash))?;

        let vote_kind = FpVar::constant(MessageKind::Vote.as_fr());
        let key_change_kind = FpVar::constant(MessageKind::KeyChange.as_fr());

        let mut running_root = old_root;
        let mut chain = FpVar::zero();
        let mut real_count = FpVar::zero();
        let mut previous_real = Boolean::TRUE;

        for (i, slot) in self.slots.iter().enumerate()
        {
            // Real slots form a non-empty prefix whose length is the batch size.
            let real = Boolean::new_witness(ns!(cs, "real"), || Ok((i as u64) < self.batch_size))?;
            if i == 0
            {
                real.enforce_equal(&Boolean::TRUE)?;
            }
            else
            {
                previous_real.conditional_enforce_equal(&Boolean::TRUE, &real)?;
            }
            real_count += FpVar::from(real.clone());

            let message = MessageVar::new_witness(ns!(cs, "message"), || Ok(slot.message))?;
            message.is_canonical_padding()?.conditional_enforce_equal(&Boolean::TRUE, &real.not())?;

            let expected_sequence = &start_sequence + Fr::from(i as u64);
            message.sequence.conditional_enforce_equal(&expected_sequence, &real)?;

            let is_vote = message.kind.is_eq(&vote_kind)?;
            let is_key_change = message.kind.is_eq(&key_change_kind)?;
            is_vote.or(&is_key_change)?.conditional_enforce_equal(&Boolean::TRUE, &real)?;
            let vote = real.and(&is_vote)?;
            let key_change = real.and(&is_key_change)?;

            // Votes and key changes leave the last two payload elements zero.
            message.payload[3].conditional_enforce_equal(&FpVar::zero(), &real)?;
            message.payload[4].conditional_enforce_equal(&FpVar::zero(), &real)?;

            // Open the target leaf against the running root.
            let leaf = StateLeafVar::new_witness(ns!(cs, "leaf"), || Ok(slot.leaf))?;
            let path = MerklePathVar::new_witness(ns!(cs, "path"), || Ok(slot.proof.clone()))?;
            if path.siblings.len() != usize::from(self.config.state_tree_depth) { return Err(SynthesisError::Unsatisfiable); }

            let opened = path.compute_root(&leaf.hash(&hashers.five)?, &hashers.two)?;
            opened.conditional_enforce_equal(&running_root, &real)?;
            path.index().conditional_enforce_equal(&message.payload[0], &real)?;
            leaf.deactivated.conditional_enforce_equal(&Boolean::FALSE, &real)?;

            // sequence > lastUpdateSeq
            let gap = &message.sequence - &leaf.last_update_seq - Fr::one();
            enforce_bit_length(&real.select(&gap, &FpVar::zero())?, SEQUENCE_BITS)?;

            // weight <= creditBalance
            let weight = &message.payload[2];
            let remaining = &leaf.credit_balance - weight;
            enforce_bit_length(&vote.select(weight, &FpVar::zero())?, CREDIT_BITS)?;
            enforce_bit_length(&vote.select(&remaining, &FpVar::zero())?, CREDIT_BITS)?;

            let new_key = PointVar::new(message.payload[1].clone(), message.payload[2].clone());
            subgroup_check_var(&new_key)?.conditional_enforce_equal(&Boolean::TRUE, &key_change)?;

            let updated = StateLeafVar {
                public_key: PointVar::conditionally_select(&key_change, &new_key, &leaf.public_key)?,
                credit_balance: vote.select(&remaining, &leaf.credit_balance)?,
                deactivated: leaf.deactivated.clone(),
                last_update_seq: real.select(&message.sequence, &leaf.last_update_seq)?,
            };
            let rewritten = path.compute_root(&updated.hash(&hashers.five)?, &hashers.two)?;
            running_root = real.select(&rewritten, &running_root)?;

            let linked = hashers.two.hash(&[chain.clone(), message.hash(&hashers.seven)?])?;
            chain = real.select(&linked, &chain)?;

            previous_real = real;
        }

        real_count.enforce_equal(&batch_size)?;
        running_root.enforce_equal(&new_root)?;
        chain.enforce_equal(&message_chain_hash)?;

        Ok(())
    }
}

/// Applies vote and key-change batches to the state tree.
pub struct MessageBatchProcessor
{
    config: ProtocolConfig,
}

impl MessageBatchProcessor
{
    pub fn new(config: ProtocolConfig) -> Result<Self, CircuitError>
    {
        config.validate()?;
        Ok(MessageBatchProcessor { config })
    }

    pub fn config(&self) -> &ProtocolConfig
    {
        &self.config
    }

    /// Builds the witness for `batch` against `tree`, returning the circuit
    /// and the tree after the batch. `tree` itself is left untouched.
    pub fn prepare(
        &self,
        tree: &StateTree,
        batch: &Batch,
    ) -> Result<(ProcessMessagesCircuit, StateTree), CircuitError>
    {
        let capacity = self.config.max_batch_size;
        let depth = self.config.state_tree_depth;

        if tree.depth() != depth
        {
            Err(CircuitError::InvalidConfig(format!(
                "state tree depth {} does not match the configured {}",
                tree.depth(),
                depth
            )))?
        }

        // Check that the batch is non-empty and fills exactly the fixed slot count.
        if batch.batch_size == 0 || batch.batch_size > capacity
        {
            Err(CircuitError::BatchSizeViolation { size: batch.batch_size, capacity })?
        }
        if batch.slots.len() != capacity
        {
            Err(CircuitError::BatchSizeViolation { size: batch.slots.len(), capacity })?
        }

        let mut working = tree.clone();
        let old_root = working.root();
        let mut slots = Vec::with_capacity(capacity);

        for (i, message) in batch.slots.iter().enumerate()
        {
            if i >= batch.batch_size
            {
                // Check that the padding is canonical.
                if !message.is_canonical_padding() { Err(CircuitError::MalformedPadding { slot: i })? }
                slots.push(MessageSlot::padding(depth));
                continue;
            }

            // Check that the message is next in sequence.
            let expected = batch.start_sequence.saturating_add(i as u64);
            if message.sequence != expected
            {
                Err(CircuitError::SequenceViolation { slot: i, expected, found: message.sequence })?
            }

            if !matches!(message.kind, MessageKind::Vote | MessageKind::KeyChange)
            {
                Err(CircuitError::UnsupportedMessage { slot: i })?
            }
            if message.payload[3..].iter().any(|element| !element.is_zero())
            {
                Err(CircuitError::MalformedMessage { slot: i })?
            }

            let Some((index, leaf)) = message
                .state_index()
                .and_then(|index| working.leaf(index).map(|leaf| (index, *leaf)))
            else {
                Err(CircuitError::UnknownLeaf { slot: i, index: describe(&message.payload[0]) })?
            };

            if leaf.deactivated { Err(CircuitError::DeactivatedLeaf { slot: i })? }

            // Check that the message is newer than the last one applied to the leaf.
            if message.sequence <= leaf.last_update_seq
            {
                Err(CircuitError::SequenceViolation {
                    slot: i,
                    expected: leaf.last_update_seq.saturating_add(1),
                    found: message.sequence,
                })?
            }

            let mut updated = leaf;
            if message.kind == MessageKind::Vote
            {
                let Some(weight) = fr_to_u64(&message.payload[2]).filter(|w| *w <= leaf.credit_balance)
                else { Err(CircuitError::InsufficientCredits { slot: i })? };
                updated.credit_balance -= weight;
            }
            else
            {
                let new_key = Point::new(message.payload[1], message.payload[2]);
                if !subgroup_check(&new_key) { Err(CircuitError::InvalidPoint("new public key"))? }
                updated.public_key = new_key;
            }
            updated.last_update_seq = message.sequence;

            let proof = working.proof(index)?;
            working.update(index, updated)?;
            slots.push(MessageSlot { message: *message, leaf, proof });

            debug!(target: "anon_maci::process", slot = i, sequence = message.sequence, index, "applied message");
        }

        let circuit = ProcessMessagesCircuit {
            config: self.config.clone(),
            old_root,
            new_root: working.root(),
            batch_size: batch.batch_size as u64,
            start_sequence: batch.start_sequence,
            message_chain_hash: chain_hash(batch.messages())?,
            slots,
        };

        Ok((circuit, working))
    }

    /// Like [`prepare`](Self::prepare), but commits the new tree.
    pub fn process(&self, tree: &mut StateTree, batch: &Batch) -> Result<ProcessMessagesCircuit, CircuitError>
    {
        let (circuit, next) = self.prepare(tree, batch)?;
        *tree = next;
        Ok(circuit)
    }

    /// Processes `batch` and checks the resulting witness against the
    /// constraints. The tree is only updated when the batch is verified.
    pub fn run(&self, tree: &mut StateTree, batch: &Batch) -> BatchStatus
    {
        let old_root = tree.root();
        let outcome = self.prepare(tree, batch).and_then(|(circuit, next)| {
            check_constraints(circuit)?;
            Ok(next)
        });

        match outcome
        {
            Ok(next) =>
            {
                let new_root = next.root();
                *tree = next;
                info!(target: "anon_maci::process", batch_size = batch.batch_size, root = %new_root, "message batch verified");
                BatchStatus::Verified { old_root, new_root }
            }
            Err(error) =>
            {
                warn!(target: "anon_maci::process", %error, "message batch rejected");
                BatchStatus::Rejected(error)
            }
        }
    }
}
