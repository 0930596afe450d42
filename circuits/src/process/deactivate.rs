use std::collections::BTreeSet;

use ark_ff::Zero;
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
use crate::nullifier::{deactivation_nullifier, enforce_distinct, nullifier_var, DEACTIVATION_TAG};
use crate::process::{check_constraints, BatchStatus};
use crate::state::{transition_allowed, transition_allowed_var, MerklePathVar, MerkleProof, StateLeaf, StateLeafVar, StateTree};
use crate::Fr;

/// A fixed-capacity deactivation batch. Slots with an all-zero payload are
/// empty; every other slot is a real request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeactivationBatch
{
    pub slots: Vec<Message>,
    pub start_sequence: u64,
}

impl DeactivationBatch
{
    pub fn new(messages: Vec<Message>, capacity: usize, start_sequence: u64) -> Self
    {
        let mut slots = messages;
        if slots.len() < capacity { slots.resize(capacity, Message::padding()); }
        DeactivationBatch { slots, start_sequence }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeactivationSlot
{
    pub message: Message,

    /// The target leaf before the request was applied.
    pub leaf: StateLeaf,

    pub proof: MerkleProof,

    /// The prover's claim that the transition is allowed.
    pub valid: bool,
}

impl DeactivationSlot
{
    pub fn empty(depth: u8) -> Self
    {
        DeactivationSlot {
            message: Message::padding(),
            leaf: StateLeaf::default(),
            proof: MerkleProof::empty(depth),
            valid: false,
        }
    }
}

/// `processDeactivate`. Public inputs in order: `oldRoot, newRoot,
/// processedCount, startSequence, messageChainHash, nullifier[..]`, with a
/// zero nullifier for every empty slot.
#[derive(Clone, Debug)]
pub struct ProcessDeactivateCircuit
{
    pub config: ProtocolConfig,
    pub old_root: Fr,
    pub new_root: Fr,
    pub processed_count: u64,
    pub start_sequence: u64,
    pub message_chain_hash: Fr,
    pub nullifiers: Vec<Fr>,
    pub slots: Vec<DeactivationSlot>,
}

impl ProcessDeactivateCircuit
{
    pub fn blank(config: &ProtocolConfig) -> Self
    {
        ProcessDeactivateCircuit {
            config: config.clone(),
            old_root: Fr::zero(),
            new_root: Fr::zero(),
            processed_count: 0,
            start_sequence: 0,
            message_chain_hash: Fr::zero(),
            nullifiers: vec![Fr::zero(); config.max_batch_size],
            slots: vec![DeactivationSlot::empty(config.state_tree_depth); config.max_batch_size],
        }
    }

    pub fn public_inputs(&self) -> Vec<Fr>
    {
        let mut inputs = vec![
            self.old_root,
            self.new_root,
            Fr::from(self.processed_count),
            Fr::from(self.start_sequence),
            self.message_chain_hash,
        ];
        inputs.extend_from_slice(&self.nullifiers);
        inputs
    }

    /// The nullifiers of real slots.
    pub fn emitted_nullifiers(&self) -> Vec<Fr>
    {
        self.slots
            .iter()
            .zip(&self.nullifiers)
            .filter(|(slot, _)| !slot.message.is_empty())
            .map(|(_, nullifier)| *nullifier)
            .collect()
    }
}

impl ConstraintSynthesizer<Fr> for ProcessDeactivateCircuit
{
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError>
    {
        let capacity = self.config.max_batch_size;
        if self.slots.len() != capacity || self.nullifiers.len() != capacity
        {
            return Err(SynthesisError::Unsatisfiable);
        }

        let hashers = PoseidonGadgets::new()?;

        let old_root = FpVar::new_input(ns!(cs, "old_root"), || Ok(self.old_root))?;
        let new_root = FpVar::new_input(ns!(cs, "new_root"), || Ok(self.new_root))?;
        let processed_count = FpVar::new_input(ns!(cs, "processed_count"), || Ok(Fr::from(self.processed_count)))?;
        let start_sequence = FpVar::new_input(ns!(cs, "start_sequence"), || Ok(Fr::from(self.start_sequence)))?;
        let message_chain_hash = FpVar::new_input(ns!(cs, "message_chain_hash"), || Ok(self.message_chain_hash))?;
        let public_nullifiers = self
            .nullifiers
            .iter()
            .map(|n| FpVar::new_input(ns!(cs, "nullifier"), || Ok(*n)))
            .collect::<Result<Vec<_>, _>>()?;

        let deactivate_kind = FpVar::constant(MessageKind::Deactivate.as_fr());

        let mut running_root = old_root;
        let mut chain = FpVar::zero();
        let mut next_sequence = start_sequence;
        let mut processed = FpVar::zero();
        let mut computed_nullifiers = Vec::with_capacity(capacity);
        let mut active = Vec::with_capacity(capacity);

        for (slot, public_nullifier) in self.slots.iter().zip(&public_nullifiers)
        {
            let message = MessageVar::new_witness(ns!(cs, "message"), || Ok(slot.message))?;

            // Empty slots are canonical no-ops; anything else is a real request.
            let empty = message.payload_is_empty()?;
            let real = empty.not();
            message.kind.conditional_enforce_equal(&FpVar::zero(), &empty)?;
            message.sequence.conditional_enforce_equal(&FpVar::zero(), &empty)?;
            message.kind.conditional_enforce_equal(&deactivate_kind, &real)?;
            message.sequence.conditional_enforce_equal(&next_sequence, &real)?;
            next_sequence += FpVar::from(real.clone());
            processed += FpVar::from(real.clone());

            let leaf = StateLeafVar::new_witness(ns!(cs, "leaf"), || Ok(slot.leaf))?;
            let path = MerklePathVar::new_witness(ns!(cs, "path"), || Ok(slot.proof.clone()))?;
            if path.siblings.len() != usize::from(self.config.state_tree_depth) { return Err(SynthesisError::Unsatisfiable); }

            let opened = path.compute_root(&leaf.hash(&hashers.five)?, &hashers.two)?;
            opened.conditional_enforce_equal(&running_root, &real)?;
            path.index().conditional_enforce_equal(&message.payload[0], &real)?;

            let key = PointVar::new(message.payload[1].clone(), message.payload[2].clone());
            leaf.public_key.conditional_enforce_equal(&key, &real)?;

            // The table decides, and the prover's claim must agree with it.
            let allowed = transition_allowed_var(&leaf.deactivated, &message.payload[3])?;
            let valid = Boolean::new_witness(ns!(cs, "valid"), || Ok(slot.valid))?;
            valid.conditional_enforce_equal(&Boolean::TRUE, &real)?;
            allowed.conditional_enforce_equal(&valid, &real)?;

            let updated = StateLeafVar {
                public_key: leaf.public_key.clone(),
                credit_balance: leaf.credit_balance.clone(),
                deactivated: Boolean::TRUE,
                last_update_seq: message.sequence.clone(),
            };
            let rewritten = path.compute_root(&updated.hash(&hashers.five)?, &hashers.two)?;
            running_root = real.select(&rewritten, &running_root)?;

            let nullifier = nullifier_var(&hashers.four, DEACTIVATION_TAG, &key, &message.payload[4])?;
            real.select(&nullifier, &FpVar::zero())?.enforce_equal(public_nullifier)?;

            let linked = hashers.two.hash(&[chain.clone(), message.hash(&hashers.seven)?])?;
            chain = real.select(&linked, &chain)?;

            computed_nullifiers.push(nullifier);
            active.push(real);
        }

        enforce_distinct(&computed_nullifiers, &active)?;

        processed.enforce_equal(&processed_count)?;
        running_root.enforce_equal(&new_root)?;
        chain.enforce_equal(&message_chain_hash)?;

        Ok(())
    }
}

/// Applies deactivation batches to the state tree.
pub struct DeactivationProcessor
{
    config: ProtocolConfig,
}

impl DeactivationProcessor
{
    pub fn new(config: ProtocolConfig) -> Result<Self, CircuitError>
    {
        config.validate()?;
        Ok(DeactivationProcessor { config })
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
        batch: &DeactivationBatch,
    ) -> Result<(ProcessDeactivateCircuit, StateTree), CircuitError>
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
        if batch.slots.len() != capacity
        {
            Err(CircuitError::BatchSizeViolation { size: batch.slots.len(), capacity })?
        }

        let mut working = tree.clone();
        let old_root = working.root();
        let mut next_sequence = batch.start_sequence;
        let mut seen = BTreeSet::new();
        let mut slots = Vec::with_capacity(capacity);
        let mut nullifiers = Vec::with_capacity(capacity);
        let mut real_messages = Vec::new();

        for (i, message) in batch.slots.iter().enumerate()
        {
            if message.is_empty()
            {
                if !message.is_canonical_padding() { Err(CircuitError::MalformedPadding { slot: i })? }
                slots.push(DeactivationSlot::empty(depth));
                nullifiers.push(Fr::zero());
                continue;
            }

            if message.kind != MessageKind::Deactivate { Err(CircuitError::UnsupportedMessage { slot: i })? }

            if message.sequence != next_sequence
            {
                Err(CircuitError::SequenceViolation { slot: i, expected: next_sequence, found: message.sequence })?
            }

            let Some((index, leaf)) = message
                .state_index()
                .and_then(|index| working.leaf(index).map(|leaf| (index, *leaf)))
            else {
                Err(CircuitError::UnknownLeaf { slot: i, index: describe(&message.payload[0]) })?
            };

            // Check that the request names the leaf's current key.
            let key = Point::new(message.payload[1], message.payload[2]);
            if key != leaf.public_key { Err(CircuitError::KeyMismatch { slot: i })? }

            let requested = message.payload[3];
            if !transition_allowed(leaf.status(), &requested)
            {
                Err(CircuitError::IllegalTransition { slot: i, from: leaf.status(), to: describe(&requested) })?
            }

            let nullifier = deactivation_nullifier(&key, message.payload[4])?;
            if !seen.insert(nullifier) { Err(CircuitError::DuplicateNullifier)? }

            let proof = working.proof(index)?;
            let updated = StateLeaf {
                deactivated: true,
                last_update_seq: message.sequence,
                ..leaf
            };
            working.update(index, updated)?;

            slots.push(DeactivationSlot { message: *message, leaf, proof, valid: true });
            nullifiers.push(nullifier);
            real_messages.push(*message);
            next_sequence = next_sequence.saturating_add(1);

            debug!(target: "anon_maci::process", slot = i, sequence = message.sequence, index, "applied deactivation");
        }

        let circuit = ProcessDeactivateCircuit {
            config: self.config.clone(),
            old_root,
            new_root: working.root(),
            processed_count: real_messages.len() as u64,
            start_sequence: batch.start_sequence,
            message_chain_hash: chain_hash(&real_messages)?,
            nullifiers,
            slots,
        };

        Ok((circuit, working))
    }

    /// Like [`prepare`](Self::prepare), but commits the new tree.
    pub fn process(&self, tree: &mut StateTree, batch: &DeactivationBatch) -> Result<ProcessDeactivateCircuit, CircuitError>
    {
        let (circuit, next) = self.prepare(tree, batch)?;
        *tree = next;
        Ok(circuit)
    }

    /// Processes `batch` and checks the resulting witness against the
    /// constraints. The tree is only updated when the batch is verified.
    pub fn run(&self, tree: &mut StateTree, batch: &DeactivationBatch) -> BatchStatus
    {
        let old_root = tree.root();
        let outcome = self.prepare(tree, batch).and_then(|(circuit, next)| {
            let processed = circuit.processed_count;
            check_constraints(circuit)?;
            Ok((next, processed))
        });

        match outcome
        {
            Ok((next, processed)) =>
            {
                let new_root = next.root();
                *tree = next;
                info!(target: "anon_maci::process", processed, root = %new_root, "deactivation batch verified");
                BatchStatus::Verified { old_root, new_root }
            }
            Err(error) =>
            {
                warn!(target: "anon_maci::process", %error, "deactivation batch rejected");
                BatchStatus::Rejected(error)
            }
        }
    }
}
