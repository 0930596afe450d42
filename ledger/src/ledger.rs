use anon_maci_circuits::{
    fr_from_bytes,
    fr_to_bytes,
    AddNewKeyCircuit,
    CircuitError,
    EncryptedCredential,
    Fr,
    HashBytes,
    MerkleTreeError,
    Message,
    MessageKind,
    Point,
    ProcessDeactivateCircuit,
    ProcessMessagesCircuit,
    ProtocolConfig,
    StateLeaf
};
use ark_ff::Zero;
use codec::{Decode, Encode};
use num_bigint::BigUint;
use tracing::{debug, info, warn};

use crate::accumulator::{AmortizedIncrementalMerkleTree, RegistrationTree};
use crate::backend::ProofBackend;
use crate::error::LedgerError;
use crate::keys::VerifyingKeys;
use crate::log::MessageLog;
use crate::nullifier::NullifierSet;

/// Where the ledger is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, Encode, Decode, Eq, PartialEq)]
pub enum Phase
{
    /// Keys may be registered; no batch may be accepted.
    #[default]
    Registration,

    /// The initial state root is fixed and batches are accepted.
    Processing,
}

/// Everything the ledger persists between submissions.
#[derive(Clone, Debug, Encode, Decode, Eq, PartialEq)]
pub struct LedgerState
{
    pub phase: Phase,

    /// The accumulator of registered state leaves.
    pub registrations: RegistrationTree,

    /// The current state tree root. Set once registrations are merged.
    pub state_root: Option<HashBytes>,

    /// Every nullifier consumed by a registration or a deactivation.
    pub nullifiers: NullifierSet,

    /// The sequence number the next message batch must start at.
    pub next_message_sequence: u64,

    /// The sequence number the next deactivation batch must start at.
    pub next_deactivation_sequence: u64,

    /// Published votes and key changes.
    pub messages: MessageLog,

    /// Published deactivation requests.
    pub deactivations: MessageLog,
}

impl LedgerState
{
    pub fn new(state_tree_depth: u8) -> Self
    {
        LedgerState {
            phase: Phase::Registration,
            registrations: RegistrationTree::new(state_tree_depth),
            state_root: None,
            nullifiers: NullifierSet::new(),
            next_message_sequence: 1,
            next_deactivation_sequence: 1,
            messages: MessageLog::new(),
            deactivations: MessageLog::new(),
        }
    }
}

/// A credential as big-endian coordinates.
#[derive(Clone, Copy, Debug, Encode, Decode, Eq, PartialEq)]
pub struct CredentialBytes
{
    pub c1: [HashBytes; 2],
    pub c2: [HashBytes; 2],
}

impl CredentialBytes
{
    pub fn new(credential: &EncryptedCredential) -> Self
    {
        CredentialBytes {
            c1: [fr_to_bytes(&credential.c1.x), fr_to_bytes(&credential.c1.y)],
            c2: [fr_to_bytes(&credential.c2.x), fr_to_bytes(&credential.c2.y)],
        }
    }

    /// `None` if any coordinate is not a canonical field element.
    pub fn to_credential(&self) -> Option<EncryptedCredential>
    {
        let point = |[x, y]: &[HashBytes; 2]| Some(Point::new(fr_from_bytes(x)?, fr_from_bytes(y)?));
        Some(EncryptedCredential { c1: point(&self.c1)?, c2: point(&self.c2)? })
    }
}

/// A record of an accepted action.
#[derive(Clone, Debug, Encode, Decode, Eq, PartialEq)]
pub enum LedgerEvent
{
    Registered
    {
        /// The leaf index the new key was assigned.
        index: u32,

        /// The nullifier the registration consumed.
        nullifier: HashBytes,

        /// The re-randomized credential the proof attests to.
        credential: CredentialBytes,
    },

    MessagePublished
    {
        sequence: u64,
        hash: HashBytes,
    },

    DeactivationPublished
    {
        sequence: u64,
        hash: HashBytes,
    },

    RegistrationsMerged
    {
        /// The initial state root.
        root: HashBytes,

        /// The number of registered leaves.
        count: u32,
    },

    MessagesAccepted
    {
        old_root: HashBytes,
        new_root: HashBytes,
        batch_size: u64,
        start_sequence: u64,
    },

    DeactivationsAccepted
    {
        old_root: HashBytes,
        new_root: HashBytes,

        /// The number of non-empty slots in the batch.
        processed: u64,
        start_sequence: u64,
    },
}

/// A registration together with its proof.
#[derive(Clone, Debug)]
pub struct KeySubmission<P>
{
    pub coordinator_public_key: Point,
    pub new_public_key: Point,
    pub credential: EncryptedCredential,
    pub action_counter: u64,
    pub nullifier: Fr,
    pub proof: P,
}

impl<P> KeySubmission<P>
{
    /// Takes the public inputs of `circuit`.
    pub fn new(circuit: &AddNewKeyCircuit, proof: P) -> Self
    {
        KeySubmission {
            coordinator_public_key: circuit.coordinator_public_key,
            new_public_key: circuit.new_public_key,
            credential: circuit.credential,
            action_counter: circuit.action_counter,
            nullifier: circuit.nullifier,
            proof,
        }
    }

    /// Must agree with [`AddNewKeyCircuit::public_inputs`].
    pub fn public_inputs(&self) -> Vec<Fr>
    {
        vec![
            self.coordinator_public_key.x,
            self.coordinator_public_key.y,
            self.new_public_key.x,
            self.new_public_key.y,
            self.credential.c1.x,
            self.credential.c1.y,
            self.credential.c2.x,
            self.credential.c2.y,
            Fr::from(self.action_counter),
            self.nullifier,
        ]
    }
}

/// A processed message batch together with its proof.
#[derive(Clone, Debug)]
pub struct MessageSubmission<P>
{
    pub old_root: Fr,
    pub new_root: Fr,
    pub batch_size: u64,
    pub start_sequence: u64,
    pub message_chain_hash: Fr,
    pub proof: P,
}

impl<P> MessageSubmission<P>
{
    pub fn new(circuit: &ProcessMessagesCircuit, proof: P) -> Self
    {
        MessageSubmission {
            old_root: circuit.old_root,
            new_root: circuit.new_root,
            batch_size: circuit.batch_size,
            start_sequence: circuit.start_sequence,
            message_chain_hash: circuit.message_chain_hash,
            proof,
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

/// A processed deactivation batch together with its proof.
#[derive(Clone, Debug)]
pub struct DeactivationSubmission<P>
{
    pub old_root: Fr,
    pub new_root: Fr,
    pub processed_count: u64,
    pub start_sequence: u64,
    pub message_chain_hash: Fr,

    /// One entry per slot; zero for empty slots.
    pub nullifiers: Vec<Fr>,
    pub proof: P,
}

impl<P> DeactivationSubmission<P>
{
    pub fn new(circuit: &ProcessDeactivateCircuit, proof: P) -> Self
    {
        DeactivationSubmission {
            old_root: circuit.old_root,
            new_root: circuit.new_root,
            processed_count: circuit.processed_count,
            start_sequence: circuit.start_sequence,
            message_chain_hash: circuit.message_chain_hash,
            nullifiers: circuit.nullifiers.clone(),
            proof,
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

    /// The nullifiers consumed by the batch.
    pub fn emitted_nullifiers(&self) -> Vec<Fr>
    {
        self.nullifiers.iter().filter(|nullifier| !nullifier.is_zero()).copied().collect()
    }
}

/// Accepts proofs against a single coordinator's deployment.
///
/// Every check runs before anything is written, so a rejected submission
/// leaves the ledger exactly as it was.
pub struct Ledger<B: ProofBackend>
{
    config: ProtocolConfig,
    coordinator_public_key: Point,
    backend: B,
    keys: VerifyingKeys<B::VerifyingKey>,
    state: LedgerState,
    events: Vec<LedgerEvent>,
}

fn decimal(bytes: &HashBytes) -> String
{
    BigUint::from_bytes_be(bytes).to_string()
}

fn logged<T>(action: &'static str, outcome: Result<T, LedgerError>) -> Result<T, LedgerError>
{
    if let Err(error) = &outcome
    {
        warn!(target: "anon_maci::ledger", action, %error, "rejected submission");
    }
    outcome
}

impl<B: ProofBackend> Ledger<B>
{
    pub fn new(
        config: ProtocolConfig,
        coordinator_public_key: Point,
        backend: B,
        keys: VerifyingKeys<B::VerifyingKey>,
    ) -> Result<Self, LedgerError>
    {
        config.validate()?;
        let state = LedgerState::new(config.state_tree_depth);

        Ok(Ledger { config, coordinator_public_key, backend, keys, state, events: Vec::new() })
    }

    /// Resumes a ledger from a [`snapshot`](Self::snapshot).
    pub fn restore(
        config: ProtocolConfig,
        coordinator_public_key: Point,
        backend: B,
        keys: VerifyingKeys<B::VerifyingKey>,
        snapshot: &[u8],
    ) -> Result<Self, LedgerError>
    {
        config.validate()?;
        let state = LedgerState::decode(&mut &snapshot[..])?;

        if state.registrations.full_depth != config.state_tree_depth
        {
            Err(CircuitError::InvalidConfig(format!(
                "snapshot depth {} does not match the configured {}",
                state.registrations.full_depth,
                config.state_tree_depth
            )))?
        }

        Ok(Ledger { config, coordinator_public_key, backend, keys, state, events: Vec::new() })
    }

    /// SCALE encoding of the persisted state.
    pub fn snapshot(&self) -> Vec<u8>
    {
        self.state.encode()
    }

    pub fn config(&self) -> &ProtocolConfig
    {
        &self.config
    }

    pub fn state(&self) -> &LedgerState
    {
        &self.state
    }

    pub fn phase(&self) -> Phase
    {
        self.state.phase
    }

    pub fn state_root(&self) -> Option<HashBytes>
    {
        self.state.state_root
    }

    pub fn nullifiers(&self) -> &NullifierSet
    {
        &self.state.nullifiers
    }

    pub fn events(&self) -> &[LedgerEvent]
    {
        &self.events
    }

    /// Drains the events recorded so far.
    pub fn take_events(&mut self) -> Vec<LedgerEvent>
    {
        std::mem::take(&mut self.events)
    }

    /// Registers a new key, returning its leaf index.
    pub fn register(&mut self, submission: &KeySubmission<B::Proof>) -> Result<u32, LedgerError>
    {
        let outcome = self.try_register(submission);
        logged("register", outcome)
    }

    fn try_register(&mut self, submission: &KeySubmission<B::Proof>) -> Result<u32, LedgerError>
    {
        if self.state.phase != Phase::Registration { Err(LedgerError::RegistrationClosed)? }

        if submission.coordinator_public_key != self.coordinator_public_key
        {
            Err(LedgerError::CoordinatorKeyMismatch)?
        }
        if self.state.nullifiers.contains(&submission.nullifier) { Err(LedgerError::DuplicateNullifier)? }

        let inputs = submission.public_inputs();
        if !self.backend.verify(&self.keys.add_new_key, &submission.proof, &inputs)?
        {
            Err(LedgerError::InvalidProof)?
        }

        let leaf = StateLeaf::new(submission.new_public_key, self.config.initial_credit_balance)
            .hash()
            .map_err(CircuitError::from)?;
        let registrations = self.state.registrations.clone().insert(fr_to_bytes(&leaf))?;

        self.state.nullifiers.insert(submission.nullifier)?;
        self.state.registrations = registrations;

        let index = self.state.registrations.count - 1;
        let nullifier = fr_to_bytes(&submission.nullifier);
        let credential = CredentialBytes::new(&submission.credential);
        self.events.push(LedgerEvent::Registered { index, nullifier, credential });

        info!(target: "anon_maci::ledger", index, "registered key");
        Ok(index)
    }

    /// Closes registration and fixes the initial state root, with every
    /// unregistered leaf zero.
    pub fn merge_registrations(&mut self) -> Result<HashBytes, LedgerError>
    {
        let outcome = self.try_merge_registrations();
        logged("merge_registrations", outcome)
    }

    fn try_merge_registrations(&mut self) -> Result<HashBytes, LedgerError>
    {
        if self.state.phase != Phase::Registration { Err(LedgerError::RegistrationClosed)? }

        // A tree filled to capacity has already computed its root.
        let registrations = match self.state.registrations.root
        {
            Some(_) => self.state.registrations.clone(),
            None => self.state.registrations.clone().merge()?,
        };
        let Some(root) = registrations.root else { Err(MerkleTreeError::MergeFailed)? };

        let count = registrations.count;
        self.state.registrations = registrations;
        self.state.state_root = Some(root);
        self.state.phase = Phase::Processing;
        self.events.push(LedgerEvent::RegistrationsMerged { root, count });

        info!(target: "anon_maci::ledger", count, root = %decimal(&root), "merged registrations");
        Ok(root)
    }

    /// Publishes a vote or key change, returning its sequence number.
    pub fn publish_message(&mut self, message: &Message) -> Result<u64, LedgerError>
    {
        let outcome = self.try_publish(message, false);
        logged("publish_message", outcome)
    }

    /// Publishes a deactivation request, returning its sequence number.
    pub fn publish_deactivation(&mut self, message: &Message) -> Result<u64, LedgerError>
    {
        let outcome = self.try_publish(message, true);
        logged("publish_deactivation", outcome)
    }

    fn try_publish(&mut self, message: &Message, deactivation: bool) -> Result<u64, LedgerError>
    {
        let on_stream = match message.kind
        {
            MessageKind::Vote | MessageKind::KeyChange => !deactivation,
            MessageKind::Deactivate => deactivation,
            MessageKind::Padding => false,
        };
        if !on_stream { Err(LedgerError::WrongStream(message.kind))? }

        let (log, stream) = if deactivation
        {
            (&mut self.state.deactivations, "deactivation")
        }
        else
        {
            (&mut self.state.messages, "message")
        };
        let hash = log.append(message)?;

        let sequence = message.sequence;
        self.events.push(if deactivation
        {
            LedgerEvent::DeactivationPublished { sequence, hash }
        }
        else
        {
            LedgerEvent::MessagePublished { sequence, hash }
        });

        debug!(target: "anon_maci::ledger", stream, sequence, "published message");
        Ok(sequence)
    }

    /// Checks that a batch commits to the published messages of its range.
    fn check_chain(log: &MessageLog, start: u64, count: u64, claimed: &Fr) -> Result<(), LedgerError>
    {
        let expected = log.chain(start, count)?;
        if expected != *claimed
        {
            Err(LedgerError::ChainMismatch {
                expected: decimal(&fr_to_bytes(&expected)),
                found: decimal(&fr_to_bytes(claimed)),
            })?
        }
        Ok(())
    }

    fn current_root(&self, claimed: &Fr) -> Result<HashBytes, LedgerError>
    {
        if self.state.phase != Phase::Processing { Err(LedgerError::RegistrationsNotMerged)? }
        let Some(current) = self.state.state_root else { Err(LedgerError::RegistrationsNotMerged)? };

        let claimed = fr_to_bytes(claimed);
        if claimed != current
        {
            Err(LedgerError::StaleRoot { expected: decimal(&current), found: decimal(&claimed) })?
        }
        Ok(current)
    }

    /// Applies a proven message batch.
    pub fn accept_messages(&mut self, submission: &MessageSubmission<B::Proof>) -> Result<(), LedgerError>
    {
        let outcome = self.try_accept_messages(submission);
        logged("accept_messages", outcome)
    }

    fn try_accept_messages(&mut self, submission: &MessageSubmission<B::Proof>) -> Result<(), LedgerError>
    {
        let old_root = self.current_root(&submission.old_root)?;

        let expected = self.state.next_message_sequence;
        if submission.start_sequence != expected
        {
            Err(LedgerError::SequenceMismatch { expected, found: submission.start_sequence })?
        }

        let capacity = self.config.max_batch_size;
        let size = usize::try_from(submission.batch_size).unwrap_or(usize::MAX);
        if size == 0 || size > capacity { Err(CircuitError::BatchSizeViolation { size, capacity })? }

        Self::check_chain(&self.state.messages, expected, submission.batch_size, &submission.message_chain_hash)?;

        let inputs = submission.public_inputs();
        if !self.backend.verify(&self.keys.process_messages, &submission.proof, &inputs)?
        {
            Err(LedgerError::InvalidProof)?
        }

        let new_root = fr_to_bytes(&submission.new_root);
        self.state.state_root = Some(new_root);
        self.state.next_message_sequence = expected.saturating_add(submission.batch_size);
        self.events.push(LedgerEvent::MessagesAccepted {
            old_root,
            new_root,
            batch_size: submission.batch_size,
            start_sequence: submission.start_sequence,
        });

        info!(
            target: "anon_maci::ledger",
            sequence = submission.start_sequence,
            batch_size = submission.batch_size,
            root = %decimal(&new_root),
            "accepted message batch"
        );
        Ok(())
    }

    /// Applies a proven deactivation batch and consumes its nullifiers.
    pub fn accept_deactivations(&mut self, submission: &DeactivationSubmission<B::Proof>) -> Result<(), LedgerError>
    {
        let outcome = self.try_accept_deactivations(submission);
        logged("accept_deactivations", outcome)
    }

    fn try_accept_deactivations(&mut self, submission: &DeactivationSubmission<B::Proof>) -> Result<(), LedgerError>
    {
        let old_root = self.current_root(&submission.old_root)?;

        let expected = self.state.next_deactivation_sequence;
        if submission.start_sequence != expected
        {
            Err(LedgerError::SequenceMismatch { expected, found: submission.start_sequence })?
        }

        let capacity = self.config.max_batch_size;
        if submission.nullifiers.len() != capacity
        {
            Err(CircuitError::BatchSizeViolation { size: submission.nullifiers.len(), capacity })?
        }
        let processed = usize::try_from(submission.processed_count).unwrap_or(usize::MAX);
        if processed > capacity { Err(CircuitError::BatchSizeViolation { size: processed, capacity })? }

        Self::check_chain(
            &self.state.deactivations,
            expected,
            submission.processed_count,
            &submission.message_chain_hash,
        )?;

        let emitted = submission.emitted_nullifiers();
        self.state.nullifiers.check_batch(&emitted)?;

        let inputs = submission.public_inputs();
        if !self.backend.verify(&self.keys.process_deactivate, &submission.proof, &inputs)?
        {
            Err(LedgerError::InvalidProof)?
        }

        self.state.nullifiers.insert_batch(&emitted)?;

        let new_root = fr_to_bytes(&submission.new_root);
        self.state.state_root = Some(new_root);
        self.state.next_deactivation_sequence = expected.saturating_add(submission.processed_count);
        self.events.push(LedgerEvent::DeactivationsAccepted {
            old_root,
            new_root,
            processed: submission.processed_count,
            start_sequence: submission.start_sequence,
        });

        info!(
            target: "anon_maci::ledger",
            sequence = submission.start_sequence,
            processed = submission.processed_count,
            root = %decimal(&new_root),
            "accepted deactivation batch"
        );
        Ok(())
    }
}
