use super::utils::{public_key, registered_tree, small_config};
use crate::curve::Point;
use crate::message::{chain_hash, Message};
use crate::process::{check_constraints, Batch, BatchStatus, MessageBatchProcessor};
use crate::state::{LeafStatus, StateLeaf};
use crate::{CircuitError, Fr, ProtocolConfig};

fn processor() -> MessageBatchProcessor
{
    MessageBatchProcessor::new(small_config()).unwrap()
}

fn batch(messages: Vec<Message>, start_sequence: u64) -> Batch
{
    Batch::new(messages, small_config().max_batch_size, start_sequence)
}

#[test]
fn vote_debits_credits()
{
    let processor = processor();
    let mut tree = registered_tree(processor.config(), &[1, 2]);
    let old_root = tree.root();

    let status = processor.run(&mut tree, &batch(vec![Message::vote(1, 3, 40, 1)], 1));

    assert_eq!(status, BatchStatus::Verified { old_root, new_root: tree.root() });
    assert_ne!(tree.root(), old_root);

    let leaf = tree.leaf(1).unwrap();
    assert_eq!(leaf.credit_balance, 60);
    assert_eq!(leaf.last_update_seq, 1);
    assert_eq!(tree.leaf(0).unwrap().credit_balance, 100);
}

#[test]
fn messages_apply_in_order_against_running_root()
{
    let processor = processor();
    let mut tree = registered_tree(processor.config(), &[1, 2]);
    let rotated = public_key(55);

    let messages = vec![
        Message::vote(0, 1, 10, 5),
        Message::key_change(0, &rotated, 6),
        Message::vote(1, 2, 100, 7),
        Message::vote(0, 1, 90, 8),
    ];
    let circuit = processor.process(&mut tree, &batch(messages.clone(), 5)).unwrap();

    assert_eq!(tree.leaf(0).unwrap(), &StateLeaf {
        public_key: rotated,
        credit_balance: 0,
        deactivated: false,
        last_update_seq: 8,
    });
    assert_eq!(tree.leaf(1).unwrap().credit_balance, 0);

    let inputs = circuit.public_inputs();
    assert_eq!(inputs[1], tree.root());
    assert_eq!(inputs[2], Fr::from(4u64));
    assert_eq!(inputs[3], Fr::from(5u64));
    assert_eq!(inputs[4], chain_hash(&messages).unwrap());

    check_constraints(circuit).unwrap();
}

#[test]
fn batch_size_must_be_within_capacity()
{
    let processor = processor();
    let tree = registered_tree(processor.config(), &[1]);

    let empty = batch(vec![], 1);
    assert_eq!(
        processor.prepare(&tree, &empty).unwrap_err(),
        CircuitError::BatchSizeViolation { size: 0, capacity: 4 }
    );

    let overfull = batch((1..=5).map(|seq| Message::vote(0, 0, 1, seq)).collect(), 1);
    assert_eq!(
        processor.prepare(&tree, &overfull).unwrap_err(),
        CircuitError::BatchSizeViolation { size: 5, capacity: 4 }
    );
}

#[test]
fn padding_must_be_canonical()
{
    let processor = processor();
    let tree = registered_tree(processor.config(), &[1]);

    let mut padded = batch(vec![Message::vote(0, 0, 1, 1)], 1);
    padded.slots[2].payload[4] = Fr::from(5u64);
    assert_eq!(processor.prepare(&tree, &padded).unwrap_err(), CircuitError::MalformedPadding { slot: 2 });

    let mut padded = batch(vec![Message::vote(0, 0, 1, 1)], 1);
    padded.slots[3].sequence = 9;
    assert_eq!(processor.prepare(&tree, &padded).unwrap_err(), CircuitError::MalformedPadding { slot: 3 });
}

#[test]
fn sequence_gaps_are_rejected()
{
    let processor = processor();
    let tree = registered_tree(processor.config(), &[1]);

    let gap = batch(vec![Message::vote(0, 0, 1, 1), Message::vote(0, 0, 1, 3)], 1);
    assert_eq!(
        processor.prepare(&tree, &gap).unwrap_err(),
        CircuitError::SequenceViolation { slot: 1, expected: 2, found: 3 }
    );
}

#[test]
fn replayed_sequence_is_rejected()
{
    let processor = processor();
    let mut tree = registered_tree(processor.config(), &[1]);
    let replay = batch(vec![Message::vote(0, 0, 1, 1)], 1);

    assert!(processor.run(&mut tree, &replay).is_verified());
    let root = tree.root();

    let status = processor.run(&mut tree, &replay);
    assert_eq!(
        status,
        BatchStatus::Rejected(CircuitError::SequenceViolation { slot: 0, expected: 2, found: 1 })
    );
    assert_eq!(tree.root(), root);
}

#[test]
fn invalid_messages_are_rejected_without_commit()
{
    let processor = processor();
    let mut tree = registered_tree(processor.config(), &[1, 2]);
    let root = tree.root();

    let overspend = batch(vec![Message::vote(0, 0, 60, 1), Message::vote(0, 0, 41, 2)], 1);
    assert_eq!(
        processor.run(&mut tree, &overspend),
        BatchStatus::Rejected(CircuitError::InsufficientCredits { slot: 1 })
    );
    assert_eq!(tree.root(), root);

    let unknown = batch(vec![Message::vote(2, 0, 1, 1)], 1);
    assert_eq!(
        processor.prepare(&tree, &unknown).unwrap_err(),
        CircuitError::UnknownLeaf { slot: 0, index: "2".to_string() }
    );

    let bad_key = batch(vec![Message::key_change(0, &Point::new(Fr::from(0u64), -Fr::from(1u64)), 1)], 1);
    assert_eq!(processor.prepare(&tree, &bad_key).unwrap_err(), CircuitError::InvalidPoint("new public key"));

    let deactivation = batch(vec![Message::deactivate(0, &public_key(1), 1, 0, 1)], 1);
    assert_eq!(processor.prepare(&tree, &deactivation).unwrap_err(), CircuitError::UnsupportedMessage { slot: 0 });
}

#[test]
fn deactivated_leaf_cannot_vote()
{
    let processor = processor();
    let mut tree = registered_tree(processor.config(), &[1]);
    let mut leaf = *tree.leaf(0).unwrap();
    leaf.deactivated = true;
    tree.update(0, leaf).unwrap();
    assert_eq!(tree.leaf(0).unwrap().status(), LeafStatus::Deactivated);

    let vote = batch(vec![Message::vote(0, 0, 1, 1)], 1);
    assert_eq!(processor.prepare(&tree, &vote).unwrap_err(), CircuitError::DeactivatedLeaf { slot: 0 });
}

#[test]
fn padding_carrying_a_message_is_unsatisfied()
{
    let processor = processor();
    let tree = registered_tree(processor.config(), &[1]);
    let first = Message::vote(0, 0, 10, 1);
    let second = Message::vote(0, 0, 10, 2);

    let (honest, after_first) = processor.prepare(&tree, &batch(vec![first], 1)).unwrap();
    let (mut forged, _) = processor.prepare(&tree, &batch(vec![first, second], 1)).unwrap();

    forged.batch_size = 1;
    forged.new_root = after_first.root();
    forged.message_chain_hash = honest.message_chain_hash;

    assert!(matches!(check_constraints(forged), Err(CircuitError::Unsatisfied(_))));
    check_constraints(honest).unwrap();
}

#[test]
fn reordered_batch_is_unsatisfied()
{
    let processor = processor();
    let tree = registered_tree(processor.config(), &[1, 2]);
    let messages = vec![Message::vote(0, 0, 10, 1), Message::vote(1, 0, 20, 2)];

    let (mut forged, _) = processor.prepare(&tree, &batch(messages, 1)).unwrap();
    forged.slots.swap(0, 1);

    assert!(matches!(check_constraints(forged), Err(CircuitError::Unsatisfied(_))));
}

#[test]
fn overspend_witness_is_unsatisfied()
{
    let processor = processor();
    let tree = registered_tree(processor.config(), &[1]);

    let (mut forged, _) = processor.prepare(&tree, &batch(vec![Message::vote(0, 0, 100, 1)], 1)).unwrap();
    forged.slots[0].message.payload[2] = Fr::from(101u64);

    assert!(matches!(check_constraints(forged), Err(CircuitError::Unsatisfied(_))));
}

#[test]
fn payload_tail_must_be_zero()
{
    let processor = processor();
    let tree = registered_tree(processor.config(), &[1]);

    let mut vote = Message::vote(0, 1, 10, 1);
    vote.payload[4] = Fr::from(1u64);
    assert_eq!(
        processor.prepare(&tree, &batch(vec![vote], 1)).unwrap_err(),
        CircuitError::MalformedMessage { slot: 0 }
    );

    let mut key_change = Message::key_change(0, &public_key(55), 1);
    key_change.payload[3] = Fr::from(3u64);
    assert_eq!(
        processor.prepare(&tree, &batch(vec![key_change], 1)).unwrap_err(),
        CircuitError::MalformedMessage { slot: 0 }
    );
}

#[test]
fn nonzero_payload_tail_is_unsatisfied()
{
    let processor = processor();
    let tree = registered_tree(processor.config(), &[1]);

    // The tail does not touch the leaf, so only the layout constraint can fail.
    let (mut forged, _) = processor.prepare(&tree, &batch(vec![Message::vote(0, 1, 10, 1)], 1)).unwrap();
    forged.slots[0].message.payload[3] = Fr::from(7u64);
    forged.message_chain_hash = chain_hash(&[forged.slots[0].message]).unwrap();

    assert!(matches!(check_constraints(forged), Err(CircuitError::Unsatisfied(_))));
}

#[test]
fn key_change_outside_subgroup_is_unsatisfied()
{
    let processor = processor();
    let tree = registered_tree(processor.config(), &[1]);
    let (mut forged, _) = processor
        .prepare(&tree, &batch(vec![Message::key_change(0, &public_key(55), 1)], 1))
        .unwrap();

    let outside = public_key(55).add(&Point::new(Fr::from(0u64), -Fr::from(1u64)));
    let message = Message::key_change(0, &outside, 1);

    let mut leaf = *tree.leaf(0).unwrap();
    leaf.public_key = outside;
    leaf.last_update_seq = 1;
    let mut after = tree.clone();
    after.update(0, leaf).unwrap();

    forged.slots[0].message = message;
    forged.new_root = after.root();
    forged.message_chain_hash = chain_hash(&[message]).unwrap();

    assert!(matches!(check_constraints(forged), Err(CircuitError::Unsatisfied(_))));
}

/// One vote and thirty-one padding entries at the default capacity.
#[test]
fn full_capacity_batch()
{
    let config = ProtocolConfig::default();
    let processor = MessageBatchProcessor::new(config.clone()).unwrap();
    let mut tree = registered_tree(&config, &[1]);
    let old_root = tree.root();

    let full = Batch::new(vec![Message::vote(0, 4, 25, 1)], config.max_batch_size, 1);
    assert_eq!(full.slots.len(), 32);

    let status = processor.run(&mut tree, &full);
    assert_eq!(status, BatchStatus::Verified { old_root, new_root: tree.root() });
    assert_eq!(tree.leaf(0).unwrap().credit_balance, 75);
}
