use ark_ff::PrimeField;

use crate::curve::Point;
use crate::state::{StateLeaf, StateTree};
use crate::{Fr, ProtocolConfig};

/// A small deployment which keeps constraint systems quick to check.
pub fn small_config() -> ProtocolConfig
{
    ProtocolConfig {
        state_tree_depth: 4,
        max_batch_size: 4,
        ..ProtocolConfig::default()
    }
}

/// The public key for secret `seed`.
pub fn public_key(seed: u64) -> Point
{
    Point::base8().mul(&Fr::from(seed).into_bigint())
}

/// A tree holding one fresh leaf per seed, in order.
pub fn registered_tree(config: &ProtocolConfig, seeds: &[u64]) -> StateTree
{
    let mut tree = StateTree::new(config.state_tree_depth).unwrap();
    for seed in seeds
    {
        tree.insert(StateLeaf::new(public_key(*seed), config.initial_credit_balance)).unwrap();
    }
    tree
}
