pub mod poseidon;

pub use light_poseidon::{Poseidon, PoseidonError, PoseidonHasher};
pub use poseidon::{poseidon_hash, PoseidonGadget, PoseidonGadgets};
