mod keys;
mod nullifier;
mod utils;
