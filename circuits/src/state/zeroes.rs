use crate::hash::{poseidon_hash, PoseidonError};
use crate::Fr;

/// Roots of empty subtrees: `zeroes[0]` is the empty leaf and
/// `zeroes[i + 1] = Poseidon(zeroes[i], zeroes[i])`.
pub fn get_merkle_zeroes(depth: u8) -> Result<Vec<Fr>, PoseidonError>
{
    let mut zeroes = Vec::with_capacity(usize::from(depth) + 1);
    zeroes.push(Fr::from(0u64));
    for i in 0..usize::from(depth)
    {
        zeroes.push(poseidon_hash(&[zeroes[i], zeroes[i]])?);
    }
    Ok(zeroes)
}
