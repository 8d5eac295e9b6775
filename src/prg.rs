// SPDX-License-Identifier: Apache-2.0

//! Fixed-key AES-128 pseudorandom generators in the Matyas-Meyer-Oseas
//! construction, `G(x) = AES_k(x) ^ x`.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
#[cfg(feature = "multi-thread")]
use rayon::prelude::*;

use crate::block::Block;

// Fixed keys of the three PRG instances. Changing any of them changes every
// key and output share ever produced, so they are permanent.
pub(crate) const PRG_KEY_LEFT: u128 = 0x243f_6a88_85a3_08d3_1319_8a2e_0370_7344;
pub(crate) const PRG_KEY_RIGHT: u128 = 0xa409_3822_299f_31d0_082e_fa98_ec4e_6c89;
pub(crate) const PRG_KEY_VALUE: u128 = 0x4528_21e6_38d0_1377_be54_66cf_34e9_0c6c;

/// Minimum batch size before seeds are split across threads.
#[cfg(feature = "multi-thread")]
const PAR_CHUNK: usize = 1024;

/// One PRG instance with a precreated cipher.
#[derive(Clone)]
pub struct Prg {
    cipher: Aes128,
}

impl Prg {
    pub fn with_key(key: u128) -> Self {
        let cipher = Aes128::new(GenericArray::from_slice(&key.to_le_bytes()));
        Self { cipher }
    }

    /// Expand one seed into one block.
    pub fn expand(&self, seed: Block) -> Block {
        let mut buf = GenericArray::clone_from_slice(&seed.to_le_bytes());
        self.cipher.encrypt_block(&mut buf);
        Block::from_le_bytes(buf.into()) ^ seed
    }

    /// Expand a span of seeds. Equals [`Prg::expand`] applied to each seed,
    /// in order.
    #[cfg(not(feature = "multi-thread"))]
    pub fn expand_batch(&self, seeds: &[Block]) -> Vec<Block> {
        self.expand_span(seeds)
    }

    /// Expand a span of seeds. Equals [`Prg::expand`] applied to each seed,
    /// in order.
    #[cfg(feature = "multi-thread")]
    pub fn expand_batch(&self, seeds: &[Block]) -> Vec<Block> {
        if seeds.len() < PAR_CHUNK {
            return self.expand_span(seeds);
        }
        seeds
            .par_chunks(PAR_CHUNK)
            .flat_map_iter(|chunk| self.expand_span(chunk))
            .collect()
    }

    fn expand_span(&self, seeds: &[Block]) -> Vec<Block> {
        let mut buf: Vec<aes::Block> = seeds
            .iter()
            .map(|seed| GenericArray::clone_from_slice(&seed.to_le_bytes()))
            .collect();
        self.cipher.encrypt_blocks(&mut buf);
        buf.iter()
            .zip(seeds)
            .map(|(out, seed)| Block::from_le_bytes((*out).into()) ^ *seed)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_deterministic_not_identity() {
        let prg = Prg::with_key(PRG_KEY_LEFT);
        let seed = Block::new(0x2a4c_8f25_7912_5a94_2a45_8f24_2b4e_4819);
        let out = prg.expand(seed);
        assert_eq!(out, prg.expand(seed));
        assert_ne!(out, seed);
        assert_ne!(out, Block::ZERO);
    }

    #[test]
    fn test_instances_disagree() {
        let seed = Block::new(42);
        let left = Prg::with_key(PRG_KEY_LEFT).expand(seed);
        let right = Prg::with_key(PRG_KEY_RIGHT).expand(seed);
        let value = Prg::with_key(PRG_KEY_VALUE).expand(seed);
        assert_ne!(left, right);
        assert_ne!(left, value);
        assert_ne!(right, value);
    }

    #[test]
    fn test_batch_matches_sequential() {
        let prg = Prg::with_key(PRG_KEY_VALUE);
        let seeds: Vec<Block> = (0..300u128).map(|i| Block::new(i * i + 7)).collect();
        let batch = prg.expand_batch(&seeds);
        for (seed, out) in seeds.iter().zip(&batch) {
            assert_eq!(prg.expand(*seed), *out);
        }
    }
}
