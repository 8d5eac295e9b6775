// SPDX-License-Identifier: Apache-2.0

//! See [`Block`]

use std::fmt;
use std::ops::{BitAnd, BitXor, BitXorAssign};

use serde::{Deserialize, Serialize};

/// A 128-bit block.
///
/// Blocks are the seed space of the PRGs, the carrier of correction words,
/// and the container packed output elements are read out of. The
/// least-significant bit doubles as the control bit during tree expansion.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block(u128);

impl Block {
    pub const ZERO: Self = Block(0);

    pub fn new(bits: u128) -> Self {
        Block(bits)
    }

    pub fn to_bits(self) -> u128 {
        self.0
    }

    /// The control bit carried in the least-significant position.
    pub fn lsb(self) -> bool {
        self.0 & 1 == 1
    }

    /// Copy of the block with the control bit cleared.
    pub fn with_lsb_cleared(self) -> Self {
        Block(self.0 & !1)
    }

    pub fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Block(u128::from_le_bytes(bytes))
    }
}

impl BitXor for Block {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Block(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for Block {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

impl BitAnd for Block {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Block(self.0 & rhs.0)
    }
}

impl From<u128> for Block {
    fn from(bits: u128) -> Self {
        Block(bits)
    }
}

impl From<Block> for u128 {
    fn from(block: Block) -> Self {
        block.0
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({:#034x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsb_extract_and_clear() {
        let block = Block::new(0xdead_beef);
        assert!(block.lsb());
        assert!(!block.with_lsb_cleared().lsb());
        assert_eq!(block.with_lsb_cleared().to_bits(), 0xdead_beee);
        assert!(!Block::new(0xdead_beee).lsb());
    }

    #[test]
    fn test_xor_and() {
        let a = Block::new(0b1100);
        let b = Block::new(0b1010);
        assert_eq!((a ^ b).to_bits(), 0b0110);
        assert_eq!((a & b).to_bits(), 0b1000);
        let mut c = a;
        c ^= b;
        assert_eq!(c, a ^ b);
    }

    #[test]
    fn test_le_bytes_round_trip() {
        let block = Block::new(0x0123_4567_89ab_cdef_0011_2233_4455_6677);
        assert_eq!(Block::from_le_bytes(block.to_le_bytes()), block);
    }
}
