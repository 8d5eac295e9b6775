// SPDX-License-Identifier: Apache-2.0

//! Output element widths and the packed value codec.
//!
//! Output shares live in `$\mathbb{Z}_{2^b}$` for a per-level width `b`.
//! Elements narrower than a block are packed side by side, so one PRG call
//! masks `128 / b` outputs at once.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::{DpfError, Result};

mod private {
    pub trait Sealed {}
}

/// An output element of width [`Value::BITS`] with wrapping mod-`2^BITS`
/// arithmetic.
///
/// Implemented for the unsigned integer primitives and, below a byte, for
/// [`U1`], [`U2`], and [`U4`].
pub trait Value: private::Sealed + Copy + Eq + Debug {
    const BITS: u32;

    /// Truncates `bits` to the low `BITS` bits.
    fn from_bits(bits: u128) -> Self;

    fn to_bits(self) -> u128;

    fn wrapping_add(self, rhs: Self) -> Self;

    fn wrapping_neg(self) -> Self;
}

macro_rules! impl_int_value {
    ($t:ty) => {
        impl private::Sealed for $t {}

        impl Value for $t {
            const BITS: u32 = <$t>::BITS;

            fn from_bits(bits: u128) -> Self {
                bits as $t
            }

            fn to_bits(self) -> u128 {
                self as u128
            }

            fn wrapping_add(self, rhs: Self) -> Self {
                <$t>::wrapping_add(self, rhs)
            }

            fn wrapping_neg(self) -> Self {
                <$t>::wrapping_neg(self)
            }
        }
    };
}

impl_int_value!(u8);
impl_int_value!(u16);
impl_int_value!(u32);
impl_int_value!(u64);
impl_int_value!(u128);

macro_rules! decl_packed_value {
    ($t_impl:ident, $bits:expr) => {
        /// Unsigned element narrower than a byte, stored in the low bits.
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $t_impl(u8);

        impl $t_impl {
            const MASK: u8 = (1 << $bits) - 1;

            pub fn new(value: u8) -> Self {
                Self(value & Self::MASK)
            }

            pub fn get(self) -> u8 {
                self.0
            }
        }

        impl From<u8> for $t_impl {
            fn from(value: u8) -> Self {
                Self::new(value)
            }
        }

        impl private::Sealed for $t_impl {}

        impl Value for $t_impl {
            const BITS: u32 = $bits;

            fn from_bits(bits: u128) -> Self {
                Self::new(bits as u8)
            }

            fn to_bits(self) -> u128 {
                self.0 as u128
            }

            fn wrapping_add(self, rhs: Self) -> Self {
                Self::new(self.0.wrapping_add(rhs.0))
            }

            fn wrapping_neg(self) -> Self {
                Self::new(self.0.wrapping_neg())
            }
        }
    };
}

decl_packed_value!(U1, 1);
decl_packed_value!(U2, 2);
decl_packed_value!(U4, 4);

pub(crate) fn elements_per_block(bits: u32) -> usize {
    (128 / bits) as usize
}

fn low_mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Reads slot `slot` of a block holding `128 / bits` packed elements.
pub(crate) fn read_slot(block: Block, bits: u32, slot: usize) -> u128 {
    (block.to_bits() >> (slot as u32 * bits)) & low_mask(bits)
}

/// Writes the low `bits` bits of `value` into slot `slot`, leaving the other
/// slots untouched.
pub(crate) fn write_slot(block: Block, bits: u32, slot: usize, value: u128) -> Block {
    let shift = slot as u32 * bits;
    let cleared = block.to_bits() & !(low_mask(bits) << shift);
    Block::new(cleared | ((value & low_mask(bits)) << shift))
}

/// Value correction for one output level: `beta` at the target slot, minus
/// party A's pseudorandom mask, plus party B's, elementwise. `invert`
/// negates every element, used when party B carries the 1 control bit on the
/// path so that the shares subtract consistently.
pub(crate) fn value_correction_block<T: Value>(
    value_a: Block,
    value_b: Block,
    slot: usize,
    beta: u128,
    invert: bool,
) -> Block {
    let mut out = Block::ZERO;
    for s in 0..elements_per_block(T::BITS) {
        let target = if s == slot {
            T::from_bits(beta)
        } else {
            T::from_bits(0)
        };
        let a = T::from_bits(read_slot(value_a, T::BITS, s));
        let b = T::from_bits(read_slot(value_b, T::BITS, s));
        let mut corrected = target.wrapping_add(a.wrapping_neg()).wrapping_add(b);
        if invert {
            corrected = corrected.wrapping_neg();
        }
        out = write_slot(out, T::BITS, s, corrected.to_bits());
    }
    out
}

/// Tagged dispatch over the eight supported widths, for callers that only
/// know the element width at run time.
pub(crate) fn value_correction_for(
    bits: u32,
    value_a: Block,
    value_b: Block,
    slot: usize,
    beta: u128,
    invert: bool,
) -> Result<Block> {
    match bits {
        1 => Ok(value_correction_block::<U1>(value_a, value_b, slot, beta, invert)),
        2 => Ok(value_correction_block::<U2>(value_a, value_b, slot, beta, invert)),
        4 => Ok(value_correction_block::<U4>(value_a, value_b, slot, beta, invert)),
        8 => Ok(value_correction_block::<u8>(value_a, value_b, slot, beta, invert)),
        16 => Ok(value_correction_block::<u16>(value_a, value_b, slot, beta, invert)),
        32 => Ok(value_correction_block::<u32>(value_a, value_b, slot, beta, invert)),
        64 => Ok(value_correction_block::<u64>(value_a, value_b, slot, beta, invert)),
        128 => Ok(value_correction_block::<u128>(value_a, value_b, slot, beta, invert)),
        _ => Err(DpfError::Unimplemented(format!(
            "element_bitsize {bits} is not supported"
        ))),
    }
}

/// Applies a value correction to one expanded block elementwise, then fixes
/// the share sign: party B's outputs are negated so the two parties' shares
/// sum instead of cancel.
pub(crate) fn correct_block<T: Value>(
    value: Block,
    correction: Block,
    control_bit: bool,
    negate: bool,
) -> Block {
    let mut out = Block::ZERO;
    for s in 0..elements_per_block(T::BITS) {
        let mut element = T::from_bits(read_slot(value, T::BITS, s));
        if control_bit {
            element = element.wrapping_add(T::from_bits(read_slot(correction, T::BITS, s)));
        }
        if negate {
            element = element.wrapping_neg();
        }
        out = write_slot(out, T::BITS, s, element.to_bits());
    }
    out
}
