// SPDX-License-Identifier: Apache-2.0

//! Distributed point functions (DPFs), including the incremental
//! (hierarchical) variant.
//!
//! A point function `f` is specified by two values `(alpha, beta)` such that
//! `f(alpha) = beta` and `f(x) = 0` for all `x != alpha`. A DPF scheme splits
//! such a function into two keys `k_0, k_1` so that evaluating either key at
//! any point yields an additive secret share: `Eval(k_0, x) + Eval(k_1, x) =
//! f(x)` for all `x`, while each key on its own reveals nothing about
//! `(alpha, beta)`.
//!
//! An *incremental* DPF additionally evaluates on prefixes of points: each
//! hierarchy level has its own domain size and output value, and evaluating a
//! level-`i` prefix of `alpha` yields a share of `beta_i`. Evaluation is
//! driven level by level through an [`EvaluationContext`], which keeps the
//! partial tree expansions so a pruned set of prefixes can be extended
//! without recomputing anything.
//!
//! Keys are generated with the GGM-style tree construction over fixed-key
//! AES, with one public correction word per tree level.

pub mod block;
pub mod dpf;
pub mod key;
pub mod params;
pub mod prg;
pub mod value;

pub use block::Block;
pub use dpf::DistributedPointFunction;
pub use key::{CorrectionWord, DpfKey, EvaluationContext, PartialEvaluation};
pub use params::DpfParameters;
pub use value::{Value, U1, U2, U4};

/// Errors reported by DPF construction, key generation, and evaluation.
///
/// Operations fail without side effects: a key or context passed to a failing
/// call is left unchanged.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DpfError {
    /// A caller-supplied argument violates the documented constraints.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested element width is outside the supported set.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// An internal invariant was violated.
    #[error("internal: {0}")]
    Internal(String),

    /// The operation is not valid in the context's current state.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
}

pub type Result<T> = core::result::Result<T, DpfError>;
