// SPDX-License-Identifier: Apache-2.0

//! Key and evaluation-context records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::params::DpfParameters;

/// Per-tree-level public correction both parties mix into their state to
/// cancel off-path divergence.
///
/// The correction words of a key pair are identical; only the root seeds and
/// party bits differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionWord {
    pub seed: Block,
    pub control_left: bool,
    pub control_right: bool,
    /// Packed element corrections, present when this tree level computes a
    /// non-final hierarchy level's output.
    pub value_correction: Option<Block>,
}

/// One party's key of a DPF pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpfKey {
    /// `false` for party A, `true` for party B.
    pub party: bool,
    /// Root seed.
    pub seed: Block,
    /// Root control bit; equals the party bit.
    pub control_bit: bool,
    /// One entry per tree level.
    pub correction_words: Vec<CorrectionWord>,
    /// Value correction of the deepest hierarchy level, applied past the
    /// last correction word.
    pub last_level_value_correction: Block,
}

/// Seed and control bit of one tree node, retained between hierarchy levels
/// for later prefix extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialEvaluation {
    pub seed: Block,
    pub control_bit: bool,
}

/// Mutable state of an incremental evaluation of one [`DpfKey`].
///
/// Created by `DistributedPointFunction::create_evaluation_context` and
/// advanced one hierarchy level per `evaluate_next` call. The partial
/// evaluations map every point output by the last call to the seed and
/// control bit of its tree node, which is exactly what extending any of
/// those points at the next level needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub(crate) parameters: Vec<DpfParameters>,
    pub(crate) key: DpfKey,
    pub(crate) hierarchy_level: i32,
    pub(crate) partial_evaluations: HashMap<Block, PartialEvaluation>,
}

impl EvaluationContext {
    pub(crate) fn new(parameters: Vec<DpfParameters>, key: DpfKey) -> Self {
        // The empty prefix maps to the root state.
        let partial_evaluations = HashMap::from([(
            Block::ZERO,
            PartialEvaluation {
                seed: key.seed,
                control_bit: key.control_bit,
            },
        )]);
        Self {
            parameters,
            key,
            hierarchy_level: -1,
            partial_evaluations,
        }
    }

    /// Last hierarchy level whose output was produced, `-1` before the first
    /// `evaluate_next` call.
    pub fn hierarchy_level(&self) -> i32 {
        self.hierarchy_level
    }

    pub fn key(&self) -> &DpfKey {
        &self.key
    }
}
