// SPDX-License-Identifier: Apache-2.0

//! See [`DistributedPointFunction`]

use std::collections::HashMap;

use bitvec::prelude::*;
use rand::{thread_rng, CryptoRng, Rng, RngCore};

use crate::block::Block;
use crate::key::{CorrectionWord, DpfKey, EvaluationContext, PartialEvaluation};
use crate::params::{validate_parameters, DpfParameters, TreeLayout};
use crate::prg::{Prg, PRG_KEY_LEFT, PRG_KEY_RIGHT, PRG_KEY_VALUE};
use crate::value::{correct_block, read_slot, value_correction_for, Value};
use crate::{DpfError, Result};

/// Key generation and evaluation of distributed point functions.
///
/// A point function is specified by an index `alpha` and a value `beta`: it
/// maps `alpha` to `beta` and everything else to zero. [`Self::generate_keys`]
/// splits such a function into two keys whose evaluations at any point are
/// additive shares of the function's value there.
///
/// The incremental variant built by [`Self::new_incremental`] evaluates at
/// several hierarchy levels: for each parameter entry, the prefix of `alpha`
/// of that level's length maps to that level's `beta`. Evaluation walks the
/// levels front to back through an [`EvaluationContext`], extending a pruned
/// set of prefixes at each step.
pub struct DistributedPointFunction {
    parameters: Vec<DpfParameters>,
    layout: TreeLayout,
    prg_left: Prg,
    prg_right: Prg,
    prg_value: Prg,
}

/// Seeds and packed control bits of one level of expanded tree nodes.
struct DpfExpansion {
    seeds: Vec<Block>,
    control_bits: BitVec,
}

impl DpfExpansion {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            seeds: Vec::with_capacity(capacity),
            control_bits: BitVec::with_capacity(capacity),
        }
    }

    fn push(&mut self, seed: Block, control_bit: bool) {
        self.seeds.push(seed);
        self.control_bits.push(control_bit);
    }

    fn len(&self) -> usize {
        self.seeds.len()
    }
}

fn fits_in_bits(value: u128, bits: u32) -> bool {
    bits >= 128 || value >> bits == 0
}

impl DistributedPointFunction {
    /// Creates a DPF evaluated only at its output layer.
    pub fn new(parameters: DpfParameters) -> Result<Self> {
        Self::new_incremental(&[parameters])
    }

    /// Creates an incremental DPF with one evaluation layer per parameter
    /// entry. Domain sizes must be strictly increasing and element sizes
    /// non-decreasing.
    pub fn new_incremental(parameters: &[DpfParameters]) -> Result<Self> {
        validate_parameters(parameters)?;
        let layout = TreeLayout::compute(parameters);
        Ok(Self {
            parameters: parameters.to_vec(),
            layout,
            prg_left: Prg::with_key(PRG_KEY_LEFT),
            prg_right: Prg::with_key(PRG_KEY_RIGHT),
            prg_value: Prg::with_key(PRG_KEY_VALUE),
        })
    }

    pub fn parameters(&self) -> &[DpfParameters] {
        &self.parameters
    }

    /// Generates a key pair for a single-level DPF, sampling the root seeds
    /// from [`thread_rng`].
    pub fn generate_keys(&self, alpha: u128, beta: u128) -> Result<(DpfKey, DpfKey)> {
        self.generate_keys_with_rng(alpha, beta, &mut thread_rng())
    }

    /// Like [`Self::generate_keys`] with a caller-supplied random source.
    pub fn generate_keys_with_rng<R: RngCore + CryptoRng>(
        &self,
        alpha: u128,
        beta: u128,
        rng: &mut R,
    ) -> Result<(DpfKey, DpfKey)> {
        if self.parameters.len() != 1 {
            return Err(DpfError::InvalidArgument(
                "single-level key generation on an incremental DPF; use generate_keys_incremental"
                    .into(),
            ));
        }
        self.generate_keys_incremental_with_rng(alpha, &[beta], rng)
    }

    /// Generates a key pair for an incremental DPF that evaluates to
    /// `betas[i]` at the level-`i` prefix of `alpha`, sampling the root seeds
    /// from [`thread_rng`].
    pub fn generate_keys_incremental(
        &self,
        alpha: u128,
        betas: &[u128],
    ) -> Result<(DpfKey, DpfKey)> {
        self.generate_keys_incremental_with_rng(alpha, betas, &mut thread_rng())
    }

    /// Like [`Self::generate_keys_incremental`] with a caller-supplied random
    /// source. The source is consulted exactly twice, once per root seed.
    pub fn generate_keys_incremental_with_rng<R: RngCore + CryptoRng>(
        &self,
        alpha: u128,
        betas: &[u128],
        rng: &mut R,
    ) -> Result<(DpfKey, DpfKey)> {
        let num_levels = self.parameters.len();
        if betas.len() != num_levels {
            return Err(DpfError::InvalidArgument(format!(
                "expected {num_levels} beta values, got {}",
                betas.len()
            )));
        }
        if !fits_in_bits(alpha, self.parameters[num_levels - 1].log_domain_size) {
            return Err(DpfError::InvalidArgument(format!(
                "alpha {alpha} is outside the domain of the deepest level"
            )));
        }
        for (i, (&beta, p)) in betas.iter().zip(&self.parameters).enumerate() {
            if !fits_in_bits(beta, p.element_bitsize) {
                return Err(DpfError::InvalidArgument(format!(
                    "beta {beta} does not fit in {} bits at level {i}",
                    p.element_bitsize
                )));
            }
        }

        let mut seeds = [Block::new(rng.gen::<u128>()), Block::new(rng.gen::<u128>())];
        let root_seeds = seeds;
        let mut control_bits = [false, true];
        let mut correction_words = Vec::with_capacity(self.layout.tree_levels_needed);
        for tree_level in 0..self.layout.tree_levels_needed {
            correction_words.push(self.generate_next(
                tree_level,
                alpha,
                betas,
                &mut seeds,
                &mut control_bits,
            )?);
        }
        let last_level_value_correction = self.value_correction_at(
            num_levels - 1,
            &seeds,
            &control_bits,
            alpha,
            betas[num_levels - 1],
        )?;

        let key_a = DpfKey {
            party: false,
            seed: root_seeds[0],
            control_bit: false,
            correction_words: correction_words.clone(),
            last_level_value_correction,
        };
        let key_b = DpfKey {
            party: true,
            seed: root_seeds[1],
            control_bit: true,
            correction_words,
            last_level_value_correction,
        };
        Ok((key_a, key_b))
    }

    /// Expands both parties' seeds one tree level down the alpha path and
    /// derives the level's correction word.
    fn generate_next(
        &self,
        tree_level: usize,
        alpha: u128,
        betas: &[u128],
        seeds: &mut [Block; 2],
        control_bits: &mut [bool; 2],
    ) -> Result<CorrectionWord> {
        // A hierarchy level whose output sits at this depth gets its value
        // correction from the current on-path seeds, before they expand past
        // the depth.
        let value_correction = match self.layout.tree_to_hierarchy.get(&tree_level) {
            Some(&hierarchy) => Some(self.value_correction_at(
                hierarchy,
                seeds,
                control_bits,
                alpha,
                betas[hierarchy],
            )?),
            None => None,
        };

        let last_log_domain = self.parameters[self.parameters.len() - 1].log_domain_size;
        let alpha_bit = (alpha >> (last_log_domain as usize - 1 - tree_level)) & 1 == 1;

        let left = [
            self.prg_left.expand(seeds[0]),
            self.prg_left.expand(seeds[1]),
        ];
        let right = [
            self.prg_right.expand(seeds[0]),
            self.prg_right.expand(seeds[1]),
        ];
        // Equalizing the parties' children off the alpha path makes every
        // off-path subtree collapse to identical states.
        let (keep, lose) = if alpha_bit {
            (&right, &left)
        } else {
            (&left, &right)
        };
        let seed_correction = lose[0].with_lsb_cleared() ^ lose[1].with_lsb_cleared();
        let control_left = left[0].lsb() ^ left[1].lsb() ^ alpha_bit ^ true;
        let control_right = right[0].lsb() ^ right[1].lsb() ^ alpha_bit;
        let keep_control = if alpha_bit { control_right } else { control_left };

        for party in 0..2 {
            let expanded = keep[party];
            let mut seed = expanded.with_lsb_cleared();
            let mut control_bit = expanded.lsb();
            if control_bits[party] {
                seed ^= seed_correction;
                control_bit ^= keep_control;
            }
            seeds[party] = seed;
            control_bits[party] = control_bit;
        }

        Ok(CorrectionWord {
            seed: seed_correction,
            control_left,
            control_right,
            value_correction,
        })
    }

    /// Value correction of one hierarchy level, from both parties' on-path
    /// seeds at that level's output depth.
    fn value_correction_at(
        &self,
        hierarchy: usize,
        seeds: &[Block; 2],
        control_bits: &[bool; 2],
        alpha: u128,
        beta: u128,
    ) -> Result<Block> {
        let p = self.parameters[hierarchy];
        let depth = self.layout.hierarchy_to_tree[hierarchy];
        let last_log_domain = self.parameters[self.parameters.len() - 1].log_domain_size;
        let dropped = last_log_domain - p.log_domain_size;
        let alpha_prefix = if dropped >= 128 { 0 } else { alpha >> dropped };
        let slot_bits = p.log_domain_size as usize - depth;
        let slot = (alpha_prefix & ((1u128 << slot_bits) - 1)) as usize;
        value_correction_for(
            p.element_bitsize,
            self.prg_value.expand(seeds[0]),
            self.prg_value.expand(seeds[1]),
            slot,
            beta,
            // Negated when party B carries the 1 control bit on the path, so
            // the parties' shares subtract consistently.
            control_bits[1],
        )
    }

    /// Returns an [`EvaluationContext`] for incrementally evaluating `key`.
    pub fn create_evaluation_context(&self, key: DpfKey) -> Result<EvaluationContext> {
        self.validate_key(&key)?;
        Ok(EvaluationContext::new(self.parameters.clone(), key))
    }

    fn validate_key(&self, key: &DpfKey) -> Result<()> {
        if key.control_bit != key.party {
            return Err(DpfError::InvalidArgument(
                "key root control bit does not equal its party bit".into(),
            ));
        }
        if key.correction_words.len() != self.layout.tree_levels_needed {
            return Err(DpfError::InvalidArgument(format!(
                "key carries {} correction words, expected {}",
                key.correction_words.len(),
                self.layout.tree_levels_needed
            )));
        }
        for (tree_level, cw) in key.correction_words.iter().enumerate() {
            let expects_value = self.layout.tree_to_hierarchy.contains_key(&tree_level);
            if cw.value_correction.is_some() != expects_value {
                return Err(DpfError::InvalidArgument(format!(
                    "value-correction layout mismatch at tree level {tree_level}"
                )));
            }
        }
        Ok(())
    }

    /// Evaluates the next hierarchy level under every one-level extension of
    /// `prefixes`.
    ///
    /// On the first call `prefixes` must be empty and the whole first-level
    /// domain is returned. On later calls each prefix is a point output by
    /// the previous call, read from the low-order bits; the return vector
    /// holds the shares of all extensions of `prefixes[0]`, then all
    /// extensions of `prefixes[1]`, and so on, each prefix's extensions in
    /// increasing order. `T` must match the level's element width.
    ///
    /// An empty `prefixes` after the first call selects nothing: the result
    /// is an empty vector and the context does not advance.
    ///
    /// On error the context is left unchanged.
    pub fn evaluate_next<T: Value>(
        &self,
        prefixes: &[u128],
        ctx: &mut EvaluationContext,
    ) -> Result<Vec<T>> {
        if ctx.parameters != self.parameters {
            return Err(DpfError::InvalidArgument(
                "evaluation context was created for different parameters".into(),
            ));
        }
        self.validate_key(&ctx.key)?;
        let num_levels = self.parameters.len();
        if ctx.hierarchy_level < -1 || ctx.hierarchy_level > num_levels as i32 {
            return Err(DpfError::InvalidArgument(
                "context hierarchy level is out of range".into(),
            ));
        }
        if ctx.hierarchy_level >= num_levels as i32 - 1 {
            return Err(DpfError::FailedPrecondition(
                "every hierarchy level has already been evaluated".into(),
            ));
        }
        if ctx.hierarchy_level == -1 && !prefixes.is_empty() {
            return Err(DpfError::FailedPrecondition(
                "prefixes must be empty on the first call".into(),
            ));
        }
        if ctx.hierarchy_level >= 0 && prefixes.is_empty() {
            return Ok(Vec::new());
        }

        let hierarchy = (ctx.hierarchy_level + 1) as usize;
        let params = self.parameters[hierarchy];
        if T::BITS != params.element_bitsize {
            return Err(DpfError::InvalidArgument(format!(
                "output type is {} bits wide but level {hierarchy} produces {}-bit elements",
                T::BITS,
                params.element_bitsize
            )));
        }
        let prev_log_domain = if hierarchy == 0 {
            0
        } else {
            self.parameters[hierarchy - 1].log_domain_size
        };
        for &prefix in prefixes {
            if !fits_in_bits(prefix, prev_log_domain) {
                return Err(DpfError::InvalidArgument(format!(
                    "prefix {prefix} does not fit in {prev_log_domain} bits"
                )));
            }
        }

        let depth = self.layout.hierarchy_to_tree[hierarchy];
        let prev_depth = if hierarchy == 0 {
            0
        } else {
            self.layout.hierarchy_to_tree[hierarchy - 1]
        };
        let gap = params.log_domain_size - prev_log_domain;
        let too_large = || {
            DpfError::InvalidArgument(format!(
                "cannot expand {gap} new domain bits per prefix in one call"
            ))
        };
        let outputs_per_prefix = 1usize.checked_shl(gap).ok_or_else(too_large)?;
        let root = [0u128];
        let work: &[u128] = if hierarchy == 0 { &root } else { prefixes };
        let total = work
            .len()
            .checked_mul(outputs_per_prefix)
            .ok_or_else(too_large)?;

        // Walk each prefix down to the depth its fixed bits pin, then expand
        // the whole working set jointly. Children are enumerated left then
        // right, so nodes stay in prefix-major order throughout.
        let select_end = (prev_log_domain as usize).min(depth);
        let mut expansion = DpfExpansion::with_capacity(work.len() << (depth - select_end));
        for &prefix in work {
            let node = ctx
                .partial_evaluations
                .get(&Block::new(prefix))
                .ok_or_else(|| {
                    if hierarchy == 0 {
                        DpfError::Internal("evaluation context lost its root state".into())
                    } else {
                        DpfError::InvalidArgument(format!(
                            "prefix {prefix} does not extend any previously evaluated point"
                        ))
                    }
                })?;
            let mut seed = node.seed;
            let mut control_bit = node.control_bit;
            for level in prev_depth..select_end {
                let bit = (prefix >> (prev_log_domain as usize - 1 - level)) & 1 == 1;
                (seed, control_bit) =
                    self.descend(seed, control_bit, &ctx.key.correction_words[level], bit);
            }
            expansion.push(seed, control_bit);
        }
        for level in select_end..depth {
            expansion = self.expand_level(&expansion, &ctx.key.correction_words[level]);
        }

        let correction = if hierarchy == num_levels - 1 {
            ctx.key.last_level_value_correction
        } else {
            ctx.key.correction_words[depth]
                .value_correction
                .ok_or_else(|| {
                    DpfError::Internal("no value correction at a hierarchy boundary".into())
                })?
        };
        let value_blocks = self.prg_value.expand_batch(&expansion.seeds);
        let corrected: Vec<Block> = value_blocks
            .iter()
            .enumerate()
            .map(|(node, &value)| {
                correct_block::<T>(value, correction, expansion.control_bits[node], ctx.key.party)
            })
            .collect();

        // Read the outputs point by point out of the packed blocks.
        let slot_bits = params.log_domain_size as usize - depth;
        let slot_mask = (1u128 << slot_bits) - 1;
        let nodes_per_prefix = 1usize << (depth - select_end);
        let is_last = hierarchy == num_levels - 1;
        let mut outputs = Vec::with_capacity(total);
        let mut partial_evaluations = HashMap::new();
        if !is_last {
            partial_evaluations.reserve(total);
        }
        for (j, &prefix) in work.iter().enumerate() {
            let base = j * nodes_per_prefix;
            for extension in 0..outputs_per_prefix as u128 {
                let point = (prefix << gap) | extension;
                let node = base + (extension >> slot_bits) as usize;
                let slot = (point & slot_mask) as usize;
                outputs.push(T::from_bits(read_slot(corrected[node], T::BITS, slot)));
                if !is_last {
                    partial_evaluations.insert(
                        Block::new(point),
                        PartialEvaluation {
                            seed: expansion.seeds[node],
                            control_bit: expansion.control_bits[node],
                        },
                    );
                }
            }
        }

        ctx.partial_evaluations = partial_evaluations;
        ctx.hierarchy_level += 1;
        Ok(outputs)
    }

    /// Expands one node a level down on the given side, applying the level's
    /// correction word.
    fn descend(
        &self,
        seed: Block,
        control_bit: bool,
        cw: &CorrectionWord,
        right: bool,
    ) -> (Block, bool) {
        let expanded = if right {
            self.prg_right.expand(seed)
        } else {
            self.prg_left.expand(seed)
        };
        let mut child_seed = expanded.with_lsb_cleared();
        let mut child_bit = expanded.lsb();
        if control_bit {
            child_seed ^= cw.seed;
            child_bit ^= if right { cw.control_right } else { cw.control_left };
        }
        (child_seed, child_bit)
    }

    /// Expands a whole working set one level down, both children per node.
    fn expand_level(&self, expansion: &DpfExpansion, cw: &CorrectionWord) -> DpfExpansion {
        let lefts = self.prg_left.expand_batch(&expansion.seeds);
        let rights = self.prg_right.expand_batch(&expansion.seeds);
        let mut next = DpfExpansion::with_capacity(expansion.len() * 2);
        for node in 0..expansion.len() {
            let control_bit = expansion.control_bits[node];
            for (expanded, cw_control) in [
                (lefts[node], cw.control_left),
                (rights[node], cw.control_right),
            ] {
                let mut child_seed = expanded.with_lsb_cleared();
                let mut child_bit = expanded.lsb();
                if control_bit {
                    child_seed ^= cw.seed;
                    child_bit ^= cw_control;
                }
                next.push(child_seed, child_bit);
            }
        }
        next
    }
}
