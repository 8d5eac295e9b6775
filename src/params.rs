// SPDX-License-Identifier: Apache-2.0

//! Hierarchy-level parameters and their mapping onto the binary evaluation
//! tree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{DpfError, Result};

/// Base-2 logarithm of the block width.
const LOG_BLOCK_BITS: u32 = 7;

/// Domain and output size of one hierarchy level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpfParameters {
    /// Base-2 logarithm of the domain size at this level, in `[0, 128]`.
    pub log_domain_size: u32,
    /// Bit width of the output elements at this level, a power of two in
    /// `[1, 128]`.
    pub element_bitsize: u32,
}

impl DpfParameters {
    pub fn new(log_domain_size: u32, element_bitsize: u32) -> Self {
        Self {
            log_domain_size,
            element_bitsize,
        }
    }

    /// How many domain bits a single output block absorbs at this element
    /// width.
    pub(crate) fn log_elements_per_block(self) -> u32 {
        LOG_BLOCK_BITS - self.element_bitsize.trailing_zeros()
    }
}

/// Checks the full parameter list of an incremental DPF.
pub(crate) fn validate_parameters(parameters: &[DpfParameters]) -> Result<()> {
    if parameters.is_empty() {
        return Err(DpfError::InvalidArgument(
            "parameter list must not be empty".into(),
        ));
    }
    for (i, p) in parameters.iter().enumerate() {
        if p.log_domain_size > 128 {
            return Err(DpfError::InvalidArgument(format!(
                "log_domain_size must be in [0, 128], got {} at level {i}",
                p.log_domain_size
            )));
        }
        if !p.element_bitsize.is_power_of_two() || p.element_bitsize > 128 {
            return Err(DpfError::InvalidArgument(format!(
                "element_bitsize must be a power of two in [1, 128], got {} at level {i}",
                p.element_bitsize
            )));
        }
    }
    for (i, pair) in parameters.windows(2).enumerate() {
        if pair[1].log_domain_size <= pair[0].log_domain_size {
            return Err(DpfError::InvalidArgument(format!(
                "log_domain_size must be strictly increasing, got {} after {} at level {}",
                pair[1].log_domain_size,
                pair[0].log_domain_size,
                i + 1
            )));
        }
        if pair[1].element_bitsize < pair[0].element_bitsize {
            return Err(DpfError::InvalidArgument(format!(
                "element_bitsize must be non-decreasing, got {} after {} at level {}",
                pair[1].element_bitsize,
                pair[0].element_bitsize,
                i + 1
            )));
        }
    }
    Ok(())
}

/// Where each hierarchy level lands in the evaluation tree.
///
/// Hierarchy level `i` is computed from the seeds at tree depth
/// `hierarchy_to_tree[i]`, the smallest depth at which its whole output fits
/// the per-node block, pushed down as needed so every level owns a distinct
/// depth. Correction word `t` takes depth-`t` seeds to depth `t + 1`; the
/// value correction of a non-final hierarchy level rides on the correction
/// word at its output depth, while the final level's is applied past the last
/// correction word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TreeLayout {
    /// Number of correction words each key carries.
    pub tree_levels_needed: usize,
    /// Output depths of the non-final hierarchy levels, by owning level.
    pub tree_to_hierarchy: HashMap<usize, usize>,
    /// Output depth of each hierarchy level.
    pub hierarchy_to_tree: Vec<usize>,
}

impl TreeLayout {
    /// `parameters` must have passed [`validate_parameters`].
    pub fn compute(parameters: &[DpfParameters]) -> Self {
        let mut hierarchy_to_tree = Vec::with_capacity(parameters.len());
        let mut depth = 0usize;
        for (i, p) in parameters.iter().enumerate() {
            let min_depth =
                (p.log_domain_size as usize).saturating_sub(p.log_elements_per_block() as usize);
            depth = if i == 0 { min_depth } else { min_depth.max(depth + 1) };
            hierarchy_to_tree.push(depth);
        }
        let tree_levels_needed = depth;
        let mut tree_to_hierarchy = HashMap::new();
        for (i, &d) in hierarchy_to_tree
            .iter()
            .take(parameters.len() - 1)
            .enumerate()
        {
            tree_to_hierarchy.insert(d, i);
        }
        Self {
            tree_levels_needed,
            tree_to_hierarchy,
            hierarchy_to_tree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(list: &[(u32, u32)]) -> Vec<DpfParameters> {
        list.iter()
            .map(|&(n, b)| DpfParameters::new(n, b))
            .collect()
    }

    #[test]
    fn test_validate_accepts_single_level() {
        assert!(validate_parameters(&params(&[(4, 32)])).is_ok());
        assert!(validate_parameters(&params(&[(0, 1)])).is_ok());
        assert!(validate_parameters(&params(&[(128, 128)])).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_list() {
        assert!(matches!(
            validate_parameters(&[]),
            Err(DpfError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_domain() {
        assert!(matches!(
            validate_parameters(&params(&[(129, 8)])),
            Err(DpfError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_element_bitsize() {
        for bitsize in [0, 3, 12, 129, 256] {
            assert!(matches!(
                validate_parameters(&params(&[(4, bitsize)])),
                Err(DpfError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_validate_rejects_non_increasing_domains() {
        assert!(matches!(
            validate_parameters(&params(&[(4, 8), (3, 8)])),
            Err(DpfError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_parameters(&params(&[(4, 8), (4, 8)])),
            Err(DpfError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_rejects_decreasing_element_bitsize() {
        assert!(matches!(
            validate_parameters(&params(&[(2, 16), (4, 8)])),
            Err(DpfError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_layout_single_level_packed() {
        // 16 32-bit elements, 4 per block: 2 tree levels cover the domain.
        let layout = TreeLayout::compute(&params(&[(4, 32)]));
        assert_eq!(layout.tree_levels_needed, 2);
        assert_eq!(layout.hierarchy_to_tree, vec![2]);
        assert!(layout.tree_to_hierarchy.is_empty());
    }

    #[test]
    fn test_layout_whole_domain_in_root_block() {
        let layout = TreeLayout::compute(&params(&[(1, 1)]));
        assert_eq!(layout.tree_levels_needed, 0);
        assert_eq!(layout.hierarchy_to_tree, vec![0]);

        let layout = TreeLayout::compute(&params(&[(0, 64)]));
        assert_eq!(layout.tree_levels_needed, 0);
        assert_eq!(layout.hierarchy_to_tree, vec![0]);
    }

    #[test]
    fn test_layout_two_levels() {
        let layout = TreeLayout::compute(&params(&[(2, 8), (4, 8)]));
        assert_eq!(layout.hierarchy_to_tree, vec![0, 1]);
        assert_eq!(layout.tree_levels_needed, 1);
        assert_eq!(layout.tree_to_hierarchy, HashMap::from([(0, 0)]));
    }

    #[test]
    fn test_layout_mixed_widths() {
        let layout = TreeLayout::compute(&params(&[(3, 1), (6, 8)]));
        assert_eq!(layout.hierarchy_to_tree, vec![0, 2]);
        assert_eq!(layout.tree_levels_needed, 2);
        assert_eq!(layout.tree_to_hierarchy, HashMap::from([(0, 0)]));
    }

    #[test]
    fn test_layout_forces_distinct_depths() {
        // Both levels would pack into the root block; the second is pushed
        // down so it gets its own depth.
        let layout = TreeLayout::compute(&params(&[(1, 2), (2, 2)]));
        assert_eq!(layout.hierarchy_to_tree, vec![0, 1]);
        assert_eq!(layout.tree_levels_needed, 1);
    }

    #[test]
    fn test_layout_full_width_elements_never_pack() {
        let layout = TreeLayout::compute(&params(&[(3, 128)]));
        assert_eq!(layout.tree_levels_needed, 3);
        assert_eq!(layout.hierarchy_to_tree, vec![3]);
    }
}
