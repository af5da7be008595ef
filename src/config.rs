// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

/// Banding and posterior-extraction parameters of a pairwise alignment.
///
/// Use `PairwiseAlignmentParametersBuilder` to deviate from the defaults.
#[derive(Debug, Clone, Builder, CopyGetters, Serialize, Deserialize)]
#[get_copy = "pub"]
pub struct PairwiseAlignmentParameters {
    /// Minimum posterior probability of a match to be reported.
    #[builder(default = "0.01")]
    threshold: f64,
    /// Minimum number of x+y diagonals to advance between backward sweeps.
    #[builder(default = "1000")]
    min_diags_between_trace_back: usize,
    /// Overlap between successive backward sweeps. Posteriors are only
    /// extracted this many diagonals below the sweep boundary, where the
    /// end-prior initialisation has washed out.
    #[builder(default = "40")]
    trace_back_diagonals: usize,
    /// Number of cells to expand the band around each anchor point.
    #[builder(default = "20")]
    diagonal_expansion: usize,
    /// Amount to trim from both ends of a match run before its positions
    /// are used as banding constraints.
    #[builder(default = "14")]
    constraint_diagonal_trim: usize,
    /// Gap rectangles bigger than this are searched for additional anchors.
    #[builder(default = "500_000")]
    anchor_matrix_bigger_than_this: usize,
    /// Gap rectangles bigger than this are searched for anchors without
    /// respecting repeat masking.
    #[builder(default = "500_000_000")]
    repeat_mask_matrix_bigger_than_this: usize,
    /// Gap rectangles bigger than this are split into two sub-alignments.
    #[builder(default = "3_000_000_000")]
    split_matrix_bigger_than_this: usize,
    /// Treat `N` and other ambiguous bases as wildcards instead of
    /// unalignable symbols.
    #[builder(default = "false")]
    align_ambiguity_characters: bool,
    /// Weight of the indel posterior term when reweighting aligned pairs.
    #[builder(default = "0.5")]
    gap_gamma: f64,
}

impl Default for PairwiseAlignmentParameters {
    fn default() -> Self {
        PairwiseAlignmentParametersBuilder::default().build().unwrap()
    }
}
