// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The banded forward-backward engine: diagonal geometry, the sliding DP
//! matrix, per-cell and per-diagonal kernels, the top-level driver, anchor
//! scaffolding and posterior post-processing.

pub mod anchors;
pub mod diagonal;
pub mod driver;
pub mod kernel;
pub mod matrix;
pub mod posterior;

use crate::model::Hmm;

/// Fixed-point value of probability one. Posteriors are carried as integers
/// to keep sorting and aggregation deterministic.
pub const PROB_ONE: i64 = 10_000_000;

/// A pair of 0-based sequence positions aligned with the given fixed-point
/// posterior probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, new)]
pub struct AlignedPair {
    pub posterior: i64,
    pub x: usize,
    pub y: usize,
}

impl AlignedPair {
    /// Posterior probability as a fraction of [`PROB_ONE`].
    pub fn prob(&self) -> f64 {
        self.posterior as f64 / PROB_ONE as f64
    }
}

/// How posterior match probabilities are turned into aligned pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Report the posterior of the match state only.
    SingleMatch,
    /// Report the summed posterior of every state the machine declares as
    /// high confidence.
    MultiMatch,
}

/// Where a backward sweep sends its per-cell results.
pub enum PosteriorSink<'a> {
    Pairs {
        pairs: &'a mut Vec<AlignedPair>,
        mode: ExtractionMode,
    },
    Expectations(&'a mut Hmm),
}

/// Average posterior match probability per aligned pair, in percent.
/// Indels do not contribute.
pub fn score_by_posterior_probability_ignoring_gaps(pairs: &[AlignedPair]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let total: i64 = pairs.iter().map(|p| p.posterior).sum();
    100.0 * total as f64 / (pairs.len() as i64 * PROB_ONE) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posterior_score() {
        let pairs = vec![
            AlignedPair::new(PROB_ONE, 0, 0),
            AlignedPair::new(PROB_ONE / 2, 1, 1),
        ];
        assert_relative_eq!(score_by_posterior_probability_ignoring_gaps(&pairs), 75.0);
        assert_relative_eq!(score_by_posterior_probability_ignoring_gaps(&[]), 0.0);
    }
}
