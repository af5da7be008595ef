// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Post-processing of aligned pairs: per-position gap posteriors and the
//! AMAP-style reweighting that trades match posterior against indel
//! posterior.

use crate::align::{AlignedPair, PROB_ONE};

/// Per-position probability of being gapped, in fixed point: `PROB_ONE`
/// minus the summed match posteriors projecting onto the position, clamped
/// to `[0, PROB_ONE]`.
pub fn indel_probabilities(
    pairs: &[AlignedPair],
    seq_length: usize,
    x_if_true_else_y: bool,
) -> Vec<i64> {
    let mut probs = vec![PROB_ONE; seq_length];
    for pair in pairs {
        let i = if x_if_true_else_y { pair.x } else { pair.y };
        probs[i] -= pair.posterior;
    }
    for p in &mut probs {
        *p = (*p).max(0).min(PROB_ONE);
    }
    probs
}

/// Replace each pair's posterior by the gap-gamma weighted difference with
/// the indel posteriors of its two positions; pairs whose adjusted weight
/// is not positive are discarded.
pub fn reweight_aligned_pairs(
    pairs: Vec<AlignedPair>,
    indel_probs_x: &[i64],
    indel_probs_y: &[i64],
    gap_gamma: f64,
) -> Vec<AlignedPair> {
    pairs
        .into_iter()
        .filter_map(|pair| {
            let penalty =
                gap_gamma * (indel_probs_x[pair.x] + indel_probs_y[pair.y]) as f64;
            let weight = pair.posterior as f64 - penalty;
            if weight > 0.0 {
                Some(AlignedPair::new(weight.round() as i64, pair.x, pair.y))
            } else {
                None
            }
        })
        .collect()
}

/// Convenience form deriving both indel vectors from the pairs themselves.
pub fn reweight_aligned_pairs_from_lengths(
    pairs: Vec<AlignedPair>,
    seq_length_x: usize,
    seq_length_y: usize,
    gap_gamma: f64,
) -> Vec<AlignedPair> {
    let indel_probs_x = indel_probabilities(&pairs, seq_length_x, true);
    let indel_probs_y = indel_probabilities(&pairs, seq_length_y, false);
    reweight_aligned_pairs(pairs, &indel_probs_x, &indel_probs_y, gap_gamma)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs() -> Vec<AlignedPair> {
        vec![
            AlignedPair::new(9_000_000, 0, 0),
            AlignedPair::new(8_000_000, 1, 1),
            AlignedPair::new(1_000_000, 1, 2),
            AlignedPair::new(9_500_000, 2, 3),
        ]
    }

    #[test]
    fn test_indel_probabilities() {
        let probs = indel_probabilities(&pairs(), 4, true);
        assert_eq!(probs[0], 1_000_000);
        // both pairs of x = 1 project onto the position
        assert_eq!(probs[1], 1_000_000);
        assert_eq!(probs[2], 500_000);
        // never aligned
        assert_eq!(probs[3], PROB_ONE);
    }

    #[test]
    fn test_indel_probabilities_clamped() {
        let overfull = vec![
            AlignedPair::new(9_000_000, 0, 0),
            AlignedPair::new(9_000_000, 0, 1),
        ];
        let probs = indel_probabilities(&overfull, 1, true);
        assert_eq!(probs[0], 0);
    }

    #[test]
    fn test_reweight_with_zero_indels_is_identity() {
        let zero_x = vec![0; 4];
        let zero_y = vec![0; 4];
        let reweighted = reweight_aligned_pairs(pairs(), &zero_x, &zero_y, 0.5);
        assert_eq!(reweighted, pairs());
    }

    #[test]
    fn test_reweight_discards_nonpositive_weights() {
        let indel_x = indel_probabilities(&pairs(), 3, true);
        let indel_y = indel_probabilities(&pairs(), 4, false);
        let reweighted = reweight_aligned_pairs(pairs(), &indel_x, &indel_y, 0.9);
        // the weak (1, 2) pair carries high indel posterior on both sides
        assert!(reweighted.iter().all(|p| !(p.x == 1 && p.y == 2)));
        assert!(!reweighted.is_empty());
        for pair in &reweighted {
            assert!(pair.posterior > 0);
        }
    }

    #[test]
    fn test_reweight_from_lengths() {
        let reweighted = reweight_aligned_pairs_from_lengths(pairs(), 3, 4, 0.0);
        // gamma zero keeps every pair untouched
        assert_eq!(reweighted, pairs());
    }
}
