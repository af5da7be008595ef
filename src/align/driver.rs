// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The banded forward-backward driver. The forward pass advances through
//! the band; whenever it is far enough ahead of the last extracted
//! diagonal, a bounded backward sweep is run against it, posteriors (or
//! expectations) are extracted from the overlap-free part, and diagonals
//! that fell out of the window are deleted. Peak memory is proportional to
//! the window, not to the sequence lengths.

use std::cmp;

use bio::stats::LogProb;

use crate::align::anchors::{self, AlignmentSegment};
use crate::align::diagonal::Band;
use crate::align::kernel;
use crate::align::matrix::DpMatrix;
use crate::align::{AlignedPair, ExtractionMode, PosteriorSink};
use crate::config::{PairwiseAlignmentParameters, PairwiseAlignmentParametersBuilder};
use crate::errors::{Error, Result};
use crate::model::{Emissions, Hmm, Transitions};
use crate::sequence::SequenceView;

/// Maximum tolerated disagreement (in log space) between the total
/// probabilities observed by successive backward sweeps.
const TOTAL_PROB_TOLERANCE: f64 = 1.0;

/// Run the banded forward-backward pass over one (sub-)alignment and feed
/// every extracted diagonal into the sink.
#[allow(clippy::too_many_arguments)]
pub fn get_posterior_probs_with_banding<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    anchors: &[(usize, usize)],
    sx: &X,
    sy: &Y,
    p: &PairwiseAlignmentParameters,
    ragged_left: bool,
    ragged_right: bool,
    sink: &mut PosteriorSink,
) -> Result<()>
where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    let lx = sx.len();
    let ly = sy.len();
    if lx == 0 || ly == 0 {
        // nothing is alignable
        return Ok(());
    }
    let n = lx + ly;
    let band = Band::new(anchors, lx, ly, p.diagonal_expansion())?;
    let window = p.min_diags_between_trace_back() + p.trace_back_diagonals() + 2;
    let capacity = cmp::min(window + 1, n + 1);
    let mut fwd = DpMatrix::new(capacity, machine.state_count());
    let mut bwd = DpMatrix::new(capacity, machine.state_count());

    fwd.create_diagonal(band.diagonal(0))?;
    match fwd.get_mut(0) {
        Some(d) => d.initialise(|s| {
            if ragged_left {
                machine.prob_ragged_start(s)
            } else {
                machine.prob_start(s)
            }
        }),
        None => unreachable!(),
    }

    let mut traced_back_to = 0;
    let mut fwd_low = 0;
    let mut total_prob: Option<LogProb> = None;

    for xay in 1..=n {
        fwd.create_diagonal(band.diagonal(xay))?;
        let mut current = fwd.take_diagonal(xay);
        kernel::forward_diagonal(
            machine,
            emissions,
            &mut current,
            fwd.get_behind(xay, 1),
            fwd.get_behind(xay, 2),
            sx,
            sy,
        );
        fwd.put_diagonal(current);

        let at_end = xay == n;
        if !at_end
            && xay - traced_back_to < p.min_diags_between_trace_back() + p.trace_back_diagonals()
        {
            continue;
        }
        // posteriors are only extracted trace_back_diagonals below the
        // sweep boundary, where the end-prior initialisation has washed out
        let traced_back_from = if at_end {
            xay
        } else {
            xay - p.trace_back_diagonals()
        };

        bwd.create_diagonal(band.diagonal(xay))?;
        match bwd.get_mut(xay) {
            Some(d) => d.initialise(|s| {
                if at_end && ragged_right {
                    machine.prob_ragged_end(s)
                } else {
                    machine.prob_end(s)
                }
            }),
            None => unreachable!(),
        }
        for xay2 in (traced_back_to..xay).rev() {
            bwd.create_diagonal(band.diagonal(xay2))?;
            let mut current = bwd.take_diagonal(xay2);
            kernel::backward_diagonal(
                machine,
                emissions,
                &mut current,
                bwd.get(xay2 + 1),
                bwd.get(xay2 + 2),
                sx,
                sy,
            );
            bwd.put_diagonal(current);
        }

        let sweep_total =
            kernel::total_probability(machine, emissions, traced_back_to, &fwd, &bwd, sx, sy);
        match total_prob {
            None => {
                if *sweep_total == f64::NEG_INFINITY {
                    return Err(Error::AlignmentImpossible {
                        x_start: 0,
                        y_start: 0,
                        x_end: lx,
                        y_end: ly,
                    });
                }
                debug!("total alignment probability: {}", *sweep_total);
                total_prob = Some(sweep_total);
            }
            Some(previous) => {
                if (*sweep_total - *previous).abs() > TOTAL_PROB_TOLERANCE {
                    return Err(Error::IntegrityCheck {
                        forward: *previous,
                        backward: *sweep_total,
                    });
                }
            }
        }

        for xay2 in traced_back_to + 1..=traced_back_from {
            match &mut *sink {
                PosteriorSink::Pairs { pairs, mode } => kernel::posterior_match_probs(
                    machine, xay2, &fwd, &bwd, sweep_total, p, *mode, pairs,
                ),
                PosteriorSink::Expectations(hmm) => kernel::expectation_diagonal(
                    machine, emissions, xay2, &fwd, &bwd, sweep_total, hmm, sx, sy,
                ),
            }
        }

        if !at_end {
            // slide the window; the diagonal just below the new tail is
            // kept, later extractions still read through it
            let keep_from = traced_back_from.saturating_sub(1);
            for xay2 in fwd_low..keep_from {
                fwd.delete_diagonal(xay2);
            }
            fwd_low = keep_from;
            for xay2 in traced_back_to..=xay {
                bwd.delete_diagonal(xay2);
            }
            traced_back_to = traced_back_from;
        }
    }

    if let PosteriorSink::Expectations(hmm) = sink {
        if let Some(total) = total_prob {
            hmm.add_likelihood(*total);
        }
    }
    Ok(())
}

/// Split the alignment over large anchor gaps and run the banded pass on
/// every sub-alignment. A sub-alignment for which the alignment is
/// impossible contributes nothing; the remaining segments are still
/// processed.
#[allow(clippy::too_many_arguments)]
pub fn get_posterior_probs_with_banding_and_splitting<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    anchors: &[(usize, usize)],
    sx: &X,
    sy: &Y,
    p: &PairwiseAlignmentParameters,
    ragged_left: bool,
    ragged_right: bool,
    sink: &mut PosteriorSink,
) -> Result<()>
where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    let segments = anchors::split_points(
        anchors,
        sx.len(),
        sy.len(),
        p.split_matrix_bigger_than_this(),
        ragged_left,
        ragged_right,
    );
    for segment in &segments {
        let result = run_segment(machine, emissions, segment, sx, sy, p, sink);
        if let Err(Error::AlignmentImpossible { .. }) = result {
            warn!(
                "skipping sub-alignment ({}, {})-({}, {}): alignment impossible",
                segment.x_start, segment.y_start, segment.x_end, segment.y_end
            );
            continue;
        }
        result?;
    }
    Ok(())
}

fn run_segment<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    segment: &AlignmentSegment,
    sx: &X,
    sy: &Y,
    p: &PairwiseAlignmentParameters,
    sink: &mut PosteriorSink,
) -> Result<()>
where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    let sub_sx = sx.slice(segment.x_start, segment.x_end - segment.x_start);
    let sub_sy = sy.slice(segment.y_start, segment.y_end - segment.y_start);
    match &mut *sink {
        PosteriorSink::Pairs { pairs, mode } => {
            let mut sub_pairs = Vec::new();
            {
                let mut sub_sink = PosteriorSink::Pairs {
                    pairs: &mut sub_pairs,
                    mode: *mode,
                };
                get_posterior_probs_with_banding(
                    machine,
                    emissions,
                    &segment.anchors,
                    &sub_sx,
                    &sub_sy,
                    p,
                    segment.ragged_left,
                    segment.ragged_right,
                    &mut sub_sink,
                )?;
            }
            pairs.extend(sub_pairs.into_iter().map(|pair| {
                AlignedPair::new(
                    pair.posterior,
                    pair.x + segment.x_start,
                    pair.y + segment.y_start,
                )
            }));
            Ok(())
        }
        PosteriorSink::Expectations(hmm) => {
            let mut sub_sink = PosteriorSink::Expectations(&mut **hmm);
            get_posterior_probs_with_banding(
                machine,
                emissions,
                &segment.anchors,
                &sub_sx,
                &sub_sy,
                p,
                segment.ragged_left,
                segment.ragged_right,
                &mut sub_sink,
            )
        }
    }
}

/// Posterior match probabilities of the whole alignment, banded around the
/// given anchors and split over large gaps. Pairs are returned ordered by
/// `(x + y, x)`.
#[allow(clippy::too_many_arguments)]
pub fn get_aligned_pairs<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    sx: &X,
    sy: &Y,
    anchors: &[(usize, usize)],
    p: &PairwiseAlignmentParameters,
    ragged_left: bool,
    ragged_right: bool,
    mode: ExtractionMode,
) -> Result<Vec<AlignedPair>>
where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    if mode == ExtractionMode::MultiMatch && machine.match_states().is_empty() {
        return Err(Error::UnsupportedStateMachine {
            kind: machine.kind(),
        });
    }
    let mut pairs = Vec::new();
    {
        let mut sink = PosteriorSink::Pairs {
            pairs: &mut pairs,
            mode,
        };
        get_posterior_probs_with_banding_and_splitting(
            machine,
            emissions,
            anchors,
            sx,
            sy,
            p,
            ragged_left,
            ragged_right,
            &mut sink,
        )?;
    }
    pairs.sort_by_key(|pair| (pair.x + pair.y, pair.x));
    Ok(pairs)
}

/// One expectation step of Baum-Welch training over the whole alignment,
/// accumulated into `hmm`.
#[allow(clippy::too_many_arguments)]
pub fn get_expectations<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    hmm: &mut Hmm,
    sx: &X,
    sy: &Y,
    anchors: &[(usize, usize)],
    p: &PairwiseAlignmentParameters,
    ragged_left: bool,
    ragged_right: bool,
) -> Result<()>
where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    let mut sink = PosteriorSink::Expectations(hmm);
    get_posterior_probs_with_banding_and_splitting(
        machine,
        emissions,
        anchors,
        sx,
        sy,
        p,
        ragged_left,
        ragged_right,
        &mut sink,
    )
}

/// Correctness reference: align with the band covering the whole matrix and
/// a window spanning every diagonal. Quadratic, only sensible for small
/// inputs.
pub fn get_aligned_pairs_without_banding<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    sx: &X,
    sy: &Y,
    p: &PairwiseAlignmentParameters,
    ragged_left: bool,
    ragged_right: bool,
    mode: ExtractionMode,
) -> Result<Vec<AlignedPair>>
where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    let n = sx.len() + sy.len();
    let p_full = PairwiseAlignmentParametersBuilder::default()
        .threshold(p.threshold())
        .diagonal_expansion(n)
        .min_diags_between_trace_back(n + 2)
        .trace_back_diagonals(0)
        .split_matrix_bigger_than_this(usize::max_value())
        .align_ambiguity_characters(p.align_ambiguity_characters())
        .gap_gamma(p.gap_gamma())
        .build()
        .unwrap();
    let mut pairs = Vec::new();
    {
        let mut sink = PosteriorSink::Pairs {
            pairs: &mut pairs,
            mode,
        };
        get_posterior_probs_with_banding(
            machine,
            emissions,
            &[],
            sx,
            sy,
            &p_full,
            ragged_left,
            ragged_right,
            &mut sink,
        )?;
    }
    pairs.sort_by_key(|pair| (pair.x + pair.y, pair.x));
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::emissions::NucleotideEmissions;
    use crate::model::ThreeState;
    use crate::sequence::Bases;

    fn params(expansion: usize) -> PairwiseAlignmentParameters {
        PairwiseAlignmentParametersBuilder::default()
            .diagonal_expansion(expansion)
            .build()
            .unwrap()
    }

    #[test]
    fn test_sliding_window_matches_reference() {
        let machine = ThreeState::nucleotide_defaults();
        let emissions = NucleotideEmissions::default();
        let x = b"ACGTAGCTACGATCGATTTACGGCATCAGGCATTAACGTACGTAGCTAGC".to_vec();
        let mut y = x.clone();
        // a substitution, a deletion and an insertion
        y[10] = b'T';
        y.remove(25);
        y.insert(40, b'G');
        let sx = Bases::new(&x);
        let sy = Bases::new(&y);
        let reference = get_aligned_pairs_without_banding(
            &machine,
            &emissions,
            &sx,
            &sy,
            &params(20),
            false,
            false,
            ExtractionMode::SingleMatch,
        )
        .unwrap();
        // small window so that several sweeps happen
        let p = PairwiseAlignmentParametersBuilder::default()
            .diagonal_expansion(x.len() + y.len())
            .min_diags_between_trace_back(20)
            .trace_back_diagonals(40)
            .build()
            .unwrap();
        let windowed = get_aligned_pairs(
            &machine,
            &emissions,
            &sx,
            &sy,
            &[],
            &p,
            false,
            false,
            ExtractionMode::SingleMatch,
        )
        .unwrap();
        let key = |pair: &AlignedPair| (pair.x, pair.y);
        let reference_keys: Vec<_> = reference.iter().map(key).collect();
        let differing = windowed
            .iter()
            .filter(|pair| !reference_keys.contains(&key(pair)))
            .count()
            + reference
                .iter()
                .filter(|pair| !windowed.iter().any(|w| key(w) == key(pair)))
                .count();
        assert!(differing <= 2, "{} pairs differ", differing);
        for a in &reference {
            if let Some(b) = windowed.iter().find(|w| key(w) == key(a)) {
                assert!(
                    (a.posterior - b.posterior).abs() < 20_000,
                    "posterior drifted: {:?} vs {:?}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_multi_match_equals_single_for_one_match_state() {
        let machine = ThreeState::nucleotide_defaults();
        let emissions = NucleotideEmissions::default();
        let sx = Bases::new(b"ACGTACGT");
        let sy = Bases::new(b"ACGTACGT");
        let single = get_aligned_pairs(
            &machine, &emissions, &sx, &sy, &[], &params(20), false, false,
            ExtractionMode::SingleMatch,
        )
        .unwrap();
        let multi = get_aligned_pairs(
            &machine, &emissions, &sx, &sy, &[], &params(20), false, false,
            ExtractionMode::MultiMatch,
        )
        .unwrap();
        assert_eq!(single, multi);
    }

    struct ImpossibleEmissions;

    impl crate::model::Emissions<u8, u8> for ImpossibleEmissions {
        fn prob_match(&self, _: u8, _: u8) -> LogProb {
            LogProb::ln_zero()
        }
        fn prob_gap_x(&self, _: u8) -> LogProb {
            LogProb::ln_zero()
        }
        fn prob_gap_y(&self, _: u8, _: u8) -> LogProb {
            LogProb::ln_zero()
        }
    }

    #[test]
    fn test_alignment_impossible_is_reported() {
        let machine = ThreeState::nucleotide_defaults();
        let sx = Bases::new(b"ACGT");
        let sy = Bases::new(b"ACGT");
        let result = get_posterior_probs_with_banding(
            &machine,
            &ImpossibleEmissions,
            &[],
            &sx,
            &sy,
            &params(20),
            false,
            false,
            &mut PosteriorSink::Pairs {
                pairs: &mut Vec::new(),
                mode: ExtractionMode::SingleMatch,
            },
        );
        assert!(matches!(result, Err(Error::AlignmentImpossible { .. })));
    }

    #[test]
    fn test_impossible_segment_is_skipped_by_splitting() {
        let machine = ThreeState::nucleotide_defaults();
        let sx = Bases::new(b"ACGT");
        let sy = Bases::new(b"ACGT");
        let pairs = get_aligned_pairs(
            &machine,
            &ImpossibleEmissions,
            &sx,
            &sy,
            &[],
            &params(20),
            false,
            false,
            ExtractionMode::SingleMatch,
        )
        .unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_empty_sequence_yields_no_pairs() {
        let machine = ThreeState::nucleotide_defaults();
        let emissions = NucleotideEmissions::default();
        let sx = Bases::new(b"");
        let sy = Bases::new(b"ACGT");
        let pairs = get_aligned_pairs(
            &machine, &emissions, &sx, &sy, &[], &params(20), false, false,
            ExtractionMode::SingleMatch,
        )
        .unwrap();
        assert!(pairs.is_empty());
    }
}
