// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Forward and backward recurrences over single diagonals, plus the
//! per-diagonal reductions built on them: total probability, posterior
//! match extraction and expectation accumulation.

use bio::stats::LogProb;

use crate::align::diagonal::{x_coordinate, y_coordinate};
use crate::align::matrix::{DpDiagonal, DpMatrix};
use crate::align::{AlignedPair, ExtractionMode, PROB_ONE};
use crate::config::PairwiseAlignmentParameters;
use crate::model::{Edge, Emissions, EmissionClass, Hmm, Transitions};
use crate::sequence::SequenceView;

fn apply_edges(current: &mut [LogProb], pred: &[LogProb], edges: &[Edge], emission: LogProb) {
    for edge in edges {
        current[edge.to] = current[edge.to].ln_add_exp(pred[edge.from] + edge.prob + emission);
    }
}

/// Forward recurrence for one cell given its banded predecessors. Absent
/// predecessors contribute log zero.
#[allow(clippy::too_many_arguments)]
fn cell_forward<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    current: &mut [LogProb],
    lower: Option<&[LogProb]>,
    middle: Option<&[LogProb]>,
    upper: Option<&[LogProb]>,
    x: usize,
    y: usize,
    sx: &X,
    sy: &Y,
) where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    if let Some(lower) = lower {
        // the banded lower predecessor (x, y-1) implies y >= 1; at x = 0
        // the gap context degenerates to the first reference symbol
        let cx = sx.get(x.saturating_sub(1));
        let e = emissions.prob_gap_y(cx, sy.get(y - 1));
        apply_edges(current, lower, machine.edges(EmissionClass::GapY), e);
    }
    if let Some(middle) = middle {
        let e = emissions.prob_match(sx.get(x - 1), sy.get(y - 1));
        apply_edges(current, middle, machine.edges(EmissionClass::Match), e);
    }
    if let Some(upper) = upper {
        let e = emissions.prob_gap_x(sx.get(x - 1));
        apply_edges(current, upper, machine.edges(EmissionClass::GapX), e);
    }
}

/// Backward recurrence for one cell given its banded successors.
#[allow(clippy::too_many_arguments)]
fn cell_backward<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    current: &mut [LogProb],
    gap_y_succ: Option<&[LogProb]>,
    match_succ: Option<&[LogProb]>,
    gap_x_succ: Option<&[LogProb]>,
    x: usize,
    y: usize,
    sx: &X,
    sy: &Y,
) where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    if let Some(succ) = gap_y_succ {
        let cx = sx.get(x.saturating_sub(1));
        let e = emissions.prob_gap_y(cx, sy.get(y));
        apply_edges(current, succ, machine.edges(EmissionClass::GapY), e);
    }
    if let Some(succ) = match_succ {
        let e = emissions.prob_match(sx.get(x), sy.get(y));
        apply_edges(current, succ, machine.edges(EmissionClass::Match), e);
    }
    if let Some(succ) = gap_x_succ {
        let e = emissions.prob_gap_x(sx.get(x));
        apply_edges(current, succ, machine.edges(EmissionClass::GapX), e);
    }
}

/// Forward-fill a whole diagonal from the two diagonals behind it.
pub fn forward_diagonal<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    current: &mut DpDiagonal,
    prev1: Option<&DpDiagonal>,
    prev2: Option<&DpDiagonal>,
    sx: &X,
    sy: &Y,
) where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    let diagonal = current.diagonal();
    for xmy in diagonal.cells() {
        let x = x_coordinate(diagonal.xay(), xmy) as usize;
        let y = y_coordinate(diagonal.xay(), xmy) as usize;
        let lower = prev1.and_then(|d| d.cell(xmy + 1));
        let middle = prev2.and_then(|d| d.cell(xmy));
        let upper = prev1.and_then(|d| d.cell(xmy - 1));
        match current.cell_mut(xmy) {
            Some(cell) => {
                cell_forward(machine, emissions, cell, lower, middle, upper, x, y, sx, sy)
            }
            None => unreachable!(),
        }
    }
}

/// Backward-fill a whole diagonal from the two diagonals ahead of it. In
/// backward cells the emission of the cell itself is excluded, so the
/// forward/backward product at a cell is the full-path probability.
pub fn backward_diagonal<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    current: &mut DpDiagonal,
    next1: Option<&DpDiagonal>,
    next2: Option<&DpDiagonal>,
    sx: &X,
    sy: &Y,
) where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    let diagonal = current.diagonal();
    for xmy in diagonal.cells() {
        let x = x_coordinate(diagonal.xay(), xmy) as usize;
        let y = y_coordinate(diagonal.xay(), xmy) as usize;
        let gap_y_succ = next1.and_then(|d| d.cell(xmy - 1));
        let gap_x_succ = next1.and_then(|d| d.cell(xmy + 1));
        let match_succ = next2.and_then(|d| d.cell(xmy));
        match current.cell_mut(xmy) {
            Some(cell) => cell_backward(
                machine, emissions, cell, gap_y_succ, match_succ, gap_x_succ, x, y, sx, sy,
            ),
            None => unreachable!(),
        }
    }
}

/// Total probability of the alignment, evaluated at diagonal `xay` of a
/// completed forward/backward pair. Besides the dot product of the two
/// diagonals, match steps bridging `xay` from `xay - 1` to `xay + 1`
/// contribute.
pub fn total_probability<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    xay: usize,
    fwd: &DpMatrix,
    bwd: &DpMatrix,
    sx: &X,
    sy: &Y,
) -> LogProb
where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    let mut total = match (fwd.get(xay), bwd.get(xay)) {
        (Some(f), Some(b)) => f.dot_product(b),
        _ => panic!("bug: total probability requested for non-resident diagonal {}", xay),
    };
    if let (Some(f), Some(b)) = (fwd.get_behind(xay, 1), bwd.get(xay + 1)) {
        for xmy in f.diagonal().cells() {
            if let (Some(fc), Some(bc)) = (f.cell(xmy), b.cell(xmy)) {
                let x = x_coordinate(xay as i64 + 1, xmy) as usize;
                let y = y_coordinate(xay as i64 + 1, xmy) as usize;
                let e = emissions.prob_match(sx.get(x - 1), sy.get(y - 1));
                for edge in machine.edges(EmissionClass::Match) {
                    total = total.ln_add_exp(fc[edge.from] + edge.prob + e + bc[edge.to]);
                }
            }
        }
    }
    total
}

/// Emit aligned pairs for every cell of diagonal `xay` whose posterior
/// match probability reaches the threshold. Cell coordinates are converted
/// to 0-based aligned positions.
pub fn posterior_match_probs<T: Transitions>(
    machine: &T,
    xay: usize,
    fwd: &DpMatrix,
    bwd: &DpMatrix,
    total: LogProb,
    p: &PairwiseAlignmentParameters,
    mode: ExtractionMode,
    pairs: &mut Vec<AlignedPair>,
) {
    let (f, b) = match (fwd.get(xay), bwd.get(xay)) {
        (Some(f), Some(b)) => (f, b),
        _ => panic!("bug: posterior extraction on non-resident diagonal {}", xay),
    };
    let single = [machine.match_state()];
    let states: &[usize] = match mode {
        ExtractionMode::SingleMatch => &single,
        ExtractionMode::MultiMatch => machine.match_states(),
    };
    for xmy in f.diagonal().cells() {
        let x = x_coordinate(xay as i64, xmy);
        let y = y_coordinate(xay as i64, xmy);
        if x < 1 || y < 1 {
            continue;
        }
        if let (Some(fc), Some(bc)) = (f.cell(xmy), b.cell(xmy)) {
            let mut posterior = 0.0;
            for &s in states {
                posterior += (*(fc[s] + bc[s]) - *total).exp();
            }
            let posterior = posterior.min(1.0);
            if posterior >= p.threshold() {
                pairs.push(AlignedPair::new(
                    (posterior * PROB_ONE as f64).round() as i64,
                    x as usize - 1,
                    y as usize - 1,
                ));
            }
        }
    }
}

/// Accumulate transition and emission expectations over every edge that
/// enters a cell of diagonal `xay`.
#[allow(clippy::too_many_arguments)]
pub fn expectation_diagonal<T, E, X, Y>(
    machine: &T,
    emissions: &E,
    xay: usize,
    fwd: &DpMatrix,
    bwd: &DpMatrix,
    total: LogProb,
    hmm: &mut Hmm,
    sx: &X,
    sy: &Y,
) where
    T: Transitions,
    X: SequenceView,
    Y: SequenceView,
    E: Emissions<X::Elem, Y::Elem>,
{
    let b = match bwd.get(xay) {
        Some(b) => b,
        None => panic!("bug: expectation extraction on non-resident diagonal {}", xay),
    };
    let f1 = fwd.get_behind(xay, 1);
    let f2 = fwd.get_behind(xay, 2);
    for xmy in b.diagonal().cells() {
        let bc = match b.cell(xmy) {
            Some(bc) => bc,
            None => unreachable!(),
        };
        let x = x_coordinate(xay as i64, xmy) as usize;
        let y = y_coordinate(xay as i64, xmy) as usize;
        if let Some(fc) = f1.and_then(|d| d.cell(xmy + 1)) {
            let cx = sx.get(x.saturating_sub(1));
            let e = emissions.prob_gap_y(cx, sy.get(y - 1));
            for edge in machine.edges(EmissionClass::GapY) {
                let p = (*(fc[edge.from] + edge.prob + e + bc[edge.to]) - *total).exp();
                hmm.add_transition(edge.from, edge.to, p);
            }
        }
        if let Some(fc) = f2.and_then(|d| d.cell(xmy)) {
            let cx = sx.get(x - 1);
            let cy = sy.get(y - 1);
            let e = emissions.prob_match(cx, cy);
            for edge in machine.edges(EmissionClass::Match) {
                let p = (*(fc[edge.from] + edge.prob + e + bc[edge.to]) - *total).exp();
                hmm.add_transition(edge.from, edge.to, p);
                if hmm.has_emission_expectations() {
                    if let Some((ix, iy)) = emissions.symbol_indices(cx, cy) {
                        hmm.add_emission(edge.to, ix, iy, p);
                    }
                }
            }
        }
        if let Some(fc) = f1.and_then(|d| d.cell(xmy - 1)) {
            let e = emissions.prob_gap_x(sx.get(x - 1));
            for edge in machine.edges(EmissionClass::GapX) {
                let p = (*(fc[edge.from] + edge.prob + e + bc[edge.to]) - *total).exp();
                hmm.add_transition(edge.from, edge.to, p);
            }
        }
    }
}
