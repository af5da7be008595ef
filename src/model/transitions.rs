// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Concrete state topologies. Transition parameters are given in ordinary
//! probability space and converted once; everything a DP sweep touches is
//! precomputed into per-class edge lists.

use bio::stats::{LogProb, Prob};

use crate::errors::{Error, Result};
use crate::model::{Edge, EmissionClass, State, StateMachineKind, Transitions};

const MATCH_CONTINUE: f64 = 0.9703833696510062;
const GAP_SHORT_OPEN: f64 = 0.0129868352330243;
const GAP_SHORT_EXTEND: f64 = 0.7126062401851738;
const GAP_SWITCH: f64 = 0.0073673675173412815;
const GAP_LONG_OPEN: f64 = 0.001821479941473;
const GAP_LONG_EXTEND: f64 = 0.99656342579062;

// Signal-tuned variants derived from the observed stride/skip/stay rates of
// template reads.
const SIGNAL_MATCH_CONTINUE: f64 = 0.79015888282447311;
const SIGNAL_SKIP_OPEN: f64 = 0.19652425498269727;
const SIGNAL_STAY_OPEN: f64 = 0.013316862192910478;

fn ln(p: f64) -> LogProb {
    LogProb::from(Prob(p))
}

fn edge(from: State, to: State, p: f64) -> Edge {
    Edge::new(from as usize, to as usize, ln(p))
}

/// Transition parameters of the symmetric three-state machine. The
/// probability of returning to match from a gap state is implied by the
/// extend and switch parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreeStateParams {
    pub match_continue: f64,
    pub gap_open_x: f64,
    pub gap_open_y: f64,
    pub gap_extend_x: f64,
    pub gap_extend_y: f64,
    pub gap_switch_to_x: f64,
    pub gap_switch_to_y: f64,
}

impl Default for ThreeStateParams {
    fn default() -> Self {
        ThreeStateParams {
            match_continue: MATCH_CONTINUE,
            gap_open_x: GAP_SHORT_OPEN,
            gap_open_y: GAP_SHORT_OPEN,
            gap_extend_x: GAP_SHORT_EXTEND,
            gap_extend_y: GAP_SHORT_EXTEND,
            gap_switch_to_x: GAP_SWITCH,
            gap_switch_to_y: GAP_SWITCH,
        }
    }
}

/// The strawman machine: match, one gap state per sequence, cross switches
/// between the gap states.
#[derive(Debug, Clone)]
pub struct ThreeState {
    end_probs: [LogProb; 3],
    edges: [Vec<Edge>; 3],
    match_states: [usize; 1],
}

impl ThreeState {
    pub fn new(params: ThreeStateParams) -> Self {
        let match_from_gap_x = 1.0 - params.gap_extend_x - params.gap_switch_to_y;
        let match_from_gap_y = 1.0 - params.gap_extend_y - params.gap_switch_to_x;
        let into_match = vec![
            edge(State::Match, State::Match, params.match_continue),
            edge(State::ShortGapX, State::Match, match_from_gap_x),
            edge(State::ShortGapY, State::Match, match_from_gap_y),
        ];
        let into_gap_x = vec![
            edge(State::Match, State::ShortGapX, params.gap_open_x),
            edge(State::ShortGapX, State::ShortGapX, params.gap_extend_x),
            edge(State::ShortGapY, State::ShortGapX, params.gap_switch_to_x),
        ];
        let into_gap_y = vec![
            edge(State::Match, State::ShortGapY, params.gap_open_y),
            edge(State::ShortGapY, State::ShortGapY, params.gap_extend_y),
            edge(State::ShortGapX, State::ShortGapY, params.gap_switch_to_y),
        ];
        ThreeState {
            end_probs: [
                ln(params.match_continue),
                ln(match_from_gap_x),
                ln(match_from_gap_y),
            ],
            edges: [into_match, into_gap_x, into_gap_y],
            match_states: [State::Match as usize],
        }
    }

    /// Defaults fitted for nucleotide/nucleotide alignment.
    pub fn nucleotide_defaults() -> Self {
        ThreeState::new(ThreeStateParams::default())
    }

    /// Defaults fitted for k-mer/event alignment, where gaps in x are
    /// skipped k-mers and gaps in y are event stays.
    pub fn nanopore_defaults() -> Self {
        ThreeState::new(ThreeStateParams {
            match_continue: SIGNAL_MATCH_CONTINUE,
            gap_open_x: SIGNAL_SKIP_OPEN,
            gap_open_y: SIGNAL_STAY_OPEN,
            ..ThreeStateParams::default()
        })
    }

    /// Uninformative transitions, the usual starting point of expectation
    /// maximization.
    pub fn uniform() -> Self {
        let u = 1.0 / 3.0;
        ThreeState::new(ThreeStateParams {
            match_continue: u,
            gap_open_x: u,
            gap_open_y: u,
            gap_extend_x: u,
            gap_extend_y: u,
            gap_switch_to_x: u,
            gap_switch_to_y: u,
        })
    }

    /// Rebuild the machine from accumulated expectations, normalizing each
    /// row of the transition table.
    pub fn from_expectations(hmm: &crate::model::Hmm) -> Result<Self> {
        if hmm.kind() != StateMachineKind::ThreeState || hmm.state_count() != 3 {
            return Err(Error::IncompatibleExpectations {
                expected: StateMachineKind::ThreeState,
                found: hmm.kind(),
                found_states: hmm.state_count(),
            });
        }
        let t = hmm.normalized_transitions();
        let m = State::Match as usize;
        let gx = State::ShortGapX as usize;
        let gy = State::ShortGapY as usize;
        Ok(ThreeState::new(ThreeStateParams {
            match_continue: t[m][m],
            gap_open_x: t[m][gx],
            gap_open_y: t[m][gy],
            gap_extend_x: t[gx][gx],
            gap_extend_y: t[gy][gy],
            gap_switch_to_x: t[gy][gx],
            gap_switch_to_y: t[gx][gy],
        }))
    }
}

impl Transitions for ThreeState {
    fn kind(&self) -> StateMachineKind {
        StateMachineKind::ThreeState
    }

    fn state_count(&self) -> usize {
        3
    }

    fn match_states(&self) -> &[usize] {
        &self.match_states
    }

    fn edges(&self, class: EmissionClass) -> &[Edge] {
        &self.edges[class as usize]
    }

    fn prob_start(&self, state: usize) -> LogProb {
        if state == State::Match as usize {
            LogProb::ln_one()
        } else {
            LogProb::ln_zero()
        }
    }

    fn prob_end(&self, state: usize) -> LogProb {
        self.end_probs[state]
    }

    fn prob_ragged_start(&self, _: usize) -> LogProb {
        LogProb::ln_one()
    }

    fn prob_ragged_end(&self, _: usize) -> LogProb {
        LogProb::ln_one()
    }
}

/// Transition parameters of the four-state machine. There is no long gap
/// state for y: extra events are frequent but short, while skips of whole
/// k-mer runs need the dedicated long-x branch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FourStateParams {
    pub match_continue: f64,
    pub gap_open_x: f64,
    pub gap_open_y: f64,
    pub gap_extend_x: f64,
    pub gap_extend_y: f64,
    pub gap_long_open_x: f64,
    pub gap_long_extend_x: f64,
    pub gap_long_switch_to_x: f64,
}

impl Default for FourStateParams {
    fn default() -> Self {
        FourStateParams {
            match_continue: MATCH_CONTINUE,
            gap_open_x: GAP_SHORT_OPEN,
            gap_open_y: GAP_SHORT_OPEN,
            gap_extend_x: GAP_SHORT_EXTEND,
            gap_extend_y: GAP_SHORT_EXTEND,
            gap_long_open_x: GAP_LONG_OPEN,
            gap_long_extend_x: GAP_LONG_EXTEND,
            gap_long_switch_to_x: GAP_SWITCH,
        }
    }
}

/// Asymmetric machine with an extra long-gap branch for rare multi-k-mer
/// skips of the reference.
#[derive(Debug, Clone)]
pub struct FourState {
    end_probs: [LogProb; 4],
    edges: [Vec<Edge>; 3],
    match_states: [usize; 1],
}

impl FourState {
    pub fn new(params: FourStateParams) -> Self {
        let match_from_short_gap_x = 1.0 - params.gap_extend_x;
        let match_from_short_gap_y = 1.0 - params.gap_extend_y - params.gap_long_switch_to_x;
        let match_from_long_gap_x = 1.0 - params.gap_long_extend_x;
        let into_match = vec![
            edge(State::Match, State::Match, params.match_continue),
            edge(State::ShortGapX, State::Match, match_from_short_gap_x),
            edge(State::ShortGapY, State::Match, match_from_short_gap_y),
            edge(State::LongGapX, State::Match, match_from_long_gap_x),
        ];
        let into_gap_x = vec![
            edge(State::Match, State::ShortGapX, params.gap_open_x),
            edge(State::ShortGapX, State::ShortGapX, params.gap_extend_x),
            edge(State::Match, State::LongGapX, params.gap_long_open_x),
            edge(State::LongGapX, State::LongGapX, params.gap_long_extend_x),
            edge(State::ShortGapY, State::LongGapX, params.gap_long_switch_to_x),
        ];
        let into_gap_y = vec![
            edge(State::Match, State::ShortGapY, params.gap_open_y),
            edge(State::ShortGapY, State::ShortGapY, params.gap_extend_y),
        ];
        FourState {
            end_probs: [
                ln(params.match_continue),
                ln(match_from_short_gap_x),
                ln(match_from_short_gap_y),
                ln(match_from_long_gap_x),
            ],
            edges: [into_match, into_gap_x, into_gap_y],
            match_states: [State::Match as usize],
        }
    }

    pub fn defaults() -> Self {
        FourState::new(FourStateParams::default())
    }
}

impl Transitions for FourState {
    fn kind(&self) -> StateMachineKind {
        StateMachineKind::FourState
    }

    fn state_count(&self) -> usize {
        4
    }

    fn match_states(&self) -> &[usize] {
        &self.match_states
    }

    fn edges(&self, class: EmissionClass) -> &[Edge] {
        &self.edges[class as usize]
    }

    fn prob_start(&self, state: usize) -> LogProb {
        if state == State::Match as usize {
            LogProb::ln_one()
        } else {
            LogProb::ln_zero()
        }
    }

    fn prob_end(&self, state: usize) -> LogProb {
        self.end_probs[state]
    }

    fn prob_ragged_start(&self, _: usize) -> LogProb {
        LogProb::ln_one()
    }

    fn prob_ragged_end(&self, _: usize) -> LogProb {
        LogProb::ln_one()
    }
}

/// Transition parameters of the five-state machine with symmetric short and
/// long gap branches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiveStateParams {
    pub match_continue: f64,
    pub gap_short_open_x: f64,
    pub gap_short_open_y: f64,
    pub gap_short_extend_x: f64,
    pub gap_short_extend_y: f64,
    pub gap_short_switch_to_x: f64,
    pub gap_short_switch_to_y: f64,
    pub gap_long_open_x: f64,
    pub gap_long_open_y: f64,
    pub gap_long_extend_x: f64,
    pub gap_long_extend_y: f64,
    pub gap_long_switch_to_x: f64,
    pub gap_long_switch_to_y: f64,
}

impl Default for FiveStateParams {
    fn default() -> Self {
        FiveStateParams {
            match_continue: MATCH_CONTINUE,
            gap_short_open_x: GAP_SHORT_OPEN,
            gap_short_open_y: GAP_SHORT_OPEN,
            gap_short_extend_x: GAP_SHORT_EXTEND,
            gap_short_extend_y: GAP_SHORT_EXTEND,
            gap_short_switch_to_x: GAP_SWITCH,
            gap_short_switch_to_y: GAP_SWITCH,
            gap_long_open_x: GAP_LONG_OPEN,
            gap_long_open_y: GAP_LONG_OPEN,
            gap_long_extend_x: GAP_LONG_EXTEND,
            gap_long_extend_y: GAP_LONG_EXTEND,
            gap_long_switch_to_x: GAP_SWITCH,
            gap_long_switch_to_y: GAP_SWITCH,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FiveState {
    end_probs: [LogProb; 5],
    edges: [Vec<Edge>; 3],
    match_states: [usize; 1],
}

impl FiveState {
    pub fn new(params: FiveStateParams) -> Self {
        let match_from_short_gap_x =
            1.0 - params.gap_short_extend_x - params.gap_short_switch_to_y;
        let match_from_short_gap_y =
            1.0 - params.gap_short_extend_y - params.gap_short_switch_to_x;
        let match_from_long_gap_x = 1.0 - params.gap_long_extend_x;
        let match_from_long_gap_y = 1.0 - params.gap_long_extend_y;
        let into_match = vec![
            edge(State::Match, State::Match, params.match_continue),
            edge(State::ShortGapX, State::Match, match_from_short_gap_x),
            edge(State::ShortGapY, State::Match, match_from_short_gap_y),
            edge(State::LongGapX, State::Match, match_from_long_gap_x),
            edge(State::LongGapY, State::Match, match_from_long_gap_y),
        ];
        let into_gap_x = vec![
            edge(State::Match, State::ShortGapX, params.gap_short_open_x),
            edge(State::ShortGapX, State::ShortGapX, params.gap_short_extend_x),
            edge(State::ShortGapY, State::ShortGapX, params.gap_short_switch_to_x),
            edge(State::Match, State::LongGapX, params.gap_long_open_x),
            edge(State::LongGapX, State::LongGapX, params.gap_long_extend_x),
            edge(State::LongGapY, State::LongGapX, params.gap_long_switch_to_x),
        ];
        let into_gap_y = vec![
            edge(State::Match, State::ShortGapY, params.gap_short_open_y),
            edge(State::ShortGapY, State::ShortGapY, params.gap_short_extend_y),
            edge(State::ShortGapX, State::ShortGapY, params.gap_short_switch_to_y),
            edge(State::Match, State::LongGapY, params.gap_long_open_y),
            edge(State::LongGapY, State::LongGapY, params.gap_long_extend_y),
            edge(State::LongGapX, State::LongGapY, params.gap_long_switch_to_y),
        ];
        FiveState {
            end_probs: [
                ln(params.match_continue),
                ln(match_from_short_gap_x),
                ln(match_from_short_gap_y),
                ln(match_from_long_gap_x),
                ln(match_from_long_gap_y),
            ],
            edges: [into_match, into_gap_x, into_gap_y],
            match_states: [State::Match as usize],
        }
    }

    pub fn defaults() -> Self {
        FiveState::new(FiveStateParams::default())
    }

    pub fn from_expectations(hmm: &crate::model::Hmm) -> Result<Self> {
        if hmm.kind() != StateMachineKind::FiveState || hmm.state_count() != 5 {
            return Err(Error::IncompatibleExpectations {
                expected: StateMachineKind::FiveState,
                found: hmm.kind(),
                found_states: hmm.state_count(),
            });
        }
        let t = hmm.normalized_transitions();
        let m = State::Match as usize;
        let sgx = State::ShortGapX as usize;
        let sgy = State::ShortGapY as usize;
        let lgx = State::LongGapX as usize;
        let lgy = State::LongGapY as usize;
        Ok(FiveState::new(FiveStateParams {
            match_continue: t[m][m],
            gap_short_open_x: t[m][sgx],
            gap_short_open_y: t[m][sgy],
            gap_short_extend_x: t[sgx][sgx],
            gap_short_extend_y: t[sgy][sgy],
            gap_short_switch_to_x: t[sgy][sgx],
            gap_short_switch_to_y: t[sgx][sgy],
            gap_long_open_x: t[m][lgx],
            gap_long_open_y: t[m][lgy],
            gap_long_extend_x: t[lgx][lgx],
            gap_long_extend_y: t[lgy][lgy],
            gap_long_switch_to_x: t[lgy][lgx],
            gap_long_switch_to_y: t[lgx][lgy],
        }))
    }
}

impl Transitions for FiveState {
    fn kind(&self) -> StateMachineKind {
        StateMachineKind::FiveState
    }

    fn state_count(&self) -> usize {
        5
    }

    fn match_states(&self) -> &[usize] {
        &self.match_states
    }

    fn edges(&self, class: EmissionClass) -> &[Edge] {
        &self.edges[class as usize]
    }

    fn prob_start(&self, state: usize) -> LogProb {
        if state == State::Match as usize {
            LogProb::ln_one()
        } else {
            LogProb::ln_zero()
        }
    }

    fn prob_end(&self, state: usize) -> LogProb {
        self.end_probs[state]
    }

    fn prob_ragged_start(&self, _: usize) -> LogProb {
        LogProb::ln_one()
    }

    fn prob_ragged_end(&self, _: usize) -> LogProb {
        LogProb::ln_one()
    }
}
