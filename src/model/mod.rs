// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Pair hidden Markov models over a reference sequence (x) and a stream of
//! observations (y). A model is split into two orthogonal capabilities:
//! [`Transitions`] describes the state topology with its priors, and
//! [`emissions::Emissions`] scores symbol pairs. Concrete machines combine
//! one of each.

use bio::stats::LogProb;
use strum_macros::{Display, EnumIter, IntoStaticStr};

pub mod emissions;
pub mod hmm;
pub mod transitions;

pub use crate::model::emissions::Emissions;
pub use crate::model::hmm::Hmm;
pub use crate::model::transitions::{FiveState, FourState, ThreeState};

/// States shared by the machine variants. The three-state machine uses
/// `Match`, `ShortGapX` and `ShortGapY`; the four-state machine adds
/// `LongGapX`; the five-state machine uses all five.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr)]
pub enum State {
    /// x and y advance together.
    Match = 0,
    /// x advances against a gap (a skipped k-mer).
    ShortGapX = 1,
    /// y advances against a gap (an extra event).
    ShortGapY = 2,
    LongGapX = 3,
    LongGapY = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr, Serialize, Deserialize)]
pub enum StateMachineKind {
    ThreeState,
    FourState,
    FiveState,
}

/// Which sequence a transition consumes, and therefore which predecessor
/// cell it reads and which emission density it is scored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum EmissionClass {
    /// Both sequences advance; predecessor is the middle cell (x-1, y-1).
    Match = 0,
    /// Only x advances; predecessor is the upper cell (x-1, y).
    GapX = 1,
    /// Only y advances; predecessor is the lower cell (x, y-1).
    GapY = 2,
}

/// A directed transition of the state topology with its log probability.
#[derive(Debug, Clone, Copy, new)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub prob: LogProb,
}

/// The state-machine capability: topology, transition access and priors.
/// All probabilities are in log space.
pub trait Transitions {
    fn kind(&self) -> StateMachineKind;

    fn state_count(&self) -> usize;

    /// The state whose posterior is reported as a match.
    fn match_state(&self) -> usize {
        State::Match as usize
    }

    /// States the multi-match extractor reports from.
    fn match_states(&self) -> &[usize];

    /// All transitions that enter a state of the given emission class.
    fn edges(&self, class: EmissionClass) -> &[Edge];

    /// Log prior of starting in `state` when the alignment is pinned to the
    /// upper-left corner.
    fn prob_start(&self, state: usize) -> LogProb;

    /// Log prior of ending in `state` when the alignment is pinned to the
    /// lower-right corner.
    fn prob_end(&self, state: usize) -> LogProb;

    /// Log prior of starting in `state` when leading unaligned symbols are
    /// free.
    fn prob_ragged_start(&self, state: usize) -> LogProb;

    /// Log prior of ending in `state` when trailing unaligned symbols are
    /// free.
    fn prob_ragged_end(&self, state: usize) -> LogProb;
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_state_indices_are_dense() {
        for (i, state) in State::iter().enumerate() {
            assert_eq!(state as usize, i);
        }
    }
}
