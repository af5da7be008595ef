// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! A library for aligning nanopore event streams to reference sequences
//! with a banded pair-HMM forward-backward algorithm. Anchors from a guide
//! alignment constrain the DP band; a sliding diagonal window bounds
//! memory; posterior match probabilities (or Baum-Welch expectations) are
//! extracted on the fly.

#[macro_use]
extern crate approx;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

pub mod align;
pub mod config;
pub mod errors;
pub mod guide;
pub mod model;
pub mod sequence;

pub use crate::align::driver::{
    get_aligned_pairs, get_aligned_pairs_without_banding, get_expectations,
    get_posterior_probs_with_banding, get_posterior_probs_with_banding_and_splitting,
};
pub use crate::align::{
    score_by_posterior_probability_ignoring_gaps, AlignedPair, ExtractionMode, PosteriorSink,
    PROB_ONE,
};
pub use crate::config::{PairwiseAlignmentParameters, PairwiseAlignmentParametersBuilder};
pub use crate::errors::Error;
pub use crate::guide::GuideAlignment;
pub use crate::model::emissions::{
    Emissions, HdpEmissions, KmerEmissions, KmerModelParams, NanoporeScaling,
    NucleotideEmissions, SignalEmissions, SignalEmissionsBuilder,
};
pub use crate::model::{
    FiveState, FourState, Hmm, State, StateMachineKind, ThreeState, Transitions,
};
pub use crate::sequence::{Bases, Event, Events, Kmers, SequenceView, NB_EVENT_PARAMS};
