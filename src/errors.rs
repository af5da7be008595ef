use thiserror::Error;

use crate::model::StateMachineKind;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error(
        "guide alignment operations consume {consumed_ref} reference and {consumed_query} query symbols, but the record declares {declared_ref} and {declared_query}"
    )]
    GuideAlignmentMismatch {
        consumed_ref: usize,
        consumed_query: usize,
        declared_ref: usize,
        declared_query: usize,
    },
    #[error("anchor ({x}, {y}) is not strictly monotonic in both coordinates")]
    NonMonotonicAnchors { x: usize, y: usize },
    #[error("anchor maps read position {read_pos} outside the event map (length {event_map_len})")]
    AnchorOutsideEventMap {
        read_pos: usize,
        event_map_len: usize,
    },
    #[error(
        "alignment is impossible for segment ({x_start}, {y_start})-({x_end}, {y_end}): band is empty or total probability is zero"
    )]
    AlignmentImpossible {
        x_start: usize,
        y_start: usize,
        x_end: usize,
        y_end: usize,
    },
    #[error("unable to allocate dynamic programming diagonals ({cells} cells requested)")]
    MatrixAllocation { cells: usize },
    #[error(
        "forward and backward total probabilities disagree beyond tolerance ({forward} vs {backward} in log space)"
    )]
    IntegrityCheck { forward: f64, backward: f64 },
    #[error("{kind} state machine does not support the requested posterior extraction")]
    UnsupportedStateMachine { kind: StateMachineKind },
    #[error("invalid signal model: {msg}")]
    InvalidSignalModel { msg: String },
    #[error(
        "expectation record of kind {found} with {found_states} states cannot be loaded into a {expected} state machine"
    )]
    IncompatibleExpectations {
        expected: StateMachineKind,
        found: StateMachineKind,
        found_states: usize,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
