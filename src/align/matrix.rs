// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Storage for the active part of the DP matrix: one dense vector of
//! per-state log probabilities per banded cell, organised as diagonals in a
//! fixed-capacity ring. The banded driver deletes diagonals as its window
//! slides, which is what bounds memory.

use bio::stats::LogProb;

use crate::align::diagonal::Diagonal;
use crate::errors::{Error, Result};

/// One anti-diagonal of DP cells, each holding a log probability per state.
#[derive(Debug, Clone, PartialEq)]
pub struct DpDiagonal {
    diagonal: Diagonal,
    state_count: usize,
    cells: Vec<LogProb>,
}

impl DpDiagonal {
    pub fn new(diagonal: Diagonal, state_count: usize) -> Result<Self> {
        let n = diagonal.width() * state_count;
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(n)
            .map_err(|_| Error::MatrixAllocation { cells: n })?;
        cells.resize(n, LogProb::ln_zero());
        Ok(DpDiagonal {
            diagonal,
            state_count,
            cells,
        })
    }

    pub fn diagonal(&self) -> Diagonal {
        self.diagonal
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn zero(&mut self) {
        for v in &mut self.cells {
            *v = LogProb::ln_zero();
        }
    }

    /// Set every cell's state vector from the given per-state prior.
    pub fn initialise<F: Fn(usize) -> LogProb>(&mut self, state_value: F) {
        let state_count = self.state_count;
        for (i, v) in self.cells.iter_mut().enumerate() {
            *v = state_value(i % state_count);
        }
    }

    fn offset(&self, xmy: i64) -> Option<usize> {
        if xmy < self.diagonal.min_xmy()
            || xmy > self.diagonal.max_xmy()
            || (xmy - self.diagonal.min_xmy()) % 2 != 0
        {
            return None;
        }
        Some(((xmy - self.diagonal.min_xmy()) / 2) as usize * self.state_count)
    }

    /// The state vector of the cell at `xmy`, or `None` outside the band.
    pub fn cell(&self, xmy: i64) -> Option<&[LogProb]> {
        self.offset(xmy)
            .map(move |o| &self.cells[o..o + self.state_count])
    }

    pub fn cell_mut(&mut self, xmy: i64) -> Option<&mut [LogProb]> {
        let state_count = self.state_count;
        match self.offset(xmy) {
            Some(o) => Some(&mut self.cells[o..o + state_count]),
            None => None,
        }
    }

    /// Log of the summed products of the two diagonals' cells, over the
    /// cells they share.
    pub fn dot_product(&self, other: &DpDiagonal) -> LogProb {
        debug_assert_eq!(self.diagonal.xay(), other.diagonal().xay());
        let mut total = LogProb::ln_zero();
        for xmy in self.diagonal.cells() {
            if let (Some(a), Some(b)) = (self.cell(xmy), other.cell(xmy)) {
                for (p, q) in a.iter().zip(b) {
                    total = total.ln_add_exp(*p + *q);
                }
            }
        }
        total
    }
}

/// The resident diagonals of a forward or backward pass, keyed by `xay`
/// modulo a fixed capacity.
#[derive(Debug)]
pub struct DpMatrix {
    state_count: usize,
    slots: Vec<Option<DpDiagonal>>,
    active: usize,
}

impl DpMatrix {
    pub fn new(capacity: usize, state_count: usize) -> Self {
        // a cell calculation reads two diagonals behind the head
        let capacity = capacity.max(3);
        DpMatrix {
            state_count,
            slots: (0..capacity).map(|_| None).collect(),
            active: 0,
        }
    }

    pub fn active_diagonals(&self) -> usize {
        self.active
    }

    fn slot(&self, xay: usize) -> usize {
        xay % self.slots.len()
    }

    pub fn get(&self, xay: usize) -> Option<&DpDiagonal> {
        self.slots[self.slot(xay)]
            .as_ref()
            .filter(|d| d.diagonal().xay() == xay as i64)
    }

    pub fn get_mut(&mut self, xay: usize) -> Option<&mut DpDiagonal> {
        let slot = self.slot(xay);
        self.slots[slot]
            .as_mut()
            .filter(|d| d.diagonal().xay() == xay as i64)
    }

    /// The diagonal `back` steps before `xay`, if resident.
    pub fn get_behind(&self, xay: usize, back: usize) -> Option<&DpDiagonal> {
        xay.checked_sub(back).and_then(|i| self.get(i))
    }

    /// Allocate a zeroed diagonal. The ring slot must be free, which the
    /// sliding window of the banded driver guarantees.
    pub fn create_diagonal(&mut self, diagonal: Diagonal) -> Result<&mut DpDiagonal> {
        let slot = self.slot(diagonal.xay() as usize);
        if self.slots[slot].is_some() {
            panic!(
                "bug: dp matrix ring slot for diagonal {} still occupied",
                diagonal.xay()
            );
        }
        self.slots[slot] = Some(DpDiagonal::new(diagonal, self.state_count)?);
        self.active += 1;
        Ok(self.slots[slot].as_mut().unwrap())
    }

    /// Remove the diagonal for in-place computation; pair with
    /// [`DpMatrix::put_diagonal`].
    pub fn take_diagonal(&mut self, xay: usize) -> DpDiagonal {
        let slot = self.slot(xay);
        match self.slots[slot].take() {
            Some(d) if d.diagonal().xay() == xay as i64 => {
                self.active -= 1;
                d
            }
            _ => panic!("bug: diagonal {} is not resident", xay),
        }
    }

    pub fn put_diagonal(&mut self, diagonal: DpDiagonal) {
        let slot = self.slot(diagonal.diagonal().xay() as usize);
        debug_assert!(self.slots[slot].is_none());
        self.slots[slot] = Some(diagonal);
        self.active += 1;
    }

    pub fn delete_diagonal(&mut self, xay: usize) {
        let slot = self.slot(xay);
        let matches = self.slots[slot]
            .as_ref()
            .map_or(false, |d| d.diagonal().xay() == xay as i64);
        if matches {
            self.slots[slot] = None;
            self.active -= 1;
        }
    }
}
