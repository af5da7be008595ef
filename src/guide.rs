// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The guide alignment handed in by the caller (parsed externally from
//! exonerate CIGAR text) and its conversion into banding anchors.

use bio::alignment::AlignmentOperation;
use bio_types::strand::Strand;

use crate::align::anchors::filter_to_remove_overlap;
use crate::errors::{Error, Result};

/// A pairwise guide alignment between a reference contig (sequence 1, the
/// `x` axis) and a read (sequence 2, the `y` axis), with run-length encoded
/// operations. `Del` consumes sequence 1 only, `Ins` sequence 2 only.
#[derive(Debug, Clone, Getters, CopyGetters, new)]
pub struct GuideAlignment {
    #[get = "pub"]
    contig1: String,
    #[get_copy = "pub"]
    strand1: Strand,
    #[get_copy = "pub"]
    start1: usize,
    #[get_copy = "pub"]
    end1: usize,
    #[get = "pub"]
    contig2: String,
    #[get_copy = "pub"]
    strand2: Strand,
    #[get_copy = "pub"]
    start2: usize,
    #[get_copy = "pub"]
    end2: usize,
    #[get = "pub"]
    operations: Vec<(AlignmentOperation, usize)>,
}

impl GuideAlignment {
    /// Check that the operations consume exactly the declared coordinate
    /// ranges.
    pub fn validate(&self) -> Result<()> {
        let mut consumed_ref = 0;
        let mut consumed_query = 0;
        for &(op, len) in &self.operations {
            match op {
                AlignmentOperation::Match | AlignmentOperation::Subst => {
                    consumed_ref += len;
                    consumed_query += len;
                }
                AlignmentOperation::Del | AlignmentOperation::Xclip(_) => consumed_ref += len,
                AlignmentOperation::Ins | AlignmentOperation::Yclip(_) => consumed_query += len,
            }
        }
        let declared_ref = self.end1 - self.start1;
        let declared_query = self.end2 - self.start2;
        if consumed_ref != declared_ref || consumed_query != declared_query {
            return Err(Error::GuideAlignmentMismatch {
                consumed_ref,
                consumed_query,
                declared_ref,
                declared_query,
            });
        }
        Ok(())
    }

    /// Shift the reference coordinates, optionally flipping the strand (the
    /// coordinate interval is mirrored in that case).
    pub fn rebase_reference(&mut self, shift: i64, flip_strand: bool) {
        self.start1 = (self.start1 as i64 + shift) as usize;
        self.end1 = (self.end1 as i64 + shift) as usize;
        if flip_strand {
            std::mem::swap(&mut self.start1, &mut self.end1);
            self.strand1 = match self.strand1 {
                Strand::Forward => Strand::Reverse,
                Strand::Reverse => Strand::Forward,
                Strand::Unknown => Strand::Unknown,
            };
        }
    }

    /// Banding constraints from the aligned runs of the guide: every
    /// position of a run, with `trim` positions dropped from both run ends.
    /// Reference positions are relative to `start1`, read positions are
    /// absolute (ready for event-map remapping); the result is strictly
    /// monotonic.
    pub fn anchor_pairs(&self, trim: usize) -> Result<Vec<(usize, usize)>> {
        self.validate()?;
        let mut pairs = Vec::new();
        let mut x = 0;
        let mut y = self.start2;
        let mut run: Option<(usize, usize, usize)> = None;
        let flush = |run: &mut Option<(usize, usize, usize)>, pairs: &mut Vec<(usize, usize)>| {
            if let Some((x0, y0, len)) = run.take() {
                if len > 2 * trim {
                    for i in trim..len - trim {
                        pairs.push((x0 + i, y0 + i));
                    }
                }
            }
        };
        for &(op, len) in &self.operations {
            match op {
                AlignmentOperation::Match | AlignmentOperation::Subst => {
                    match run.as_mut() {
                        Some((_, _, run_len)) => *run_len += len,
                        None => run = Some((x, y, len)),
                    }
                    x += len;
                    y += len;
                }
                AlignmentOperation::Del | AlignmentOperation::Xclip(_) => {
                    flush(&mut run, &mut pairs);
                    x += len;
                }
                AlignmentOperation::Ins | AlignmentOperation::Yclip(_) => {
                    flush(&mut run, &mut pairs);
                    y += len;
                }
            }
        }
        flush(&mut run, &mut pairs);
        Ok(filter_to_remove_overlap(&pairs))
    }
}
