// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Anchor scaffolding around the banded DP: seeding anchors from exact
//! matches, enforcing monotonicity, remapping read coordinates to event
//! indices, and splitting alignments over large anchor gaps.

use std::collections::HashMap;

use itertools::Itertools;

use crate::config::PairwiseAlignmentParameters;
use crate::errors::{Error, Result};

const DEFAULT_SEED_LENGTH: usize = 11;

// seeds occurring more often than this in the reference are repeats in all
// but name and are not worth chaining
const MAX_SEED_OCCURRENCES: usize = 32;

/// A sub-alignment produced by [`split_points`]: a rectangle of the full
/// matrix plus the anchors falling into it, rebased to its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentSegment {
    pub x_start: usize,
    pub y_start: usize,
    pub x_end: usize,
    pub y_end: usize,
    pub anchors: Vec<(usize, usize)>,
    pub ragged_left: bool,
    pub ragged_right: bool,
}

/// Keep a maximal subset of pairs that increases strictly in both
/// coordinates. Candidates are visited ordered by `(x + y, x)`, so of two
/// conflicting pairs the one closer to the upper-left corner survives.
pub fn filter_to_remove_overlap(pairs: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut filtered: Vec<(usize, usize)> = Vec::new();
    for &(x, y) in pairs
        .iter()
        .sorted_by_key(|&&(x, y)| (x + y, x))
        .dedup()
    {
        let acceptable = match filtered.last() {
            Some(&(px, py)) => x > px && y > py,
            None => true,
        };
        if acceptable {
            filtered.push((x, y));
        }
    }
    filtered
}

fn is_masked(seed: &[u8]) -> bool {
    seed.iter()
        .any(|&b| b.is_ascii_lowercase() || !matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T'))
}

fn seed_key(seed: &[u8]) -> Vec<u8> {
    seed.to_ascii_uppercase()
}

/// Seed anchors from exact seed matches between two nucleotide sequences,
/// trim the ends of every gapless chain, and filter the result for strict
/// monotonicity. With `respect_masking`, soft-masked (lowercase) positions
/// do not seed.
pub fn blast_pairs(
    sx: &[u8],
    sy: &[u8],
    trim: usize,
    respect_masking: bool,
) -> Vec<(usize, usize)> {
    blast_pairs_with_seed(sx, sy, DEFAULT_SEED_LENGTH, trim, respect_masking)
}

pub fn blast_pairs_with_seed(
    sx: &[u8],
    sy: &[u8],
    seed_length: usize,
    trim: usize,
    respect_masking: bool,
) -> Vec<(usize, usize)> {
    if sx.len() < seed_length || sy.len() < seed_length {
        return Vec::new();
    }
    let mut index: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();
    for (x, seed) in sx.windows(seed_length).enumerate() {
        if respect_masking && is_masked(seed) {
            continue;
        }
        index.entry(seed_key(seed)).or_insert_with(Vec::new).push(x);
    }
    let mut hits: Vec<(usize, usize)> = Vec::new();
    for (y, seed) in sy.windows(seed_length).enumerate() {
        if respect_masking && is_masked(seed) {
            continue;
        }
        if let Some(xs) = index.get(&seed_key(seed)) {
            if xs.len() > MAX_SEED_OCCURRENCES {
                continue;
            }
            for &x in xs {
                hits.push((x, y));
            }
        }
    }

    // group the hits into gapless chains and trim the chain ends
    hits.sort_by_key(|&(x, y)| (x as i64 - y as i64, x));
    let mut pairs = Vec::new();
    let mut chain_start = 0;
    for i in 0..hits.len() {
        let chain_ends = match hits.get(i + 1) {
            Some(&(nx, ny)) => {
                let (x, y) = hits[i];
                nx as i64 - ny as i64 != x as i64 - y as i64 || nx != x + 1
            }
            None => true,
        };
        if chain_ends {
            let (x0, y0) = hits[chain_start];
            // base length of the chain, counting the final seed
            let len = hits[i].0 - x0 + seed_length;
            if len > 2 * trim {
                for offset in trim..len - trim {
                    pairs.push((x0 + offset, y0 + offset));
                }
            }
            chain_start = i + 1;
        }
    }
    filter_to_remove_overlap(&pairs)
}

/// Enrich a (possibly empty) anchor list: every gap rectangle between
/// consecutive anchors that is bigger than `anchor_matrix_bigger_than_this`
/// is searched for further anchors, and repeat masking is dropped for
/// rectangles beyond `repeat_mask_matrix_bigger_than_this`.
pub fn seed_and_enrich_anchors(
    sx: &[u8],
    sy: &[u8],
    anchors: &[(usize, usize)],
    p: &PairwiseAlignmentParameters,
) -> Vec<(usize, usize)> {
    let mut enriched = anchors.to_vec();
    let mut gap_start = (0, 0);
    let bounds = anchors
        .iter()
        .map(|&(x, y)| (x, y))
        .chain(Some((sx.len(), sy.len())));
    for (nx, ny) in bounds {
        let area = nx
            .saturating_sub(gap_start.0)
            .saturating_mul(ny.saturating_sub(gap_start.1));
        if area > p.anchor_matrix_bigger_than_this() {
            let respect_masking = area <= p.repeat_mask_matrix_bigger_than_this();
            let found = blast_pairs(
                &sx[gap_start.0..nx],
                &sy[gap_start.1..ny],
                p.constraint_diagonal_trim(),
                respect_masking,
            );
            enriched.extend(
                found
                    .into_iter()
                    .map(|(x, y)| (x + gap_start.0, y + gap_start.1)),
            );
        }
        gap_start = (nx + 1, ny + 1);
    }
    filter_to_remove_overlap(&enriched)
}

/// Map the read coordinates of guide anchors to event indices via the
/// per-strand event map, relative to the event at `map_offset`. Anchors
/// whose read position maps before the window are dropped; the result is
/// filtered for strict monotonicity.
pub fn remap_anchor_pairs(
    anchors: &[(usize, usize)],
    event_map: &[usize],
    map_offset: usize,
) -> Result<Vec<(usize, usize)>> {
    let base = match event_map.get(map_offset) {
        Some(&base) => base,
        None => {
            return Err(Error::AnchorOutsideEventMap {
                read_pos: map_offset,
                event_map_len: event_map.len(),
            })
        }
    };
    let mut remapped = Vec::with_capacity(anchors.len());
    for &(x, read_pos) in anchors {
        let event = match event_map.get(read_pos) {
            Some(&event) => event,
            None => {
                return Err(Error::AnchorOutsideEventMap {
                    read_pos,
                    event_map_len: event_map.len(),
                })
            }
        };
        if let Some(event) = event.checked_sub(base) {
            remapped.push((x, event));
        }
    }
    Ok(filter_to_remove_overlap(&remapped))
}

/// Walk the anchor list and cut the alignment into sub-alignments wherever
/// the gap rectangle between consecutive anchors exceeds
/// `max_matrix_size`; the cut runs through the midpoint of the gap. Ragged
/// flags reach only the outermost sub-alignments.
pub fn split_points(
    anchors: &[(usize, usize)],
    lx: usize,
    ly: usize,
    max_matrix_size: usize,
    ragged_left: bool,
    ragged_right: bool,
) -> Vec<AlignmentSegment> {
    let mut segments: Vec<AlignmentSegment> = Vec::new();
    let mut segment_start = (0, 0);
    let mut segment_anchors: Vec<(usize, usize)> = Vec::new();
    let mut prev_cell = (0, 0);

    let close_segment_at = |segments: &mut Vec<AlignmentSegment>,
                                segment_anchors: &mut Vec<(usize, usize)>,
                                segment_start: &mut (usize, usize),
                                cut: (usize, usize)| {
        segments.push(AlignmentSegment {
            x_start: segment_start.0,
            y_start: segment_start.1,
            x_end: cut.0,
            y_end: cut.1,
            anchors: std::mem::replace(segment_anchors, Vec::new()),
            ragged_left: false,
            ragged_right: false,
        });
        *segment_start = cut;
    };

    for &(x, y) in anchors {
        let cell = (x + 1, y + 1);
        let area = (cell.0 - prev_cell.0).saturating_mul(cell.1 - prev_cell.1);
        if area > max_matrix_size {
            let cut = (
                (prev_cell.0 + cell.0) / 2,
                (prev_cell.1 + cell.1) / 2,
            );
            close_segment_at(&mut segments, &mut segment_anchors, &mut segment_start, cut);
        }
        segment_anchors.push((x - segment_start.0, y - segment_start.1));
        prev_cell = cell;
    }
    let end = (lx, ly);
    let area = (end.0.saturating_sub(prev_cell.0)).saturating_mul(end.1.saturating_sub(prev_cell.1));
    if area > max_matrix_size {
        let cut = ((prev_cell.0 + end.0) / 2, (prev_cell.1 + end.1) / 2);
        close_segment_at(&mut segments, &mut segment_anchors, &mut segment_start, cut);
    }
    segments.push(AlignmentSegment {
        x_start: segment_start.0,
        y_start: segment_start.1,
        x_end: lx,
        y_end: ly,
        anchors: segment_anchors,
        ragged_left: false,
        ragged_right: false,
    });

    if let Some(first) = segments.first_mut() {
        first.ragged_left = ragged_left;
    }
    if let Some(last) = segments.last_mut() {
        last.ragged_right = ragged_right;
    }
    segments
}
