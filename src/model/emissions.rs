// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Emission oracles: log densities of observing a symbol pair under a match,
//! of skipping a reference symbol, and of an unpaired observation. Discrete
//! oracles look tables up, the signal oracle evaluates scaled per-k-mer
//! Gaussians, and the HDP oracle defers to caller-provided densities.

use bio::stats::LogProb;
use statrs::distribution::{Continuous, Normal};

use crate::errors::{Error, Result};
use crate::sequence::Event;

/// Number of alphabet symbols including the ambiguity symbol.
pub const SYMBOL_NUMBER: usize = 5;

/// Parameters stored per k-mer in an emission model file.
pub const MODEL_PARAMS: usize = 5;

const EMISSION_MATCH: f64 = -2.1149196655034745; // ln(0.12064298095701059)
const EMISSION_TRANSITION: f64 = -3.9833860032220842; // ln(0.01862247669752685)
const EMISSION_TRANSVERSION: f64 = -4.5691014376830479; // ln(0.010367271172731285)
const EMISSION_MATCH_N: f64 = -3.2188758248682006; // ln(0.04)
const EMISSION_GAP: f64 = -1.6094379124341003; // ln(0.2)

// Flat density for events paired with k-mers outside the model table.
const BACKGROUND_EVENT_PROB: f64 = -3.9;

const DEFAULT_KMER_SKIP_PROB: f64 = 0.05;

/// The emission capability of a pair HMM, over x elements of type `Xe` and
/// y elements of type `Ye`.
pub trait Emissions<Xe: Copy, Ye: Copy> {
    /// Log density of observing `y` aligned to `x`.
    fn prob_match(&self, x: Xe, y: Ye) -> LogProb;

    /// Log probability of skipping `x` against a gap.
    fn prob_gap_x(&self, x: Xe) -> LogProb;

    /// Log density of an unpaired observation `y` in the context of `x`.
    fn prob_gap_y(&self, x: Xe, y: Ye) -> LogProb;

    /// Discrete symbol indices for expectation tables; `None` for oracles
    /// whose observations are continuous.
    fn symbol_indices(&self, _x: Xe, _y: Ye) -> Option<(usize, usize)> {
        None
    }

    /// Shape of the emission expectation table implied by
    /// `symbol_indices`.
    fn symbol_set_sizes(&self) -> (usize, usize) {
        (0, 0)
    }
}

/// Index of a base in the emission tables; `None` for ambiguity codes.
pub fn base_index(base: u8) -> Option<usize> {
    match base.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Index of a base with ambiguity codes mapped to the last symbol.
pub fn ambiguous_base_index(base: u8) -> usize {
    base_index(base).unwrap_or(SYMBOL_NUMBER - 1)
}

/// Rank of a k-mer among all k-mers of its length; `None` if it contains
/// ambiguity codes.
pub fn kmer_index(kmer: &[u8]) -> Option<usize> {
    let mut index = 0;
    for &base in kmer {
        index = index * 4 + base_index(base)?;
    }
    Some(index)
}

lazy_static! {
    static ref MATCH_PROBS: [[LogProb; 4]; 4] = {
        let mut table = [[LogProb::ln_zero(); 4]; 4];
        for i in 0..4 {
            for j in 0..4 {
                table[i][j] = LogProb(if i == j {
                    EMISSION_MATCH
                } else if i % 2 == j % 2 {
                    // purine/purine and pyrimidine/pyrimidine pairs
                    EMISSION_TRANSITION
                } else {
                    EMISSION_TRANSVERSION
                });
            }
        }
        table
    };
}

/// Table-driven nucleotide emissions.
#[derive(Debug, Clone, Copy, new)]
pub struct NucleotideEmissions {
    align_ambiguity: bool,
}

impl Default for NucleotideEmissions {
    fn default() -> Self {
        NucleotideEmissions::new(false)
    }
}

impl Emissions<u8, u8> for NucleotideEmissions {
    fn prob_match(&self, x: u8, y: u8) -> LogProb {
        match (base_index(x), base_index(y)) {
            (Some(i), Some(j)) => MATCH_PROBS[i][j],
            _ if self.align_ambiguity => LogProb(EMISSION_MATCH_N),
            _ => LogProb::ln_zero(),
        }
    }

    fn prob_gap_x(&self, _: u8) -> LogProb {
        LogProb(EMISSION_GAP)
    }

    fn prob_gap_y(&self, _: u8, _: u8) -> LogProb {
        LogProb(EMISSION_GAP)
    }

    fn symbol_indices(&self, x: u8, y: u8) -> Option<(usize, usize)> {
        Some((ambiguous_base_index(x), ambiguous_base_index(y)))
    }

    fn symbol_set_sizes(&self) -> (usize, usize) {
        (SYMBOL_NUMBER, SYMBOL_NUMBER)
    }
}

/// Discrete k-mer emissions, scored position-wise with the nucleotide
/// tables.
#[derive(Debug, Clone, Copy, new)]
pub struct KmerEmissions {
    inner: NucleotideEmissions,
}

impl<'a> Emissions<&'a [u8], &'a [u8]> for KmerEmissions {
    fn prob_match(&self, x: &'a [u8], y: &'a [u8]) -> LogProb {
        x.iter()
            .zip(y)
            .fold(LogProb::ln_one(), |p, (&a, &b)| p + self.inner.prob_match(a, b))
    }

    fn prob_gap_x(&self, x: &'a [u8]) -> LogProb {
        x.iter()
            .fold(LogProb::ln_one(), |p, &a| p + self.inner.prob_gap_x(a))
    }

    fn prob_gap_y(&self, x: &'a [u8], y: &'a [u8]) -> LogProb {
        y.iter()
            .fold(LogProb::ln_one(), |p, &b| p + self.inner.prob_gap_y(x[0], b))
    }
}

/// Per-strand read adjustment parameters reported by the basecaller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, new)]
pub struct NanoporeScaling {
    pub scale: f64,
    pub shift: f64,
    pub var: f64,
    pub scale_sd: f64,
    pub var_sd: f64,
}

impl Default for NanoporeScaling {
    fn default() -> Self {
        NanoporeScaling::new(1.0, 0.0, 1.0, 1.0, 1.0)
    }
}

/// One row of an emission model file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, new)]
pub struct KmerModelParams {
    pub level_mean: f64,
    pub level_sd: f64,
    pub noise_mean: f64,
    pub noise_sd: f64,
    pub noise_lambda: f64,
}

/// Builder for [`SignalEmissions`]. Scaling to the read is applied here;
/// the built oracle is immutable.
pub struct SignalEmissionsBuilder {
    k: usize,
    params: Vec<KmerModelParams>,
    scaling: NanoporeScaling,
    skip_prob: f64,
}

impl SignalEmissionsBuilder {
    pub fn new(k: usize, params: Vec<KmerModelParams>) -> Self {
        SignalEmissionsBuilder {
            k,
            params,
            scaling: NanoporeScaling::default(),
            skip_prob: DEFAULT_KMER_SKIP_PROB,
        }
    }

    /// Adjust the model towards the read.
    pub fn scale(mut self, scaling: NanoporeScaling) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn skip_prob(mut self, prob: f64) -> Self {
        self.skip_prob = prob;
        self
    }

    pub fn build(self) -> Result<SignalEmissions> {
        let expected = 4usize.pow(self.k as u32);
        if self.params.len() != expected {
            return Err(Error::InvalidSignalModel {
                msg: format!(
                    "expected {} k-mer parameter rows for k = {}, got {}",
                    expected,
                    self.k,
                    self.params.len()
                ),
            });
        }
        if !(self.skip_prob > 0.0 && self.skip_prob < 1.0) {
            return Err(Error::InvalidSignalModel {
                msg: format!("k-mer skip probability {} is not in (0, 1)", self.skip_prob),
            });
        }
        let s = self.scaling;
        let mut level = Vec::with_capacity(self.params.len());
        let mut noise = Vec::with_capacity(self.params.len());
        for p in &self.params {
            let dist = |mean: f64, sd: f64| {
                Normal::new(mean, sd).map_err(|_| Error::InvalidSignalModel {
                    msg: format!("bad Gaussian parameters ({}, {})", mean, sd),
                })
            };
            level.push(dist(p.level_mean * s.scale + s.shift, p.level_sd * s.var)?);
            noise.push(dist(p.noise_mean * s.scale_sd, p.noise_sd * s.var_sd)?);
        }
        Ok(SignalEmissions {
            k: self.k,
            level,
            noise,
            skip: LogProb(self.skip_prob.ln()),
        })
    }
}

/// Continuous emissions of nanopore events conditioned on reference k-mers.
#[derive(Debug, Clone)]
pub struct SignalEmissions {
    k: usize,
    level: Vec<Normal>,
    noise: Vec<Normal>,
    skip: LogProb,
}

impl SignalEmissions {
    pub fn k(&self) -> usize {
        self.k
    }
}

impl<'a> Emissions<&'a [u8], Event> for SignalEmissions {
    fn prob_match(&self, x: &'a [u8], y: Event) -> LogProb {
        match kmer_index(x) {
            Some(i) => LogProb(self.level[i].ln_pdf(y.mean) + self.noise[i].ln_pdf(y.noise)),
            None => LogProb(BACKGROUND_EVENT_PROB),
        }
    }

    fn prob_gap_x(&self, _: &'a [u8]) -> LogProb {
        self.skip
    }

    /// An unpaired event is modelled as a stay: the pore re-reads the
    /// current k-mer.
    fn prob_gap_y(&self, x: &'a [u8], y: Event) -> LogProb {
        self.prob_match(x, y)
    }
}

/// Emissions backed by a hierarchical Dirichlet process, consumed as an
/// opaque pair of density callbacks.
pub struct HdpEmissions<M, G> {
    match_density: M,
    gap_density: G,
    skip: LogProb,
}

impl<M, G> HdpEmissions<M, G>
where
    M: Fn(&[u8], Event) -> LogProb,
    G: Fn(&[u8], Event) -> LogProb,
{
    pub fn new(match_density: M, gap_density: G) -> Self {
        HdpEmissions {
            match_density,
            gap_density,
            skip: LogProb(DEFAULT_KMER_SKIP_PROB.ln()),
        }
    }
}

impl<'a, M, G> Emissions<&'a [u8], Event> for HdpEmissions<M, G>
where
    M: Fn(&[u8], Event) -> LogProb,
    G: Fn(&[u8], Event) -> LogProb,
{
    fn prob_match(&self, x: &'a [u8], y: Event) -> LogProb {
        (self.match_density)(x, y)
    }

    fn prob_gap_x(&self, _: &'a [u8]) -> LogProb {
        self.skip
    }

    fn prob_gap_y(&self, x: &'a [u8], y: Event) -> LogProb {
        (self.gap_density)(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    pub(crate) fn flat_signal_model(k: usize) -> Vec<KmerModelParams> {
        // distinct, well separated level means per k-mer
        (0..4usize.pow(k as u32))
            .map(|i| KmerModelParams::new(60.0 + i as f64 * 2.0, 1.0, 1.0, 0.3, 0.0))
            .collect_vec()
    }

    #[test]
    fn test_base_index() {
        assert_eq!(base_index(b'A'), Some(0));
        assert_eq!(base_index(b't'), Some(3));
        assert_eq!(base_index(b'N'), None);
        assert_eq!(ambiguous_base_index(b'N'), 4);
    }

    #[test]
    fn test_kmer_index() {
        assert_eq!(kmer_index(b"AA"), Some(0));
        assert_eq!(kmer_index(b"AC"), Some(1));
        assert_eq!(kmer_index(b"TT"), Some(15));
        assert_eq!(kmer_index(b"AN"), None);
    }

    #[test]
    fn test_nucleotide_match_structure() {
        let e = NucleotideEmissions::default();
        // identity beats transition beats transversion
        assert!(e.prob_match(b'A', b'A') > e.prob_match(b'A', b'G'));
        assert!(e.prob_match(b'A', b'G') > e.prob_match(b'A', b'C'));
        // ambiguity is unalignable by default
        assert_eq!(e.prob_match(b'A', b'N'), LogProb::ln_zero());
        assert!(e.prob_gap_y(b'A', b'N') > LogProb::ln_zero());
        // but a wildcard when requested
        let e = NucleotideEmissions::new(true);
        assert_relative_eq!(*e.prob_match(b'A', b'N'), EMISSION_MATCH_N);
    }

    #[test]
    fn test_kmer_emissions_factorize() {
        let e = KmerEmissions::new(NucleotideEmissions::default());
        let single = NucleotideEmissions::default();
        let expected = single.prob_match(b'A', b'A') + single.prob_match(b'C', b'G');
        assert_relative_eq!(*e.prob_match(b"AC", b"AG"), *expected, epsilon = 1e-12);
    }

    #[test]
    fn test_signal_model_scaling() {
        let params = flat_signal_model(1);
        let unscaled = SignalEmissionsBuilder::new(1, params.clone()).build().unwrap();
        let scaled = SignalEmissionsBuilder::new(1, params)
            .scale(NanoporeScaling::new(1.0, 5.0, 1.0, 1.0, 1.0))
            .build()
            .unwrap();
        let event = |mean: f64| Event::new(mean, 1.0, 0.01);
        // the shifted model peaks five picoamps higher
        assert_relative_eq!(
            *unscaled.prob_match(b"A", event(60.0)),
            *scaled.prob_match(b"A", event(65.0)),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_signal_model_validation() {
        assert!(SignalEmissionsBuilder::new(2, flat_signal_model(1)).build().is_err());
        let mut bad = flat_signal_model(1);
        bad[0].level_sd = 0.0;
        assert!(SignalEmissionsBuilder::new(1, bad).build().is_err());
    }

    #[test]
    fn test_hdp_oracle_defers() {
        let oracle = HdpEmissions::new(
            |_: &[u8], _: Event| LogProb(-1.0),
            |_: &[u8], _: Event| LogProb(-2.0),
        );
        let event = Event::new(60.0, 1.0, 0.01);
        assert_relative_eq!(*oracle.prob_match(b"ACGTAC", event), -1.0);
        assert_relative_eq!(*oracle.prob_gap_y(b"ACGTAC", event), -2.0);
    }
}
