//! End-to-end alignment scenarios over the public API.

use std::collections::HashMap;

use rand::prelude::*;

use porealign::{
    get_aligned_pairs, get_expectations, score_by_posterior_probability_ignoring_gaps,
    AlignedPair, Bases, Events, ExtractionMode, Hmm, Kmers, KmerModelParams, NanoporeScaling,
    NucleotideEmissions, PairwiseAlignmentParameters, PairwiseAlignmentParametersBuilder,
    SequenceView, SignalEmissionsBuilder, StateMachineKind, ThreeState,
};

fn setup_logger() {
    let _ = env_logger::init();
}

fn align_bases(
    x: &[u8],
    y: &[u8],
    anchors: &[(usize, usize)],
    p: &PairwiseAlignmentParameters,
    ragged_left: bool,
    ragged_right: bool,
) -> Vec<AlignedPair> {
    let machine = ThreeState::nucleotide_defaults();
    let emissions = NucleotideEmissions::default();
    get_aligned_pairs(
        &machine,
        &emissions,
        &Bases::new(x),
        &Bases::new(y),
        anchors,
        p,
        ragged_left,
        ragged_right,
        ExtractionMode::SingleMatch,
    )
    .unwrap()
}

fn pair_map(pairs: &[AlignedPair]) -> HashMap<(usize, usize), f64> {
    pairs.iter().map(|p| ((p.x, p.y), p.prob())).collect()
}

fn params_with_threshold(threshold: f64) -> PairwiseAlignmentParameters {
    PairwiseAlignmentParametersBuilder::default()
        .threshold(threshold)
        .build()
        .unwrap()
}

#[test]
fn test_identity_alignment() {
    setup_logger();
    let p = PairwiseAlignmentParameters::default();
    let pairs = align_bases(b"AGCTT", b"AGCTT", &[], &p, false, false);
    let map = pair_map(&pairs);
    let mut aggregate = 0.0;
    for i in 0..5 {
        let prob = map
            .get(&(i, i))
            .unwrap_or_else(|| panic!("missing diagonal pair ({}, {})", i, i));
        assert!(*prob > 0.9, "posterior {} at ({}, {})", prob, i, i);
        aggregate += prob;
    }
    assert!(aggregate >= 4.5);
    // pairs come back ordered for deterministic downstream processing
    for window in pairs.windows(2) {
        assert!(window[0].x + window[0].y <= window[1].x + window[1].y);
    }
    assert!(score_by_posterior_probability_ignoring_gaps(&pairs) > 85.0);
}

#[test]
fn test_single_insertion_in_y() {
    setup_logger();
    let p = params_with_threshold(0.1);
    let pairs = align_bases(b"ACGT", b"ACCGT", &[], &p, false, false);
    let map = pair_map(&pairs);
    for &(x, y) in &[(0, 0), (2, 3), (3, 4)] {
        assert!(map.get(&(x, y)).copied().unwrap_or(0.0) > 0.9, "({}, {})", x, y);
    }
    // the duplicated C is genuinely ambiguous between y = 1 and y = 2
    let ambiguous: f64 = map.get(&(1, 1)).unwrap_or(&0.0) + map.get(&(1, 2)).unwrap_or(&0.0);
    assert!(ambiguous > 0.8, "ambiguous C mass {}", ambiguous);
    // the insertion consumes y = 2 against x = 1 at most
    for pair in &pairs {
        assert!(pair.y != 2 || pair.x == 1, "unexpected pair {:?}", pair);
        let expected = [(0, 0), (1, 1), (1, 2), (2, 3), (3, 4)];
        assert!(expected.contains(&(pair.x, pair.y)), "unexpected pair {:?}", pair);
    }
}

#[test]
fn test_single_deletion_in_x() {
    setup_logger();
    let p = params_with_threshold(0.1);
    let pairs = align_bases(b"ACCGT", b"ACGT", &[], &p, false, false);
    let map = pair_map(&pairs);
    for &(x, y) in &[(0, 0), (3, 2), (4, 3)] {
        assert!(map.get(&(x, y)).copied().unwrap_or(0.0) > 0.9, "({}, {})", x, y);
    }
    let ambiguous: f64 = map.get(&(1, 1)).unwrap_or(&0.0) + map.get(&(2, 1)).unwrap_or(&0.0);
    assert!(ambiguous > 0.8, "ambiguous C mass {}", ambiguous);
    for pair in &pairs {
        let expected = [(0, 0), (1, 1), (2, 1), (3, 2), (4, 3)];
        assert!(expected.contains(&(pair.x, pair.y)), "unexpected pair {:?}", pair);
    }
}

#[test]
fn test_anchor_split_matches_unsplit_alignment() {
    setup_logger();
    let mut rng = StdRng::seed_from_u64(99);
    let alphabet = b"ACGT";
    let x: Vec<u8> = (0..250).map(|_| alphabet[rng.gen_range(0, 4)]).collect();
    let y = x.clone();
    let anchors = vec![(5, 5), (200, 200)];

    let segments = porealign::align::anchors::split_points(&anchors, 250, 250, 10_000, false, false);
    assert!(segments.len() >= 2);

    let split_params = PairwiseAlignmentParametersBuilder::default()
        .split_matrix_bigger_than_this(10_000)
        .build()
        .unwrap();
    let split = align_bases(&x, &y, &anchors, &split_params, false, false);
    let unsplit = align_bases(&x, &y, &anchors, &PairwiseAlignmentParameters::default(), false, false);

    let split_map = pair_map(&split);
    let unsplit_map = pair_map(&unsplit);
    let differing = split_map
        .keys()
        .filter(|k| !unsplit_map.contains_key(*k))
        .count()
        + unsplit_map
            .keys()
            .filter(|k| !split_map.contains_key(*k))
            .count();
    assert!(differing <= 2, "{} pairs differ between split and unsplit", differing);
    // the identity diagonal survives the split intact
    for i in 0..250 {
        assert!(unsplit_map.get(&(i, i)).copied().unwrap_or(0.0) > 0.5, "({}, {})", i, i);
    }
}

#[test]
fn test_ragged_right_end_is_free() {
    setup_logger();
    let p = PairwiseAlignmentParameters::default();
    let plain = align_bases(b"ACGT", b"ACGT", &[], &p, false, false);
    let ragged = align_bases(b"ACGT", b"ACGTXXXX", &[], &p, false, true);
    let plain_map = pair_map(&plain);
    let ragged_map = pair_map(&ragged);
    for i in 0..4 {
        let a = plain_map.get(&(i, i)).copied().unwrap_or(0.0);
        let b = ragged_map.get(&(i, i)).copied().unwrap_or(0.0);
        assert!(b > 0.9, "posterior {} at ({}, {})", b, i, i);
        assert!((a - b).abs() < 1e-2, "({}, {}): {} vs {}", i, i, a, b);
    }
    // nothing aligns to the ragged tail
    assert!(ragged.iter().all(|pair| pair.y < 4));
}

#[test]
fn test_expectations_concentrate_on_match_continue() {
    setup_logger();
    let machine = ThreeState::uniform();
    let emissions = NucleotideEmissions::default();
    let mut hmm = Hmm::new(StateMachineKind::ThreeState, 3, 5, 5);
    get_expectations(
        &machine,
        &emissions,
        &mut hmm,
        &Bases::new(b"AGCTT"),
        &Bases::new(b"AGCTT"),
        &[],
        &PairwiseAlignmentParameters::default(),
        false,
        false,
    )
    .unwrap();
    assert!(hmm.likelihood() < 0.0);
    let t = hmm.normalized_transitions();
    assert!(
        t[0][0] > 0.9,
        "match-continue mass after one expectation round: {}",
        t[0][0]
    );
    // emission expectations concentrate on identical base pairs
    let mut diagonal = 0.0;
    let mut off_diagonal = 0.0;
    for i in 0..5 {
        for j in 0..5 {
            if i == j {
                diagonal += hmm.emission(0, i, j);
            } else {
                off_diagonal += hmm.emission(0, i, j);
            }
        }
    }
    assert!(diagonal > 10.0 * off_diagonal);

    // the trained machine closes the EM loop
    let trained = ThreeState::from_expectations(&hmm).unwrap();
    let pairs = get_aligned_pairs(
        &trained,
        &emissions,
        &Bases::new(b"AGCTT"),
        &Bases::new(b"AGCTT"),
        &[],
        &PairwiseAlignmentParameters::default(),
        false,
        false,
        ExtractionMode::SingleMatch,
    )
    .unwrap();
    assert!(pairs.iter().filter(|p| p.x == p.y).count() == 5);
}

#[test]
fn test_signal_alignment_recovers_event_positions() {
    setup_logger();
    // one event per k-mer, drawn at the model mean
    let k = 2;
    let params = (0..16)
        .map(|i| KmerModelParams::new(60.0 + i as f64 * 4.0, 0.8, 1.0, 0.2, 0.0))
        .collect::<Vec<_>>();
    let emissions = SignalEmissionsBuilder::new(k, params.clone())
        .scale(NanoporeScaling::default())
        .build()
        .unwrap();
    let reference = b"ACGTACGGTCA";
    let kmers = Kmers::new(reference, k);
    let mut raw = Vec::new();
    for i in 0..kmers.len() {
        let index = porealign::model::emissions::kmer_index(kmers.get(i)).unwrap();
        raw.extend_from_slice(&[60.0 + index as f64 * 4.0, 1.0, 0.01]);
    }
    let events = Events::new(&raw);
    let machine = ThreeState::nanopore_defaults();
    let pairs = get_aligned_pairs(
        &machine,
        &emissions,
        &kmers,
        &events,
        &[],
        &PairwiseAlignmentParameters::default(),
        false,
        false,
        ExtractionMode::SingleMatch,
    )
    .unwrap();
    let map = pair_map(&pairs);
    for i in 0..kmers.len() {
        assert!(
            map.get(&(i, i)).copied().unwrap_or(0.0) > 0.5,
            "k-mer {} not aligned to its event",
            i
        );
    }
}
