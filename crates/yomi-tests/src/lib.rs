//! Shared fixtures for the yomi integration and property tests.

use yomi_core::Tuple;

/// Builds a corpus from `(word, reading)` pairs.
pub fn corpus(pairs: &[(&str, &str)]) -> Vec<Tuple> {
    pairs.iter().map(|(w, r)| Tuple::new(*w, *r)).collect()
}

/// A small corpus where several characters share factors, so propagation has
/// cycles to work through.
pub fn overlapping_corpus() -> Vec<Tuple> {
    corpus(&[
        ("大人", "おとな"),
        ("大", "おお"),
        ("人", "ひと"),
        ("人口", "じんこう"),
        ("口", "くち"),
        ("火山", "かざん"),
        ("山", "やま"),
        ("火", "ひ"),
        ("大山", "おおやま"),
    ])
}

pub fn assert_close(actual: f64, expected: f64, tol: f64, label: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{} mismatch: expected {:.15}, got {:.15}, diff={:.3e}",
        label,
        expected,
        actual,
        (actual - expected).abs()
    );
}
