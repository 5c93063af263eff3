//! Sparse categorical distributions over readings.
//!
//! Entries below [`PRUNE_RATIO`] of the total mass are dropped on normalization
//! without renormalizing, so a normalized distribution may sum to slightly less
//! than one.

use std::cmp::Ordering;
use std::sync::Arc;

use rustc_hash::FxHashMap;

/// A reading string (or substring) shared between partitions, nodes and reports.
pub type Reading = Arc<str>;

/// Entries whose normalized probability falls below this are pruned.
pub const PRUNE_RATIO: f64 = 1e-3;

/// Absolute per-entry tolerance when comparing two distributions.
pub const CONVERGENCE_TOLERANCE: f64 = 1e-6;

/// Maximum entry of a rescaled omega or alpha weight vector.
pub const WEIGHT_CEILING: f64 = 10.0;

/// Mapping reading → probability. Readings not present are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution {
    entries: FxHashMap<Reading, f64>,
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniform distribution over the distinct `readings`; empty input gives an empty distribution.
    pub fn uniform<I>(readings: I) -> Self
    where
        I: IntoIterator<Item = Reading>,
    {
        let mut entries = FxHashMap::default();
        for reading in readings {
            entries.insert(reading, 0.0);
        }
        let share = 1.0 / entries.len().max(1) as f64;
        for value in entries.values_mut() {
            *value = share;
        }
        Self { entries }
    }

    pub fn get(&self, reading: &str) -> Option<f64> {
        self.entries.get(reading).copied()
    }

    pub fn contains(&self, reading: &str) -> bool {
        self.entries.contains_key(reading)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Reading, f64)> + '_ {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    pub fn total_mass(&self) -> f64 {
        self.entries.values().sum()
    }

    /// Adds `mass` to `reading`, creating the entry if needed.
    pub fn add(&mut self, reading: Reading, mass: f64) {
        *self.entries.entry(reading).or_insert(0.0) += mass;
    }

    /// Adds every entry of `other`, scaled by `weight`. No normalization.
    pub fn accumulate(&mut self, other: &Distribution, weight: f64) {
        for (reading, p) in &other.entries {
            *self.entries.entry(reading.clone()).or_insert(0.0) += p * weight;
        }
    }

    /// Divides by the total mass and prunes entries below [`PRUNE_RATIO`].
    ///
    /// A zero-mass (or non-finite) distribution carries no information and is cleared.
    pub fn normalize(&mut self) {
        let total = self.total_mass();
        if !(total > 0.0 && total.is_finite()) {
            self.entries.clear();
            return;
        }
        self.entries.retain(|_, p| {
            *p /= total;
            *p >= PRUNE_RATIO
        });
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Elementwise comparison over the union of keys; missing entries count as zero.
    pub fn approx_eq(&self, other: &Distribution, tolerance: f64) -> bool {
        let covered = self.entries.iter().all(|(reading, p)| {
            (p - other.get(reading).unwrap_or(0.0)).abs() <= tolerance
        });
        covered
            && other
                .entries
                .iter()
                .filter(|(reading, _)| !self.entries.contains_key(*reading))
                .all(|(_, p)| p.abs() <= tolerance)
    }

    /// Readings whose probability strictly exceeds `threshold`.
    pub fn readings_above(&self, threshold: f64) -> Vec<Reading> {
        let mut kept: Vec<Reading> = self
            .entries
            .iter()
            .filter(|(_, p)| **p > threshold)
            .map(|(reading, _)| reading.clone())
            .collect();
        kept.sort();
        kept
    }

    /// `(probability, reading)` pairs, most probable first; ties by reading.
    pub fn sorted(&self) -> Vec<(f64, Reading)> {
        let mut pairs: Vec<(f64, Reading)> = self
            .entries
            .iter()
            .map(|(reading, p)| (*p, reading.clone()))
            .collect();
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        pairs
    }
}

impl FromIterator<(Reading, f64)> for Distribution {
    fn from_iter<T: IntoIterator<Item = (Reading, f64)>>(iter: T) -> Self {
        let mut distribution = Distribution::new();
        for (reading, mass) in iter {
            distribution.add(reading, mass);
        }
        distribution
    }
}

/// Rescales `weights` so that the largest entry equals [`WEIGHT_CEILING`].
///
/// An empty vector is left alone. When no entry is positive (all zero) the
/// vector falls back to uniform trust: every entry becomes the ceiling.
pub fn rescale_to_ceiling(weights: &mut [f64]) {
    if weights.is_empty() {
        return;
    }
    let max = weights
        .iter()
        .copied()
        .filter(|w| w.is_finite())
        .fold(0.0_f64, f64::max);
    if max > 0.0 {
        let scale = WEIGHT_CEILING / max;
        for w in weights.iter_mut() {
            *w *= scale;
        }
    } else {
        weights.fill(WEIGHT_CEILING);
    }
}

/// Index of the first maximal weight; `None` for an empty slice.
///
/// Earlier entries win ties, so partition order decides between equal scores.
pub fn first_argmax(weights: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &w) in weights.iter().enumerate() {
        match best {
            Some((_, current)) if w.partial_cmp(&current) != Some(Ordering::Greater) => {}
            _ => best = Some((i, w)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(s: &str) -> Reading {
        Arc::from(s)
    }

    #[test]
    fn uniform_splits_mass_evenly_and_dedups() {
        let d = Distribution::uniform([r("か"), r("ひ"), r("か")]);
        assert_eq!(d.len(), 2);
        assert_eq!(d.get("か"), Some(0.5));
        assert_eq!(d.get("ひ"), Some(0.5));
        assert!(Distribution::uniform(Vec::new()).is_empty());
    }

    #[test]
    fn normalize_divides_and_prunes() {
        let mut d: Distribution = [(r("a"), 3.0), (r("b"), 1.0), (r("c"), 0.003)]
            .into_iter()
            .collect();
        d.normalize();
        assert!(d.get("c").is_none());
        let total = d.total_mass();
        assert!(total <= 1.0 + 1e-12);
        assert!((d.get("a").unwrap() - 3.0 / 4.003).abs() < 1e-12);
        assert!(total > 1.0 - 1e-3);
    }

    #[test]
    fn normalize_zero_mass_clears() {
        let mut d: Distribution = [(r("a"), 0.0), (r("b"), 0.0)].into_iter().collect();
        d.normalize();
        assert!(d.is_empty());

        let mut empty = Distribution::new();
        empty.normalize();
        assert!(empty.is_empty());
    }

    #[test]
    fn approx_eq_covers_union_of_keys() {
        let a: Distribution = [(r("a"), 1.0)].into_iter().collect();
        let b: Distribution = [(r("a"), 1.0), (r("b"), 1e-7)].into_iter().collect();
        let c: Distribution = [(r("a"), 0.9), (r("b"), 0.1)].into_iter().collect();
        assert!(a.approx_eq(&b, CONVERGENCE_TOLERANCE));
        assert!(b.approx_eq(&a, CONVERGENCE_TOLERANCE));
        assert!(!a.approx_eq(&c, CONVERGENCE_TOLERANCE));
        assert!(!c.approx_eq(&a, CONVERGENCE_TOLERANCE));
    }

    #[test]
    fn accumulate_applies_weight() {
        let mut acc = Distribution::new();
        let msg: Distribution = [(r("a"), 0.5), (r("b"), 0.5)].into_iter().collect();
        acc.accumulate(&msg, 2.0);
        acc.accumulate(&msg, 1.0);
        assert_eq!(acc.get("a"), Some(1.5));
    }

    #[test]
    fn sorted_orders_by_probability_then_reading() {
        let d: Distribution = [(r("b"), 0.25), (r("a"), 0.25), (r("c"), 0.5)]
            .into_iter()
            .collect();
        let order: Vec<String> = d.sorted().into_iter().map(|(_, s)| s.to_string()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn rescale_sets_max_to_ceiling() {
        let mut w = vec![1.0, 4.0, 2.0];
        rescale_to_ceiling(&mut w);
        assert_eq!(w, vec![2.5, 10.0, 5.0]);
    }

    #[test]
    fn rescale_all_zero_falls_back_to_uniform() {
        let mut w = vec![0.0, 0.0];
        rescale_to_ceiling(&mut w);
        assert_eq!(w, vec![WEIGHT_CEILING, WEIGHT_CEILING]);

        let mut empty: Vec<f64> = Vec::new();
        rescale_to_ceiling(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn first_argmax_prefers_earliest_tie() {
        assert_eq!(first_argmax(&[1.0, 3.0, 3.0]), Some(1));
        assert_eq!(first_argmax(&[]), None);
        assert_eq!(first_argmax(&[2.0]), Some(0));
    }
}
