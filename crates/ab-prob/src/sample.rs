//! Sample vectors and the per-call diagnostics that travel with them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pareto draws whose shape is `<= 1` (infinite mean).
pub const INVALID_SHAPE: &str = "shape <= 1, invalid sample";
/// Draws taken from a posterior whose update carried zero weight.
pub const PRIOR_FLOOR_APPLIED: &str = "empty posterior, prior floor applied";
/// Normal update whose observations had zero spread.
pub const ZERO_VARIANCE: &str = "zero sample variance, prior variance used";

/// Warning key -> occurrence count, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    counts: BTreeMap<String, u64>,
}

impl Diagnostics {
    /// Empty diagnostics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` occurrences of `key`. Zero counts are not recorded.
    pub fn record(&mut self, key: &str, count: u64) {
        if count == 0 {
            return;
        }
        *self.counts.entry(key.to_string()).or_insert(0) += count;
    }

    /// Occurrences recorded for `key`.
    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Fold another set of counts into this one.
    pub fn merge(&mut self, other: &Diagnostics) {
        for (key, &count) in &other.counts {
            self.record(key, count);
        }
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `(key, count)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, &c)| (k.as_str(), c))
    }
}

/// Posterior draws plus the diagnostics raised while drawing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    /// Raw draws.
    pub samples: Vec<f64>,
    /// Warning counts raised while drawing.
    pub diagnostics: Diagnostics,
}

impl SampleSet {
    /// Wrap draws with their diagnostics.
    pub fn new(samples: Vec<f64>, diagnostics: Diagnostics) -> Self {
        Self { samples, diagnostics }
    }

    /// Number of draws.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when there are no draws.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Arithmetic mean of the draws (`NaN` when empty).
    pub fn mean(&self) -> f64 {
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_merge() {
        let mut a = Diagnostics::new();
        a.record(INVALID_SHAPE, 3);
        a.record(ZERO_VARIANCE, 0);
        assert_eq!(a.get(INVALID_SHAPE), 3);
        assert_eq!(a.get(ZERO_VARIANCE), 0);

        let mut b = Diagnostics::new();
        b.record(INVALID_SHAPE, 2);
        b.record(PRIOR_FLOOR_APPLIED, 5);
        a.merge(&b);

        let pairs: Vec<_> = a.iter().collect();
        assert_eq!(pairs, vec![(PRIOR_FLOOR_APPLIED, 5), (INVALID_SHAPE, 5)]);
    }

    #[test]
    fn test_empty() {
        assert!(Diagnostics::new().is_empty());
        assert!(SampleSet::default().is_empty());
        assert!(SampleSet::default().mean().is_nan());
    }
}
