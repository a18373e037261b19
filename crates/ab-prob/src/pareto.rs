//! Heavy-tailed (power-law) magnitudes with a Gamma prior on the Pareto shape.
//!
//! The shape hyperparameter accumulates `sum(values)` over every observation,
//! while the rate accumulates `value * ln(frequency / xmin)` only over entries
//! with `frequency >= xmin`. The two sums deliberately use different filters.
//!
//! Each draw maps a shape `s` to the Pareto mean `xmin * s / (s - 1)`. Draws
//! with `s <= 1` have no finite mean: they are kept as-is and counted under
//! [`INVALID_SHAPE`].

use ab_core::{Error, Result};
use rand::Rng;

use crate::gamma::{GammaParams, GammaPrior};
use crate::sample::{Diagnostics, INVALID_SHAPE, PRIOR_FLOOR_APPLIED, SampleSet};

/// Posterior over the mean of a Pareto(xmin, shape) magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct ParetoPosterior {
    params: GammaParams,
    xmin: f64,
}

impl ParetoPosterior {
    /// Posterior under the flat `Gamma(0, 0)` prior with `xmin = 1`.
    pub fn new(values: &[f64], frequencies: &[f64]) -> Result<Self> {
        Self::with_prior(values, frequencies, GammaPrior::default(), 1.0)
    }

    /// Posterior under an explicit Gamma prior on the shape and a known `xmin`.
    pub fn with_prior(
        values: &[f64],
        frequencies: &[f64],
        prior: GammaPrior,
        xmin: f64,
    ) -> Result<Self> {
        prior.validate()?;
        if !xmin.is_finite() || xmin <= 0.0 {
            return Err(Error::InvalidInput(format!("xmin must be finite and > 0, got {}", xmin)));
        }
        let mut shape = prior.alpha;
        let mut rate = prior.beta;
        for (v, f) in crate::paired(values, frequencies)? {
            shape += v;
            if f >= xmin {
                rate += v * (f / xmin).ln();
            }
        }
        Ok(Self { params: GammaParams::floor(shape, rate, "Pareto")?, xmin })
    }

    /// Posterior Gamma shape of the tail index.
    pub fn alpha(&self) -> f64 {
        self.params.shape
    }

    /// Posterior Gamma scale `theta = 1 / rate` of the tail index.
    pub fn theta(&self) -> f64 {
        1.0 / self.params.rate
    }

    /// Known scale (minimum value).
    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    /// Whether a zero-weight update forced the prior floor.
    pub fn is_floored(&self) -> bool {
        self.params.floored
    }

    /// Pareto mean evaluated at the posterior mean shape; infinite when that shape is `<= 1`.
    pub fn mean(&self) -> f64 {
        pareto_mean(self.params.mean(), self.xmin)
    }

    /// Log-density of the posterior over the tail index at `x`.
    pub fn logpdf(&self, x: f64) -> f64 {
        self.params.logpdf(x)
    }

    /// Equal-tailed credible interval for the Pareto mean.
    ///
    /// The mean is decreasing in the shape, so the shape quantiles swap ends.
    pub fn credible_interval(&self, level: f64) -> Result<(f64, f64)> {
        let (lo, hi) = self.params.quantiles(level)?;
        Ok((pareto_mean(hi, self.xmin), pareto_mean(lo, self.xmin)))
    }

    /// Draw `n` Pareto means; shapes `<= 1` are counted, not dropped.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<SampleSet> {
        let shapes = self.params.draw(n, rng)?;
        let invalid = shapes.iter().filter(|&&s| s <= 1.0).count() as u64;
        let samples = shapes.into_iter().map(|s| self.xmin * s / (s - 1.0)).collect();

        let mut diagnostics = Diagnostics::new();
        diagnostics.record(INVALID_SHAPE, invalid);
        if self.params.floored {
            diagnostics.record(PRIOR_FLOOR_APPLIED, n as u64);
        }
        Ok(SampleSet::new(samples, diagnostics))
    }
}

#[inline]
fn pareto_mean(shape: f64, xmin: f64) -> f64 {
    if shape <= 1.0 { f64::INFINITY } else { xmin * shape / (shape - 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const CONTROL_VALUES: [f64; 13] =
        [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 12.0, 13.0, 20.0, 23.0];
    const CONTROL_FREQS: [f64; 13] =
        [1129.0, 67.0, 43.0, 16.0, 10.0, 1.0, 5.0, 2.0, 4.0, 1.0, 1.0, 1.0, 1.0];

    #[test]
    fn test_asymmetric_filters() {
        // xmin = 2: the entry with frequency 1 is excluded from the rate only.
        let post = ParetoPosterior::with_prior(
            &[3.0, 5.0],
            &[1.0, 8.0],
            GammaPrior::default(),
            2.0,
        )
        .unwrap();
        assert_eq!(post.alpha(), 8.0);
        assert_relative_eq!(post.theta(), 1.0 / (5.0 * 4f64.ln()), epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_xmin() {
        assert!(ParetoPosterior::with_prior(&[1.0], &[2.0], GammaPrior::default(), 0.0).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let err = ParetoPosterior::new(&CONTROL_VALUES, &CONTROL_FREQS[..12]).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_invalid_shapes_are_counted_not_dropped() {
        // shape ~ Gamma(2, rate 2): mean 1, so roughly 60% of draws fall at or below 1.
        let post = ParetoPosterior::with_prior(
            &[2.0],
            &[std::f64::consts::E],
            GammaPrior::default(),
            1.0,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let set = post.sample(10_000, &mut rng).unwrap();
        assert_eq!(set.len(), 10_000);
        let invalid = set.diagnostics.get(INVALID_SHAPE);
        assert!(invalid > 4_000 && invalid < 8_000, "invalid={}", invalid);
        assert!(post.mean().is_infinite() || post.mean() > 1.0);
    }

    #[test]
    fn test_well_identified_tail() {
        let post = ParetoPosterior::new(&CONTROL_VALUES, &CONTROL_FREQS).unwrap();
        assert_eq!(post.alpha(), 113.0);
        let mut rng = StdRng::seed_from_u64(1);
        let set = post.sample(20_000, &mut rng).unwrap();
        // Shape posterior sits near 1.44; only its far left tail is invalid.
        let invalid = set.diagnostics.get(INVALID_SHAPE);
        assert!(invalid < 200, "invalid={}", invalid);
        let below_xmin = set.samples.iter().filter(|&&m| !(m > post.xmin())).count() as u64;
        assert_eq!(below_xmin, invalid);
        let (lo, hi) = post.credible_interval(0.95).unwrap();
        assert!(lo < hi);
    }
}
