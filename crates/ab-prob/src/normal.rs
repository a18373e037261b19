//! Normal metric with known variance: posterior over the mean only.

use ab_core::{Error, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use statrs::distribution::ContinuousCDF;

use crate::sample::{Diagnostics, SampleSet, ZERO_VARIANCE};

/// Natural log of `sqrt(2π)`.
const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_7;

/// Normal prior on the metric mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalPrior {
    /// Prior mean.
    pub mean: f64,
    /// Prior variance.
    pub variance: f64,
}

impl Default for NormalPrior {
    fn default() -> Self {
        Self { mean: 0.0, variance: 100.0 }
    }
}

/// Precision-weighted posterior `N(mean, stddev)` of the metric mean.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalPosterior {
    mean: f64,
    stddev: f64,
    zero_variance: bool,
}

impl NormalPosterior {
    /// Posterior under the default prior.
    pub fn new(values: &[f64], frequencies: &[f64]) -> Result<Self> {
        Self::with_prior(values, frequencies, NormalPrior::default())
    }

    /// Combine `prior` with the weighted multiset `values[i] x frequencies[i]`.
    ///
    /// The observation variance is the (population) variance of the multiset.
    /// An empty multiset leaves the prior unchanged.
    pub fn with_prior(values: &[f64], frequencies: &[f64], prior: NormalPrior) -> Result<Self> {
        if !prior.mean.is_finite() {
            return Err(Error::InvalidInput(format!("prior mean must be finite, got {}", prior.mean)));
        }
        if !prior.variance.is_finite() || prior.variance <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "prior variance must be finite and > 0, got {}",
                prior.variance
            )));
        }

        let mut n = 0.0;
        let mut sum = 0.0;
        for (v, f) in crate::paired(values, frequencies)? {
            n += f;
            sum += v * f;
        }
        if n == 0.0 {
            return Ok(Self { mean: prior.mean, stddev: prior.variance.sqrt(), zero_variance: false });
        }

        let sample_mean = sum / n;
        let sample_var = crate::paired(values, frequencies)?
            .map(|(v, f)| f * (v - sample_mean).powi(2))
            .sum::<f64>()
            / n;
        let zero_variance = !(sample_var.is_finite() && sample_var > 0.0);
        let obs_var = if zero_variance { prior.variance } else { sample_var };

        let sample_precision = 1.0 / obs_var;
        let precision = 1.0 / prior.variance;
        let total_precision = precision + n * sample_precision;

        Ok(Self {
            mean: (precision * prior.mean + sample_precision * sum) / total_precision,
            stddev: (1.0 / total_precision).sqrt(),
            zero_variance,
        })
    }

    /// Posterior mean.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Posterior standard deviation.
    pub fn stddev(&self) -> f64 {
        self.stddev
    }

    /// Log-density of the posterior at `x`.
    pub fn logpdf(&self, x: f64) -> f64 {
        let z = (x - self.mean) / self.stddev;
        -0.5 * z * z - self.stddev.ln() - LN_SQRT_2PI
    }

    /// Equal-tailed credible interval for the mean.
    pub fn credible_interval(&self, level: f64) -> Result<(f64, f64)> {
        crate::check_level(level)?;
        let dist = statrs::distribution::Normal::new(self.mean, self.stddev).map_err(|e| {
            Error::NumericDegeneracy(format!("Normal({}, {}): {}", self.mean, self.stddev, e))
        })?;
        let tail = 0.5 * (1.0 - level);
        Ok((dist.inverse_cdf(tail), dist.inverse_cdf(1.0 - tail)))
    }

    /// Draw `n` means from the posterior.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<SampleSet> {
        let dist = Normal::new(self.mean, self.stddev).map_err(|e| {
            Error::NumericDegeneracy(format!("Normal({}, {}): {}", self.mean, self.stddev, e))
        })?;
        let samples = (0..n).map(|_| dist.sample(rng)).collect();
        let mut diagnostics = Diagnostics::new();
        if self.zero_variance {
            diagnostics.record(ZERO_VARIANCE, n as u64);
        }
        Ok(SampleSet::new(samples, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_precision_weighting() {
        // Multiset {1, 1, 3, 3}: mean 2, population variance 1.
        let prior = NormalPrior { mean: 0.0, variance: 4.0 };
        let post = NormalPosterior::with_prior(&[1.0, 3.0], &[2.0, 2.0], prior).unwrap();
        let total_precision = 0.25 + 4.0;
        assert_relative_eq!(post.mean(), 8.0 / total_precision, epsilon = 1e-12);
        assert_relative_eq!(post.stddev(), (1.0 / total_precision).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_is_prior() {
        let post = NormalPosterior::new(&[], &[]).unwrap();
        assert_eq!(post.mean(), 0.0);
        assert_relative_eq!(post.stddev(), 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_variance_uses_prior_variance() {
        let post = NormalPosterior::new(&[5.0], &[3.0]).unwrap();
        assert!(post.mean().is_finite() && post.stddev() > 0.0);
        let mut rng = StdRng::seed_from_u64(2);
        let set = post.sample(10, &mut rng).unwrap();
        assert_eq!(set.diagnostics.get(ZERO_VARIANCE), 10);
    }

    #[test]
    fn test_invalid_prior_and_lengths() {
        let bad = NormalPrior { mean: 0.0, variance: 0.0 };
        assert!(NormalPosterior::with_prior(&[1.0], &[1.0], bad).is_err());
        assert!(NormalPosterior::new(&[1.0, 2.0], &[1.0]).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_logpdf_symmetry_and_interval() {
        let post = NormalPosterior::new(&[9.0, 11.0], &[50.0, 50.0]).unwrap();
        let d = 0.3;
        assert_relative_eq!(post.logpdf(post.mean() + d), post.logpdf(post.mean() - d), epsilon = 1e-12);
        let (lo, hi) = post.credible_interval(0.95).unwrap();
        assert_relative_eq!(hi - post.mean(), post.mean() - lo, epsilon = 1e-9);
    }

    #[test]
    fn test_samples_follow_posterior() {
        let post = NormalPosterior::new(&[9.0, 11.0], &[50.0, 50.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let set = post.sample(50_000, &mut rng).unwrap();
        assert!(set.diagnostics.is_empty());
        assert_relative_eq!(set.mean(), post.mean(), epsilon = 0.01);
    }
}
