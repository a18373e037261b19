//! Exponential durations with a conjugate Gamma prior on the rate.
//!
//! Observations arrive as paired `values` / `frequencies`. The posterior
//! shape accumulates `sum(values)` (values are read as event counts) and the
//! rate accumulates `sum(value * frequency)`. Samples are reciprocal rate
//! draws, i.e. mean durations.

use ab_core::Result;
use rand::Rng;

use crate::gamma::{GammaParams, GammaPrior};
use crate::sample::{Diagnostics, PRIOR_FLOOR_APPLIED, SampleSet};

/// Posterior over the mean duration of an exponential process.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialPosterior {
    params: GammaParams,
}

impl ExponentialPosterior {
    /// Posterior under the flat `Gamma(0, 0)` prior.
    pub fn new(values: &[f64], frequencies: &[f64]) -> Result<Self> {
        Self::with_prior(values, frequencies, GammaPrior::default())
    }

    /// Posterior under an explicit Gamma prior on the rate.
    pub fn with_prior(values: &[f64], frequencies: &[f64], prior: GammaPrior) -> Result<Self> {
        prior.validate()?;
        let mut shape = prior.alpha;
        let mut rate = prior.beta;
        for (v, f) in crate::paired(values, frequencies)? {
            shape += v;
            rate += v * f;
        }
        Ok(Self { params: GammaParams::floor(shape, rate, "Exponential")? })
    }

    /// Posterior Gamma shape of the rate.
    pub fn alpha(&self) -> f64 {
        self.params.shape
    }

    /// Posterior Gamma rate of the rate.
    pub fn beta(&self) -> f64 {
        self.params.rate
    }

    /// Whether a zero-weight update forced the prior floor.
    pub fn is_floored(&self) -> bool {
        self.params.floored
    }

    /// Posterior mean duration `beta / (alpha - 1)`; infinite for `alpha <= 1`.
    pub fn mean(&self) -> f64 {
        if self.params.shape <= 1.0 {
            return f64::INFINITY;
        }
        self.params.rate / (self.params.shape - 1.0)
    }

    /// Log-density of the posterior over the rate at `x`.
    pub fn logpdf(&self, x: f64) -> f64 {
        self.params.logpdf(x)
    }

    /// Equal-tailed credible interval for the mean duration.
    pub fn credible_interval(&self, level: f64) -> Result<(f64, f64)> {
        let (lo, hi) = self.params.quantiles(level)?;
        Ok((1.0 / hi, 1.0 / lo))
    }

    /// Draw `n` mean durations from the posterior.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<SampleSet> {
        // A rate draw can still underflow for tiny (but positive) shapes.
        let samples = self
            .params
            .draw(n, rng)?
            .into_iter()
            .map(|rate| 1.0 / rate.max(f64::MIN_POSITIVE))
            .collect();
        let mut diagnostics = Diagnostics::new();
        if self.params.floored {
            diagnostics.record(PRIOR_FLOOR_APPLIED, n as u64);
        }
        Ok(SampleSet::new(samples, diagnostics))
    }
}
