//! Bernoulli trials with a conjugate Beta prior.

use ab_core::{Error, Result};
use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use statrs::distribution::ContinuousCDF;
use statrs::function::gamma::ln_gamma;

use crate::sample::{Diagnostics, SampleSet};

/// Beta prior over a success rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaPrior {
    /// Prior pseudo-successes.
    pub alpha: f64,
    /// Prior pseudo-failures.
    pub beta: f64,
}

impl Default for BetaPrior {
    /// Beta(1, 1) = Uniform(0, 1).
    fn default() -> Self {
        Self { alpha: 1.0, beta: 1.0 }
    }
}

/// Posterior `Beta(alpha0 + S, beta0 + T - S)` over a conversion rate.
#[derive(Debug, Clone, PartialEq)]
pub struct BernoulliPosterior {
    alpha: f64,
    beta: f64,
}

impl BernoulliPosterior {
    /// Posterior after `successes` out of `trials` under the uniform prior.
    pub fn new(trials: u64, successes: u64) -> Result<Self> {
        Self::with_prior(trials, successes, BetaPrior::default())
    }

    /// Posterior after `successes` out of `trials` under `prior`.
    pub fn with_prior(trials: u64, successes: u64, prior: BetaPrior) -> Result<Self> {
        if !prior.alpha.is_finite() || prior.alpha <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "prior alpha must be finite and > 0, got {}",
                prior.alpha
            )));
        }
        if !prior.beta.is_finite() || prior.beta <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "prior beta must be finite and > 0, got {}",
                prior.beta
            )));
        }
        if successes > trials {
            return Err(Error::InvalidInput(format!(
                "successes ({}) must not exceed trials ({})",
                successes, trials
            )));
        }
        Ok(Self {
            alpha: prior.alpha + successes as f64,
            beta: prior.beta + (trials - successes) as f64,
        })
    }

    /// Posterior Beta alpha.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Posterior Beta beta.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Posterior mean `alpha / (alpha + beta)`.
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// Log-density of the posterior at rate `x`.
    ///
    /// Support: `0 <= x <= 1`; outside it the density is `-inf`.
    pub fn logpdf(&self, x: f64) -> f64 {
        let (a, b) = (self.alpha, self.beta);
        if !(0.0..=1.0).contains(&x) {
            return f64::NEG_INFINITY;
        }
        let ln_norm = -ln_beta(a, b);
        // Boundary points: the power term is 0 at exponent 0, otherwise +-inf.
        if x == 0.0 || x == 1.0 {
            let shape = if x == 0.0 { a } else { b };
            if shape < 1.0 {
                return f64::INFINITY;
            }
            if shape > 1.0 {
                return f64::NEG_INFINITY;
            }
            return ln_norm;
        }
        ln_norm + (a - 1.0) * x.ln() + (b - 1.0) * (1.0 - x).ln()
    }

    /// Equal-tailed credible interval for the rate.
    pub fn credible_interval(&self, level: f64) -> Result<(f64, f64)> {
        crate::check_level(level)?;
        let dist = statrs::distribution::Beta::new(self.alpha, self.beta)
            .map_err(|e| Error::NumericDegeneracy(format!("Beta({}, {}): {}", self.alpha, self.beta, e)))?;
        let tail = 0.5 * (1.0 - level);
        Ok((dist.inverse_cdf(tail), dist.inverse_cdf(1.0 - tail)))
    }

    /// Draw `n` rates from the posterior.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<SampleSet> {
        let dist = Beta::new(self.alpha, self.beta)
            .map_err(|e| Error::NumericDegeneracy(format!("Beta({}, {}): {}", self.alpha, self.beta, e)))?;
        let samples = (0..n).map(|_| dist.sample(rng)).collect();
        Ok(SampleSet::new(samples, Diagnostics::new()))
    }
}

#[inline]
fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}
