//! Gamma prior shared by the Exponential and Pareto posteriors.
//!
//! Both families place a Gamma(shape, rate) posterior on a positive
//! parameter (an event rate, a tail index). This module owns the
//! hyperparameter checks, the zero-weight floor, the density and the
//! quantiles; the families decide how a Gamma draw maps to a sample.

use ab_core::{Error, Result};
use rand::Rng;
use rand_distr::{Distribution, Gamma};
use serde::{Deserialize, Serialize};
use statrs::distribution::ContinuousCDF;
use statrs::function::gamma::ln_gamma;

use crate::{PRIOR_FLOOR, SHAPE_FLOOR};

/// Gamma(alpha, beta) prior in shape/rate form. `0, 0` is the improper flat prior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GammaPrior {
    /// Shape.
    pub alpha: f64,
    /// Rate.
    pub beta: f64,
}

impl GammaPrior {
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(Error::InvalidInput(format!(
                "prior alpha must be finite and >= 0, got {}",
                self.alpha
            )));
        }
        if !self.beta.is_finite() || self.beta < 0.0 {
            return Err(Error::InvalidInput(format!(
                "prior beta must be finite and >= 0, got {}",
                self.beta
            )));
        }
        Ok(())
    }
}

/// Posterior Gamma hyperparameters in shape/rate form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GammaParams {
    pub shape: f64,
    pub rate: f64,
    /// Set when either hyperparameter had to be raised to its floor.
    pub floored: bool,
}

impl GammaParams {
    /// Apply the floor to non-positive hyperparameters.
    pub fn floor(shape: f64, rate: f64, family: &str) -> Result<Self> {
        if shape.is_nan() || rate.is_nan() || shape.is_infinite() || rate.is_infinite() {
            return Err(Error::NumericDegeneracy(format!(
                "{} posterior has non-finite hyperparameters (shape={}, rate={})",
                family, shape, rate
            )));
        }
        let floored = shape <= 0.0 || rate <= 0.0;
        if floored {
            log::debug!(
                "{} posterior has zero weight (shape={}, rate={}); applying prior floor",
                family,
                shape,
                rate
            );
        }
        let shape = if shape <= 0.0 { SHAPE_FLOOR } else { shape };
        let rate = if rate <= 0.0 { PRIOR_FLOOR } else { rate };
        Ok(Self { shape, rate, floored })
    }

    /// Posterior mean of the Gamma-distributed parameter.
    pub fn mean(&self) -> f64 {
        self.shape / self.rate
    }

    /// Log-density at `x` (support `x >= 0`).
    pub fn logpdf(&self, x: f64) -> f64 {
        if x < 0.0 {
            return f64::NEG_INFINITY;
        }
        if x == 0.0 {
            if self.shape < 1.0 {
                return f64::INFINITY;
            }
            if self.shape > 1.0 {
                return f64::NEG_INFINITY;
            }
            // shape == 1 => exponential
            return self.rate.ln();
        }
        let ln_norm = self.shape * self.rate.ln() - ln_gamma(self.shape);
        ln_norm + (self.shape - 1.0) * x.ln() - self.rate * x
    }

    /// Equal-tailed quantiles `(q(tail), q(1 - tail))`.
    pub fn quantiles(&self, level: f64) -> Result<(f64, f64)> {
        crate::check_level(level)?;
        let dist = statrs::distribution::Gamma::new(self.shape, self.rate).map_err(|e| {
            Error::NumericDegeneracy(format!("Gamma({}, {}): {}", self.shape, self.rate, e))
        })?;
        let tail = 0.5 * (1.0 - level);
        Ok((dist.inverse_cdf(tail), dist.inverse_cdf(1.0 - tail)))
    }

    /// Draw `n` parameter values (scale = 1 / rate).
    pub fn draw<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<f64>> {
        let dist = Gamma::new(self.shape, 1.0 / self.rate).map_err(|e| {
            Error::NumericDegeneracy(format!("Gamma({}, {}): {}", self.shape, self.rate, e))
        })?;
        Ok((0..n).map(|_| dist.sample(rng)).collect())
    }
}
