//! Variants: named products of posteriors.
//!
//! A variant models a compound metric (e.g. conversion rate x revenue per
//! conversion) as the element-wise product of its distributions' draws.

use ab_core::{Error, Result};
use ab_prob::{BernoulliPosterior, Diagnostics, Posterior, PosteriorSpec};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One arm of a test, rebuilt from current statistics every evaluation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    name: String,
    distributions: Vec<Posterior>,
}

/// Joint draws of a variant plus per-distribution diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantSamples {
    /// Element-wise product of every distribution's draws.
    pub samples: Vec<f64>,
    /// `(family name, diagnostics)` per distribution, in distribution order.
    pub diagnostics: Vec<(&'static str, Diagnostics)>,
}

impl Variant {
    /// Create a variant; the name must be non-empty and at least one distribution given.
    pub fn new(name: impl Into<String>, distributions: Vec<Posterior>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidInput("variant name must be non-empty".to_string()));
        }
        if distributions.is_empty() {
            return Err(Error::InvalidInput(format!(
                "variant '{}' needs at least one distribution",
                name
            )));
        }
        Ok(Self { name, distributions })
    }

    /// Single-distribution conversion-rate variant under the uniform prior.
    pub fn bernoulli(name: impl Into<String>, trials: u64, successes: u64) -> Result<Self> {
        Self::new(name, vec![BernoulliPosterior::new(trials, successes)?.into()])
    }

    /// Variant name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Distributions whose product forms this variant's metric.
    pub fn distributions(&self) -> &[Posterior] {
        &self.distributions
    }

    /// Draw `n` joint samples.
    pub fn sample_posterior<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<VariantSamples> {
        let mut samples = vec![1.0; n];
        let mut diagnostics = Vec::with_capacity(self.distributions.len());
        for dist in &self.distributions {
            let set = dist.sample(n, rng)?;
            if set.len() != n {
                return Err(Error::NumericDegeneracy(format!(
                    "variant '{}': {} returned {} draws, expected {}",
                    self.name,
                    dist.name(),
                    set.len(),
                    n
                )));
            }
            for (acc, x) in samples.iter_mut().zip(&set.samples) {
                *acc *= x;
            }
            diagnostics.push((dist.name(), set.diagnostics));
        }
        Ok(VariantSamples { samples, diagnostics })
    }
}

/// Serialized variant as read from experiment files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSpec {
    /// Variant name
    pub name: String,
    /// Distributions whose product forms the metric
    pub distributions: Vec<PosteriorSpec>,
}

impl VariantSpec {
    /// Build the variant, running every posterior update.
    pub fn build(&self) -> Result<Variant> {
        let distributions =
            self.distributions.iter().map(PosteriorSpec::build).collect::<Result<Vec<_>>>()?;
        Variant::new(self.name.clone(), distributions)
    }
}
