//! One entry point over the four posterior families.
//!
//! `Posterior` is what a variant holds; `PosteriorSpec` is its serialized
//! form (observed sufficient statistics plus prior), as read from
//! experiment files.

use ab_core::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bernoulli::{BernoulliPosterior, BetaPrior};
use crate::exponential::ExponentialPosterior;
use crate::gamma::GammaPrior;
use crate::normal::{NormalPosterior, NormalPrior};
use crate::pareto::ParetoPosterior;
use crate::sample::SampleSet;

/// A sampleable posterior from one of the supported conjugate families.
#[derive(Debug, Clone, PartialEq)]
pub enum Posterior {
    /// Conversion rate.
    Bernoulli(BernoulliPosterior),
    /// Mean duration.
    Exponential(ExponentialPosterior),
    /// Mean magnitude.
    Pareto(ParetoPosterior),
    /// Mean of a normal metric.
    Normal(NormalPosterior),
}

impl Posterior {
    /// Family name used to attribute diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Posterior::Bernoulli(_) => "Bernoulli",
            Posterior::Exponential(_) => "Exponential",
            Posterior::Pareto(_) => "Pareto",
            Posterior::Normal(_) => "Normal",
        }
    }

    /// Closed-form posterior mean of the sampled quantity.
    pub fn mean(&self) -> f64 {
        match self {
            Posterior::Bernoulli(p) => p.mean(),
            Posterior::Exponential(p) => p.mean(),
            Posterior::Pareto(p) => p.mean(),
            Posterior::Normal(p) => p.mean(),
        }
    }

    /// Log-density of the posterior over the family's parameter.
    pub fn logpdf(&self, x: f64) -> f64 {
        match self {
            Posterior::Bernoulli(p) => p.logpdf(x),
            Posterior::Exponential(p) => p.logpdf(x),
            Posterior::Pareto(p) => p.logpdf(x),
            Posterior::Normal(p) => p.logpdf(x),
        }
    }

    /// Equal-tailed credible interval of the sampled quantity.
    pub fn credible_interval(&self, level: f64) -> Result<(f64, f64)> {
        match self {
            Posterior::Bernoulli(p) => p.credible_interval(level),
            Posterior::Exponential(p) => p.credible_interval(level),
            Posterior::Pareto(p) => p.credible_interval(level),
            Posterior::Normal(p) => p.credible_interval(level),
        }
    }

    /// Draw `n` samples together with this call's diagnostics.
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<SampleSet> {
        match self {
            Posterior::Bernoulli(p) => p.sample(n, rng),
            Posterior::Exponential(p) => p.sample(n, rng),
            Posterior::Pareto(p) => p.sample(n, rng),
            Posterior::Normal(p) => p.sample(n, rng),
        }
    }
}

impl From<BernoulliPosterior> for Posterior {
    fn from(p: BernoulliPosterior) -> Self {
        Posterior::Bernoulli(p)
    }
}

impl From<ExponentialPosterior> for Posterior {
    fn from(p: ExponentialPosterior) -> Self {
        Posterior::Exponential(p)
    }
}

impl From<ParetoPosterior> for Posterior {
    fn from(p: ParetoPosterior) -> Self {
        Posterior::Pareto(p)
    }
}

impl From<NormalPosterior> for Posterior {
    fn from(p: NormalPosterior) -> Self {
        Posterior::Normal(p)
    }
}

fn default_xmin() -> f64 {
    1.0
}

/// Serialized posterior: observed statistics plus prior, tagged by family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum PosteriorSpec {
    /// See [`BernoulliPosterior`].
    Bernoulli {
        /// Observed trials.
        trials: u64,
        /// Observed successes.
        successes: u64,
        /// Defaults to uniform.
        #[serde(default)]
        prior: BetaPrior,
    },
    /// See [`ExponentialPosterior`].
    Exponential {
        /// Distinct durations.
        values: Vec<f64>,
        /// Weight of each duration.
        frequencies: Vec<f64>,
        /// Defaults to the flat prior.
        #[serde(default)]
        prior: GammaPrior,
    },
    /// See [`ParetoPosterior`].
    Pareto {
        /// Distinct magnitudes.
        values: Vec<f64>,
        /// Weight of each magnitude.
        frequencies: Vec<f64>,
        /// Defaults to the flat prior.
        #[serde(default)]
        prior: GammaPrior,
        /// Known scale, default 1.
        #[serde(default = "default_xmin")]
        xmin: f64,
    },
    /// See [`NormalPosterior`].
    Normal {
        /// Distinct observations.
        values: Vec<f64>,
        /// Weight of each observation.
        frequencies: Vec<f64>,
        /// Defaults to [`NormalPrior::default`].
        #[serde(default)]
        prior: NormalPrior,
    },
}

impl PosteriorSpec {
    /// Run the conjugate update; fails fast on malformed input.
    pub fn build(&self) -> Result<Posterior> {
        Ok(match self {
            PosteriorSpec::Bernoulli { trials, successes, prior } => {
                BernoulliPosterior::with_prior(*trials, *successes, *prior)?.into()
            }
            PosteriorSpec::Exponential { values, frequencies, prior } => {
                ExponentialPosterior::with_prior(values, frequencies, *prior)?.into()
            }
            PosteriorSpec::Pareto { values, frequencies, prior, xmin } => {
                ParetoPosterior::with_prior(values, frequencies, *prior, *xmin)?.into()
            }
            PosteriorSpec::Normal { values, frequencies, prior } => {
                NormalPosterior::with_prior(values, frequencies, *prior)?.into()
            }
        })
    }
}
