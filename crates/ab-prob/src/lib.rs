//! Conjugate posterior building blocks for abayes.
//!
//! This crate hosts the four posterior families the decision engine samples from:
//! - Bernoulli trials with a Beta prior (conversion rates)
//! - Exponential durations with a Gamma prior on the rate
//! - Pareto magnitudes with a Gamma prior on the shape
//! - Normal metrics with known variance (posterior over the mean only)
//!
//! Every posterior is built from aggregated sufficient statistics, is immutable
//! once constructed, and samples into a `SampleSet` that carries its own
//! diagnostics instead of mutating shared state.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Beta-Bernoulli conversion rates.
pub mod bernoulli;
/// Gamma-Exponential durations.
pub mod exponential;
/// Gamma priors and the shared Gamma parameter helpers.
pub mod gamma;
/// Normal means with known variance.
pub mod normal;
/// Gamma-Pareto magnitudes.
pub mod pareto;
/// Family dispatch and serialized specs.
pub mod posterior;
/// Draws and their diagnostics.
pub mod sample;

pub use bernoulli::{BernoulliPosterior, BetaPrior};
pub use exponential::ExponentialPosterior;
pub use gamma::GammaPrior;
pub use normal::{NormalPosterior, NormalPrior};
pub use pareto::ParetoPosterior;
pub use posterior::{Posterior, PosteriorSpec};
pub use sample::{Diagnostics, SampleSet};

/// Rate floor substituted when an update leaves the Gamma rate at zero.
pub const PRIOR_FLOOR: f64 = 1e-3;
/// Shape floor substituted when an update leaves the Gamma shape at zero.
///
/// One pseudo-event. Shapes far below 1 make Gamma draws underflow to exactly
/// zero, which turns reciprocal samples into infinities.
pub const SHAPE_FLOOR: f64 = 1.0;

/// Check a credible level lies strictly inside (0, 1).
pub(crate) fn check_level(level: f64) -> ab_core::Result<()> {
    if !(level > 0.0 && level < 1.0) {
        return Err(ab_core::Error::InvalidInput(format!(
            "credible level must be in (0, 1), got {}",
            level
        )));
    }
    Ok(())
}

/// Validate paired `values` / `frequencies` and return them zipped.
pub(crate) fn paired<'a>(
    values: &'a [f64],
    frequencies: &'a [f64],
) -> ab_core::Result<impl Iterator<Item = (f64, f64)> + 'a> {
    ab_core::Error::check_lengths(values.len(), frequencies.len())?;
    for (i, (&v, &f)) in values.iter().zip(frequencies).enumerate() {
        if !v.is_finite() {
            return Err(ab_core::Error::InvalidInput(format!(
                "values[{}] must be finite, got {}",
                i, v
            )));
        }
        if !f.is_finite() || f < 0.0 {
            return Err(ab_core::Error::InvalidInput(format!(
                "frequencies[{}] must be finite and >= 0, got {}",
                i, f
            )));
        }
    }
    Ok(values.iter().copied().zip(frequencies.iter().copied()))
}
