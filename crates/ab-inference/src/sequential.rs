//! Two-sided sequential sampling: a frequentist stopping rule on success counts.
//!
//! Only successes matter. After every trial the test compares the
//! treatment-minus-control success lead against a fixed bound and stops:
//!
//! - **treatment** wins when `treatment - control >= max_lead`;
//! - **control** wins when `control - treatment >= max_lead`;
//! - **no winner** when total successes reach `max_successes` first.
//!
//! Under the null each success is a fair ±1 step of the lead, so by the
//! reflection principle the two-sided crossing probability within `N`
//! successes is about `4 * (1 - Φ(d / √N))`. Setting it to α gives
//! `d = z(1 - α/4) · √N`. Under the alternative (treatment rate
//! `(1 + δ)` times control) the lead drifts by `μ = δ / (2 + δ)` per
//! success, and `N` is the smallest horizon whose crossing probability
//! reaches the requested power.
//!
//! ## References
//!
//! - Miller E (2015). Simple sequential A/B testing.

use ab_core::{DecisionPolicy, Error, LegStats, Result, TrialSource};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Leg name the method requires for the baseline.
pub const CONTROL: &str = "control";
/// Leg name the method requires for the challenger.
pub const TREATMENT: &str = "treatment";

// ---------------------------------------------------------------------------
// Design
// ---------------------------------------------------------------------------

/// Fixed stopping bounds, computed once per design.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequentialBounds {
    /// Total successes after which the test stops without a winner.
    pub max_successes: u64,
    /// Success lead that declares a winner.
    pub max_lead: f64,
}

impl Default for SequentialBounds {
    /// Published design for α = 0.05, power = 0.8, δ = 0.1.
    fn default() -> Self {
        let max_successes = 3250;
        Self { max_successes, max_lead: 2.24 * (max_successes as f64).sqrt() }
    }
}

impl SequentialBounds {
    /// Derive bounds from significance level, power and minimum detectable
    /// (relative) effect.
    pub fn from_design(alpha: f64, power: f64, effect: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(Error::InvalidConfiguration("alpha must be in (0, 1)".to_string()));
        }
        if !(power > 0.0 && power < 1.0) {
            return Err(Error::InvalidConfiguration("power must be in (0, 1)".to_string()));
        }
        if !(effect.is_finite() && effect > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "effect must be finite and > 0, got {}",
                effect
            )));
        }

        let std_normal = Normal::new(0.0, 1.0)
            .map_err(|e| Error::NumericDegeneracy(format!("standard normal: {}", e)))?;
        let z_alpha = std_normal.inverse_cdf(1.0 - alpha / 4.0);
        let z_power = std_normal.inverse_cdf(power);

        // Per-success drift and spread of the lead under the alternative.
        let mu = effect / (2.0 + effect);
        let sigma = (1.0 - mu * mu).sqrt();

        let max_successes = ((z_alpha + sigma * z_power) / mu).powi(2).ceil() as u64;
        let max_lead = z_alpha * (max_successes as f64).sqrt();
        Ok(Self { max_successes, max_lead })
    }
}

/// Decision state of a sequential test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequentialState {
    /// Still collecting trials.
    Running,
    /// Terminal; `None` means the success ceiling was hit with no winner.
    Done(Option<String>),
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// Two-sided sequential sampling over exactly one control and one treatment leg.
#[derive(Debug, Clone)]
pub struct TwoSidedSequential {
    base_rate: f64,
    bounds: SequentialBounds,
    max_trials: Option<u64>,
    state: SequentialState,
}

impl TwoSidedSequential {
    /// Method for a control leg converting at `base_rate`, with the default bounds.
    pub fn new(base_rate: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&base_rate) {
            return Err(Error::InvalidConfiguration(format!(
                "base_rate must be in [0, 1], got {}",
                base_rate
            )));
        }
        Ok(Self {
            base_rate,
            bounds: SequentialBounds::default(),
            max_trials: None,
            state: SequentialState::Running,
        })
    }

    /// Replace the default bounds.
    pub fn with_bounds(mut self, bounds: SequentialBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Give up (undecided) after this many total trials.
    pub fn with_max_trials(mut self, max_trials: Option<u64>) -> Self {
        self.max_trials = max_trials;
        self
    }

    /// Control conversion rate the design was made for.
    pub fn base_rate(&self) -> f64 {
        self.base_rate
    }

    /// Stopping bounds in use.
    pub fn bounds(&self) -> SequentialBounds {
        self.bounds
    }

    /// Current decision state.
    pub fn state(&self) -> &SequentialState {
        &self.state
    }

    /// The method needs exactly a `control` and a `treatment` leg.
    pub fn validate(legs: &[LegStats]) -> Result<()> {
        let has = |name: &str| legs.iter().any(|l| l.name == name);
        if legs.len() != 2 || !has(CONTROL) || !has(TREATMENT) {
            let names: Vec<&str> = legs.iter().map(|l| l.name.as_str()).collect();
            return Err(Error::InvalidConfiguration(format!(
                "two-sided sequential sampling needs exactly legs '{}' and '{}', got {:?}",
                CONTROL, TREATMENT, names
            )));
        }
        Ok(())
    }

    /// Run one trial and apply the stopping rule. No-op once done.
    pub fn check(&mut self, source: &mut dyn TrialSource) -> Result<&SequentialState> {
        if self.state != SequentialState::Running {
            return Ok(&self.state);
        }
        let legs = source.legs();
        Self::validate(&legs)?;
        source.trial();
        self.observe(source.successes(), &source.legs());
        Ok(&self.state)
    }

    /// Apply the stopping rule to the current counters.
    pub fn observe(&mut self, total_successes: u64, legs: &[LegStats]) {
        if self.state != SequentialState::Running {
            return;
        }
        let successes = |name: &str| {
            legs.iter().find(|l| l.name == name).map(|l| l.successes as f64).unwrap_or(0.0)
        };
        let lead = successes(TREATMENT) - successes(CONTROL);

        let winner = if lead >= self.bounds.max_lead {
            Some(Some(TREATMENT.to_string()))
        } else if -lead >= self.bounds.max_lead {
            Some(Some(CONTROL.to_string()))
        } else if total_successes >= self.bounds.max_successes {
            Some(None)
        } else {
            None
        };
        if let Some(winner) = winner {
            log::debug!(
                "sequential test done: winner={:?}, lead={}, successes={}",
                winner,
                lead,
                total_successes
            );
            self.state = SequentialState::Done(winner);
        }
    }
}

impl DecisionPolicy for TwoSidedSequential {
    fn name(&self) -> &str {
        "sequential"
    }

    fn run(&mut self, source: &mut dyn TrialSource) -> Result<()> {
        Self::validate(&source.legs())?;
        while self.state == SequentialState::Running {
            if let Some(max) = self.max_trials {
                if source.trials() >= max {
                    log::debug!("trial cap {} reached without a decision", max);
                    break;
                }
            }
            self.check(source)?;
        }
        Ok(())
    }

    fn done(&self) -> bool {
        self.state != SequentialState::Running
    }

    fn winner(&self) -> Option<&str> {
        match &self.state {
            SequentialState::Done(Some(name)) => Some(name.as_str()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
