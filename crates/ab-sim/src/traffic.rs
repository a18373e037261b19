//! Simulated traffic: weighted legs with fixed true conversion rates.

use ab_core::{Error, LegStats, Result, TrialSource};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// One arm of a simulated experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    name: String,
    weight: f64,
    rate: f64,
    trials: u64,
    successes: u64,
}

impl Leg {
    /// A leg receiving traffic in proportion to `weight` and converting at `rate`.
    pub fn new(name: impl Into<String>, weight: f64, rate: f64) -> Result<Self> {
        let name = name.into();
        if !(weight.is_finite() && weight > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "leg '{}': weight must be finite and > 0, got {}",
                name, weight
            )));
        }
        if !(0.0..=1.0).contains(&rate) {
            return Err(Error::InvalidConfiguration(format!(
                "leg '{}': rate must be in [0, 1], got {}",
                name, rate
            )));
        }
        Ok(Self { name, weight, rate, trials: 0, successes: 0 })
    }

    /// Leg name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Relative traffic weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// True conversion rate.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Trials assigned so far.
    pub fn trials(&self) -> u64 {
        self.trials
    }

    /// Successes so far.
    pub fn successes(&self) -> u64 {
        self.successes
    }

    /// Record one Bernoulli outcome drawn with `rng`.
    pub fn trial<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        let success = rng.random::<f64>() < self.rate;
        self.trials += 1;
        self.successes += success as u64;
        success
    }

    fn stats(&self) -> LegStats {
        LegStats::new(self.name.clone(), self.trials, self.successes)
    }
}

/// A simulated experiment: every trial goes to one leg, picked at random by weight.
#[derive(Debug, Clone)]
pub struct AbTest {
    legs: Vec<Leg>,
    rng: StdRng,
    trials: u64,
    successes: u64,
}

impl AbTest {
    /// Experiment over `legs` (control first), reproducible from `seed`.
    pub fn new(legs: Vec<Leg>, seed: u64) -> Result<Self> {
        if legs.is_empty() {
            return Err(Error::InvalidConfiguration("an experiment needs at least one leg".into()));
        }
        let mut seen = HashSet::with_capacity(legs.len());
        for leg in &legs {
            if !seen.insert(leg.name()) {
                return Err(Error::InvalidConfiguration(format!(
                    "duplicate leg name '{}'",
                    leg.name()
                )));
            }
        }
        Ok(Self { legs, rng: StdRng::seed_from_u64(seed), trials: 0, successes: 0 })
    }

    /// Legs in construction order.
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Weighted pick: the leg maximizing `u^(1/weight)` for fresh uniforms `u`.
    fn pick_leg(&mut self) -> usize {
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, leg) in self.legs.iter().enumerate() {
            let u: f64 = self.rng.random();
            let score = u.powf(1.0 / leg.weight);
            if score > best_score {
                best_score = score;
                best = i;
            }
        }
        best
    }
}

impl TrialSource for AbTest {
    fn trial(&mut self) -> bool {
        let i = self.pick_leg();
        let success = self.legs[i].trial(&mut self.rng);
        self.trials += 1;
        self.successes += success as u64;
        success
    }

    fn trials(&self) -> u64 {
        self.trials
    }

    fn successes(&self) -> u64 {
        self.successes
    }

    fn legs(&self) -> Vec<LegStats> {
        self.legs.iter().map(Leg::stats).collect()
    }
}
