//! Bayesian expected-loss decision engine.
//!
//! Each evaluation cycle draws `n_samples` joint posterior samples per
//! variant and reduces them to three statistics per variant:
//!
//! - `beats_control`: fraction of draws where the variant exceeds control
//!   (variant 0);
//! - `beats_all`: fraction of draws where the variant equals the per-draw
//!   maximum (exact ties credit every maximal variant);
//! - `loss`: mean of `max - variant` over draws, the expected opportunity
//!   cost of choosing the variant now.
//!
//! The test is done as soon as any variant's loss is below
//! `loss_threshold`. The winner is then the variant with the highest
//! `beats_all` (control if none is above zero), which need not be the
//! variant whose loss cleared the threshold.
//!
//! ## Architecture
//!
//! Sampling is chunked (`chunk_size` draws per variant per chunk) to bound
//! memory and run Rayon-parallel across chunks. Chunk `c` of variant `v` in
//! cycle `k` draws from an RNG seeded by `(seed, k, v, c)`, and chunk
//! accumulators are merged in chunk order, so a given seed reproduces a
//! cycle bit-exactly regardless of thread count.

use ab_core::{
    DecisionPolicy, DiagnosticWarning, Error, EvaluationReport, LegStats, Result, TrialSource,
    VariantStatistics,
};
use ab_prob::Diagnostics;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::variant::Variant;

/// Draws per variant per cycle. At 1M draws the loss estimate's standard
/// error is far below the default threshold.
pub const DEFAULT_SAMPLES: usize = 1_000_000;
/// Expected-loss stopping threshold.
pub const DEFAULT_LOSS_THRESHOLD: f64 = 0.003;
/// Draws per variant per parallel chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 65_536;
/// Trials between re-evaluations in the incremental loop.
pub const DEFAULT_CHECK_EVERY: u64 = 500;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BayesianTestConfig {
    /// Posterior draws per variant per evaluation cycle.
    pub n_samples: usize,
    /// Stop once any variant's expected loss is below this.
    pub loss_threshold: f64,
    /// Draws per variant per parallel chunk.
    pub chunk_size: usize,
    /// Base RNG seed.
    pub seed: u64,
    /// Trials between re-evaluations when driving a `TrialSource`.
    pub check_every: u64,
    /// Stop driving a `TrialSource` after this many total trials, undecided.
    pub max_trials: Option<u64>,
    /// Log per-variant statistics at `info` instead of `debug`.
    pub verbose: bool,
}

impl Default for BayesianTestConfig {
    fn default() -> Self {
        Self {
            n_samples: DEFAULT_SAMPLES,
            loss_threshold: DEFAULT_LOSS_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            seed: 42,
            check_every: DEFAULT_CHECK_EVERY,
            max_trials: None,
            verbose: true,
        }
    }
}

impl BayesianTestConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.n_samples == 0 {
            return Err(Error::InvalidConfiguration("n_samples must be >= 1".to_string()));
        }
        if !self.loss_threshold.is_finite() || self.loss_threshold <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "loss_threshold must be finite and > 0, got {}",
                self.loss_threshold
            )));
        }
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfiguration("chunk_size must be >= 1".to_string()));
        }
        if self.check_every == 0 {
            return Err(Error::InvalidConfiguration("check_every must be >= 1".to_string()));
        }
        Ok(())
    }
}

/// Maps a leg's counters to the variant evaluated for it.
pub type VariantBuilder = Box<dyn Fn(&LegStats) -> Result<Variant> + Send + Sync>;

/// Default builder: uniform-prior Bernoulli over the leg's trials/successes.
pub fn bernoulli_builder() -> VariantBuilder {
    Box::new(|leg: &LegStats| Variant::bernoulli(leg.name.clone(), leg.trials, leg.successes))
}

// ---------------------------------------------------------------------------
// RNG
// ---------------------------------------------------------------------------

/// Chunk RNG. Same (seed, cycle, variant, chunk) -> same draw sequence.
#[inline]
fn chunk_rng(seed: u64, cycle: u64, variant: u64, chunk: u64) -> StdRng {
    let mut h = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    for x in [cycle, variant, chunk] {
        h = (h ^ x).wrapping_mul(0xBF58_476D_1CE4_E5B9).rotate_left(31);
    }
    StdRng::seed_from_u64(h)
}

// ---------------------------------------------------------------------------
// Accumulator for chunked reduction
// ---------------------------------------------------------------------------

struct Accumulator {
    beats_control: Vec<u64>,
    beats_all: Vec<u64>,
    loss_sum: Vec<f64>,
    /// `[variant][distribution]`
    diagnostics: Vec<Vec<Diagnostics>>,
    n_draws: u64,
}

impl Accumulator {
    fn new(variants: &[Variant]) -> Self {
        let n = variants.len();
        Self {
            beats_control: vec![0; n],
            beats_all: vec![0; n],
            loss_sum: vec![0.0; n],
            diagnostics: variants
                .iter()
                .map(|v| vec![Diagnostics::new(); v.distributions().len()])
                .collect(),
            n_draws: 0,
        }
    }

    fn merge(&mut self, other: &Accumulator) {
        self.n_draws += other.n_draws;
        for (a, b) in self.beats_control.iter_mut().zip(&other.beats_control) {
            *a += b;
        }
        for (a, b) in self.beats_all.iter_mut().zip(&other.beats_all) {
            *a += b;
        }
        for (a, b) in self.loss_sum.iter_mut().zip(&other.loss_sum) {
            *a += b;
        }
        for (a, b) in self.diagnostics.iter_mut().zip(&other.diagnostics) {
            for (da, db) in a.iter_mut().zip(b) {
                da.merge(db);
            }
        }
    }
}

/// Sample one chunk of every variant and reduce it column by column.
fn reduce_chunk(
    variants: &[Variant],
    seed: u64,
    cycle: u64,
    chunk: u64,
    len: usize,
) -> Result<Accumulator> {
    let mut acc = Accumulator::new(variants);
    let mut rows = Vec::with_capacity(variants.len());
    for (v, variant) in variants.iter().enumerate() {
        let mut rng = chunk_rng(seed, cycle, v as u64, chunk);
        let drawn = variant.sample_posterior(len, &mut rng)?;
        for (slot, (_, diag)) in acc.diagnostics[v].iter_mut().zip(&drawn.diagnostics) {
            slot.merge(diag);
        }
        rows.push(drawn.samples);
    }

    for j in 0..len {
        let control = rows[0][j];
        let col_max = rows.iter().map(|r| r[j]).fold(f64::NEG_INFINITY, f64::max);
        for (v, row) in rows.iter().enumerate() {
            let x = row[j];
            if x > control {
                acc.beats_control[v] += 1;
            }
            if x == col_max {
                acc.beats_all[v] += 1;
            }
            acc.loss_sum[v] += col_max - x;
        }
    }
    acc.n_draws = len as u64;
    Ok(acc)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Bayesian A/B(/n) test. Variant 0 is control.
pub struct BayesianTest {
    config: BayesianTestConfig,
    variants: Vec<Variant>,
    builder: VariantBuilder,
    cycle: usize,
    done: bool,
    winner: Option<String>,
    last_report: Option<EvaluationReport>,
}

impl std::fmt::Debug for BayesianTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BayesianTest")
            .field("config", &self.config)
            .field("variants", &self.variants)
            .field("cycle", &self.cycle)
            .field("done", &self.done)
            .field("winner", &self.winner)
            .finish_non_exhaustive()
    }
}

impl Default for BayesianTest {
    fn default() -> Self {
        Self::new(BayesianTestConfig::default())
    }
}

impl BayesianTest {
    /// Empty test; variants are supplied later or built from a trial source.
    pub fn new(config: BayesianTestConfig) -> Self {
        Self {
            config,
            variants: Vec::new(),
            builder: bernoulli_builder(),
            cycle: 0,
            done: false,
            winner: None,
            last_report: None,
        }
    }

    /// Test over a fixed set of variants (control first).
    pub fn with_variants(config: BayesianTestConfig, variants: Vec<Variant>) -> Self {
        let mut test = Self::new(config);
        test.variants = variants;
        test
    }

    /// Replace the leg -> variant mapping used by [`BayesianTest::run`].
    pub fn with_builder(mut self, builder: VariantBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Engine configuration.
    pub fn config(&self) -> &BayesianTestConfig {
        &self.config
    }

    /// Current variants, control first.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Supersede the current variants with ones built from fresh totals.
    pub fn set_variants(&mut self, variants: Vec<Variant>) {
        self.variants = variants;
    }

    /// Completed evaluation cycles.
    pub fn cycles(&self) -> usize {
        self.cycle
    }

    /// Whether the stopping rule has fired.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Declared winner, if done.
    pub fn winner_name(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    /// Report of the most recent evaluation cycle.
    pub fn last_report(&self) -> Option<&EvaluationReport> {
        self.last_report.as_ref()
    }

    fn validate_variants(&self) -> Result<()> {
        if self.variants.is_empty() {
            return Err(Error::InvalidConfiguration(
                "a test needs at least one variant".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(self.variants.len());
        for v in &self.variants {
            if !seen.insert(v.name()) {
                return Err(Error::InvalidConfiguration(format!(
                    "duplicate variant name '{}'",
                    v.name()
                )));
            }
        }
        Ok(())
    }

    /// Sample the current variants, compute statistics, and apply the stopping rule.
    ///
    /// Once the test is done this is a no-op returning the final report.
    pub fn evaluate(&mut self) -> Result<&EvaluationReport> {
        if !(self.done && self.last_report.is_some()) {
            let report = self.run_cycle()?;
            self.last_report = Some(report);
        }
        self.last_report
            .as_ref()
            .ok_or_else(|| Error::InvalidConfiguration("no evaluation cycle has run".to_string()))
    }

    fn run_cycle(&mut self) -> Result<EvaluationReport> {
        self.config.validate()?;
        self.validate_variants()?;

        let n = self.config.n_samples;
        let chunk_size = self.config.chunk_size;
        let seed = self.config.seed;
        let cycle = self.cycle as u64;
        let variants = &self.variants;

        let n_chunks = n.div_ceil(chunk_size);
        let chunks = (0..n_chunks)
            .into_par_iter()
            .map(|c| {
                let start = c * chunk_size;
                let len = (start + chunk_size).min(n) - start;
                reduce_chunk(variants, seed, cycle, c as u64, len)
            })
            .collect::<Result<Vec<Accumulator>>>()?;

        let mut total = Accumulator::new(variants);
        for acc in &chunks {
            total.merge(acc);
        }

        let draws = total.n_draws as f64;
        let stats: Vec<VariantStatistics> = variants
            .iter()
            .enumerate()
            .map(|(v, variant)| VariantStatistics {
                name: variant.name().to_string(),
                loss: total.loss_sum[v] / draws,
                beats_control: total.beats_control[v] as f64 / draws,
                beats_all: total.beats_all[v] as f64 / draws,
            })
            .collect();

        let warnings: Vec<DiagnosticWarning> = variants
            .iter()
            .zip(&total.diagnostics)
            .flat_map(|(variant, per_dist)| {
                variant.distributions().iter().zip(per_dist).flat_map(move |(dist, diag)| {
                    diag.iter().map(move |(key, count)| DiagnosticWarning {
                        variant: variant.name().to_string(),
                        distribution: dist.name().to_string(),
                        key: key.to_string(),
                        count,
                    })
                })
            })
            .collect();

        let level = if self.config.verbose { log::Level::Info } else { log::Level::Debug };
        let mut cleared = false;
        let mut best: Option<usize> = None;
        let mut best_beats_all = 0.0;
        for (v, s) in stats.iter().enumerate() {
            log::log!(level, "{}", s.record());
            if s.loss < self.config.loss_threshold {
                cleared = true;
            }
            if s.beats_all > best_beats_all {
                best_beats_all = s.beats_all;
                best = Some(v);
            }
        }
        for w in &warnings {
            if self.config.verbose {
                log::warn!("{}", w);
            } else {
                log::debug!("{}", w);
            }
        }

        let best_name = variants[best.unwrap_or(0)].name().to_string();
        if cleared {
            self.done = true;
            self.winner = Some(best_name.clone());
        }
        log::log!(level, "Test finished={}, best leg={}", self.done, best_name);

        let report = EvaluationReport {
            cycle: self.cycle,
            n_samples: n,
            variants: stats,
            warnings,
            done: self.done,
            winner: self.winner.clone(),
            best: best_name,
        };
        self.cycle += 1;
        Ok(report)
    }

    fn rebuild_variants(&mut self, legs: &[LegStats]) -> Result<()> {
        let variants = legs.iter().map(|leg| (self.builder)(leg)).collect::<Result<Vec<_>>>()?;
        self.set_variants(variants);
        Ok(())
    }
}

impl DecisionPolicy for BayesianTest {
    fn name(&self) -> &str {
        "bayesian"
    }

    /// Incremental loop: one trial at a time, re-evaluating every `check_every` trials.
    fn run(&mut self, source: &mut dyn TrialSource) -> Result<()> {
        self.config.validate()?;
        while !self.done {
            if let Some(max) = self.config.max_trials {
                if source.trials() >= max {
                    log::debug!("trial cap {} reached without a decision", max);
                    break;
                }
            }
            source.trial();
            if source.trials() % self.config.check_every == 0 {
                self.rebuild_variants(&source.legs())?;
                self.evaluate()?;
            }
        }
        Ok(())
    }

    fn done(&self) -> bool {
        self.done
    }

    fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }
}
