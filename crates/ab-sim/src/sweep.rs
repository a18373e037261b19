//! Decision-quality sweeps over a grid of true conversion rates.
//!
//! Every grid cell runs `simulations_per_cell` independent simulated
//! experiments to completion under one decision policy and classifies each
//! decision against the true rates. Simulations inside a cell run
//! Rayon-parallel; simulation `i` of cell `c` draws traffic from a seed
//! derived from `(seed, c, i)`, so a sweep is reproducible regardless of
//! thread count.

use ab_core::{DecisionPolicy, Error, Result, TrialSource};
use ab_inference::{BayesianTest, BayesianTestConfig, SequentialBounds, TwoSidedSequential};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::traffic::{AbTest, Leg};

const CONTROL: &str = "control";
const TREATMENT: &str = "treatment";

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How a decision compares with the true rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Treatment is better and was declared.
    TruePositive,
    /// Treatment declared, but it is not better.
    FalsePositive,
    /// Control is better and was declared.
    TrueNegative,
    /// Control declared, but it is not better.
    FalseNegative,
    /// Rates are equal and no winner was declared.
    TrueNull,
    /// Rates differ but no winner was declared.
    FalseNull,
}

impl Outcome {
    /// Every outcome, in CSV column order.
    pub const ALL: [Outcome; 6] = [
        Outcome::TruePositive,
        Outcome::FalsePositive,
        Outcome::TrueNegative,
        Outcome::FalseNegative,
        Outcome::TrueNull,
        Outcome::FalseNull,
    ];

    /// CSV column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::TruePositive => "true_positive",
            Outcome::FalsePositive => "false_positive",
            Outcome::TrueNegative => "true_negative",
            Outcome::FalseNegative => "false_negative",
            Outcome::TrueNull => "true_null",
            Outcome::FalseNull => "false_null",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a decision. Any winner other than `control` / `treatment` counts as none.
pub fn classify(control_rate: f64, treatment_rate: f64, winner: Option<&str>) -> Outcome {
    let treatment_won = winner == Some(TREATMENT);
    let control_won = winner == Some(CONTROL);
    if treatment_rate > control_rate {
        if treatment_won {
            Outcome::TruePositive
        } else if control_won {
            Outcome::FalseNegative
        } else {
            Outcome::FalseNull
        }
    } else if treatment_rate < control_rate {
        if treatment_won {
            Outcome::FalsePositive
        } else if control_won {
            Outcome::TrueNegative
        } else {
            Outcome::FalseNull
        }
    } else if treatment_won {
        Outcome::FalsePositive
    } else if control_won {
        Outcome::FalseNegative
    } else {
        Outcome::TrueNull
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Decision policy used for every simulation of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Expected-loss engine re-evaluated every `check_every` trials.
    #[default]
    Bayesian,
    /// Two-sided sequential sampling on success counts.
    Sequential,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Bayesian => f.write_str("bayesian"),
            Policy::Sequential => f.write_str("sequential"),
        }
    }
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bayesian" => Ok(Policy::Bayesian),
            "sequential" => Ok(Policy::Sequential),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown policy '{}', expected 'bayesian' or 'sequential'",
                other
            ))),
        }
    }
}

fn default_grid() -> Vec<f64> {
    (1..50).map(|i| i as f64 * 0.01).collect()
}

/// Sweep configuration, as read from YAML/JSON files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// True control rates (outer grid axis).
    pub control_rates: Vec<f64>,
    /// True treatment rates (inner grid axis).
    pub treatment_rates: Vec<f64>,
    /// Independent simulations per grid cell.
    pub simulations_per_cell: usize,
    /// Decision policy.
    pub policy: Policy,
    /// Traffic weight of the control leg.
    pub control_weight: f64,
    /// Traffic weight of the treatment leg.
    pub treatment_weight: f64,
    /// Base seed; per-simulation seeds are derived from it.
    pub seed: u64,
    /// Worker threads (`None` = Rayon default).
    pub threads: Option<usize>,
    /// Give up (undecided) after this many trials per simulation.
    pub max_trials: Option<u64>,
    /// Engine settings for the Bayesian policy. Its seed is replaced per simulation.
    pub bayesian: BayesianTestConfig,
    /// Bounds for the sequential policy.
    pub sequential: SequentialBounds,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            control_rates: default_grid(),
            treatment_rates: default_grid(),
            simulations_per_cell: 100,
            policy: Policy::Bayesian,
            control_weight: 0.5,
            treatment_weight: 0.5,
            seed: 42,
            threads: None,
            max_trials: None,
            bayesian: BayesianTestConfig { verbose: false, ..Default::default() },
            sequential: SequentialBounds::default(),
        }
    }
}

impl SweepConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.control_rates.is_empty() || self.treatment_rates.is_empty() {
            return Err(Error::InvalidConfiguration("rate grids must be non-empty".to_string()));
        }
        for &rate in self.control_rates.iter().chain(&self.treatment_rates) {
            if !(0.0..=1.0).contains(&rate) {
                return Err(Error::InvalidConfiguration(format!(
                    "rates must be in [0, 1], got {}",
                    rate
                )));
            }
        }
        if self.simulations_per_cell == 0 {
            return Err(Error::InvalidConfiguration(
                "simulations_per_cell must be >= 1".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(Error::InvalidConfiguration("threads must be >= 1".to_string()));
        }
        // Weights are checked by `Leg::new`.
        Leg::new(CONTROL, self.control_weight, 0.0)?;
        Leg::new(TREATMENT, self.treatment_weight, 0.0)?;
        self.bayesian.validate()
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Outcome of one simulated experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Trials consumed before the policy stopped.
    pub trials: u64,
    /// Declared winner, `None` when undecided.
    pub winner: Option<String>,
    /// Classification against the true rates.
    pub outcome: Outcome,
}

/// Simulation RNG seed. Same (seed, cell, simulation) -> same traffic.
#[inline]
fn simulation_seed(seed: u64, cell: u64, simulation: u64) -> u64 {
    let mut h = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    for x in [cell, simulation] {
        h = (h ^ x).wrapping_mul(0x94D0_49BB_1331_11EB).rotate_left(29);
    }
    h
}

/// Run one control-vs-treatment experiment to completion.
pub fn run_simulation(
    config: &SweepConfig,
    control_rate: f64,
    treatment_rate: f64,
    seed: u64,
) -> Result<SimulationResult> {
    let legs = vec![
        Leg::new(CONTROL, config.control_weight, control_rate)?,
        Leg::new(TREATMENT, config.treatment_weight, treatment_rate)?,
    ];
    let mut test = AbTest::new(legs, seed)?;

    let mut policy: Box<dyn DecisionPolicy> = match config.policy {
        Policy::Bayesian => {
            let engine = BayesianTestConfig {
                seed,
                max_trials: config.max_trials.or(config.bayesian.max_trials),
                ..config.bayesian.clone()
            };
            Box::new(BayesianTest::new(engine))
        }
        Policy::Sequential => Box::new(
            TwoSidedSequential::new(control_rate)?
                .with_bounds(config.sequential)
                .with_max_trials(config.max_trials),
        ),
    };
    policy.run(&mut test)?;

    let winner = policy.winner().map(str::to_string);
    let outcome = classify(control_rate, treatment_rate, winner.as_deref());
    Ok(SimulationResult { trials: test.trials(), winner, outcome })
}

/// One CSV row: a grid cell's trial counts and outcome rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    /// True control rate of the cell.
    pub control_rate: f64,
    /// True treatment rate of the cell.
    pub treatment_rate: f64,
    /// Mean trials per simulation.
    pub mean_trials: f64,
    /// Median trials per simulation.
    pub median_trials: f64,
    /// Share of [`Outcome::TruePositive`].
    pub true_positive: f64,
    /// Share of [`Outcome::FalsePositive`].
    pub false_positive: f64,
    /// Share of [`Outcome::TrueNegative`].
    pub true_negative: f64,
    /// Share of [`Outcome::FalseNegative`].
    pub false_negative: f64,
    /// Share of [`Outcome::TrueNull`].
    pub true_null: f64,
    /// Share of [`Outcome::FalseNull`].
    pub false_null: f64,
}

impl SweepRow {
    /// Fraction of simulations classified as `outcome`.
    pub fn rate(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::TruePositive => self.true_positive,
            Outcome::FalsePositive => self.false_positive,
            Outcome::TrueNegative => self.true_negative,
            Outcome::FalseNegative => self.false_negative,
            Outcome::TrueNull => self.true_null,
            Outcome::FalseNull => self.false_null,
        }
    }

    fn from_results(control_rate: f64, treatment_rate: f64, results: &[SimulationResult]) -> Self {
        let n = results.len() as f64;
        let share = |o: Outcome| results.iter().filter(|r| r.outcome == o).count() as f64 / n;
        let mut trials: Vec<u64> = results.iter().map(|r| r.trials).collect();
        trials.sort_unstable();
        Self {
            control_rate,
            treatment_rate,
            mean_trials: trials.iter().sum::<u64>() as f64 / n,
            median_trials: median(&trials),
            true_positive: share(Outcome::TruePositive),
            false_positive: share(Outcome::FalsePositive),
            true_negative: share(Outcome::TrueNegative),
            false_negative: share(Outcome::FalseNegative),
            true_null: share(Outcome::TrueNull),
            false_null: share(Outcome::FalseNull),
        }
    }
}

/// Median of sorted counts; mean of the middle pair for even lengths.
fn median(sorted: &[u64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

/// Run every simulation of one grid cell.
pub fn run_cell(
    config: &SweepConfig,
    cell: u64,
    control_rate: f64,
    treatment_rate: f64,
) -> Result<SweepRow> {
    let results = (0..config.simulations_per_cell as u64)
        .into_par_iter()
        .map(|i| {
            run_simulation(
                config,
                control_rate,
                treatment_rate,
                simulation_seed(config.seed, cell, i),
            )
        })
        .collect::<Result<Vec<_>>>()?;
    let row = SweepRow::from_results(control_rate, treatment_rate, &results);
    log::debug!(
        "cell {} ({:.2} vs {:.2}): mean trials {:.1}, true_positive {:.2}, true_null {:.2}",
        cell,
        control_rate,
        treatment_rate,
        row.mean_trials,
        row.true_positive,
        row.true_null
    );
    Ok(row)
}

/// Run the whole grid, control rate outermost. Rows come back in grid order.
pub fn run_sweep(config: &SweepConfig) -> Result<Vec<SweepRow>> {
    config.validate()?;
    let cells: Vec<(f64, f64)> = config
        .control_rates
        .iter()
        .flat_map(|&c| config.treatment_rates.iter().map(move |&t| (c, t)))
        .collect();
    log::info!(
        "sweep: {} cells x {} simulations, policy={}",
        cells.len(),
        config.simulations_per_cell,
        config.policy
    );

    let sweep = || {
        cells
            .par_iter()
            .enumerate()
            .map(|(i, &(c, t))| run_cell(config, i as u64, c, t))
            .collect::<Result<Vec<_>>>()
    };
    match config.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| Error::InvalidConfiguration(format!("thread pool: {}", e)))?
            .install(sweep),
        None => sweep(),
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Write the header row plus one row per cell.
pub fn write_csv<W: Write>(rows: &[SweepRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// [`write_csv`] to a file.
pub fn write_csv_path(rows: &[SweepRow], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(rows, std::io::BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_classification_table() {
        use Outcome::*;
        assert_eq!(classify(0.1, 0.2, Some("treatment")), TruePositive);
        assert_eq!(classify(0.1, 0.2, Some("control")), FalseNegative);
        assert_eq!(classify(0.1, 0.2, None), FalseNull);
        assert_eq!(classify(0.2, 0.1, Some("treatment")), FalsePositive);
        assert_eq!(classify(0.2, 0.1, Some("control")), TrueNegative);
        assert_eq!(classify(0.2, 0.1, None), FalseNull);
        assert_eq!(classify(0.1, 0.1, Some("treatment")), FalsePositive);
        assert_eq!(classify(0.1, 0.1, Some("control")), FalseNegative);
        assert_eq!(classify(0.1, 0.1, None), TrueNull);
        assert_eq!(classify(0.1, 0.1, Some("treatment-b")), TrueNull);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("bayesian".parse::<Policy>().unwrap(), Policy::Bayesian);
        assert_eq!("Sequential".parse::<Policy>().unwrap(), Policy::Sequential);
        assert!("thompson".parse::<Policy>().is_err());
        assert_eq!(Policy::Sequential.to_string(), "sequential");
    }

    #[test]
    fn test_default_grid() {
        let cfg = SweepConfig::default();
        assert_eq!(cfg.control_rates.len(), 49);
        assert_abs_diff_eq!(cfg.control_rates[0], 0.01);
        assert_abs_diff_eq!(cfg.control_rates[48], 0.49, epsilon = 1e-12);
        assert_eq!(cfg.simulations_per_cell, 100);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let bad = SweepConfig { treatment_rates: vec![], ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = SweepConfig { control_rates: vec![1.5], ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = SweepConfig { simulations_per_cell: 0, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = SweepConfig { control_weight: 0.0, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = SweepConfig { threads: Some(0), ..Default::default() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[3]), 3.0);
        assert_eq!(median(&[1, 3]), 2.0);
        assert_eq!(median(&[1, 2, 10]), 2.0);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn test_simulation_seed_decorrelates() {
        assert_eq!(simulation_seed(1, 2, 3), simulation_seed(1, 2, 3));
        assert_ne!(simulation_seed(1, 2, 3), simulation_seed(1, 3, 2));
        assert_ne!(simulation_seed(1, 0, 0), simulation_seed(2, 0, 0));
    }

    #[test]
    fn test_row_statistics() {
        let result = |trials, outcome| SimulationResult { trials, winner: None, outcome };
        let results = vec![
            result(100, Outcome::TruePositive),
            result(300, Outcome::TruePositive),
            result(200, Outcome::FalseNull),
            result(1_000, Outcome::FalseNegative),
        ];
        let row = SweepRow::from_results(0.1, 0.2, &results);
        assert_abs_diff_eq!(row.mean_trials, 400.0);
        assert_abs_diff_eq!(row.median_trials, 250.0);
        assert_abs_diff_eq!(row.true_positive, 0.5);
        assert_abs_diff_eq!(row.false_null, 0.25);
        assert_abs_diff_eq!(row.false_negative, 0.25);
        let total: f64 = Outcome::ALL.iter().map(|&o| row.rate(o)).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_csv_layout() {
        let row = SweepRow {
            control_rate: 0.1,
            treatment_rate: 0.2,
            mean_trials: 1500.0,
            median_trials: 1000.0,
            true_positive: 0.9,
            false_positive: 0.0,
            true_negative: 0.0,
            false_negative: 0.05,
            true_null: 0.0,
            false_null: 0.05,
        };
        let mut buf = Vec::new();
        write_csv(&[row.clone(), row], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "control_rate,treatment_rate,mean_trials,median_trials,true_positive,\
             false_positive,true_negative,false_negative,true_null,false_null"
        );
        assert_eq!(lines[1], "0.1,0.2,1500.0,1000.0,0.9,0.0,0.0,0.05,0.0,0.05");
    }
}
