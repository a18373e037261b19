//! Common data types for abayes

use serde::{Deserialize, Serialize};

/// Cumulative counters of one experiment leg, as read by decision policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegStats {
    /// Leg name (`"control"`, `"treatment"`, ...)
    pub name: String,
    /// Trials assigned to this leg so far
    pub trials: u64,
    /// Successful trials so far
    pub successes: u64,
}

impl LegStats {
    /// Create a counter snapshot
    pub fn new(name: impl Into<String>, trials: u64, successes: u64) -> Self {
        Self { name: name.into(), trials, successes }
    }

    /// Observed success rate, `0.0` before the first trial.
    pub fn rate(&self) -> f64 {
        if self.trials == 0 { 0.0 } else { self.successes as f64 / self.trials as f64 }
    }
}

/// Monte-Carlo comparison statistics for one variant in one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantStatistics {
    /// Variant name
    pub name: String,
    /// Expected opportunity loss of choosing this variant now
    pub loss: f64,
    /// Fraction of draws where this variant beats control
    pub beats_control: f64,
    /// Fraction of draws where this variant is the column maximum
    pub beats_all: f64,
}

impl VariantStatistics {
    /// Batch-report record with the published rounding (loss 5 dp, probabilities 3 dp).
    pub fn record(&self) -> ReportRecord {
        ReportRecord {
            name: self.name.clone(),
            loss: round_to(self.loss, 5),
            beats_control: round_to(self.beats_control, 3),
            beats_all: round_to(self.beats_all, 3),
        }
    }
}

/// Rounded per-variant line of a batch report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    /// Variant name
    pub name: String,
    /// Loss rounded to 5 decimal places
    pub loss: f64,
    /// P(beats control) rounded to 3 decimal places
    pub beats_control: f64,
    /// P(beats all) rounded to 3 decimal places
    pub beats_all: f64,
}

impl std::fmt::Display for ReportRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Variant {} has loss {:.5}, beats control with p={:.3}, beats all with p={:.3}",
            self.name, self.loss, self.beats_control, self.beats_all
        )
    }
}

/// A sampling diagnostic surfaced by one distribution of one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticWarning {
    /// Variant the distribution belongs to
    pub variant: String,
    /// Distribution family name (e.g. `"Pareto"`)
    pub distribution: String,
    /// Warning key (e.g. `"shape <= 1, invalid sample"`)
    pub key: String,
    /// Number of draws affected in this cycle
    pub count: u64,
}

impl std::fmt::Display for DiagnosticWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Warning: (variant {}, distribution {}): {} (n={})",
            self.variant, self.distribution, self.key, self.count
        )
    }
}

/// Result of one evaluation cycle of the Bayesian decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Zero-based evaluation cycle index
    pub cycle: usize,
    /// Posterior draws per variant
    pub n_samples: usize,
    /// Statistics per variant, control first
    pub variants: Vec<VariantStatistics>,
    /// Diagnostics raised while sampling this cycle only
    pub warnings: Vec<DiagnosticWarning>,
    /// Whether any variant's loss cleared the threshold
    pub done: bool,
    /// Declared winner; only set when `done`
    pub winner: Option<String>,
    /// Variant with the highest `beats_all` this cycle (control if none is above zero)
    pub best: String,
}

impl EvaluationReport {
    /// Rounded per-variant records in variant order.
    pub fn records(&self) -> Vec<ReportRecord> {
        self.variants.iter().map(VariantStatistics::record).collect()
    }

    /// Statistics for a variant by name.
    pub fn variant(&self, name: &str) -> Option<&VariantStatistics> {
        self.variants.iter().find(|v| v.name == name)
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round() / scale
}
