//! abayes CLI

use ab_core::{DecisionPolicy, TrialSource};
use ab_inference::{BayesianTest, BayesianTestConfig, SequentialBounds, TwoSidedSequential};
use ab_sim::{AbTest, Leg, Policy, classify, run_sweep, write_csv_path};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod experiment;

#[derive(Parser)]
#[command(name = "abayes")]
#[command(about = "abayes - Bayesian and sequential A/B test decisions")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one evaluation cycle over an experiment file
    Evaluate {
        /// Experiment file (YAML, or JSON by extension)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the report (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Posterior draws per variant (overrides the file)
        #[arg(long)]
        samples: Option<usize>,

        /// Expected-loss threshold (overrides the file)
        #[arg(long)]
        threshold: Option<f64>,

        /// RNG seed (overrides the file)
        #[arg(long)]
        seed: Option<u64>,

        /// Threads (0 = auto)
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Simulate one experiment to a decision
    Simulate {
        /// True control conversion rate
        #[arg(long)]
        control_rate: f64,

        /// True treatment conversion rate
        #[arg(long)]
        treatment_rate: f64,

        /// Decision policy (bayesian, sequential)
        #[arg(long, default_value = "bayesian")]
        policy: Policy,

        /// Traffic seed (also seeds the engine)
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Posterior draws per variant per evaluation (bayesian)
        #[arg(long, default_value = "1000000")]
        samples: usize,

        /// Trials between evaluations (bayesian)
        #[arg(long, default_value = "500")]
        check_every: u64,

        /// Stop undecided after this many trials
        #[arg(long)]
        max_trials: Option<u64>,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sweep a grid of true rates and write outcome rates as CSV
    Sweep {
        /// Sweep config (YAML, or JSON by extension). Defaults to the full 0.01..0.49 grid.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output CSV
        #[arg(short, long)]
        output: PathBuf,

        /// Decision policy (overrides the config)
        #[arg(long)]
        policy: Option<Policy>,

        /// Simulations per grid cell (overrides the config)
        #[arg(long)]
        simulations: Option<usize>,

        /// Worker threads (overrides the config)
        #[arg(long)]
        threads: Option<usize>,

        /// Base seed (overrides the config)
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Evaluate { input, output, samples, threshold, seed, threads } => {
            cmd_evaluate(&input, output.as_ref(), samples, threshold, seed, threads)
        }
        Commands::Simulate {
            control_rate,
            treatment_rate,
            policy,
            seed,
            samples,
            check_every,
            max_trials,
            output,
        } => cmd_simulate(
            control_rate,
            treatment_rate,
            policy,
            seed,
            samples,
            check_every,
            max_trials,
            output.as_ref(),
        ),
        Commands::Sweep { config, output, policy, simulations, threads, seed } => {
            cmd_sweep(config.as_ref(), &output, policy, simulations, threads, seed)
        }
    }
}

fn cmd_evaluate(
    input: &PathBuf,
    output: Option<&PathBuf>,
    samples: Option<usize>,
    threshold: Option<f64>,
    seed: Option<u64>,
    threads: usize,
) -> Result<()> {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }

    tracing::info!(path = %input.display(), "loading experiment");
    let file = experiment::read_experiment(input)?;
    let mut config = file.config.clone();
    if let Some(n) = samples {
        config.n_samples = n;
    }
    if let Some(t) = threshold {
        config.loss_threshold = t;
    }
    if let Some(s) = seed {
        config.seed = s;
    }
    let variants = file.build_variants()?;
    tracing::info!(variants = variants.len(), n_samples = config.n_samples, "experiment loaded");

    let mut test = BayesianTest::with_variants(config, variants);
    let report = test.evaluate()?;
    tracing::info!(done = report.done, best = %report.best, "evaluation complete");

    write_json(output, serde_json::to_value(report)?)
}

#[allow(clippy::too_many_arguments)]
fn cmd_simulate(
    control_rate: f64,
    treatment_rate: f64,
    policy: Policy,
    seed: u64,
    samples: usize,
    check_every: u64,
    max_trials: Option<u64>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let legs =
        vec![Leg::new("control", 0.5, control_rate)?, Leg::new("treatment", 0.5, treatment_rate)?];
    let mut test = AbTest::new(legs, seed)?;

    let mut method: Box<dyn DecisionPolicy> = match policy {
        Policy::Bayesian => Box::new(BayesianTest::new(BayesianTestConfig {
            n_samples: samples,
            check_every,
            seed,
            max_trials,
            verbose: false,
            ..Default::default()
        })),
        Policy::Sequential => Box::new(
            TwoSidedSequential::new(control_rate)?
                .with_bounds(SequentialBounds::default())
                .with_max_trials(max_trials),
        ),
    };
    method.run(&mut test)?;

    let winner = method.winner();
    tracing::info!(policy = method.name(), trials = test.trials(), ?winner, "simulation complete");

    let legs = TrialSource::legs(&test);
    let observed_rates: serde_json::Map<String, serde_json::Value> =
        legs.iter().map(|l| (l.name.clone(), l.rate().into())).collect();

    let output_json = serde_json::json!({
        "policy": method.name(),
        "control_rate": control_rate,
        "treatment_rate": treatment_rate,
        "done": method.done(),
        "winner": winner,
        "outcome": classify(control_rate, treatment_rate, winner),
        "trials": test.trials(),
        "successes": test.successes(),
        "legs": legs,
        "observed_rates": observed_rates,
    });
    write_json(output, output_json)
}

fn cmd_sweep(
    config: Option<&PathBuf>,
    output: &PathBuf,
    policy: Option<Policy>,
    simulations: Option<usize>,
    threads: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let mut cfg = match config {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading sweep config");
            experiment::read_sweep_config(path)?
        }
        None => ab_sim::SweepConfig::default(),
    };
    if let Some(p) = policy {
        cfg.policy = p;
    }
    if let Some(n) = simulations {
        cfg.simulations_per_cell = n;
    }
    if threads.is_some() {
        cfg.threads = threads;
    }
    if let Some(s) = seed {
        cfg.seed = s;
    }

    let rows = run_sweep(&cfg)?;
    write_csv_path(&rows, output)?;
    tracing::info!(rows = rows.len(), path = %output.display(), "sweep written");
    Ok(())
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
