//! Decision quality of both policies on simulated traffic.

use ab_core::{DecisionPolicy, Error, TrialSource};
use ab_inference::{BayesianTestConfig, TwoSidedSequential};
use ab_sim::{AbTest, Leg, Outcome, Policy, SweepConfig, run_cell, run_simulation, run_sweep};

fn bayesian_quick() -> SweepConfig {
    SweepConfig {
        policy: Policy::Bayesian,
        simulations_per_cell: 20,
        bayesian: BayesianTestConfig { n_samples: 20_000, verbose: false, ..Default::default() },
        ..Default::default()
    }
}

fn sequential(simulations_per_cell: usize) -> SweepConfig {
    SweepConfig { policy: Policy::Sequential, simulations_per_cell, ..Default::default() }
}

#[test]
fn sequential_rejects_three_legs_before_any_trial() {
    let legs = vec![
        Leg::new("control", 1.0, 0.1).unwrap(),
        Leg::new("treatment", 1.0, 0.1).unwrap(),
        Leg::new("treatment-b", 1.0, 0.1).unwrap(),
    ];
    let mut test = AbTest::new(legs, 5).unwrap();
    let mut method = TwoSidedSequential::new(0.1).unwrap();
    let err = method.run(&mut test).unwrap_err();
    assert!(matches!(err, Error::InvalidConfiguration(_)));
    assert_eq!(test.trials(), 0);
}

#[test]
fn equal_rates_are_mostly_called_null_by_sequential_sampling() {
    let row = run_cell(&sequential(100), 0, 0.3, 0.3).unwrap();
    assert!(row.true_null > 0.8, "{:?}", row);
    assert_eq!(row.true_positive + row.true_negative + row.false_null, 0.0);
    // Undecided runs stop exactly at the success ceiling, ~3250 / 0.3 trials.
    assert!(row.median_trials > 9_000.0 && row.median_trials < 12_500.0, "{:?}", row);
}

#[test]
fn expected_loss_always_names_a_winner_at_equal_rates() {
    // The expected-loss rule stops once either leg's loss is small, which
    // happens with identical legs too: uncapped runs never end undecided.
    let row = run_cell(&bayesian_quick(), 0, 0.10, 0.10).unwrap();
    assert_eq!(row.true_null, 0.0, "{:?}", row);
    assert!((row.false_positive + row.false_negative - 1.0).abs() < 1e-12, "{:?}", row);

    // Only a trial cap leaves room for a null call.
    let capped = SweepConfig { max_trials: Some(400), ..bayesian_quick() };
    let row = run_cell(&capped, 0, 0.10, 0.10).unwrap();
    assert_eq!(row.true_null, 1.0, "{:?}", row);
    assert_eq!(row.median_trials, 400.0);
}

#[test]
fn clear_treatment_win_is_detected() {
    let row = run_cell(&bayesian_quick(), 0, 0.05, 0.30).unwrap();
    assert!(row.true_positive >= 0.9, "{:?}", row);
    // Nothing is decided before the first evaluation checkpoint.
    assert!(row.mean_trials >= 500.0, "{:?}", row);

    let row = run_cell(&sequential(20), 0, 0.05, 0.30).unwrap();
    assert!(row.true_positive >= 0.9, "{:?}", row);
}

#[test]
fn clear_control_win_is_detected() {
    let row = run_cell(&bayesian_quick(), 0, 0.30, 0.05).unwrap();
    assert!(row.true_negative >= 0.9, "{:?}", row);
}

#[test]
fn trial_cap_leaves_decision_open() {
    let cfg = SweepConfig { max_trials: Some(1_000), ..sequential(1) };
    let result = run_simulation(&cfg, 0.2, 0.2, 9).unwrap();
    assert_eq!(result.trials, 1_000);
    assert_eq!(result.winner, None);
    assert_eq!(result.outcome, Outcome::TrueNull);
}

#[test]
fn simulations_are_reproducible() {
    let cfg = bayesian_quick();
    let a = run_simulation(&cfg, 0.10, 0.15, 77).unwrap();
    let b = run_simulation(&cfg, 0.10, 0.15, 77).unwrap();
    assert_eq!(a, b);
}

#[test]
fn sweep_rows_follow_grid_order() {
    let cfg = SweepConfig {
        control_rates: vec![0.1, 0.4],
        treatment_rates: vec![0.2, 0.5],
        threads: Some(2),
        ..sequential(4)
    };
    let rows = run_sweep(&cfg).unwrap();
    let cells: Vec<(f64, f64)> = rows.iter().map(|r| (r.control_rate, r.treatment_rate)).collect();
    assert_eq!(cells, vec![(0.1, 0.2), (0.1, 0.5), (0.4, 0.2), (0.4, 0.5)]);
    for row in &rows {
        let total: f64 = Outcome::ALL.iter().map(|&o| row.rate(o)).sum();
        assert!((total - 1.0).abs() < 1e-12, "{:?}", row);
    }
    assert_eq!(rows, run_sweep(&SweepConfig { threads: Some(1), ..cfg }).unwrap());
}

#[test]
fn config_reads_from_json_with_defaults() {
    let cfg: SweepConfig = serde_json::from_str(
        r#"{"control_rates": [0.1], "treatment_rates": [0.1, 0.2], "policy": "sequential"}"#,
    )
    .unwrap();
    assert_eq!(cfg.policy, Policy::Sequential);
    assert_eq!(cfg.simulations_per_cell, 100);
    assert_eq!(cfg.control_weight, 0.5);
    assert!(!cfg.bayesian.verbose);
}
