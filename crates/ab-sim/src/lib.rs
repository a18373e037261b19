//! # ab-sim
//!
//! Simulated experiments for abayes: a weighted traffic splitter over legs
//! with known conversion rates, and grid sweeps that measure how often a
//! decision policy picks the right leg and how many trials it needs.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Grid sweeps and outcome classification.
pub mod sweep;
/// Weighted traffic over simulated legs.
pub mod traffic;

pub use sweep::{
    Outcome, Policy, SimulationResult, SweepConfig, SweepRow, classify, run_cell, run_simulation,
    run_sweep, write_csv, write_csv_path,
};
pub use traffic::{AbTest, Leg};
