//! # ab-inference
//!
//! Decision policies for abayes.
//!
//! This crate provides:
//! - `Variant`: a named product of posteriors modelling a compound metric
//! - `BayesianTest`: the Monte-Carlo expected-loss engine and its
//!   incremental (periodic re-evaluation) loop
//! - `TwoSidedSequential`: a frequentist sequential stopping rule with the
//!   same `DecisionPolicy` contract, for comparing stopping times
//!
//! ## Architecture
//!
//! Both policies consume trials through `ab_core::TrialSource`, NOT a
//! concrete simulator; the simulator lives in ab-sim.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Expected-loss Bayesian decision engine.
pub mod bayesian;
/// Two-sided sequential sampling.
pub mod sequential;
/// Variants and their joint posterior draws.
pub mod variant;

pub use bayesian::{BayesianTest, BayesianTestConfig, VariantBuilder, bernoulli_builder};
pub use sequential::{SequentialBounds, SequentialState, TwoSidedSequential};
pub use variant::{Variant, VariantSamples, VariantSpec};
