//! # ab-core
//!
//! Core types and traits for abayes.
//!
//! This crate holds the error taxonomy shared by every layer, the
//! serializable report records, and the seams (`TrialSource`,
//! `DecisionPolicy`) that keep decision logic independent of where
//! trials come from.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error types
pub mod error;
/// Seam traits between trial sources and decision policies
pub mod traits;
/// Report and counter records
pub mod types;

pub use error::{Error, Result};
pub use traits::{DecisionPolicy, TrialSource};
pub use types::{
    DiagnosticWarning, EvaluationReport, LegStats, ReportRecord, VariantStatistics, round_to,
};
