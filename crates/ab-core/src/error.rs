//! Error types for abayes

use thiserror::Error;

/// abayes error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Out-of-range counts, priors or values handed to a posterior update
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Paired `values` / `frequencies` sequences of different lengths
    #[error("Invalid input: values and frequencies must be of equal length (got {values} and {frequencies})")]
    LengthMismatch {
        /// Length of the `values` sequence
        values: usize,
        /// Length of the `frequencies` sequence
        frequencies: usize,
    },

    /// A decision policy was wired to an experiment it cannot evaluate
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Posterior hyperparameters that cannot be sampled from
    #[error("Numeric degeneracy: {0}")]
    NumericDegeneracy(String),
}

impl Error {
    /// True for every input-shape error, including paired-length mismatches.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::LengthMismatch { .. })
    }

    /// Check that paired observation sequences line up.
    pub fn check_lengths(values: usize, frequencies: usize) -> Result<()> {
        if values != frequencies {
            return Err(Error::LengthMismatch { values, frequencies });
        }
        Ok(())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
