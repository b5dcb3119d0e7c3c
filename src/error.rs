// src/error.rs

use thiserror::Error;

/// Failures reported by a sparse-component solver.
///
/// These stay solver-level: the adapter attaches the penalty and component
/// count before they reach a caller, see [`SpcaError::SolverFailure`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("solver did not converge within {iterations} iterations (last change {last_change:.3e})")]
    NotConverged { iterations: usize, last_change: f64 },

    #[error("solver produced non-finite values in {what}")]
    NonFinite { what: &'static str },

    #[error("solver output has shape {found:?} for {what}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("solver reported explained variance totalling {total}, outside [0, 1]")]
    ExplainedVarianceOutOfRange { total: f64 },

    #[error("solver returned an empty loadings matrix")]
    EmptyLoadings,

    #[error("linear algebra failure inside solver: {0}")]
    Linalg(String),
}

/// Error taxonomy of the tuning core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpcaError {
    #[error("insufficient data: {rows} rows, {cols} columns (need at least 2 rows and 1 column)")]
    InsufficientData { rows: usize, cols: usize },

    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: String,
    },

    #[error("sparse solver failed at penalty {penalty} with K = {components}: {source}")]
    SolverFailure {
        penalty: f64,
        components: usize,
        #[source]
        source: SolverError,
    },

    #[error("no tuning results to select from")]
    EmptyResultSet,

    #[error("decomposition failed: {0}")]
    Decomposition(String),
}

impl SpcaError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: impl Into<String>) -> Self {
        SpcaError::InvalidParameter {
            name,
            value,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SpcaError>;
