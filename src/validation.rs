// src/validation.rs

//! Numeric checks shared by the analyzer, adapter and tuner.

use crate::error::{Result, SpcaError};
use float_cmp::approx_eq;
use ndarray::{ArrayView2, Zip};

/// Absolute tolerance under which two IS scores are treated as tied.
pub const SCORE_TIE_TOLERANCE: f64 = 1e-9;

/// Rejects matrices that cannot support a covariance decomposition:
/// fewer than 2 rows, no columns, or any non-finite entry.
pub fn check_data_matrix(data: ArrayView2<f64>) -> Result<()> {
    let (rows, cols) = data.dim();
    if rows < 2 || cols < 1 {
        return Err(SpcaError::InsufficientData { rows, cols });
    }
    if let Some(((r, c), &value)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(SpcaError::invalid(
            "data",
            value,
            format!("entry at row {}, column {} is not finite", r, c),
        ));
    }
    Ok(())
}

/// K must lie in `[1, min(rows, cols)]`.
pub fn check_component_count(components: usize, rows: usize, cols: usize) -> Result<()> {
    let upper = rows.min(cols);
    if components == 0 || components > upper {
        return Err(SpcaError::invalid(
            "components",
            components as f64,
            format!("must be between 1 and min(rows, cols) = {}", upper),
        ));
    }
    Ok(())
}

pub fn check_penalty(penalty: f64) -> Result<()> {
    if !penalty.is_finite() {
        return Err(SpcaError::invalid("penalty", penalty, "must be finite"));
    }
    if penalty < 0.0 {
        return Err(SpcaError::invalid("penalty", penalty, "must be non-negative"));
    }
    Ok(())
}

/// Every value must be a valid penalty and no value may repeat.
pub fn check_penalty_values(values: &[f64]) -> Result<()> {
    for (i, &value) in values.iter().enumerate() {
        check_penalty(value)?;
        if values[..i].iter().any(|&earlier| earlier == value) {
            return Err(SpcaError::invalid(
                "penalty grid",
                value,
                "grid values must be distinct",
            ));
        }
    }
    Ok(())
}

/// Fraction of entries that are exactly zero. Empty matrices count as dense.
pub fn zero_fraction(matrix: ArrayView2<f64>) -> f64 {
    let total = matrix.len();
    if total == 0 {
        return 0.0;
    }
    let zeros = matrix.iter().filter(|&&v| v == 0.0).count();
    zeros as f64 / total as f64
}

pub fn all_finite(matrix: ArrayView2<f64>) -> bool {
    let mut finite = true;
    Zip::from(matrix).for_each(|&v| finite &= v.is_finite());
    finite
}

pub fn scores_tied(a: f64, b: f64) -> bool {
    approx_eq!(f64, a, b, epsilon = SCORE_TIE_TOLERANCE)
}
