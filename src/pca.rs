// src/pca.rs

//! Standard (non-sparse) principal component analysis.
//!
//! The tuning core only needs the ordered eigenvalue spectrum of the data's
//! covariance, so the provider contract is deliberately small.

use crate::error::{Result, SpcaError};
use crate::linalg_backends::{BackendEigh, NdarrayLinAlgBackend};
use crate::validation::check_data_matrix;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Eigen-structure of the covariance of the standardized data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaDecomposition {
    /// Component variances (covariance eigenvalues), descending.
    /// Shape: (n_components)
    pub eigenvalues: Array1<f64>,
}

impl PcaDecomposition {
    pub fn n_components(&self) -> usize {
        self.eigenvalues.len()
    }
}

/// Anything able to produce a full standard-PCA decomposition of a data matrix.
///
/// Implementations must be deterministic for a fixed input and must return
/// eigenvalues in descending order.
pub trait PcaProvider: Sync {
    fn decompose(&self, data: ArrayView2<f64>) -> Result<PcaDecomposition>;
}

/// Centered and unit-variance scaled copy of `data`.
///
/// Standard deviations with magnitude below 1e-9 are replaced by 1.0 so that
/// constant columns become all-zero rather than NaN.
pub(crate) fn standardize_columns(data: ArrayView2<f64>) -> Result<Array2<f64>> {
    let mean = data
        .mean_axis(Axis(0))
        .ok_or_else(|| SpcaError::Decomposition("failed to compute column means".into()))?;
    let mut scaled = &data - &mean;
    let scale = scaled
        .map_axis(Axis(0), |column| column.std(0.0))
        .mapv(|s| if s.abs() < 1e-9 { 1.0 } else { s });
    scaled /= &scale;
    Ok(scaled)
}

/// Exact PCA through the covariance matrix, or through the Gram matrix when
/// there are more features than samples.
#[derive(Debug, Default, Clone, Copy)]
pub struct CovariancePca {
    backend: NdarrayLinAlgBackend,
}

impl CovariancePca {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PcaProvider for CovariancePca {
    fn decompose(&self, data: ArrayView2<f64>) -> Result<PcaDecomposition> {
        check_data_matrix(data)?;
        let (n_samples, n_features) = data.dim();
        let scaled = standardize_columns(data)?;
        let denom = (n_samples - 1) as f64;

        // X X^T and X^T X share their nonzero eigenvalues; decompose the smaller one.
        let (matrix, label) = if n_features <= n_samples {
            (scaled.t().dot(&scaled) / denom, "covariance")
        } else {
            (scaled.dot(&scaled.t()) / denom, "Gram")
        };
        let eig = self
            .backend
            .eigh_descending(matrix.view())
            .map_err(|e| SpcaError::Decomposition(format!("{} eigendecomposition: {}", label, e)))?;
        Ok(PcaDecomposition {
            eigenvalues: eig.eigenvalues.mapv(|v| v.max(0.0)),
        })
    }
}
