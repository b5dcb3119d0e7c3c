// src/variance.rs

use crate::error::{Result, SpcaError};
use crate::pca::{CovariancePca, PcaProvider};
use log::debug;
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Per-component fractions of explained variance, in descending-eigenvalue order.
///
/// Entries are non-negative and sum to 1 (within floating-point tolerance)
/// unless the data has no variance at all, in which case every entry is 0.
/// Deserialization rebuilds the fractions from the stored eigenvalues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredSpectrum")]
pub struct VarianceSpectrum {
    eigenvalues: Array1<f64>,
    fractions: Array1<f64>,
}

#[derive(Deserialize)]
struct StoredSpectrum {
    eigenvalues: Array1<f64>,
}

impl From<StoredSpectrum> for VarianceSpectrum {
    fn from(stored: StoredSpectrum) -> Self {
        Self::from_eigenvalues(stored.eigenvalues)
    }
}

impl VarianceSpectrum {
    /// Builds a spectrum from raw eigenvalues. Negative values are clamped to 0.
    pub fn from_eigenvalues(eigenvalues: Array1<f64>) -> Self {
        let eigenvalues = eigenvalues.mapv(|v| v.max(0.0));
        let total = eigenvalues.sum();
        let fractions = if total > 0.0 {
            eigenvalues.mapv(|v| v / total)
        } else {
            Array1::zeros(eigenvalues.len())
        };
        Self {
            eigenvalues,
            fractions,
        }
    }

    pub fn fractions(&self) -> &Array1<f64> {
        &self.fractions
    }

    pub fn eigenvalues(&self) -> &Array1<f64> {
        &self.eigenvalues
    }

    pub fn len(&self) -> usize {
        self.fractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fractions.is_empty()
    }

    /// PEV of the first `k` components.
    pub fn leading_sum(&self, k: usize) -> Result<f64> {
        if k == 0 || k > self.len() {
            return Err(SpcaError::invalid(
                "components",
                k as f64,
                format!("spectrum has {} components", self.len()),
            ));
        }
        Ok(self.fractions.iter().take(k).sum())
    }

    /// Running totals, for cumulative scree curves.
    pub fn cumulative(&self) -> Array1<f64> {
        self.fractions
            .iter()
            .scan(0.0, |acc, &f| {
                *acc += f;
                Some(*acc)
            })
            .collect()
    }
}

/// Computes variance spectra via a standard PCA provider.
#[derive(Debug, Default, Clone)]
pub struct VarianceAnalyzer<P = CovariancePca> {
    provider: P,
}

impl VarianceAnalyzer<CovariancePca> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: PcaProvider> VarianceAnalyzer<P> {
    pub fn with_provider(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Full-length PEV spectrum of `data`; the caller truncates as needed.
    ///
    /// # Errors
    /// `InsufficientData` for fewer than 2 rows, no columns, or data without
    /// any variance; whatever the provider reports for a failed decomposition.
    pub fn analyze(&self, data: ArrayView2<f64>) -> Result<VarianceSpectrum> {
        let decomposition = self.provider.decompose(data)?;
        if decomposition.eigenvalues.iter().all(|&v| v <= 0.0) {
            let (rows, cols) = data.dim();
            return Err(SpcaError::InsufficientData { rows, cols });
        }
        let spectrum = VarianceSpectrum::from_eigenvalues(decomposition.eigenvalues);
        debug!(
            "Variance spectrum over {} components, leading fraction {:.4}",
            spectrum.len(),
            spectrum.fractions().first().copied().unwrap_or(0.0)
        );
        Ok(spectrum)
    }

    /// PEV of standard PCA restricted to the first `components` components.
    pub fn leading_pev(&self, data: ArrayView2<f64>, components: usize) -> Result<f64> {
        self.analyze(data)?.leading_sum(components)
    }
}
