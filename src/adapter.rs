// src/adapter.rs

use crate::error::{Result, SolverError, SpcaError};
use crate::solver::{LoadingsLayout, SolverOutput, SparseComponentSolver};
use crate::validation::{all_finite, check_component_count, check_data_matrix, check_penalty, zero_fraction};
use log::trace;
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Rounding allowance when checking that per-component fractions sum to at most 1.
const EXPLAINED_VARIANCE_SLACK: f64 = 1e-6;

/// Normalized result of one sparse fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseFitRecord {
    /// Sparse loadings. Shape: `(n_features, n_components)`; column j is component j.
    pub loadings: Array2<f64>,
    /// Explained-variance fraction of each component, indexed like the loadings columns.
    pub explained_variance: Array1<f64>,
    /// Penalty applied uniformly to every component.
    pub penalty: f64,
    /// Solver iterations used, as reported by the solver.
    pub iterations: usize,
}

impl SparseFitRecord {
    pub fn n_components(&self) -> usize {
        self.loadings.ncols()
    }

    pub fn n_features(&self) -> usize {
        self.loadings.nrows()
    }

    /// PEV of the sparse components taken together.
    pub fn total_explained_variance(&self) -> f64 {
        self.explained_variance.sum()
    }

    /// Fraction of loading entries that are exactly zero.
    pub fn sparsity_ratio(&self) -> f64 {
        zero_fraction(self.loadings.view())
    }
}

/// Drives a [`SparseComponentSolver`] with a single penalty shared by all
/// components and checks what comes back.
#[derive(Debug, Clone)]
pub struct SparseFitAdapter<S> {
    solver: S,
}

impl<S: SparseComponentSolver> SparseFitAdapter<S> {
    pub fn new(solver: S) -> Self {
        Self { solver }
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Fits `components` sparse components at `penalty`.
    ///
    /// # Errors
    /// `InsufficientData` / `InvalidParameter` for bad inputs, `SolverFailure`
    /// (carrying the penalty and K) when the solver fails or returns an
    /// unusable result.
    pub fn fit(&self, data: ArrayView2<f64>, components: usize, penalty: f64) -> Result<SparseFitRecord> {
        check_data_matrix(data)?;
        check_penalty(penalty)?;
        let (rows, cols) = data.dim();
        check_component_count(components, rows, cols)?;
        self.fit_checked(data, components, penalty)
    }

    /// Same as [`fit`](Self::fit) for inputs the caller has already validated.
    pub(crate) fn fit_checked(
        &self,
        data: ArrayView2<f64>,
        components: usize,
        penalty: f64,
    ) -> Result<SparseFitRecord> {
        let penalties = vec![penalty; components];
        let wrap = |source: SolverError| SpcaError::SolverFailure {
            penalty,
            components,
            source,
        };
        let output = self.solver.fit(data, components, &penalties).map_err(wrap)?;
        trace!(
            "Solver finished at penalty {} after {} iterations",
            penalty,
            output.iterations
        );
        normalize_output(output, data.ncols(), components, penalty).map_err(wrap)
    }
}

/// Brings a solver output into `(n_features, K)` layout and rejects anything
/// structurally invalid.
fn normalize_output(
    output: SolverOutput,
    n_features: usize,
    components: usize,
    penalty: f64,
) -> std::result::Result<SparseFitRecord, SolverError> {
    if output.loadings.is_empty() {
        return Err(SolverError::EmptyLoadings);
    }
    let loadings = match output.layout {
        LoadingsLayout::FeaturesByComponents => output.loadings,
        LoadingsLayout::ComponentsByFeatures => output.loadings.reversed_axes(),
    };
    if loadings.dim() != (n_features, components) {
        return Err(SolverError::ShapeMismatch {
            what: "loadings",
            expected: (n_features, components),
            found: loadings.dim(),
        });
    }
    if output.explained_variance.len() != components {
        return Err(SolverError::ShapeMismatch {
            what: "explained variance",
            expected: (components, 1),
            found: (output.explained_variance.len(), 1),
        });
    }
    if !all_finite(loadings.view()) {
        return Err(SolverError::NonFinite { what: "loadings" });
    }
    if output.explained_variance.iter().any(|v| !v.is_finite()) {
        return Err(SolverError::NonFinite {
            what: "explained variance",
        });
    }
    let total = output.explained_variance.sum();
    if output.explained_variance.iter().any(|&v| v < 0.0) || total > 1.0 + EXPLAINED_VARIANCE_SLACK {
        return Err(SolverError::ExplainedVarianceOutOfRange { total });
    }

    Ok(SparseFitRecord {
        loadings: loadings.as_standard_layout().into_owned(),
        explained_variance: output.explained_variance,
        penalty,
        iterations: output.iterations,
    })
}
