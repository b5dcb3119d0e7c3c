// src/solver.rs

//! Sparse-component solvers.
//!
//! The tuning core talks to a solver only through [`SparseComponentSolver`].
//! [`ElasticNetSpca`] is the bundled implementation: the alternating
//! elastic-net / Procrustes scheme of Zou, Hastie and Tibshirani (2006),
//! run on the unit-trace correlation matrix of the data.

use crate::error::SolverError;
use crate::linalg_backends::{BackendEigh, BackendSVD, NdarrayLinAlgBackend};
use crate::pca::standardize_columns;
use log::{debug, trace};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};
use serde::{Deserialize, Serialize};

/// How a solver lays out its loadings matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadingsLayout {
    /// Shape `(n_features, n_components)`; column j is component j.
    FeaturesByComponents,
    /// Shape `(n_components, n_features)`; row j is component j.
    ComponentsByFeatures,
}

/// Raw solver result, before the adapter normalizes it.
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub loadings: Array2<f64>,
    pub layout: LoadingsLayout,
    /// Explained-variance fraction contributed by each component, in the same
    /// order as the components of `loadings`.
    pub explained_variance: Array1<f64>,
    pub iterations: usize,
}

/// Capability to fit K sparse components under per-component L1 penalties.
///
/// Implementations must not mutate shared state in `fit`; the tuner may call
/// it concurrently from several worker threads.
pub trait SparseComponentSolver: Sync {
    fn fit(
        &self,
        data: ArrayView2<f64>,
        components: usize,
        penalties: &[f64],
    ) -> Result<SolverOutput, SolverError>;
}

impl<S: SparseComponentSolver + ?Sized> SparseComponentSolver for &S {
    fn fit(
        &self,
        data: ArrayView2<f64>,
        components: usize,
        penalties: &[f64],
    ) -> Result<SolverOutput, SolverError> {
        (**self).fit(data, components, penalties)
    }
}

/// Settings for [`ElasticNetSpca`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNetSpcaConfig {
    /// Quadratic (ridge) penalty added to the diagonal of the Gram matrix.
    pub ridge: f64,
    /// Maximum number of alternating elastic-net / Procrustes rounds.
    pub max_iterations: usize,
    /// Convergence threshold on the max-abs change of the unit-normalized loadings.
    pub tolerance: f64,
    /// Maximum coordinate-descent sweeps per elastic-net subproblem.
    pub max_coordinate_sweeps: usize,
    /// A subproblem stops once no coefficient moves by more than this.
    pub coordinate_tolerance: f64,
}

impl Default for ElasticNetSpcaConfig {
    fn default() -> Self {
        ElasticNetSpcaConfig {
            ridge: 1e-6,
            max_iterations: 200,
            tolerance: 1e-4,
            max_coordinate_sweeps: 1000,
            coordinate_tolerance: 1e-10,
        }
    }
}

/// Below this smallest singular value the Procrustes step keeps the previous basis.
const PROCRUSTES_RANK_TOLERANCE: f64 = 1e-7;

/// Deterministic sparse PCA solver.
///
/// Penalties act on the correlation matrix scaled to unit trace, so a penalty
/// is measured relative to the total variance of the data. Loadings are
/// returned as `(n_features, K)` with unit-length (or all-zero) columns, and
/// explained variance is the adjusted variance of the possibly correlated
/// sparse components.
#[derive(Debug, Default, Clone)]
pub struct ElasticNetSpca {
    config: ElasticNetSpcaConfig,
    backend: NdarrayLinAlgBackend,
}

impl ElasticNetSpca {
    pub fn new(config: ElasticNetSpcaConfig) -> Self {
        Self {
            config,
            backend: NdarrayLinAlgBackend,
        }
    }

    pub fn config(&self) -> &ElasticNetSpcaConfig {
        &self.config
    }

    /// Coordinate descent for
    /// `min b'(G + ridge I)b - 2 target'b + penalty |b|_1`, warm-started from `beta`.
    fn solve_elastic_net(
        &self,
        gram: &Array2<f64>,
        target: ArrayView1<f64>,
        penalty: f64,
        mut beta: ArrayViewMut1<f64>,
    ) {
        let p = gram.nrows();
        let threshold = 0.5 * penalty;
        for _ in 0..self.config.max_coordinate_sweeps {
            let mut max_delta = 0.0f64;
            for i in 0..p {
                let off_diagonal: f64 = (0..p)
                    .filter(|&c| c != i)
                    .map(|c| gram[[i, c]] * beta[c])
                    .sum();
                let updated = soft_threshold(target[i] - off_diagonal, threshold)
                    / (gram[[i, i]] + self.config.ridge);
                max_delta = max_delta.max((updated - beta[i]).abs());
                beta[i] = updated;
            }
            if max_delta < self.config.coordinate_tolerance {
                break;
            }
        }
    }

    /// Orthonormal `A` closest to `m` (`U V'` from its thin SVD), or `None`
    /// when `m` is rank deficient.
    fn procrustes(&self, m: ArrayView2<f64>) -> Result<Option<Array2<f64>>, SolverError> {
        let svd = self
            .backend
            .thin_svd(m)
            .map_err(|e| SolverError::Linalg(e.to_string()))?;
        if svd.s.iter().any(|&sv| sv < PROCRUSTES_RANK_TOLERANCE) {
            return Ok(None);
        }
        Ok(Some(svd.u.dot(&svd.vt)))
    }
}

impl SparseComponentSolver for ElasticNetSpca {
    fn fit(
        &self,
        data: ArrayView2<f64>,
        components: usize,
        penalties: &[f64],
    ) -> Result<SolverOutput, SolverError> {
        let n_features = data.ncols();
        if components == 0 || components > n_features {
            return Err(SolverError::ShapeMismatch {
                what: "components",
                expected: (n_features, 1),
                found: (components, 1),
            });
        }
        if penalties.len() != components {
            return Err(SolverError::ShapeMismatch {
                what: "penalties",
                expected: (components, 1),
                found: (penalties.len(), 1),
            });
        }

        let scaled = standardize_columns(data).map_err(|e| SolverError::Linalg(e.to_string()))?;
        let total_variance = scaled.iter().map(|v| v * v).sum::<f64>();
        if total_variance <= 0.0 {
            debug!("Data has no variance; returning all-zero loadings.");
            return Ok(SolverOutput {
                loadings: Array2::zeros((n_features, components)),
                layout: LoadingsLayout::FeaturesByComponents,
                explained_variance: Array1::zeros(components),
                iterations: 0,
            });
        }

        let mut gram = scaled.t().dot(&scaled);
        let trace = gram.diag().sum();
        gram /= trace;

        let eig = self
            .backend
            .eigh_descending(gram.view())
            .map_err(|e| SolverError::Linalg(e.to_string()))?;
        let mut basis = eig.eigenvectors.slice(s![.., ..components]).to_owned();
        let mut coefficients = Array2::<f64>::zeros((n_features, components));
        let mut previous: Option<Array2<f64>> = None;
        let mut last_change = f64::INFINITY;

        for iteration in 1..=self.config.max_iterations {
            let targets = gram.dot(&basis);
            for (j, beta) in coefficients.axis_iter_mut(Axis(1)).enumerate() {
                self.solve_elastic_net(&gram, targets.column(j), penalties[j], beta);
            }

            let projected = gram.dot(&coefficients);
            if let Some(updated) = self.procrustes(projected.view())? {
                basis = updated;
            }

            let normalized = normalize_columns(&coefficients);
            if normalized.iter().any(|v| !v.is_finite()) {
                return Err(SolverError::NonFinite { what: "loadings" });
            }
            if let Some(prev) = previous.as_ref() {
                last_change = max_abs_difference(&normalized, prev);
                trace!("SPCA iteration {}: loadings change {:.3e}", iteration, last_change);
                if last_change < self.config.tolerance {
                    let explained_variance = adjusted_variance(&scaled, &normalized, total_variance);
                    return Ok(SolverOutput {
                        loadings: normalized,
                        layout: LoadingsLayout::FeaturesByComponents,
                        explained_variance,
                        iterations: iteration,
                    });
                }
            }
            previous = Some(normalized);
        }

        Err(SolverError::NotConverged {
            iterations: self.config.max_iterations,
            last_change,
        })
    }
}

fn soft_threshold(x: f64, threshold: f64) -> f64 {
    x.signum() * (x.abs() - threshold).max(0.0)
}

/// Scales each column to unit length; all-zero columns stay zero.
fn normalize_columns(matrix: &Array2<f64>) -> Array2<f64> {
    let mut out = matrix.clone();
    for mut column in out.axis_iter_mut(Axis(1)) {
        let norm = column.dot(&column).sqrt();
        if norm > 0.0 {
            column.mapv_inplace(|x| x / norm);
        }
    }
    out
}

fn max_abs_difference(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    let mut max = 0.0f64;
    Zip::from(a).and(b).for_each(|&x, &y| max = max.max((x - y).abs()));
    max
}

/// Variance explained by each component after removing what earlier components
/// already explain (squared diagonal of R in a QR of the scores), as a
/// fraction of `total_variance`.
fn adjusted_variance(scaled: &Array2<f64>, loadings: &Array2<f64>, total_variance: f64) -> Array1<f64> {
    let scores = scaled.dot(loadings);
    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(scores.ncols());
    let mut explained = Array1::<f64>::zeros(scores.ncols());
    for (j, column) in scores.axis_iter(Axis(1)).enumerate() {
        let mut residual = column.to_owned();
        for q in &basis {
            let projection = residual.dot(q);
            residual.scaled_add(-projection, q);
        }
        let norm = residual.dot(&residual).sqrt();
        explained[j] = norm * norm / total_variance;
        if norm > 1e-12 {
            basis.push(residual / norm);
        }
    }
    explained
}
