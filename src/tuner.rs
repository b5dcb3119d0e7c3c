// src/tuner.rs

use crate::adapter::{SparseFitAdapter, SparseFitRecord};
use crate::error::{Result, SpcaError};
use crate::pca::{CovariancePca, PcaProvider};
use crate::solver::SparseComponentSolver;
use crate::validation::{check_component_count, check_data_matrix, check_penalty_values};
use crate::variance::VarianceAnalyzer;
use log::{debug, info, warn};
use ndarray::ArrayView2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Ordered, distinct, non-negative candidate penalties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PenaltyGrid {
    values: Vec<f64>,
}

impl PenaltyGrid {
    /// # Errors
    /// `InvalidParameter` if any value is negative, non-finite, or repeated.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        check_penalty_values(&values)?;
        Ok(Self { values })
    }

    /// `count` evenly spaced penalties from `start` to `stop` inclusive.
    pub fn linspace(start: f64, stop: f64, count: usize) -> Result<Self> {
        let values = match count {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (stop - start) / (count - 1) as f64;
                (0..count).map(|i| start + step * i as f64).collect()
            }
        };
        Self::new(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

/// What to do when the solver fails at one grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Stop the run and return the failure.
    #[default]
    Abort,
    /// Record a zero-score sentinel for the failed point and keep going.
    Sentinel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TunerConfig {
    pub failure_policy: FailurePolicy,
    /// Evaluate grid points on the rayon thread pool.
    pub parallel: bool,
}

/// Whether a grid point produced a genuine fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitStatus {
    Fitted(SparseFitRecord),
    Failed { reason: String },
}

/// Outcome of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    pub penalty: f64,
    pub status: FitStatus,
    /// PEV of the sparse components taken together.
    pub pev_sparse: f64,
    /// Fraction of exactly-zero loadings.
    pub sparsity_ratio: f64,
    /// `PEV_pca * PEV_sparse * sparsity_ratio`.
    pub is_score: f64,
}

impl TuningResult {
    pub(crate) fn fitted(penalty: f64, record: SparseFitRecord, pev_pca: f64) -> Self {
        let pev_sparse = record.total_explained_variance();
        let sparsity_ratio = record.sparsity_ratio();
        Self {
            penalty,
            status: FitStatus::Fitted(record),
            pev_sparse,
            sparsity_ratio,
            is_score: pev_pca * pev_sparse * sparsity_ratio,
        }
    }

    pub(crate) fn sentinel(penalty: f64, reason: String) -> Self {
        Self {
            penalty,
            status: FitStatus::Failed { reason },
            pev_sparse: 0.0,
            sparsity_ratio: 0.0,
            is_score: 0.0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self.status, FitStatus::Failed { .. })
    }

    pub fn record(&self) -> Option<&SparseFitRecord> {
        match &self.status {
            FitStatus::Fitted(record) => Some(record),
            FitStatus::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            FitStatus::Fitted(_) => None,
            FitStatus::Failed { reason } => Some(reason),
        }
    }
}

/// Grid search over penalties scored by the Index of Sparseness.
#[derive(Debug, Clone)]
pub struct ISGridTuner<S, P = CovariancePca> {
    adapter: SparseFitAdapter<S>,
    analyzer: VarianceAnalyzer<P>,
    config: TunerConfig,
}

impl<S: SparseComponentSolver> ISGridTuner<S, CovariancePca> {
    pub fn new(solver: S) -> Self {
        Self {
            adapter: SparseFitAdapter::new(solver),
            analyzer: VarianceAnalyzer::new(),
            config: TunerConfig::default(),
        }
    }
}

impl<S: SparseComponentSolver, P: PcaProvider> ISGridTuner<S, P> {
    pub fn with_analyzer<Q: PcaProvider>(self, analyzer: VarianceAnalyzer<Q>) -> ISGridTuner<S, Q> {
        ISGridTuner {
            adapter: self.adapter,
            analyzer,
            config: self.config,
        }
    }

    pub fn with_config(mut self, config: TunerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &VarianceAnalyzer<P> {
        &self.analyzer
    }

    /// Scores every penalty in `grid`, returning one result per grid entry in
    /// grid order.
    ///
    /// The standard-PCA baseline is computed once up front and shared by all
    /// grid points. An empty grid yields an empty sequence.
    pub fn tune(&self, data: ArrayView2<f64>, grid: &PenaltyGrid, components: usize) -> Result<Vec<TuningResult>> {
        check_data_matrix(data)?;
        let (rows, cols) = data.dim();
        check_component_count(components, rows, cols)?;
        let pev_pca = self.analyzer.leading_pev(data, components)?;
        self.evaluate_grid(data, grid, components, pev_pca)
    }

    /// Grid evaluation against a precomputed baseline. Inputs must already be validated.
    pub(crate) fn evaluate_grid(
        &self,
        data: ArrayView2<f64>,
        grid: &PenaltyGrid,
        components: usize,
        pev_pca: f64,
    ) -> Result<Vec<TuningResult>> {
        info!(
            "Starting IS grid search: {} penalties, K={}, PEV_pca={:.4}, parallel={}",
            grid.len(),
            components,
            pev_pca,
            self.config.parallel
        );
        let start_time = Instant::now();

        let evaluate = |&penalty: &f64| self.evaluate_point(data, components, penalty, pev_pca);
        let results = if self.config.parallel {
            grid.as_slice().par_iter().map(evaluate).collect::<Result<Vec<_>>>()?
        } else {
            grid.as_slice().iter().map(evaluate).collect::<Result<Vec<_>>>()?
        };

        let failed = results.iter().filter(|r| r.is_sentinel()).count();
        info!(
            "Finished IS grid search in {:?} ({} of {} points failed)",
            start_time.elapsed(),
            failed,
            results.len()
        );
        Ok(results)
    }

    fn evaluate_point(&self, data: ArrayView2<f64>, components: usize, penalty: f64, pev_pca: f64) -> Result<TuningResult> {
        match self.adapter.fit_checked(data, components, penalty) {
            Ok(record) => {
                let result = TuningResult::fitted(penalty, record, pev_pca);
                debug!(
                    "penalty={}: PEV_sparse={:.4}, sparsity={:.4}, IS={:.4}",
                    penalty, result.pev_sparse, result.sparsity_ratio, result.is_score
                );
                Ok(result)
            }
            Err(err @ SpcaError::SolverFailure { .. }) if self.config.failure_policy == FailurePolicy::Sentinel => {
                warn!("Recording sentinel for penalty {}: {}", penalty, err);
                Ok(TuningResult::sentinel(penalty, err.to_string()))
            }
            Err(err) => Err(err),
        }
    }
}
