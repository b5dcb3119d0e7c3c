// src/report.rs

use crate::error::Result;
use crate::pca::PcaProvider;
use crate::selector::{OptimalOutcome, OptimalSelector};
use crate::solver::SparseComponentSolver;
use crate::tuner::{ISGridTuner, PenaltyGrid, TuningResult};
use crate::validation::{check_component_count, check_data_matrix};
use crate::variance::VarianceSpectrum;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Point on the IS-vs-penalty curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub penalty: f64,
    pub is_score: f64,
    /// True when the point is a placeholder for a failed fit.
    pub failed: bool,
}

/// Everything a complete tuning run produces: the scree spectrum, the
/// standard-PCA baseline, every grid result, and the winner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningReport {
    pub components: usize,
    pub spectrum: VarianceSpectrum,
    pub pev_pca: f64,
    pub results: Vec<TuningResult>,
    pub optimal: OptimalOutcome,
}

impl TuningReport {
    /// Runs analyze, tune and select over `data`.
    ///
    /// # Errors
    /// Any error of the three stages; in particular `EmptyResultSet` for an
    /// empty grid or a grid where every fit failed under the sentinel policy.
    pub fn run<S, P>(
        tuner: &ISGridTuner<S, P>,
        data: ArrayView2<f64>,
        grid: &PenaltyGrid,
        components: usize,
    ) -> Result<Self>
    where
        S: SparseComponentSolver,
        P: PcaProvider,
    {
        check_data_matrix(data)?;
        let (rows, cols) = data.dim();
        check_component_count(components, rows, cols)?;

        let spectrum = tuner.analyzer().analyze(data)?;
        let pev_pca = spectrum.leading_sum(components)?;
        let results = tuner.evaluate_grid(data, grid, components, pev_pca)?;
        let optimal = OptimalSelector::new().select(&results)?;
        Ok(Self {
            components,
            spectrum,
            pev_pca,
            results,
            optimal,
        })
    }

    /// IS score per grid point, in grid order.
    pub fn is_curve(&self) -> Vec<CurvePoint> {
        self.results
            .iter()
            .map(|r| CurvePoint {
                penalty: r.penalty,
                is_score: r.is_score,
                failed: r.is_sentinel(),
            })
            .collect()
    }

    pub fn failed_points(&self) -> usize {
        self.results.iter().filter(|r| r.is_sentinel()).count()
    }
}
