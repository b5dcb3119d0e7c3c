// src/selector.rs

use crate::adapter::SparseFitRecord;
use crate::error::{Result, SpcaError};
use crate::tuner::TuningResult;
use crate::validation::scores_tied;
use serde::{Deserialize, Serialize};

/// The best grid point of a tuning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalOutcome {
    pub penalty: f64,
    pub is_score: f64,
    /// Position of the winning entry in the results sequence (and the grid).
    pub index: usize,
    pub record: SparseFitRecord,
}

/// Picks the maximum-IS result.
///
/// Scores within [`SCORE_TIE_TOLERANCE`](crate::validation::SCORE_TIE_TOLERANCE)
/// of each other are tied; ties go to the smallest penalty. Sentinel entries
/// from failed fits never win.
#[derive(Debug, Default, Clone, Copy)]
pub struct OptimalSelector;

impl OptimalSelector {
    pub fn new() -> Self {
        OptimalSelector
    }

    /// # Errors
    /// `EmptyResultSet` if `results` holds no genuine fit.
    pub fn select(&self, results: &[TuningResult]) -> Result<OptimalOutcome> {
        let genuine: Vec<(usize, &TuningResult, &SparseFitRecord)> = results
            .iter()
            .enumerate()
            .filter_map(|(index, result)| result.record().map(|record| (index, result, record)))
            .collect();
        let max_is = genuine
            .iter()
            .map(|(_, result, _)| result.is_score)
            .fold(f64::NEG_INFINITY, f64::max);

        // Tolerance is measured against the maximum, so the winner does not
        // depend on the order of `results`.
        let best = genuine
            .into_iter()
            .filter(|(_, result, _)| scores_tied(result.is_score, max_is))
            .min_by(|(ia, a, _), (ib, b, _)| a.penalty.total_cmp(&b.penalty).then(ia.cmp(ib)));

        let (index, winner, record) = best.ok_or(SpcaError::EmptyResultSet)?;
        Ok(OptimalOutcome {
            penalty: winner.penalty,
            is_score: winner.is_score,
            index,
            record: record.clone(),
        })
    }
}
