// src/tuner_tests.rs
#![cfg(test)]
use crate::adapter::SparseFitRecord;
use crate::error::{SolverError, SpcaError};
use crate::pca::{PcaDecomposition, PcaProvider};
use crate::solver::{LoadingsLayout, SolverOutput, SparseComponentSolver};
use crate::tuner::{FailurePolicy, ISGridTuner, PenaltyGrid, TunerConfig, TuningResult};
use crate::variance::VarianceAnalyzer;
use ndarray::{array, Array1, Array2, ArrayView2};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Solver whose output is a simple function of the penalty: the first
/// `floor(10 * penalty)` loadings (row-major) are zero and explained variance
/// shrinks linearly. Penalties listed in `fail_on` report non-convergence.
struct ScriptedSolver {
    fail_on: Vec<f64>,
    calls: AtomicUsize,
}

impl ScriptedSolver {
    fn new() -> Self {
        Self { fail_on: Vec::new(), calls: AtomicUsize::new(0) }
    }

    fn failing_on(fail_on: Vec<f64>) -> Self {
        Self { fail_on, calls: AtomicUsize::new(0) }
    }
}

impl SparseComponentSolver for ScriptedSolver {
    fn fit(&self, data: ArrayView2<f64>, components: usize, penalties: &[f64]) -> Result<SolverOutput, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(penalties.len(), components);
        let penalty = penalties[0];
        if self.fail_on.contains(&penalty) {
            return Err(SolverError::NotConverged { iterations: 10, last_change: 0.5 });
        }
        let n_features = data.ncols();
        let zeros = ((penalty * 10.0).floor() as usize).min(n_features * components);
        let mut loadings = Array2::<f64>::ones((n_features, components));
        for (position, value) in loadings.iter_mut().enumerate() {
            if position < zeros {
                *value = 0.0;
            }
        }
        let explained = Array1::from_shape_fn(components, |j| {
            ((0.45 - 0.15 * j as f64) * (1.0 - 0.5 * penalty)).max(0.0)
        });
        Ok(SolverOutput {
            loadings,
            layout: LoadingsLayout::FeaturesByComponents,
            explained_variance: explained,
            iterations: 1,
        })
    }
}

/// PCA provider with a fixed spectrum that counts how often it is asked.
struct FixedSpectrum {
    eigenvalues: Array1<f64>,
    calls: AtomicUsize,
}

impl PcaProvider for FixedSpectrum {
    fn decompose(&self, _data: ArrayView2<f64>) -> crate::error::Result<PcaDecomposition> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PcaDecomposition {
            eigenvalues: self.eigenvalues.clone(),
        })
    }
}

fn test_data() -> Array2<f64> {
    array![
        [1.0, 0.2, 3.1, 0.4],
        [0.5, 1.2, 2.2, 1.4],
        [2.0, 0.1, 0.3, 2.5],
        [1.5, 2.2, 1.3, 0.5],
        [0.7, 0.9, 2.8, 1.1],
        [1.9, 1.6, 0.6, 2.0]
    ]
}

/// Spectrum [0.5, 0.25, 0.125, 0.125]; PEV_pca for K = 2 is 0.75.
fn fixed_analyzer() -> VarianceAnalyzer<FixedSpectrum> {
    VarianceAnalyzer::with_provider(FixedSpectrum {
        eigenvalues: array![4.0, 2.0, 1.0, 1.0],
        calls: AtomicUsize::new(0),
    })
}

fn fitted(penalty: f64, is_score: f64) -> TuningResult {
    let record = SparseFitRecord {
        loadings: array![[1.0, 0.0], [0.0, 1.0]],
        explained_variance: array![0.3, 0.2],
        penalty,
        iterations: 1,
    };
    let mut result = TuningResult::fitted(penalty, record, 1.0);
    result.is_score = is_score;
    result
}

#[cfg(test)]
mod test_is_grid_tuner {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn results_follow_grid_order_and_length() {
        let grid = PenaltyGrid::new(vec![0.4, 0.0, 0.25, 0.1]).unwrap();
        let tuner = ISGridTuner::new(ScriptedSolver::new()).with_analyzer(fixed_analyzer());
        let results = tuner.tune(test_data().view(), &grid, 2).unwrap();
        assert_eq!(results.len(), grid.len());
        for (result, penalty) in results.iter().zip(grid.iter()) {
            assert_eq!(result.penalty, penalty);
            assert_eq!(result.record().unwrap().penalty, penalty);
        }
    }

    #[test]
    fn is_score_is_product_of_three_factors() {
        let grid = PenaltyGrid::new(vec![0.4]).unwrap();
        let tuner = ISGridTuner::new(ScriptedSolver::new()).with_analyzer(fixed_analyzer());
        let result = &tuner.tune(test_data().view(), &grid, 2).unwrap()[0];
        // 4 zeros of 8 loadings; explained (0.45 + 0.30) * 0.8.
        assert_abs_diff_eq!(result.sparsity_ratio, 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(result.pev_sparse, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(result.is_score, 0.75 * 0.6 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn dense_fit_scores_zero() {
        let grid = PenaltyGrid::new(vec![0.0]).unwrap();
        let tuner = ISGridTuner::new(ScriptedSolver::new()).with_analyzer(fixed_analyzer());
        let result = &tuner.tune(test_data().view(), &grid, 2).unwrap()[0];
        assert_eq!(result.sparsity_ratio, 0.0);
        assert_eq!(result.is_score, 0.0);
        assert!(!result.is_sentinel());
    }

    #[test]
    fn baseline_is_computed_once_per_run() {
        let grid = PenaltyGrid::linspace(0.0, 0.7, 8).unwrap();
        let tuner = ISGridTuner::new(ScriptedSolver::new()).with_analyzer(fixed_analyzer());
        tuner.tune(test_data().view(), &grid, 2).unwrap();
        assert_eq!(tuner.analyzer().provider().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn parallel_matches_sequential() {
        let grid = PenaltyGrid::linspace(0.0, 0.75, 16).unwrap();
        let sequential = ISGridTuner::new(ScriptedSolver::new()).with_analyzer(fixed_analyzer());
        let parallel = ISGridTuner::new(ScriptedSolver::new())
            .with_analyzer(fixed_analyzer())
            .with_config(TunerConfig { parallel: true, ..TunerConfig::default() });
        let a = sequential.tune(test_data().view(), &grid, 2).unwrap();
        let b = parallel.tune(test_data().view(), &grid, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_grid_gives_empty_results() {
        let grid = PenaltyGrid::new(Vec::new()).unwrap();
        let tuner = ISGridTuner::new(ScriptedSolver::new()).with_analyzer(fixed_analyzer());
        assert!(tuner.tune(test_data().view(), &grid, 2).unwrap().is_empty());
    }

    #[test]
    fn component_count_is_validated_before_fitting() {
        let grid = PenaltyGrid::new(vec![0.1]).unwrap();
        let solver = ScriptedSolver::new();
        let tuner = ISGridTuner::new(&solver).with_analyzer(fixed_analyzer());
        let err = tuner.tune(test_data().view(), &grid, 5).unwrap_err();
        assert!(matches!(err, SpcaError::InvalidParameter { name: "components", .. }));
        assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
    }
}

#[cfg(test)]
mod test_failure_policy {
    use super::*;

    #[test]
    fn abort_propagates_failure_with_context() {
        let grid = PenaltyGrid::new(vec![0.1, 0.2, 0.3]).unwrap();
        let tuner = ISGridTuner::new(ScriptedSolver::failing_on(vec![0.2])).with_analyzer(fixed_analyzer());
        let err = tuner.tune(test_data().view(), &grid, 2).unwrap_err();
        match err {
            SpcaError::SolverFailure { penalty, components, source } => {
                assert_eq!(penalty, 0.2);
                assert_eq!(components, 2);
                assert!(matches!(source, SolverError::NotConverged { .. }));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn sentinel_policy_keeps_every_grid_point() {
        let grid = PenaltyGrid::new(vec![0.1, 0.2, 0.3]).unwrap();
        let tuner = ISGridTuner::new(ScriptedSolver::failing_on(vec![0.2]))
            .with_analyzer(fixed_analyzer())
            .with_config(TunerConfig { failure_policy: FailurePolicy::Sentinel, parallel: false });
        let results = tuner.tune(test_data().view(), &grid, 2).unwrap();
        assert_eq!(results.len(), 3);
        assert!(!results[0].is_sentinel());
        assert!(results[1].is_sentinel());
        assert_eq!(results[1].is_score, 0.0);
        assert!(results[1].record().is_none());
        assert!(results[1].failure_reason().unwrap().contains("did not converge"));
        assert!(!results[2].is_sentinel());
    }

    #[test]
    fn sentinel_policy_does_not_hide_invalid_input() {
        let data = array![[1.0, 2.0, 3.0]];
        let grid = PenaltyGrid::new(vec![0.1]).unwrap();
        let tuner = ISGridTuner::new(ScriptedSolver::new())
            .with_config(TunerConfig { failure_policy: FailurePolicy::Sentinel, parallel: true });
        assert!(matches!(
            tuner.tune(data.view(), &grid, 1),
            Err(SpcaError::InsufficientData { rows: 1, cols: 3 })
        ));
    }
}

#[cfg(test)]
mod test_optimal_selector {
    use super::*;
    use crate::selector::OptimalSelector;

    #[test]
    fn dominant_maximum_wins() {
        let results = vec![fitted(0.0, 0.0), fitted(0.1, 0.2), fitted(0.2, 0.45), fitted(0.3, 0.3)];
        let outcome = OptimalSelector::new().select(&results).unwrap();
        assert_eq!(outcome.penalty, 0.2);
        assert_eq!(outcome.is_score, 0.45);
        assert_eq!(outcome.index, 2);
        assert_eq!(&outcome.record, results[2].record().unwrap());
    }

    #[test]
    fn ties_go_to_smallest_penalty() {
        let results = vec![fitted(0.3, 0.4), fitted(0.2, 0.1), fitted(0.1, 0.4)];
        let outcome = OptimalSelector::new().select(&results).unwrap();
        assert_eq!(outcome.penalty, 0.1);
        assert_eq!(outcome.index, 2);
    }

    #[test]
    fn near_ties_within_tolerance_go_to_smallest_penalty() {
        let results = vec![fitted(0.1, 0.4), fitted(0.3, 0.4 + 5e-10)];
        let outcome = OptimalSelector::new().select(&results).unwrap();
        assert_eq!(outcome.penalty, 0.1);
    }

    #[test]
    fn tolerance_is_measured_from_the_maximum_in_any_order() {
        let forward = vec![fitted(0.1, 0.0), fitted(0.2, 0.8e-9), fitted(0.3, 1.6e-9)];
        let mut reversed = forward.clone();
        reversed.reverse();

        let selector = OptimalSelector::new();
        let from_forward = selector.select(&forward).unwrap();
        let from_reversed = selector.select(&reversed).unwrap();
        assert_eq!(from_forward.penalty, 0.2);
        assert_eq!(from_forward.index, 1);
        assert_eq!(from_reversed.penalty, 0.2);
        assert_eq!(from_reversed.index, 1);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(OptimalSelector::new().select(&[]), Err(SpcaError::EmptyResultSet));
    }

    #[test]
    fn sentinels_never_win() {
        let results = vec![
            TuningResult::sentinel(0.1, "failed".to_string()),
            fitted(0.2, 0.0),
            TuningResult::sentinel(0.3, "failed".to_string()),
        ];
        let outcome = OptimalSelector::new().select(&results).unwrap();
        assert_eq!(outcome.penalty, 0.2);

        let only_failures = vec![TuningResult::sentinel(0.1, "failed".to_string())];
        assert_eq!(OptimalSelector::new().select(&only_failures), Err(SpcaError::EmptyResultSet));
    }

    #[test]
    fn input_is_left_untouched() {
        let results = vec![fitted(0.2, 0.3), fitted(0.1, 0.3)];
        let before = results.clone();
        OptimalSelector::new().select(&results).unwrap();
        assert_eq!(results, before);
    }
}

#[cfg(test)]
mod test_penalty_grid {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn linspace_includes_both_ends() {
        let grid = PenaltyGrid::linspace(0.0, 1.0, 5).unwrap();
        assert_eq!(grid.len(), 5);
        assert_abs_diff_eq!(grid.as_slice()[0], 0.0);
        assert_abs_diff_eq!(grid.as_slice()[2], 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(grid.as_slice()[4], 1.0, epsilon = 1e-15);
    }

    #[test]
    fn invalid_grids_are_rejected() {
        assert!(PenaltyGrid::new(vec![0.1, -0.1]).is_err());
        assert!(PenaltyGrid::new(vec![0.1, 0.1]).is_err());
        assert!(PenaltyGrid::linspace(0.5, 0.5, 3).is_err());
        assert!(PenaltyGrid::linspace(-1.0, 1.0, 3).is_err());
        assert!(PenaltyGrid::linspace(0.0, 1.0, 0).unwrap().is_empty());
    }
}
