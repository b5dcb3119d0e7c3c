// Sparse principal component analysis (SPCA) penalty tuning

#![doc = include_str!("../README.md")]

pub mod adapter;
pub mod error;
pub mod linalg_backends;
pub mod pca;
pub mod report;
pub mod selector;
pub mod solver;
pub mod tuner;
pub mod validation;
pub mod variance;

#[cfg(test)]
mod tuner_tests;

pub use adapter::{SparseFitAdapter, SparseFitRecord};
pub use error::{Result, SolverError, SpcaError};
pub use pca::{CovariancePca, PcaDecomposition, PcaProvider};
pub use report::{CurvePoint, TuningReport};
pub use selector::{OptimalOutcome, OptimalSelector};
pub use solver::{ElasticNetSpca, ElasticNetSpcaConfig, LoadingsLayout, SolverOutput, SparseComponentSolver};
pub use tuner::{FailurePolicy, FitStatus, ISGridTuner, PenaltyGrid, TunerConfig, TuningResult};
pub use variance::{VarianceAnalyzer, VarianceSpectrum};
