//! Tunes the SPCA penalty on synthetic data with a two-block covariance.
//!
//! Run with `RUST_LOG=debug cargo run --example tune_block_covariance` to see
//! every grid point.

use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use spca_tune::{ElasticNetSpca, FailurePolicy, ISGridTuner, PenaltyGrid, TunerConfig, TuningReport};
use std::error::Error;

/// Draws `n_samples` rows whose first `block_one` features load on one latent
/// factor and whose remaining features load on a second one.
fn block_covariance_samples(n_samples: usize, n_features: usize, block_one: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let factor = Normal::new(0.0, 1.0).unwrap();
    let noise = Normal::new(0.0, 0.3).unwrap();
    let mut data = Array2::<f64>::zeros((n_samples, n_features));
    for mut row in data.rows_mut() {
        let f1 = 2.0 * factor.sample(&mut rng);
        let f2 = 1.5 * factor.sample(&mut rng);
        for (j, value) in row.iter_mut().enumerate() {
            let latent = if j < block_one { f1 } else { f2 };
            *value = latent + noise.sample(&mut rng);
        }
    }
    data
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let data = block_covariance_samples(200, 8, 5, 2025);
    let grid = PenaltyGrid::linspace(0.0, 0.6, 25)?;
    let tuner = ISGridTuner::new(ElasticNetSpca::default()).with_config(TunerConfig {
        failure_policy: FailurePolicy::Sentinel,
        parallel: true,
    });

    let report = TuningReport::run(&tuner, data.view(), &grid, 2)?;

    println!("Scree (fraction / cumulative):");
    let cumulative = report.spectrum.cumulative();
    for (i, fraction) in report.spectrum.fractions().iter().enumerate() {
        println!("  PC{:<2} {:.4}  {:.4}", i + 1, fraction, cumulative[i]);
    }

    println!("\nIS by penalty (PEV_pca = {:.4}):", report.pev_pca);
    for point in report.is_curve() {
        let marker = if point.failed { "  (failed)" } else { "" };
        println!("  {:>6.3}  {:.4}{}", point.penalty, point.is_score, marker);
    }

    println!(
        "\nOptimal penalty {:.3} with IS {:.4}; loadings:\n{:.3}",
        report.optimal.penalty, report.optimal.is_score, report.optimal.record.loadings
    );
    Ok(())
}
