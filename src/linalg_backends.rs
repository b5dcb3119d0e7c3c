// src/linalg_backends.rs

use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_linalg::{Eigh as NdLinalgEigh, SVD as NdLinalgSVD, UPLO};
use std::error::Error;

pub type BackendError = Box<dyn Error + Send + Sync>;

/// Output of a symmetric eigendecomposition.
#[derive(Debug)]
pub struct EighOutput {
    /// Eigenvalues, sorted in descending order.
    pub eigenvalues: Array1<f64>,
    /// Eigenvectors as columns of the matrix.
    /// eigenvectors.column(i) corresponds to eigenvalues[i].
    pub eigenvectors: Array2<f64>,
}

/// Output of a thin Singular Value Decomposition.
#[derive(Debug)]
pub struct SVDOutput {
    /// Left singular vectors, shape (m, min(m, n)).
    pub u: Array2<f64>,
    /// Singular values in descending order.
    pub s: Array1<f64>,
    /// Right singular vectors transposed, shape (min(m, n), n).
    pub vt: Array2<f64>,
}

/// Symmetric eigendecomposition. Implementers may assume `matrix` is symmetric
/// and read only its upper triangle.
pub trait BackendEigh {
    fn eigh_descending(&self, matrix: ArrayView2<f64>) -> Result<EighOutput, BackendError>;
}

pub trait BackendSVD {
    fn thin_svd(&self, matrix: ArrayView2<f64>) -> Result<SVDOutput, BackendError>;
}

/// LAPACK-backed implementation through `ndarray-linalg`.
#[derive(Debug, Default, Copy, Clone)]
pub struct NdarrayLinAlgBackend;

fn to_dyn_error<E: Error + Send + Sync + 'static>(e: E) -> BackendError {
    Box::new(e)
}

impl BackendEigh for NdarrayLinAlgBackend {
    fn eigh_descending(&self, matrix: ArrayView2<f64>) -> Result<EighOutput, BackendError> {
        let (vals, vecs) = matrix.eigh(UPLO::Upper).map_err(to_dyn_error)?;
        if vals.iter().any(|v| !v.is_finite()) {
            return Err("eigendecomposition produced non-finite eigenvalues".into());
        }

        // LAPACK returns ascending order; callers rely on "first k" meaning "k largest".
        let mut order: Vec<usize> = (0..vals.len()).collect();
        order.sort_by(|&a, &b| vals[b].total_cmp(&vals[a]));

        let eigenvalues = order.iter().map(|&i| vals[i]).collect::<Array1<f64>>();
        let eigenvectors = vecs.select(Axis(1), &order);
        Ok(EighOutput { eigenvalues, eigenvectors })
    }
}

impl BackendSVD for NdarrayLinAlgBackend {
    fn thin_svd(&self, matrix: ArrayView2<f64>) -> Result<SVDOutput, BackendError> {
        let (m, n) = matrix.dim();
        let rank = m.min(n);
        let (u, s, vt) = matrix.svd(true, true).map_err(to_dyn_error)?;
        let u = u.ok_or("SVD did not return U")?;
        let vt = vt.ok_or("SVD did not return V^T")?;
        Ok(SVDOutput {
            u: u.slice(ndarray::s![.., ..rank]).to_owned(),
            s,
            vt: vt.slice(ndarray::s![..rank, ..]).to_owned(),
        })
    }
}
