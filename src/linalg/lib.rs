/* ************************************************************************ **
** This file is part of elph, and is licensed under EITHER the MIT license  **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of elph is provided under this permissive license, **
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

use elph_array_types::V3;
use nalgebra::DMatrix;

pub use nalgebra::DMatrix as Matrix;

#[derive(Debug, Fail)]
pub enum DegenerateMatrixError {
    #[fail(display = "matrix has fewer rows ({}) than columns ({})", rows, cols)]
    TooFewRows { rows: usize, cols: usize },

    #[fail(display = "matrix is rank deficient (sigma_min / sigma_max = {:e})", ratio)]
    RankDeficient { ratio: f64 },

    #[fail(display = "singular value decomposition did not converge")]
    NoConvergence,
}

/// Build a dense `K x 3` matrix whose rows are the given vectors.
pub fn matrix_from_rows(rows: &[V3]) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), 3, |r, c| rows[r][c])
}

/// Compute `P` such that `P * mat` is the identity, for a matrix of full column rank.
///
/// The matrix is rejected as degenerate when its smallest singular value
/// falls below `rank_tol` times the largest one.
pub fn left_pseudoinverse(mat: &DMatrix<f64>, rank_tol: f64) -> Result<DMatrix<f64>, DegenerateMatrixError> {
    let (rows, cols) = mat.shape();
    if rows < cols || cols == 0 {
        return Err(DegenerateMatrixError::TooFewRows { rows, cols });
    }

    // Computed explicitly as V S^-1 U^T from the thin SVD. The matrices this
    // crate sees are tiny (a few dozen rows by three columns), but there are
    // one of them per atom.
    let svd = mat.clone().svd(true, true);
    let (u, v_t) = match (&svd.u, &svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(DegenerateMatrixError::NoConvergence),
    };

    let sigma = &svd.singular_values;
    let sigma_max = sigma.max();
    let sigma_min = sigma.min();
    let ratio = if sigma_max > 0.0 { sigma_min / sigma_max } else { 0.0 };
    if !(sigma_max > 0.0) || !(sigma_min >= rank_tol * sigma_max) {
        debug!("Rejecting {}x{} matrix with sigma_min / sigma_max = {:e}", rows, cols, ratio);
        return Err(DegenerateMatrixError::RankDeficient { ratio });
    }
    trace!("Pseudoinverse of {}x{} matrix, sigma_min / sigma_max = {:e}", rows, cols, ratio);

    let sigma_inv = DMatrix::from_diagonal(&sigma.map(|s| 1.0 / s));
    Ok(v_t.transpose() * sigma_inv * u.transpose())
}
