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

//! Real spherical harmonics and their rotation matrices.
//!
//! Channels are ordered `m = -l..=l`. For `l = 1` this is `(y, z, x)`.
//!
//! The representation `D(R)` of a cartesian rotation `R` is defined by
//!
//! ```text
//! Y_m(R^-1 r) = sum_{m'} Y_{m'}(r) D_{m'm}(R)
//! ```
//!
//! which makes it a homomorphism: `D(R1 R2) = D(R1) D(R2)`. Since the
//! harmonics are orthonormal, `D` is orthogonal.

use std::f64::consts::PI;

use elph_array_types::{V3, M33};
use elph_linalg::{left_pseudoinverse, DegenerateMatrixError};
use nalgebra::DMatrix;

/// Highest angular momentum with a known representation.
pub const MAX_L: u32 = 3;

/// Number of channels for a given angular momentum.
#[inline]
pub fn num_channels(l: u32) -> usize
{ 2 * l as usize + 1 }

/// Evaluate the normalized real spherical harmonics of degree `l` at
/// the direction of `r`, in `m = -l..=l` order.
///
/// # Panics
///
/// Panics if `l > MAX_L`.
pub fn real_spherical_harmonics(l: u32, r: &V3) -> Vec<f64>
{
    let V3([x, y, z]) = r.unit();
    match l {
        0 => vec![0.5 * (1.0 / PI).sqrt()],
        1 => {
            let c = (3.0 / (4.0 * PI)).sqrt();
            vec![c * y, c * z, c * x]
        },
        2 => {
            let c = 0.5 * (15.0 / PI).sqrt();
            let c0 = 0.25 * (5.0 / PI).sqrt();
            vec![
                c * x * y,
                c * y * z,
                c0 * (3.0 * z * z - 1.0),
                c * x * z,
                0.5 * c * (x * x - y * y),
            ]
        },
        3 => {
            let c3 = 0.25 * (35.0 / (2.0 * PI)).sqrt();
            let c2 = 0.5 * (105.0 / PI).sqrt();
            let c1 = 0.25 * (21.0 / (2.0 * PI)).sqrt();
            let c0 = 0.25 * (7.0 / PI).sqrt();
            vec![
                c3 * (3.0 * x * x - y * y) * y,
                c2 * x * y * z,
                c1 * y * (5.0 * z * z - 1.0),
                c0 * (5.0 * z * z * z - 3.0 * z),
                c1 * x * (5.0 * z * z - 1.0),
                0.5 * c2 * (x * x - y * y) * z,
                c3 * (x * x - 3.0 * y * y) * x,
            ]
        },
        _ => panic!("real spherical harmonics are only implemented up to l = {}", MAX_L),
    }
}

// Deterministic, roughly uniform points on the unit sphere (golden spiral).
fn sample_directions(count: usize) -> Vec<V3>
{
    let golden = PI * (3.0 - 5f64.sqrt());
    (0..count).map(|i| {
        let z = 1.0 - 2.0 * (i as f64 + 0.5) / count as f64;
        let rho = (1.0 - z * z).sqrt();
        let phi = golden * i as f64;
        V3([rho * phi.cos(), rho * phi.sin(), z])
    }).collect()
}

const NUM_SAMPLES: usize = 64;

/// Compute the representation matrix `D(R)` for degree `l`, for an
/// orthogonal cartesian matrix `R` acting on column vectors.
///
/// This is a least-squares solve over sample directions, which is exact
/// (to rounding) whenever `R` is orthogonal.
pub fn rotation_representation(l: u32, cart_rot: &M33) -> Result<DMatrix<f64>, DegenerateMatrixError>
{
    assert!(l <= MAX_L, "no representation for l = {}", l);
    let dim = num_channels(l);
    let points = sample_directions(NUM_SAMPLES);

    // Y_{km'} = Y_{m'}(r_k),  B_{km} = Y_m(R^-1 r_k)
    let rot_inv = cart_rot.t();
    let mut y = DMatrix::zeros(points.len(), dim);
    let mut b = DMatrix::zeros(points.len(), dim);
    for (k, r) in points.iter().enumerate() {
        let rotated = &rot_inv * r;
        let y_row = real_spherical_harmonics(l, r);
        let b_row = real_spherical_harmonics(l, &rotated);
        for m in 0..dim {
            y[(k, m)] = y_row[m];
            b[(k, m)] = b_row[m];
        }
    }

    let pinv = left_pseudoinverse(&y, 1e-10)?;
    Ok(pinv * b)
}

/// Block-diagonal representation over a list of projector angular momenta.
pub fn block_representation(ls: &[u32], reps: &[DMatrix<f64>]) -> DMatrix<f64>
{
    let dim = ls.iter().map(|&l| num_channels(l)).sum();
    let mut out = DMatrix::zeros(dim, dim);
    let mut offset = 0;
    for &l in ls {
        let n = num_channels(l);
        out.view_mut((offset, offset), (n, n)).copy_from(&reps[l as usize]);
        offset += n;
    }
    out
}
