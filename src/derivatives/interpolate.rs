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

//! Fourier resampling of supercell grids onto other meshes.
//!
//! The source grid is taken to be exactly the band-limited periodic
//! function given by its discrete Fourier series. That series is
//! evaluated at the target points with a type-2 non-uniform FFT, using the
//! "exponential of semicircle" spreading kernel on a twice-upsampled grid.

use std::f64::consts::PI;
use std::sync::Arc;

use elph_array_types::{V3, M33};
use elph_structure::Lattice;
use num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};
use serde::{Serialize, Deserialize};

use crate::DerivError;
use crate::field::{GridField, flat_index, mesh_indices, mesh_len};

/// Requested relative accuracy of the non-uniform FFT when none is given.
pub const DEFAULT_INTERPOLATION_ACCURACY: f64 = 1e-6;

/// Absolute tolerance on the integerness of lattice relations.
const LATTICE_TOL: f64 = 1e-5;
/// Points closer than this (in grid units) to a grid point are read off directly.
const ON_GRID_TOL: f64 = 1e-8;
const UPSAMPLING: f64 = 2.0;
const QUADRATURE_INTERVALS: usize = 1024;

const BOHR_IN_ANGSTROM: f64 = 0.529177249;
const RYDBERG_IN_EV: f64 = 13.605826;

/// Values on a regular mesh of a cell, repeated at several lattice points.
///
/// This is the form of the local potential derivative after it has been
/// moved onto the primitive cell mesh: one block per primitive cell inside
/// the supercell. Data is ordered by component, then lattice point, then
/// mesh point (C order).
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
pub struct SampledGrid {
    mesh: [usize; 3],
    /// Integer coordinates of each cell, in units of the cell's lattice vectors.
    lattice_points: Vec<V3<i32>>,
    num_components: usize,
    data: Vec<f64>,
}

impl SampledGrid {
    pub fn new(
        mesh: [usize; 3],
        lattice_points: Vec<V3<i32>>,
        num_components: usize,
        data: Vec<f64>,
    ) -> Result<Self, DerivError> {
        let expected = mesh_len(mesh) * lattice_points.len() * num_components;
        if data.len() != expected {
            dataset_bail!(
                "sampled grid with mesh {:?}, {} cells and {} components needs {} values, got {}",
                mesh, lattice_points.len(), num_components, expected, data.len(),
            );
        }
        Ok(SampledGrid { mesh, lattice_points, num_components, data })
    }

    /// A grid field seen as a single cell.
    pub fn from_grid(field: &GridField) -> Self {
        SampledGrid {
            mesh: field.mesh(),
            lattice_points: vec![V3([0, 0, 0])],
            num_components: field.num_components(),
            data: field.data().to_vec(),
        }
    }

    pub fn mesh(&self) -> [usize; 3] { self.mesh }
    pub fn lattice_points(&self) -> &[V3<i32>] { &self.lattice_points }
    pub fn num_cells(&self) -> usize { self.lattice_points.len() }
    pub fn num_components(&self) -> usize { self.num_components }
    pub fn data(&self) -> &[f64] { &self.data }

    pub fn value(&self, component: usize, cell: usize, idx: [usize; 3]) -> f64 {
        let per_cell = mesh_len(self.mesh);
        let offset = (component * self.num_cells() + cell) * per_cell;
        self.data[offset + flat_index(self.mesh, idx)]
    }

    pub(crate) fn with_values(&self, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), self.data.len(), "with_values: length mismatch");
        SampledGrid { data, ..self.clone() }
    }

    pub(crate) fn same_shape(&self, other: &Self) -> bool {
        self.mesh == other.mesh
            && self.lattice_points == other.lattice_points
            && self.num_components == other.num_components
    }
}

/// Resample a grid field of the `source_lattice` cell onto a mesh of
/// the `target_lattice` cell.
///
/// When the source is a supercell of the target, the target mesh is
/// sampled in every target cell inside the source cell. When the target
/// is a supercell of the source, the single target cell is sampled.
pub fn interpolate(
    source: &GridField,
    source_lattice: &Lattice,
    target_mesh: [usize; 3],
    target_lattice: &Lattice,
    accuracy: f64,
) -> Result<SampledGrid, DerivError> {
    if target_mesh.iter().any(|&n| n == 0) {
        return Err(DerivError::InvalidSettings(format!("target mesh {:?} is empty", target_mesh)));
    }
    if !(accuracy > 0.0 && accuracy < 1.0) {
        return Err(DerivError::InvalidSettings(format!("interpolation accuracy {} is not in (0, 1)", accuracy)));
    }

    let lattice_points = cells_in_source(source_lattice, target_lattice)?;

    // fractional coordinates of the target cell, in the source cell
    let to_source: M33 = target_lattice.matrix() * source_lattice.inverse_matrix();
    let n_t = V3(target_mesh).map(|n| n as f64);
    let points: Vec<V3> = lattice_points.iter().flat_map(|cell| {
        let cell = cell.map(f64::from);
        mesh_indices(target_mesh).map(move |j| {
            let frac = V3::from_fn(|a| j[a] as f64 / n_t[a]) + cell;
            (frac * &to_source).fract_positive()
        })
    }).collect();

    let mut data = Vec::with_capacity(points.len() * source.num_components());
    match on_grid_indices(&points, source.mesh()) {
        Some(indices) => {
            debug!("All {} target points lie on the {:?} source grid", points.len(), source.mesh());
            for c in 0..source.num_components() {
                let component = source.component(c);
                data.extend(indices.iter().map(|&i| component[i]));
            }
        },
        None => {
            let nufft = Nufft::new(source.mesh(), accuracy);
            debug!(
                "Interpolating {:?} grid onto {} points (kernel width {}, fine grid {:?})",
                source.mesh(), points.len(), nufft.width, nufft.fine,
            );
            for c in 0..source.num_components() {
                data.extend(nufft.evaluate(source.component(c), &points));
            }
        },
    }

    Ok(SampledGrid {
        mesh: target_mesh,
        lattice_points,
        num_components: source.num_components(),
        data,
    })
}

fn cells_in_source(source: &Lattice, target: &Lattice) -> Result<Vec<V3<i32>>, DerivError> {
    if let Some(m) = source.integer_relation(target, LATTICE_TOL) {
        return lattice_points_in_supercell(&m);
    }
    if target.integer_relation(source, LATTICE_TOL).is_some() {
        return Ok(vec![V3([0, 0, 0])]);
    }
    Err(DerivError::LatticeMismatch(format!(
        "neither lattice is a superlattice of the other:\n source {:?}\n target {:?}",
        source.vectors(), target.vectors(),
    )))
}

/// The lattice points `L` with `L M^-1` in `[0, 1)^3`, for a supercell
/// related by `A_super = M A`. There are `|det M|` of them.
fn lattice_points_in_supercell(m: &M33<i32>) -> Result<Vec<V3<i32>>, DerivError> {
    const EPS: f64 = 1e-8;

    let m_f = m.map(f64::from);
    let m_inv = m_f.inv();

    // bounding box of the supercell's corners
    let mut lo = [0i32; 3];
    let mut hi = [0i32; 3];
    for corner in 0..8i32 {
        let c = V3([corner & 1, (corner >> 1) & 1, (corner >> 2) & 1]).map(f64::from);
        let image = c * &m_f;
        for a in 0..3 {
            lo[a] = lo[a].min(image[a].floor() as i32);
            hi[a] = hi[a].max(image[a].ceil() as i32);
        }
    }

    let mut out = vec![];
    for i in lo[0]..=hi[0] {
        for j in lo[1]..=hi[1] {
            for k in lo[2]..=hi[2] {
                let point = V3([i, j, k]);
                let frac = point.map(f64::from) * &m_inv;
                if frac.iter().all(|&y| y > -EPS && y < 1.0 - EPS) {
                    out.push(point);
                }
            }
        }
    }

    let expected = m.det().unsigned_abs() as usize;
    if out.len() != expected {
        return Err(DerivError::LatticeMismatch(format!(
            "found {} lattice points in a supercell of volume ratio {}",
            out.len(), expected,
        )));
    }
    Ok(out)
}

fn on_grid_indices(points: &[V3], mesh: [usize; 3]) -> Option<Vec<usize>> {
    points.iter().map(|x| {
        let mut idx = [0; 3];
        for a in 0..3 {
            let scaled = x[a] * mesh[a] as f64;
            let rounded = scaled.round();
            if (scaled - rounded).abs() > ON_GRID_TOL {
                return None;
            }
            idx[a] = (rounded as i64).rem_euclid(mesh[a] as i64) as usize;
        }
        Some(flat_index(mesh, idx))
    }).collect()
}

//=================================================================

/// Signed frequency of FFT bin `i` on an axis of length `n`.
fn centered_frequency(i: usize, n: usize) -> i64 {
    if i < (n + 1) / 2 { i as i64 } else { i as i64 - n as i64 }
}

/// A 3D FFT done as 1D transforms along each axis.
struct Fft3 {
    mesh: [usize; 3],
    plans: Vec<Arc<dyn Fft<f64>>>,
}

impl Fft3 {
    fn new(planner: &mut FftPlanner<f64>, mesh: [usize; 3], direction: FftDirection) -> Self {
        let plans = mesh.iter().map(|&n| planner.plan_fft(n, direction)).collect();
        Fft3 { mesh, plans }
    }

    /// Unnormalized, in place, on C-ordered data.
    fn process(&self, data: &mut [Complex64]) {
        assert_eq!(data.len(), mesh_len(self.mesh));
        for (axis, plan) in self.plans.iter().enumerate() {
            let n = self.mesh[axis];
            let stride: usize = self.mesh[axis + 1..].iter().product();
            let outer: usize = self.mesh[..axis].iter().product();

            let zero = Complex64::new(0.0, 0.0);
            let mut line = vec![zero; n];
            let mut scratch = vec![zero; plan.get_inplace_scratch_len()];
            for o in 0..outer {
                for s in 0..stride {
                    let base = o * n * stride + s;
                    for i in 0..n {
                        line[i] = data[base + i * stride];
                    }
                    plan.process_with_scratch(&mut line, &mut scratch);
                    for i in 0..n {
                        data[base + i * stride] = line[i];
                    }
                }
            }
        }
    }
}

/// Evaluates the Fourier series of grids of one mesh at arbitrary points.
struct Nufft {
    mesh: [usize; 3],
    fine: [usize; 3],
    width: usize,
    beta: f64,
    /// Half-width of the kernel in radians, per axis.
    alpha: [f64; 3],
    /// Kernel Fourier transform at each source frequency, per axis.
    correction: [Vec<f64>; 3],
    forward: Fft3,
    backward: Fft3,
}

impl Nufft {
    fn new(mesh: [usize; 3], accuracy: f64) -> Self {
        let width = ((1.0 / accuracy).log10().ceil() as usize + 1).max(2).min(16);
        let beta = 2.30 * width as f64;
        let fine = mesh.map(|n| {
            let m = ((UPSAMPLING * n as f64).ceil() as usize).max(2 * width);
            m + m % 2
        });
        let alpha = fine.map(|m| width as f64 * PI / m as f64);

        let mut correction: [Vec<f64>; 3] = Default::default();
        for a in 0..3 {
            correction[a] = (0..mesh[a])
                .map(|i| kernel_transform(centered_frequency(i, mesh[a]) as f64, width, beta, alpha[a]))
                .collect();
        }

        let mut planner = FftPlanner::new();
        let forward = Fft3::new(&mut planner, mesh, FftDirection::Forward);
        let backward = Fft3::new(&mut planner, fine, FftDirection::Inverse);
        Nufft { mesh, fine, width, beta, alpha, correction, forward, backward }
    }

    /// `Re sum_k c_k exp(2 pi i k.x)`, where `c` are the (normalized)
    /// discrete Fourier coefficients of `values`.
    fn evaluate(&self, values: &[f64], points: &[V3]) -> Vec<f64> {
        let (mesh, fine) = (self.mesh, self.fine);
        let mut coeffs: Vec<_> = values.iter().map(|&v| Complex64::new(v, 0.0)).collect();
        self.forward.process(&mut coeffs);

        // deconvolve, and place on the fine grid
        let norm = 1.0 / mesh_len(mesh) as f64;
        let mut spread = vec![Complex64::new(0.0, 0.0); mesh_len(fine)];
        for idx in mesh_indices(mesh) {
            let mut fine_idx = [0; 3];
            let mut corr = 1.0;
            for a in 0..3 {
                let k = centered_frequency(idx[a], mesh[a]);
                fine_idx[a] = k.rem_euclid(fine[a] as i64) as usize;
                corr *= self.correction[a][idx[a]];
            }
            spread[flat_index(fine, fine_idx)] = coeffs[flat_index(mesh, idx)] * (norm / corr);
        }
        self.backward.process(&mut spread);
        let u: Vec<f64> = spread.iter().map(|z| z.re).collect();

        points.iter().map(|x| self.gather(&u, x)).collect()
    }

    fn gather(&self, u: &[f64], x: &V3) -> f64 {
        let fine = self.fine;
        let mut weights: [Vec<(usize, f64)>; 3] = Default::default();
        for a in 0..3 {
            let m = fine[a] as i64;
            let h = 2.0 * PI / fine[a] as f64;
            let theta = 2.0 * PI * x[a];
            let lo = ((theta - self.alpha[a]) / h).ceil() as i64;
            let hi = ((theta + self.alpha[a]) / h).floor() as i64;
            weights[a] = (lo..=hi)
                .map(|l| {
                    let z = (theta - l as f64 * h) / self.alpha[a];
                    (l.rem_euclid(m) as usize, es_kernel(z, self.beta))
                })
                .collect();
        }

        let mut total = 0.0;
        for &(i, wi) in &weights[0] {
            for &(j, wj) in &weights[1] {
                let row = (i * fine[1] + j) * fine[2];
                let wij = wi * wj;
                for &(k, wk) in &weights[2] {
                    total += u[row + k] * wij * wk;
                }
            }
        }
        total
    }
}

/// `exp(beta (sqrt(1 - z^2) - 1))` on `[-1, 1]`, zero outside.
fn es_kernel(z: f64, beta: f64) -> f64 {
    if z.abs() > 1.0 {
        return 0.0;
    }
    (beta * ((1.0 - z * z).sqrt() - 1.0)).exp()
}

/// Fourier transform of the spreading kernel at integer frequency `k`,
/// divided by the fine grid spacing.
fn kernel_transform(k: f64, width: usize, beta: f64, alpha: f64) -> f64 {
    // Simpson's rule on [-1, 1]
    let n = QUADRATURE_INTERVALS;
    let dz = 2.0 / n as f64;
    let f = |z: f64| es_kernel(z, beta) * (k * alpha * z).cos();
    let mut sum = f(-1.0) + f(1.0);
    for i in 1..n {
        let z = -1.0 + i as f64 * dz;
        sum += if i % 2 == 1 { 4.0 * f(z) } else { 2.0 * f(z) };
    }
    0.5 * width as f64 * sum * dz / 3.0
}

//=================================================================

/// Choose an FFT mesh for a cell from a plane wave cutoff in eV, the way
/// VASP 6 does.
///
/// `precision` follows the `PREC` tag: a factor of 4 is applied for
/// "high", "accurate" or "single", 3 otherwise (including `None` and
/// "singlen"). Each entry is rounded up to an even 2-3-5-7 smooth number.
pub fn fft_mesh_from_cutoff(cutoff_ev: f64, lattice: &Lattice, precision: Option<&str>) -> [usize; 3] {
    let factor = cutoff_factor(precision);
    let norms = lattice.norms();
    let mut mesh = [0; 3];
    for a in 0..3 {
        let length = norms[a] / BOHR_IN_ANGSTROM;
        let gmax = (cutoff_ev / RYDBERG_IN_EV).sqrt() / (2.0 * PI / length);
        let mut n = (gmax * factor).round().max(2.0) as usize;
        while !is_even_2357_smooth(n) {
            n += 1;
        }
        mesh[a] = n;
    }
    mesh
}

fn cutoff_factor(precision: Option<&str>) -> f64 {
    match precision {
        None | Some("singlen") => 3.0,
        Some(prec) => match prec.chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('h') | Some('a') | Some('s') => 4.0,
            _ => 3.0,
        },
    }
}

fn is_even_2357_smooth(n: usize) -> bool {
    if n == 0 || n % 2 != 0 {
        return false;
    }
    let mut rest = n;
    for &p in &[2, 3, 5, 7] {
        while rest % p == 0 {
            rest /= p;
        }
    }
    rest == 1
}
