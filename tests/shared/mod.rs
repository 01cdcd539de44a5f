#![allow(dead_code)]

//! A bcc cell with an analytic local potential and analytic channel blocks.
//!
//! The potential is a sum of gaussians on the atoms. The channel blocks of
//! each site couple the `s` channel to the `p` channels in proportion to
//! that site's own displacement, so their derivative is known exactly.

use std::f64::consts::PI;

use elph::array_types::{V3, M33};
use elph::structure::{Lattice, Site, Structure};
use elph::{
    CellTransform, ChannelField, ChannelMap, DisplacementRecord, GridField,
    RunInput, Snapshot, SymmetryInput,
};

pub const LATTICE_CONSTANT: f64 = 3.0;
pub const MESH: [usize; 3] = [12, 12, 12];
pub const SIGMA: f64 = 0.5;
pub const AMPLITUDE: f64 = 0.01;
const IMAGES: i32 = 2;

pub fn bcc() -> Structure {
    Structure::new(Lattice::cubic(LATTICE_CONSTANT), vec![
        Site::new("Fe", V3([0.0, 0.0, 0.0]), 55.845),
        Site::new("Fe", V3([0.5, 0.5, 0.5]), 55.845),
    ])
}

pub fn c3() -> M33<i32> { M33::from_array([[0, 0, 1], [1, 0, 0], [0, 1, 0]]) }
pub fn c2z() -> M33<i32> { M33::from_array([[-1, 0, 0], [0, -1, 0], [0, 0, 1]]) }
pub fn body_center() -> V3 { V3([0.5, 0.5, 0.5]) }

/// `E`, `C3`, `C3^2`, and each of those followed by `C2z` and a body-centering translation.
pub fn operations() -> Vec<(M33<i32>, V3)> {
    let c3 = c3();
    let c3_sq = &c3 * &c3;
    vec![
        (M33::eye(), V3::zero()),
        (c3, V3::zero()),
        (c3_sq, V3::zero()),
        (c2z(), body_center()),
        (&c2z() * &c3, body_center()),
        (&c2z() * &c3_sq, body_center()),
    ]
}

/// A `±` pair along x on atom 0.
pub fn records() -> Vec<DisplacementRecord> {
    vec![
        DisplacementRecord::new(0, V3([AMPLITUDE, 0.0, 0.0])),
        DisplacementRecord::new(0, V3([-AMPLITUDE, 0.0, 0.0])),
    ]
}

fn grid_point(idx: [usize; 3]) -> V3
{ V3::from_fn(|k| LATTICE_CONSTANT * idx[k] as f64 / MESH[k] as f64) }

fn images() -> impl Iterator<Item=V3> {
    let range = move || -IMAGES..=IMAGES;
    range().flat_map(move |i| range().flat_map(move |j| range().map(move |k| {
        V3([i, j, k]).map(|x| LATTICE_CONSTANT * f64::from(x))
    })))
}

fn gaussian(s: &V3) -> f64
{ (-s.sqnorm() / (2.0 * SIGMA * SIGMA)).exp() }

/// The potential of atoms at the given cartesian positions.
pub fn potential(positions: &[V3]) -> GridField {
    GridField::from_fn(MESH, 1, |_, idx| {
        let r = grid_point(idx);
        let mut total = 0.0;
        for p in positions {
            for image in images() {
                total += gaussian(&(r - *p - image));
            }
        }
        total
    })
}

/// `dV/du` of one atom along one axis.
pub fn potential_derivative(atom: usize, axis: usize) -> GridField {
    let p = bcc().to_carts()[atom];
    GridField::from_fn(MESH, 1, |_, idx| {
        let r = grid_point(idx);
        images().map(|image| {
            let s = r - p - image;
            s[axis] / (SIGMA * SIGMA) * gaussian(&s)
        }).sum()
    })
}

pub fn channel_maps() -> Vec<ChannelMap> {
    vec![ChannelMap::new(vec![0, 1]).unwrap(); 2]
}

fn sqrt_3_over_4pi() -> f64 { (3.0 / (4.0 * PI)).sqrt() }

/// `|u| Y_1(u)` on the s-p entries of each site, plus a diagonal that is quadratic in `u`.
pub fn channel_blocks(displacements: &[V3], scale: f64) -> ChannelField {
    let c = sqrt_3_over_4pi();
    let blocks = displacements.iter().map(|u| {
        let p = [c * u[1], c * u[2], c * u[0]];
        let diag = 1.0 + u.sqnorm();
        let mut block = vec![0.0; 16];
        for i in 0..4 {
            block[i * 4 + i] = scale * diag;
        }
        for m in 0..3 {
            block[1 + m] = scale * p[m];
            block[(1 + m) * 4] = scale * p[m];
        }
        block
    }).collect();
    ChannelField::from_blocks(channel_maps(), blocks).unwrap()
}

/// The exact derivative of `channel_blocks` for one atom along one axis.
pub fn channel_derivative(atom: usize, axis: usize, scale: f64) -> ChannelField {
    let num_atoms = bcc().num_atoms();
    let mut displacements = vec![V3::zero(); num_atoms];
    displacements[atom][axis] = 1.0;
    // the diagonal is quadratic, so it has no first derivative
    let mut field = channel_blocks(&displacements, scale).data().to_vec();
    let blocks_len = 16;
    for site in 0..num_atoms {
        for i in 0..4 {
            field[site * blocks_len + i * 4 + i] = 0.0;
        }
    }
    ChannelField::new(channel_maps(), field).unwrap()
}

pub fn snapshot(displacements: &[V3]) -> Snapshot {
    let positions: Vec<V3> = bcc().to_carts().iter()
        .zip(displacements)
        .map(|(x, u)| *x + *u)
        .collect();
    Snapshot {
        local_potential: Some(potential(&positions)),
        dij: Some(channel_blocks(displacements, 1.0)),
        qij: Some(channel_blocks(displacements, 0.25)),
    }
}

pub fn run_input(symmetry: SymmetryInput) -> RunInput {
    let structure = bcc();
    let records = records();
    let reference = snapshot(&vec![V3::zero(); structure.num_atoms()]);
    let displaced = records.iter().map(|record| {
        let mut displacements = vec![V3::zero(); structure.num_atoms()];
        displacements[record.atom] = record.displacement;
        snapshot(&displacements)
    }).collect();

    RunInput {
        structure,
        cell_transform: CellTransform::identity(),
        reference,
        displaced,
        records,
        symmetry,
        atoms: None,
        phonon_supercell_matrix: None,
    }
}

/// The bcc primitive cell, with the conventional cell as the supercell.
pub fn primitive_transform() -> CellTransform {
    CellTransform {
        supercell_matrix: M33::eye(),
        primitive_matrix: M33::from_array([
            [-0.5, 0.5, 0.5],
            [0.5, -0.5, 0.5],
            [0.5, 0.5, -0.5],
        ]),
    }
}

pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}
