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

//! Real-valued fields computed for one configuration of a supercell,
//! and how they transform under space group operations.

use std::fmt;

use elph_array_types::V3;
use elph_structure::{Permute, SpaceOp, angular};
use nalgebra::DMatrix;
use serde::{Serialize, Deserialize};

use crate::DerivError;

/// Tolerance on the integerness of grid indices of mapped points.
const GRID_MAP_TOL: f64 = 1e-6;

/// Common interface of the snapshot types.
///
/// Every field is a flat list of reals with some shape attached.
/// Arithmetic is done on the flat data; the shape only matters for
/// validation and for applying symmetry.
pub trait Field: Clone + fmt::Debug + Send + Sync + Sized {
    fn values(&self) -> &[f64];

    /// A field of the same shape holding other values.
    ///
    /// # Panics
    ///
    /// Panics if the length differs from `self.values().len()`.
    fn with_values(&self, values: Vec<f64>) -> Self;

    fn same_shape(&self, other: &Self) -> bool;

    fn shape_description(&self) -> String;

    /// The field of the image configuration under `oper`.
    fn rotated(&self, oper: &SpaceOp) -> Result<Self, DerivError>;
}

//=================================================================

/// A scalar field on the regular real-space grid of a supercell,
/// possibly with several components (e.g. spin).
///
/// Data is component-major, and each component is in C order
/// over the mesh (the last index varies fastest).
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
pub struct GridField {
    mesh: [usize; 3],
    num_components: usize,
    data: Vec<f64>,
}

impl GridField {
    pub fn new(mesh: [usize; 3], num_components: usize, data: Vec<f64>) -> Result<Self, DerivError> {
        let expected = mesh_len(mesh) * num_components;
        if expected == 0 {
            dataset_bail!("empty grid field (mesh {:?}, {} components)", mesh, num_components);
        }
        if data.len() != expected {
            dataset_bail!(
                "grid field with mesh {:?} and {} components needs {} values, got {}",
                mesh, num_components, expected, data.len(),
            );
        }
        Ok(GridField { mesh, num_components, data })
    }

    /// Build a field by evaluating a function at each `(component, index)`.
    pub fn from_fn(mesh: [usize; 3], num_components: usize, mut f: impl FnMut(usize, [usize; 3]) -> f64) -> Self {
        let mut data = Vec::with_capacity(mesh_len(mesh) * num_components);
        for c in 0..num_components {
            for idx in mesh_indices(mesh) {
                data.push(f(c, idx));
            }
        }
        GridField { mesh, num_components, data }
    }

    pub fn mesh(&self) -> [usize; 3] { self.mesh }
    pub fn num_components(&self) -> usize { self.num_components }
    pub fn num_points(&self) -> usize { mesh_len(self.mesh) }
    pub fn data(&self) -> &[f64] { &self.data }
    pub fn into_data(self) -> Vec<f64> { self.data }

    pub fn component(&self, c: usize) -> &[f64] {
        let n = self.num_points();
        &self.data[c * n..(c + 1) * n]
    }

    pub fn value(&self, c: usize, idx: [usize; 3]) -> f64
    { self.data[c * self.num_points() + flat_index(self.mesh, idx)] }

    /// For each point of the rotated grid, the point of `self` it takes its value from.
    fn source_indices(&self, oper: &SpaceOp) -> Result<Vec<usize>, DerivError> {
        let rot_inv = match oper.rot().unimodular_inv() {
            Some(m) => m.map(f64::from),
            None => symmetry_bail!("rotation {:?} is not unimodular", oper.rot()),
        };
        let mesh = self.mesh;
        let n = V3(mesh).map(|x| x as f64);

        // V'(x) = V(W^-1 (x - t))
        mesh_indices(mesh).map(|j| {
            let x = V3::from_fn(|a| j[a] as f64 / n[a]) - *oper.trans();
            let y = &rot_inv * &x;
            let mut i = [0; 3];
            for a in 0..3 {
                let scaled = y[a] * n[a];
                let rounded = scaled.round();
                if !((scaled - rounded).abs() < GRID_MAP_TOL) {
                    symmetry_bail!(
                        "operation does not map the {:?} grid onto itself \
                         (grid point {:?} maps to fractional index {})",
                        mesh, j, scaled,
                    );
                }
                i[a] = (rounded as i64).rem_euclid(mesh[a] as i64) as usize;
            }
            Ok(flat_index(mesh, i))
        }).collect()
    }
}

impl Field for GridField {
    fn values(&self) -> &[f64] { &self.data }

    fn with_values(&self, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), self.data.len(), "with_values: length mismatch");
        GridField { mesh: self.mesh, num_components: self.num_components, data: values }
    }

    fn same_shape(&self, other: &Self) -> bool
    { self.mesh == other.mesh && self.num_components == other.num_components }

    fn shape_description(&self) -> String
    { format!("grid {:?} x {} components", self.mesh, self.num_components) }

    fn rotated(&self, oper: &SpaceOp) -> Result<Self, DerivError> {
        let sources = self.source_indices(oper)?;
        let n = self.num_points();
        let mut data = Vec::with_capacity(self.data.len());
        for c in 0..self.num_components {
            let component = &self.data[c * n..(c + 1) * n];
            data.extend(sources.iter().map(|&i| component[i]));
        }
        Ok(self.with_values(data))
    }
}

pub(crate) fn mesh_len(mesh: [usize; 3]) -> usize
{ mesh[0] * mesh[1] * mesh[2] }

#[inline]
pub(crate) fn flat_index(mesh: [usize; 3], idx: [usize; 3]) -> usize
{ (idx[0] * mesh[1] + idx[1]) * mesh[2] + idx[2] }

/// All indices of a mesh, in C order.
pub(crate) fn mesh_indices(mesh: [usize; 3]) -> impl Iterator<Item=[usize; 3]> {
    (0..mesh[0]).flat_map(move |i| {
        (0..mesh[1]).flat_map(move |j| (0..mesh[2]).map(move |k| [i, j, k]))
    })
}

//=================================================================

/// Projector angular momenta of one site, each expanding to `2l + 1`
/// channels in `m = -l..=l` order.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelMap {
    pub projector_ls: Vec<u32>,
}

impl ChannelMap {
    pub fn new(projector_ls: Vec<u32>) -> Result<Self, DerivError> {
        if let Some(&l) = projector_ls.iter().find(|&&l| l > angular::MAX_L) {
            dataset_bail!("projector angular momentum {} exceeds the maximum of {}", l, angular::MAX_L);
        }
        Ok(ChannelMap { projector_ls })
    }

    pub fn num_channels(&self) -> usize
    { self.projector_ls.iter().map(|&l| angular::num_channels(l)).sum() }

    fn block_len(&self) -> usize
    { self.num_channels() * self.num_channels() }
}

/// A square real matrix over angular momentum channels at each site,
/// such as the `D_ij` or `Q_ij` augmentation operators.
///
/// Blocks are stored site after site, each in row-major order.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelField {
    maps: Vec<ChannelMap>,
    data: Vec<f64>,
}

impl ChannelField {
    pub fn new(maps: Vec<ChannelMap>, data: Vec<f64>) -> Result<Self, DerivError> {
        let expected: usize = maps.iter().map(ChannelMap::block_len).sum();
        if data.len() != expected {
            dataset_bail!(
                "channel field over {} sites needs {} values, got {}",
                maps.len(), expected, data.len(),
            );
        }
        Ok(ChannelField { maps, data })
    }

    /// Build from one row-major block per site.
    pub fn from_blocks(maps: Vec<ChannelMap>, blocks: Vec<Vec<f64>>) -> Result<Self, DerivError> {
        if maps.len() != blocks.len() {
            dataset_bail!("{} channel maps but {} blocks", maps.len(), blocks.len());
        }
        for (site, (map, block)) in maps.iter().zip(&blocks).enumerate() {
            if block.len() != map.block_len() {
                dataset_bail!(
                    "site {}: block has {} values, but its channel map needs {}",
                    site, block.len(), map.block_len(),
                );
            }
        }
        Ok(ChannelField { maps, data: blocks.concat() })
    }

    pub fn maps(&self) -> &[ChannelMap] { &self.maps }
    pub fn num_sites(&self) -> usize { self.maps.len() }
    pub fn data(&self) -> &[f64] { &self.data }

    pub fn block(&self, site: usize) -> &[f64] {
        let start: usize = self.maps[..site].iter().map(ChannelMap::block_len).sum();
        &self.data[start..start + self.maps[site].block_len()]
    }

    /// One site's block as a matrix.
    pub fn block_matrix(&self, site: usize) -> DMatrix<f64> {
        let n = self.maps[site].num_channels();
        DMatrix::from_row_slice(n, n, self.block(site))
    }
}

impl Field for ChannelField {
    fn values(&self) -> &[f64] { &self.data }

    fn with_values(&self, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), self.data.len(), "with_values: length mismatch");
        ChannelField { maps: self.maps.clone(), data: values }
    }

    fn same_shape(&self, other: &Self) -> bool
    { self.maps == other.maps }

    fn shape_description(&self) -> String {
        let channels: Vec<_> = self.maps.iter().map(ChannelMap::num_channels).collect();
        format!("channel blocks of sizes {:?}", channels)
    }

    fn rotated(&self, oper: &SpaceOp) -> Result<Self, DerivError> {
        let atom_map = oper.atom_map();
        if atom_map.len() != self.num_sites() {
            symmetry_bail!(
                "atom map of length {} applied to a channel field over {} sites",
                atom_map.len(), self.num_sites(),
            );
        }

        let mut blocks = Vec::with_capacity(self.num_sites());
        for (site, &image) in atom_map.iter().enumerate() {
            let map = &self.maps[site];
            if self.maps[image] != *map {
                symmetry_bail!(
                    "site {} maps to site {}, but their channel maps differ ({:?} vs {:?})",
                    site, image, map.projector_ls, self.maps[image].projector_ls,
                );
            }
            let delta = angular::block_representation(&map.projector_ls, oper.l_reps());
            blocks.push(&delta * self.block_matrix(site) * delta.transpose());
        }

        // each block moves to the image of its site
        let mut data = Vec::with_capacity(self.data.len());
        for block in blocks.permuted_by(&oper.site_perm()) {
            // nalgebra is column-major; store row-major
            data.extend(block.transpose().iter().cloned());
        }
        Ok(self.with_values(data))
    }
}
