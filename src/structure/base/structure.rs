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

use elph_array_types::V3;

use crate::Lattice;

/// One atom of a periodic structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    /// Species label (e.g. `"Fe"`). Only compared for equality.
    pub species: String,
    /// Fractional position in the lattice of the owning structure.
    pub frac: V3,
    /// Atomic mass in amu.
    pub mass: f64,
}

impl Site {
    pub fn new(species: impl Into<String>, frac: V3, mass: f64) -> Self
    { Site { species: species.into(), frac, mass } }
}

/// A periodic structure; the lattice together with an ordered list of sites.
///
/// Immutable once built. Atom indices used throughout the workspace are
/// positions in this list.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    lattice: Lattice,
    sites: Vec<Site>,
}

impl Structure {
    pub fn new(lattice: Lattice, sites: Vec<Site>) -> Self
    { Structure { lattice, sites } }

    pub fn num_atoms(&self) -> usize { self.sites.len() }
    pub fn lattice(&self) -> &Lattice { &self.lattice }
    pub fn sites(&self) -> &[Site] { &self.sites }

    pub fn site(&self, atom: usize) -> Option<&Site> { self.sites.get(atom) }

    pub fn to_fracs(&self) -> Vec<V3>
    { self.sites.iter().map(|s| s.frac).collect() }

    pub fn to_carts(&self) -> Vec<V3>
    { self.sites.iter().map(|s| s.frac * &self.lattice).collect() }

    pub fn species(&self) -> Vec<&str>
    { self.sites.iter().map(|s| &s.species[..]).collect() }

    pub fn masses(&self) -> Vec<f64>
    { self.sites.iter().map(|s| s.mass).collect() }
}
