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

use std::sync::Arc;

use elph_array_types::{V3, M33};
use elph_newtype_indices::{Indexed, newtype_index};
use nalgebra::DMatrix;

use crate::{Lattice, Structure};
use crate::oper::angular::{self, MAX_L};
use crate::oper::perm::{Perm, BadPerm};
use crate::util::reduced_frac_diff;

newtype_index!{
    /// Index of an operation in a `SymmetryOperationSet`.
    OperI
}

/// Tolerance on the orthogonality of derived cartesian rotations.
const ORTHOGONALITY_TOL: f64 = 1e-6;

#[derive(Debug, Fail)]
pub enum SymmetryError {
    #[fail(display = "operation {}: rotation has determinant {} (expected ±1)", oper, det)]
    BadDeterminant { oper: usize, det: i32 },

    #[fail(display = "operation {}: cartesian rotation is not orthogonal (max deviation {:e})", oper, deviation)]
    NotOrthogonal { oper: usize, deviation: f64 },

    #[fail(display = "operation {}: atom map has length {} but the structure has {} atoms", oper, len, num_atoms)]
    AtomMapLength { oper: usize, len: usize, num_atoms: usize },

    #[fail(display = "operation {}: atom map is not a bijection ({})", oper, cause)]
    NotBijection { oper: usize, cause: BadPerm },

    #[fail(display = "operation {}: atom {} lands {:.3e} A away from its image {}", oper, atom, distance, image)]
    PositionMismatch { oper: usize, atom: usize, image: usize, distance: f64 },

    #[fail(display = "operation {}: atom {} ({}) maps to atom {} ({})", oper, atom, species, image, image_species)]
    SpeciesMismatch { oper: usize, atom: usize, species: String, image: usize, image_species: String },

    #[fail(display = "operation {}: no image found for atom {}", oper, atom)]
    NoImage { oper: usize, atom: usize },

    #[fail(display = "operation {}: could not build angular representation: {}", oper, message)]
    Representation { oper: usize, message: String },

    #[fail(display = "symmetry operation set is empty")]
    Empty,
}

/// A space group operation of a supercell, with everything derived from it.
///
/// In terms of column vectors of fractional coordinates, the operation maps
/// `x` to `W x + t`. The cartesian rotation is `R = A^T W A^-T` where `A`
/// has the lattice vectors as rows.
#[derive(Debug, Clone)]
pub struct SpaceOp {
    rot: M33<i32>,
    trans: V3,
    cart_rot: M33,
    atom_map: Vec<usize>,
    // indexed by l
    l_reps: Arc<Vec<DMatrix<f64>>>,
}

impl SpaceOp {
    /// The integer rotation `W`, acting on column vectors of supercell fractional coordinates.
    pub fn rot(&self) -> &M33<i32> { &self.rot }

    /// The fractional translation `t`.
    pub fn trans(&self) -> &V3 { &self.trans }

    /// The cartesian rotation `R`, acting on column vectors.
    pub fn cart_rot(&self) -> &M33 { &self.cart_rot }

    /// `atom_map()[s]` is the atom that atom `s` is carried onto.
    pub fn atom_map(&self) -> &[usize] { &self.atom_map }

    /// The permutation that moves per-atom data along with the atoms,
    /// for use with `Permute::permuted_by`.
    pub fn site_perm(&self) -> Perm {
        // atom_map was validated on construction
        match Perm::from_vec(self.atom_map.clone()) {
            Ok(perm) => perm.inverted(),
            Err(e) => unreachable!("validated atom map became invalid: {}", e),
        }
    }

    /// Real-spherical-harmonic representation of the rotation for degree `l`.
    ///
    /// # Panics
    ///
    /// Panics if `l > MAX_L`.
    pub fn l_rep(&self, l: u32) -> &DMatrix<f64> { &self.l_reps[l as usize] }

    /// All representations, indexed by `l`.
    pub fn l_reps(&self) -> &[DMatrix<f64>] { &self.l_reps }

    /// Rotate a cartesian vector (such as a displacement direction).
    pub fn rotate_cart(&self, v: &V3) -> V3 { &self.cart_rot * v }

    /// Transform a fractional position.
    pub fn transform_frac(&self, x: &V3) -> V3 { &self.rot.map(f64::from) * x + self.trans }

    pub fn is_identity(&self) -> bool {
        self.rot == M33::eye()
            && self.trans.iter().all(|&t| (t - t.round()).abs() < 1e-12)
            && self.atom_map.iter().enumerate().all(|(i, &j)| i == j)
    }

    /// Flipped group operator; `a.then(b)` applies `a` first.
    ///
    /// Representations are recomputed from the composite cartesian rotation
    /// rather than multiplied, so this can be compared against `a` and `b`
    /// independently.
    pub fn then(&self, other: &SpaceOp, lattice: &Lattice) -> Result<SpaceOp, SymmetryError> {
        let rot = &other.rot * &self.rot;
        let trans = &other.rot.map(f64::from) * &self.trans + other.trans;
        let atom_map = self.atom_map.iter().map(|&s| other.atom_map[s]).collect();
        SpaceOp::build(usize::MAX, lattice, rot, trans, atom_map)
    }

    fn build(
        oper: usize,
        lattice: &Lattice,
        rot: M33<i32>,
        trans: V3,
        atom_map: Vec<usize>,
    ) -> Result<SpaceOp, SymmetryError> {
        let det = rot.det();
        if det.abs() != 1 {
            return Err(SymmetryError::BadDeterminant { oper, det });
        }

        let cart_rot = cartesian_rotation(lattice, &rot);
        let deviation = (&cart_rot.t() * &cart_rot).max_abs_diff(&M33::eye());
        if !(deviation < ORTHOGONALITY_TOL) {
            return Err(SymmetryError::NotOrthogonal { oper, deviation });
        }

        let l_reps = (0..=MAX_L)
            .map(|l| angular::rotation_representation(l, &cart_rot))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SymmetryError::Representation { oper, message: e.to_string() })?;

        Ok(SpaceOp { rot, trans, cart_rot, atom_map, l_reps: Arc::new(l_reps) })
    }
}

/// `R = A^T W A^-T`.
pub fn cartesian_rotation(lattice: &Lattice, rot: &M33<i32>) -> M33 {
    let a = lattice.matrix();
    let a_inv = lattice.inverse_matrix();
    &(&a.t() * &rot.map(f64::from)) * &a_inv.t()
}

/// A validated list of space group operations of one structure.
///
/// Never mutated after construction.
#[derive(Debug, Clone)]
pub struct SymmetryOperationSet {
    opers: Indexed<OperI, SpaceOp>,
    num_atoms: usize,
}

/// Raw description of an operation, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationInput {
    pub rot: M33<i32>,
    pub trans: V3,
    pub atom_map: Vec<usize>,
}

impl SymmetryOperationSet {
    /// Validate operations with known atom maps against a structure.
    ///
    /// `symprec` is a cartesian distance in angstroms.
    pub fn new(
        structure: &Structure,
        opers: Vec<OperationInput>,
        symprec: f64,
    ) -> Result<Self, SymmetryError> {
        if opers.is_empty() {
            return Err(SymmetryError::Empty);
        }

        let lattice = structure.lattice();
        let num_atoms = structure.num_atoms();
        let mut out = Indexed::new();
        for (oper, input) in opers.into_iter().enumerate() {
            let OperationInput { rot, trans, atom_map } = input;
            validate_atom_map(oper, structure, &rot, &trans, &atom_map, symprec)?;
            out.push(SpaceOp::build(oper, lattice, rot, trans, atom_map)?);
        }
        trace!("Validated {} symmetry operations on {} atoms", out.len(), num_atoms);
        Ok(SymmetryOperationSet { opers: out, num_atoms })
    }

    /// Validate operations given only as rotations and translations,
    /// finding each atom map by position matching.
    pub fn from_operations(
        structure: &Structure,
        opers: &[(M33<i32>, V3)],
        symprec: f64,
    ) -> Result<Self, SymmetryError> {
        let fracs = structure.to_fracs();
        let lattice = structure.lattice();
        let inputs = opers.iter().enumerate().map(|(oper, &(rot, trans))| {
            let rot_f = rot.map(f64::from);
            let atom_map = fracs.iter().enumerate().map(|(atom, x)| {
                let image = &rot_f * x + trans;
                fracs.iter()
                    .position(|y| cart_distance(lattice, &image, y) < symprec)
                    .ok_or(SymmetryError::NoImage { oper, atom })
            }).collect::<Result<Vec<_>, _>>()?;
            Ok(OperationInput { rot, trans, atom_map })
        }).collect::<Result<Vec<_>, SymmetryError>>()?;

        debug!("Found atom maps for {} operations", inputs.len());
        Self::new(structure, inputs, symprec)
    }

    /// The trivial group.
    pub fn identity_only(structure: &Structure) -> Self {
        let n = structure.num_atoms();
        let eye = SpaceOp {
            rot: M33::eye(),
            trans: V3::zero(),
            cart_rot: M33::eye(),
            atom_map: (0..n).collect(),
            l_reps: Arc::new((0..=MAX_L).map(|l| {
                let dim = angular::num_channels(l);
                DMatrix::identity(dim, dim)
            }).collect()),
        };
        SymmetryOperationSet { opers: Indexed::from_raw(vec![eye]), num_atoms: n }
    }

    pub fn len(&self) -> usize { self.opers.len() }
    pub fn is_empty(&self) -> bool { self.opers.is_empty() }
    pub fn num_atoms(&self) -> usize { self.num_atoms }

    pub fn opers(&self) -> &Indexed<OperI, SpaceOp> { &self.opers }

    pub fn iter_enumerated(&self) -> impl Iterator<Item=(OperI, &SpaceOp)> + '_ {
        self.opers.iter_enumerated()
    }
}

impl std::ops::Index<OperI> for SymmetryOperationSet {
    type Output = SpaceOp;

    fn index(&self, index: OperI) -> &SpaceOp { &self.opers[index] }
}

fn cart_distance(lattice: &Lattice, a: &V3, b: &V3) -> f64 {
    (reduced_frac_diff(a, b) * lattice).norm()
}

fn validate_atom_map(
    oper: usize,
    structure: &Structure,
    rot: &M33<i32>,
    trans: &V3,
    atom_map: &[usize],
    symprec: f64,
) -> Result<(), SymmetryError> {
    let num_atoms = structure.num_atoms();
    if atom_map.len() != num_atoms {
        return Err(SymmetryError::AtomMapLength { oper, len: atom_map.len(), num_atoms });
    }
    if let Err(cause) = Perm::from_vec(atom_map.to_vec()) {
        return Err(SymmetryError::NotBijection { oper, cause });
    }

    let rot_f = rot.map(f64::from);
    let sites = structure.sites();
    for (atom, (site, &image)) in sites.iter().zip(atom_map).enumerate() {
        let image_site = &sites[image];
        if site.species != image_site.species {
            return Err(SymmetryError::SpeciesMismatch {
                oper, atom, image,
                species: site.species.clone(),
                image_species: image_site.species.clone(),
            });
        }

        let moved = &rot_f * &site.frac + *trans;
        let distance = cart_distance(structure.lattice(), &moved, &image_site.frac);
        if !(distance < symprec) {
            return Err(SymmetryError::PositionMismatch { oper, atom, image, distance });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Site;
    use crate::oper::perm::Permute;
    use elph_assert_close::assert_close;

    // two-atom bcc cell (cubic setting)
    fn bcc() -> Structure {
        Structure::new(Lattice::cubic(3.0), vec![
            Site::new("Fe", V3([0.0, 0.0, 0.0]), 55.845),
            Site::new("Fe", V3([0.5, 0.5, 0.5]), 55.845),
        ])
    }

    fn c3_111() -> M33<i32> {
        // x -> y -> z -> x
        M33::from_array([[0, 0, 1], [1, 0, 0], [0, 1, 0]])
    }

    fn c2z() -> M33<i32> {
        M33::from_array([[-1, 0, 0], [0, -1, 0], [0, 0, 1]])
    }

    #[test]
    fn finds_atom_maps() {
        let structure = bcc();
        let set = SymmetryOperationSet::from_operations(&structure, &[
            (M33::eye(), V3::zero()),
            (c3_111(), V3::zero()),
            (c2z(), V3([0.5, 0.5, 0.5])),
        ], 1e-5).unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set[OperI(0)].atom_map(), &[0, 1]);
        assert_eq!(set[OperI(1)].atom_map(), &[0, 1]);
        assert_eq!(set[OperI(2)].atom_map(), &[1, 0]);
        assert!(set[OperI(0)].is_identity());

        // C3 sends x to y
        assert_close!(abs=1e-12, set[OperI(1)].rotate_cart(&V3([1.0, 0.0, 0.0])), V3([0.0, 1.0, 0.0]));
    }

    #[test]
    fn rejects_bad_atom_maps() {
        let structure = bcc();
        let input = |atom_map| OperationInput { rot: c2z(), trans: V3([0.5, 0.5, 0.5]), atom_map };

        match SymmetryOperationSet::new(&structure, vec![input(vec![0, 1])], 1e-5) {
            Err(SymmetryError::PositionMismatch { oper: 0, .. }) => {},
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
        match SymmetryOperationSet::new(&structure, vec![input(vec![1, 1])], 1e-5) {
            Err(SymmetryError::NotBijection { .. }) => {},
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
        match SymmetryOperationSet::new(&structure, vec![input(vec![1])], 1e-5) {
            Err(SymmetryError::AtomMapLength { len: 1, num_atoms: 2, .. }) => {},
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_species_mismatch() {
        let structure = Structure::new(Lattice::cubic(3.0), vec![
            Site::new("Cs", V3([0.0, 0.0, 0.0]), 132.9),
            Site::new("Cl", V3([0.5, 0.5, 0.5]), 35.45),
        ]);
        let input = OperationInput { rot: M33::eye(), trans: V3([0.5, 0.5, 0.5]), atom_map: vec![1, 0] };
        match SymmetryOperationSet::new(&structure, vec![input], 1e-5) {
            Err(SymmetryError::SpeciesMismatch { .. }) => {},
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_non_orthogonal() {
        // a 3-fold about z is not a symmetry of a tetragonal lattice
        let structure = Structure::new(Lattice::orthorhombic(2.0, 2.0, 5.0), vec![
            Site::new("X", V3([0.0, 0.0, 0.0]), 1.0),
        ]);
        let rot = M33::from_array([[0, 0, 1], [1, 0, 0], [0, 1, 0]]);
        match SymmetryOperationSet::from_operations(&structure, &[(rot, V3::zero())], 1e-5) {
            Err(SymmetryError::NotOrthogonal { .. }) => {},
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn composition() {
        let structure = bcc();
        let set = SymmetryOperationSet::from_operations(&structure, &[
            (c3_111(), V3::zero()),
            (c2z(), V3([0.5, 0.5, 0.5])),
        ], 1e-5).unwrap();
        let (a, b) = (&set[OperI(0)], &set[OperI(1)]);
        let ab = a.then(b, structure.lattice()).unwrap();

        let x = V3([0.1, 0.2, 0.3]);
        assert_close!(abs=1e-12, ab.transform_frac(&x), b.transform_frac(&a.transform_frac(&x)));
        assert_eq!(ab.atom_map(), &[1, 0]);
        assert_close!(abs=1e-12, *ab.cart_rot(), b.cart_rot() * a.cart_rot());

        // per-atom data follows the atoms
        let data = vec!["on 0", "on 1"];
        assert_eq!(data.permuted_by(&b.site_perm()), vec!["on 1", "on 0"]);
    }

    #[test]
    fn identity_only() {
        let set = SymmetryOperationSet::identity_only(&bcc());
        assert_eq!(set.len(), 1);
        assert!(set[OperI(0)].is_identity());
        assert_eq!(set[OperI(0)].l_rep(3).shape(), (7, 7));
    }
}
