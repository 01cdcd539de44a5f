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

//! Derivatives of electronic structure fields with respect to atomic
//! displacements, from finite differences completed by symmetry.
//!
//! The pipeline for each field is
//!
//! ```text
//! displaced snapshots -> finite differences -> symmetry expansion
//!                     -> least squares fit  -> (resampling, for dV/du)
//!                     -> DerivativeStore
//! ```

#[macro_use] extern crate log;
#[macro_use] extern crate failure;

#[macro_use]
mod error;

pub mod config;
pub mod dataset;
pub mod expand;
pub mod field;
pub mod finite_difference;
pub mod fit;
pub mod interpolate;
pub mod store;

pub use crate::error::DerivError;
pub use crate::config::{Settings, Interpolation, YamlRead};
pub use crate::dataset::{DisplacementDataset, DisplacementRecord, DispI};
pub use crate::field::{Field, GridField, ChannelField, ChannelMap};
pub use crate::finite_difference::{DifferenceScheme, RawEstimate, EstI};
pub use crate::expand::Candidate;
pub use crate::fit::DerivativeTensor;
pub use crate::interpolate::{SampledGrid, DEFAULT_INTERPOLATION_ACCURACY, fft_mesh_from_cutoff};
pub use crate::store::{DerivativeStore, DerivativeMap};

pub type FailResult<T> = Result<T, failure::Error>;

use std::collections::BTreeSet;

use elph_array_types::{V3, M33};
use elph_structure::{Lattice, OperationInput, Structure, SymmetryOperationSet};
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

/// How the supercell and the primitive cell are built from the unit cell.
///
/// Both matrices act on the rows of the unit cell lattice.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CellTransform {
    /// `A_super = S A_unit`
    pub supercell_matrix: M33<i32>,
    /// `A_prim = P A_unit`
    pub primitive_matrix: M33,
}

impl CellTransform {
    /// Supercell and primitive cell both equal to the unit cell.
    pub fn identity() -> Self
    { CellTransform { supercell_matrix: M33::eye(), primitive_matrix: M33::eye() } }

    /// The primitive lattice, given the supercell lattice.
    pub fn primitive_lattice(&self, supercell: &Lattice) -> Result<Lattice, DerivError> {
        let s = self.supercell_matrix.map(f64::from);
        if s.det() == 0.0 {
            return Err(DerivError::LatticeMismatch(format!(
                "supercell matrix {:?} is singular", self.supercell_matrix,
            )));
        }
        if !(self.primitive_matrix.det().abs() > 1e-10) {
            return Err(DerivError::LatticeMismatch(format!(
                "primitive matrix {:?} is singular", self.primitive_matrix,
            )));
        }
        let unit = &s.inv() * supercell;
        Ok(&self.primitive_matrix * &unit)
    }

    /// The integer matrix `M` with `A_super = M A_prim`.
    pub fn supercell_in_primitive(&self, supercell: &Lattice) -> Result<M33<i32>, DerivError> {
        let primitive = self.primitive_lattice(supercell)?;
        match supercell.integer_relation(&primitive, 1e-5) {
            Some(m) => Ok(m),
            None => Err(DerivError::LatticeMismatch(format!(
                "supercell matrix {:?} is not an integer multiple of primitive matrix {:?}",
                self.supercell_matrix, self.primitive_matrix,
            ))),
        }
    }

    /// Check that a phonon supercell (`A_phonon = S_phonon A_unit`) is built
    /// from the same primitive cell as the supercell.
    pub fn check_phonon_supercell(&self, supercell: &Lattice, phonon_supercell_matrix: &M33<i32>) -> Result<(), DerivError> {
        let s_phonon = phonon_supercell_matrix.map(f64::from);
        if s_phonon.det() == 0.0 {
            return Err(DerivError::LatticeMismatch(format!(
                "phonon supercell matrix {:?} is singular", phonon_supercell_matrix,
            )));
        }
        let primitive = self.primitive_lattice(supercell)?;
        let unit = &self.supercell_matrix.map(f64::from).inv() * supercell;
        let phonon = &s_phonon * &unit;
        match phonon.integer_relation(&primitive, 1e-5) {
            Some(_) => Ok(()),
            None => Err(DerivError::LatticeMismatch(format!(
                "phonon supercell matrix {:?} is not an integer multiple of primitive matrix {:?}",
                phonon_supercell_matrix, self.primitive_matrix,
            ))),
        }
    }
}

/// The fields computed for one configuration. Absent fields are not differentiated.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub local_potential: Option<GridField>,
    pub dij: Option<ChannelField>,
    pub qij: Option<ChannelField>,
}

/// Where the space group operations of the supercell come from.
#[derive(Debug, Clone)]
pub enum SymmetryInput {
    /// Operations with their atom maps.
    WithAtomMaps(Vec<OperationInput>),
    /// Rotations and translations; atom maps are found by matching positions.
    Operations(Vec<(M33<i32>, V3)>),
    /// Only the identity.
    IdentityOnly,
}

impl SymmetryInput {
    pub fn build(&self, structure: &Structure, symprec: f64) -> Result<SymmetryOperationSet, DerivError> {
        Ok(match self {
            SymmetryInput::WithAtomMaps(opers) => SymmetryOperationSet::new(structure, opers.clone(), symprec)?,
            SymmetryInput::Operations(opers) => SymmetryOperationSet::from_operations(structure, opers, symprec)?,
            SymmetryInput::IdentityOnly => SymmetryOperationSet::identity_only(structure),
        })
    }
}

/// Everything `run` consumes.
#[derive(Debug, Clone)]
pub struct RunInput {
    /// The undisplaced supercell.
    pub structure: Structure,
    pub cell_transform: CellTransform,
    pub reference: Snapshot,
    /// One snapshot per displacement record.
    pub displaced: Vec<Snapshot>,
    pub records: Vec<DisplacementRecord>,
    pub symmetry: SymmetryInput,
    /// Supercell atoms to compute derivatives for. Defaults to one atom
    /// per atom of the primitive cell.
    pub atoms: Option<Vec<usize>>,
    /// Supercell of the phonon calculation (`A_phonon = S_phonon A_unit`),
    /// which may differ from `structure`. It is recorded in the store.
    pub phonon_supercell_matrix: Option<M33<i32>>,
}

/// Compute every derivative that the reference snapshot has a field for.
pub fn run(input: &RunInput, settings: &Settings) -> Result<DerivativeStore, DerivError> {
    let settings = settings.clone().validated()?;
    let dataset = DisplacementDataset::new(input.structure.clone(), input.records.clone())?;
    if input.displaced.len() != dataset.len() {
        dataset_bail!("{} displaced snapshots for {} displacements", input.displaced.len(), dataset.len());
    }

    let structure = dataset.structure();
    let symmetry = input.symmetry.build(structure, settings.symprec)?;
    if let Some(matrix) = &input.phonon_supercell_matrix {
        input.cell_transform.check_phonon_supercell(structure.lattice(), matrix)?;
    }
    let targets = required_atoms(input, structure, settings.symprec)?;
    info!(
        "Computing derivatives of {} atoms from {} displacements and {} symmetry operations",
        targets.len(), dataset.len(), symmetry.len(),
    );

    let mut store = DerivativeStore::new(
        input.cell_transform.supercell_matrix,
        input.cell_transform.primitive_matrix,
        targets.iter().cloned().collect(),
    );
    store.set_displacements(input.records.clone());
    store.set_phonon_supercell_matrix(input.phonon_supercell_matrix);
    let ctx = Context { dataset: &dataset, symmetry: &symmetry, targets: &targets, settings: &settings };

    if let Some(reference) = &input.reference.local_potential {
        let displaced = displaced_fields(input, "local potential", |s| s.local_potential.as_ref())?;
        let supercell = structure.lattice();
        let resample = match &settings.interpolation {
            Some(interp) => Some((interp, input.cell_transform.primitive_lattice(supercell)?)),
            None => None,
        };
        let map = ctx.derivatives(reference, &displaced, |tensor| match &resample {
            Some((interp, primitive)) => tensor.try_map(|f| {
                interpolate::interpolate(&f, supercell, interp.mesh, primitive, interp.accuracy)
            }),
            None => tensor.try_map(|f| Ok(SampledGrid::from_grid(&f))),
        })?;
        store.set_dv_du(map);
    }
    if let Some(reference) = &input.reference.dij {
        let displaced = displaced_fields(input, "Dij", |s| s.dij.as_ref())?;
        store.set_ddij_du(ctx.derivatives(reference, &displaced, Ok)?);
    }
    if let Some(reference) = &input.reference.qij {
        let displaced = displaced_fields(input, "Qij", |s| s.qij.as_ref())?;
        store.set_dqij_du(ctx.derivatives(reference, &displaced, Ok)?);
    }

    store.check_complete()?;
    info!("Finished derivatives of {} atoms", targets.len());
    Ok(store)
}

struct Context<'a> {
    dataset: &'a DisplacementDataset,
    symmetry: &'a SymmetryOperationSet,
    targets: &'a BTreeSet<usize>,
    settings: &'a Settings,
}

impl<'a> Context<'a> {
    /// Differentiate one field, then post-process each atom's tensor.
    fn derivatives<F, G>(
        &self,
        reference: &F,
        displaced: &[F],
        post: impl Fn(DerivativeTensor<F>) -> Result<DerivativeTensor<G>, DerivError> + Sync,
    ) -> Result<DerivativeMap<G>, DerivError>
    where
        F: Field,
        G: Send,
    {
        let estimates = finite_difference::compute(
            reference,
            displaced,
            self.dataset.records().as_slice(),
            self.dataset.structure().num_atoms(),
            self.settings.difference_scheme,
            self.settings.pair_tolerance,
        )?;

        let fit_candidates = |atom: usize, candidates: &[Candidate<F>]| -> Result<(usize, DerivativeTensor<G>), DerivError> {
            let tensor = fit::fit(atom, candidates, self.settings.rank_tolerance)?;
            Ok((atom, post(tensor)?))
        };
        if self.settings.parallel {
            // each thread expands only its own atom, so that candidates are
            // dropped as soon as their atom is fit
            self.targets.par_iter().map(|&atom| {
                let candidates = expand::expand_atom(&estimates, self.symmetry, atom)?;
                fit_candidates(atom, &candidates)
            }).collect()
        } else {
            let expanded = expand::expand(&estimates, self.symmetry, self.targets)?;
            expanded.iter().map(|(&atom, candidates)| fit_candidates(atom, candidates)).collect()
        }
    }
}

fn displaced_fields<F: Clone>(
    input: &RunInput,
    name: &str,
    get: impl Fn(&Snapshot) -> Option<&F>,
) -> Result<Vec<F>, DerivError> {
    input.displaced.iter().enumerate().map(|(disp, snapshot)| match get(snapshot) {
        Some(field) => Ok(field.clone()),
        None => dataset_bail!("the reference has a {} but displaced snapshot {} does not", name, disp),
    }).collect()
}

fn required_atoms(input: &RunInput, structure: &Structure, symprec: f64) -> Result<BTreeSet<usize>, DerivError> {
    let num_atoms = structure.num_atoms();
    let atoms: BTreeSet<usize> = match &input.atoms {
        Some(atoms) => atoms.iter().cloned().collect(),
        None => primitive_cell_atoms(&input.cell_transform, structure, symprec)?,
    };
    if atoms.is_empty() {
        dataset_bail!("no atoms to compute derivatives for");
    }
    if let Some(&atom) = atoms.iter().find(|&&atom| atom >= num_atoms) {
        dataset_bail!("requested atom {} is out of range for {} atoms", atom, num_atoms);
    }
    Ok(atoms)
}

/// One supercell atom for each atom of the primitive cell.
///
/// Supercell atoms related by a primitive lattice translation are images of
/// the same primitive atom; the lowest index among them represents it.
fn primitive_cell_atoms(transform: &CellTransform, structure: &Structure, symprec: f64) -> Result<BTreeSet<usize>, DerivError> {
    let primitive = transform.primitive_lattice(structure.lattice())?;
    let m = transform.supercell_in_primitive(structure.lattice())?.map(f64::from);
    let multiplicity = m.det().abs().round() as usize;
    let prim_fracs: Vec<V3> = structure.to_fracs().iter().map(|x| *x * &m).collect();

    let mut representatives: Vec<usize> = vec![];
    let mut images: Vec<usize> = vec![];
    for (atom, y) in prim_fracs.iter().enumerate() {
        let found = representatives.iter().position(|&rep| {
            let diff = *y - prim_fracs[rep];
            ((diff - diff.round()) * &primitive).norm() < symprec
        });
        match found {
            Some(i) => images[i] += 1,
            None => {
                representatives.push(atom);
                images.push(1);
            },
        }
    }

    if representatives.len() * multiplicity != structure.num_atoms() || images.iter().any(|&n| n != multiplicity) {
        dataset_bail!(
            "{} atoms fall into {} primitive atoms with image counts {:?}, but the supercell holds {} primitive cells",
            structure.num_atoms(), representatives.len(), images, multiplicity,
        );
    }
    trace!("Primitive cell atoms: {:?}", representatives);
    Ok(representatives.into_iter().collect())
}
