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

//! Symmetry completion of raw estimates.

use std::collections::{BTreeMap, BTreeSet};

use elph_array_types::V3;
use elph_newtype_indices::Indexed;
use elph_structure::{OperI, SymmetryOperationSet};

use crate::DerivError;
use crate::field::Field;
use crate::finite_difference::{EstI, RawEstimate};

/// An estimate carried to another atom (or direction) by a space group operation.
#[derive(Debug, Clone)]
pub struct Candidate<F> {
    /// Rotated unit direction `R d`.
    pub direction: V3,
    pub value: F,
    pub oper: OperI,
    pub estimate: EstI,
}

/// Every candidate for every target atom.
///
/// Each target gets an entry, even if nothing reaches it. Candidates are
/// listed in `(estimate, operation)` order, and duplicates are retained.
pub fn expand<F: Field>(
    estimates: &Indexed<EstI, RawEstimate<F>>,
    symmetry: &SymmetryOperationSet,
    targets: &BTreeSet<usize>,
) -> Result<BTreeMap<usize, Vec<Candidate<F>>>, DerivError> {
    targets.iter()
        .map(|&atom| Ok((atom, expand_atom(estimates, symmetry, atom)?)))
        .collect()
}

/// Candidates for a single atom.
pub fn expand_atom<F: Field>(
    estimates: &Indexed<EstI, RawEstimate<F>>,
    symmetry: &SymmetryOperationSet,
    target: usize,
) -> Result<Vec<Candidate<F>>, DerivError> {
    let num_atoms = symmetry.num_atoms();
    if target >= num_atoms {
        symmetry_bail!("target atom {} is out of range for {} atoms", target, num_atoms);
    }

    let mut out = vec![];
    for (estimate, raw) in estimates.iter_enumerated() {
        if raw.atom >= num_atoms {
            symmetry_bail!("estimate {} is for atom {}, but symmetry covers {} atoms", estimate, raw.atom, num_atoms);
        }
        for (oper, op) in symmetry.iter_enumerated() {
            if op.atom_map()[raw.atom] != target {
                continue;
            }
            out.push(Candidate {
                direction: op.rotate_cart(&raw.direction),
                value: raw.value.rotated(op)?,
                oper,
                estimate,
            });
        }
    }
    trace!("Atom {}: {} candidates", target, out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use elph_array_types::M33;
    use elph_assert_close::assert_close;
    use elph_structure::{Lattice, Site, Structure};
    use crate::dataset::DispI;
    use crate::field::{ChannelField, ChannelMap};

    fn bcc() -> Structure {
        Structure::new(Lattice::cubic(3.0), vec![
            Site::new("Fe", V3([0.0, 0.0, 0.0]), 55.845),
            Site::new("Fe", V3([0.5, 0.5, 0.5]), 55.845),
        ])
    }

    fn symmetry() -> SymmetryOperationSet {
        SymmetryOperationSet::from_operations(&bcc(), &[
            (M33::eye(), V3::zero()),
            (M33::from_array([[0, 0, 1], [1, 0, 0], [0, 1, 0]]), V3::zero()),
            (M33::from_array([[-1, 0, 0], [0, -1, 0], [0, 0, 1]]), V3([0.5, 0.5, 0.5])),
        ], 1e-5).unwrap()
    }

    // an s-channel scalar on each site; only site 0 is nonzero
    fn estimate() -> RawEstimate<ChannelField> {
        let maps = vec![ChannelMap::new(vec![0]).unwrap(); 2];
        RawEstimate {
            atom: 0,
            direction: V3([1.0, 0.0, 0.0]),
            step: 0.01,
            value: ChannelField::new(maps, vec![3.0, 0.0]).unwrap(),
            records: vec![DispI(0)],
        }
    }

    #[test]
    fn candidates_follow_the_atoms() {
        let estimates = Indexed::from_raw(vec![estimate()]);
        let targets = vec![0, 1].into_iter().collect();
        let expanded = expand(&estimates, &symmetry(), &targets).unwrap();

        let on_0 = &expanded[&0];
        assert_eq!(on_0.iter().map(|c| c.oper).collect::<Vec<_>>(), vec![OperI(0), OperI(1)]);
        assert_close!(abs=1e-12, on_0[0].direction, V3([1.0, 0.0, 0.0]));
        assert_close!(abs=1e-12, on_0[1].direction, V3([0.0, 1.0, 0.0]));

        let on_1 = &expanded[&1];
        assert_eq!(on_1.len(), 1);
        assert_eq!(on_1[0].oper, OperI(2));
        assert_close!(abs=1e-12, on_1[0].direction, V3([-1.0, 0.0, 0.0]));
        // the value moved with the atom
        assert_close!(abs=1e-12, on_1[0].value.values(), &[0.0, 3.0][..]);
    }

    #[test]
    fn redundancy_is_kept() {
        let estimates = Indexed::from_raw(vec![estimate(), estimate()]);
        let candidates = expand_atom(&estimates, &symmetry(), 0).unwrap();
        assert_eq!(candidates.len(), 4);
        assert_eq!(candidates[2].estimate, EstI(1));
        assert_eq!(candidates[2].oper, OperI(0));
    }

    #[test]
    fn unreachable_targets_get_empty_lists() {
        let estimates = Indexed::from_raw(vec![estimate()]);
        let symmetry = SymmetryOperationSet::identity_only(&bcc());
        let targets = vec![1].into_iter().collect();
        let expanded = expand(&estimates, &symmetry, &targets).unwrap();
        assert!(expanded[&1].is_empty());
    }

    #[test]
    fn out_of_range() {
        let estimates = Indexed::from_raw(vec![estimate()]);
        match expand_atom(&estimates, &symmetry(), 2) {
            Err(DerivError::SymmetryMap(_)) => {},
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }
}
