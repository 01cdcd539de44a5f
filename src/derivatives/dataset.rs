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
use elph_newtype_indices::{Indexed, newtype_index};
use elph_structure::Structure;
use serde::{Serialize, Deserialize};

use crate::DerivError;

newtype_index!{
    /// Index of a displaced configuration.
    DispI
}

/// One displaced configuration: which atom moved, and by how much (cartesian, angstrom).
#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DisplacementRecord {
    pub atom: usize,
    pub displacement: V3,
}

impl DisplacementRecord {
    pub fn new(atom: usize, displacement: V3) -> Self
    { DisplacementRecord { atom, displacement } }

    /// Displace `atom` by `amplitude` along `direction` (which need not be normalized).
    pub fn along(atom: usize, direction: &V3, amplitude: f64) -> Self
    { DisplacementRecord { atom, displacement: direction.unit() * amplitude } }

    pub fn magnitude(&self) -> f64 { self.displacement.norm() }

    pub fn direction(&self) -> V3 { self.displacement.unit() }
}

/// The undisplaced structure together with every displacement applied to it.
#[derive(Debug, Clone)]
pub struct DisplacementDataset {
    structure: Structure,
    records: Indexed<DispI, DisplacementRecord>,
}

impl DisplacementDataset {
    pub fn new(structure: Structure, records: Vec<DisplacementRecord>) -> Result<Self, DerivError> {
        validate_records(&records, structure.num_atoms())?;
        Ok(DisplacementDataset { structure, records: Indexed::from_raw(records) })
    }

    pub fn structure(&self) -> &Structure { &self.structure }
    pub fn records(&self) -> &Indexed<DispI, DisplacementRecord> { &self.records }
    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }
}

pub(crate) fn validate_records(records: &[DisplacementRecord], num_atoms: usize) -> Result<(), DerivError> {
    for (disp, record) in records.iter().enumerate() {
        if record.atom >= num_atoms {
            dataset_bail!(
                "displacement {} moves atom {}, but the structure has {} atoms",
                disp, record.atom, num_atoms,
            );
        }
        let magnitude = record.magnitude();
        if !magnitude.is_finite() || magnitude == 0.0 {
            dataset_bail!("displacement {} has invalid magnitude {}", disp, magnitude);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use elph_assert_close::assert_close;
    use elph_structure::{Lattice, Site};

    fn structure() -> Structure {
        Structure::new(Lattice::cubic(3.0), vec![
            Site::new("Fe", V3([0.0, 0.0, 0.0]), 55.845),
            Site::new("Fe", V3([0.5, 0.5, 0.5]), 55.845),
        ])
    }

    #[test]
    fn rejects_bad_records() {
        let check = |records| match DisplacementDataset::new(structure(), records) {
            Err(DerivError::InconsistentDataset(_)) => {},
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        };
        check(vec![DisplacementRecord::new(2, V3([0.01, 0.0, 0.0]))]);
        check(vec![DisplacementRecord::new(0, V3::zero())]);
        check(vec![DisplacementRecord::new(0, V3([f64::NAN, 0.0, 0.0]))]);
    }

    #[test]
    fn record_direction() {
        let record = DisplacementRecord::new(0, V3([0.0, -0.02, 0.0]));
        assert_close!(record.magnitude(), 0.02);
        assert_close!(record.direction(), V3([0.0, -1.0, 0.0]));
    }
}
