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

//! Raw derivative estimates from displaced snapshots.

use elph_array_types::V3;
use elph_newtype_indices::{Indexed, newtype_index};
use itertools::izip;
use serde::{Serialize, Deserialize};

use crate::DerivError;
use crate::dataset::{DispI, DisplacementRecord, validate_records};
use crate::field::Field;

newtype_index!{
    /// Index of a raw estimate.
    EstI
}

/// Two displacement directions count as opposite when their
/// unit vectors have a dot product below `-1 + ANTIPARALLEL_TOL`.
const ANTIPARALLEL_TOL: f64 = 1e-8;

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DifferenceScheme {
    /// Central differences for `±` pairs, forward differences for the rest.
    Auto,
    /// Every displacement must have an opposite partner.
    Central,
    /// Never pair displacements.
    Forward,
}

impl Default for DifferenceScheme {
    fn default() -> Self { DifferenceScheme::Auto }
}

/// The derivative of a field along one direction of one atom's motion.
#[derive(Debug, Clone)]
pub struct RawEstimate<F> {
    pub atom: usize,
    /// Unit cartesian direction.
    pub direction: V3,
    /// Effective step length (angstrom).
    pub step: f64,
    pub value: F,
    /// The displacements this was computed from; `+` first.
    pub records: Vec<DispI>,
}

/// Compute one estimate per displacement or `±` pair, in the order of
/// each estimate's first displacement.
///
/// `pair_tolerance` bounds the relative difference in magnitude between
/// the two halves of a pair.
pub fn compute<F: Field>(
    reference: &F,
    displaced: &[F],
    records: &[DisplacementRecord],
    num_atoms: usize,
    scheme: DifferenceScheme,
    pair_tolerance: f64,
) -> Result<Indexed<EstI, RawEstimate<F>>, DerivError> {
    if displaced.len() != records.len() {
        dataset_bail!(
            "{} displaced snapshots for {} displacement records",
            displaced.len(), records.len(),
        );
    }
    validate_records(records, num_atoms)?;
    for (disp, field) in displaced.iter().enumerate() {
        if !reference.same_shape(field) {
            dataset_bail!(
                "snapshot of displacement {} has shape {}, but the reference has shape {}",
                disp, field.shape_description(), reference.shape_description(),
            );
        }
    }

    let partners = match scheme {
        DifferenceScheme::Forward => vec![None; records.len()],
        DifferenceScheme::Auto |
        DifferenceScheme::Central => find_partners(records, pair_tolerance)?,
    };

    let mut out = Indexed::new();
    let (mut num_central, mut num_forward) = (0, 0);
    for (i, record) in records.iter().enumerate() {
        match partners[i] {
            // the minus half of a pair
            Some(j) if j < i => continue,
            Some(j) => {
                let other = &records[j];
                let span = record.magnitude() + other.magnitude();
                out.push(RawEstimate {
                    atom: record.atom,
                    direction: record.direction(),
                    step: 0.5 * span,
                    value: difference(&displaced[i], &displaced[j], span),
                    records: vec![DispI(i), DispI(j)],
                });
                num_central += 1;
            },
            None => {
                if scheme == DifferenceScheme::Central {
                    dataset_bail!(
                        "central differences requested, but displacement {} of atom {} has no opposite",
                        i, record.atom,
                    );
                }
                let step = record.magnitude();
                out.push(RawEstimate {
                    atom: record.atom,
                    direction: record.direction(),
                    step,
                    value: difference(&displaced[i], reference, step),
                    records: vec![DispI(i)],
                });
                num_forward += 1;
            },
        }
    }
    debug!(
        "{} central and {} forward difference estimates from {} displacements",
        num_central, num_forward, records.len(),
    );
    Ok(out)
}

// (a - b) / denom
fn difference<F: Field>(a: &F, b: &F, denom: f64) -> F {
    let values = izip!(a.values(), b.values())
        .map(|(a, b)| (a - b) / denom)
        .collect();
    a.with_values(values)
}

// partners[i] = Some(j) when i and j form a pair.
fn find_partners(records: &[DisplacementRecord], pair_tolerance: f64) -> Result<Vec<Option<usize>>, DerivError> {
    let mut partners = vec![None; records.len()];
    for i in 0..records.len() {
        if partners[i].is_some() {
            continue;
        }
        let (plus, plus_dir) = (&records[i], records[i].direction());
        let found = (i + 1..records.len()).find(|&j| {
            partners[j].is_none()
                && records[j].atom == plus.atom
                && plus_dir.dot(&records[j].direction()) < -1.0 + ANTIPARALLEL_TOL
        });
        if let Some(j) = found {
            let (a, b) = (plus.magnitude(), records[j].magnitude());
            if (a - b).abs() > pair_tolerance * a {
                dataset_bail!(
                    "displacements {} and {} of atom {} are opposite but differ in magnitude ({} vs {})",
                    i, j, plus.atom, a, b,
                );
            }
            trace!("Pairing displacements {} and {} of atom {}", i, j, plus.atom);
            partners[i] = Some(j);
            partners[j] = Some(i);
        }
    }
    Ok(partners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use elph_assert_close::assert_close;
    use crate::field::GridField;

    // two grid points, each a quadratic in the displacement of atom 0 along x
    fn quadratic(u: f64) -> GridField {
        let coeffs = [(1.0, 2.0, 5.0), (-3.0, 0.5, -7.0)];
        let data = coeffs.iter().map(|&(a, b, c)| a + b * u + c * u * u).collect();
        GridField::new([1, 1, 2], 1, data).unwrap()
    }

    fn along_x(atom: usize, u: f64) -> DisplacementRecord
    { DisplacementRecord::new(atom, V3([u, 0.0, 0.0])) }

    #[test]
    fn central_is_exact_for_quadratics() {
        let h = 0.01;
        let estimates = compute(
            &quadratic(0.0),
            &[quadratic(h), quadratic(-h)],
            &[along_x(0, h), along_x(0, -h)],
            2, DifferenceScheme::Auto, 1e-3,
        ).unwrap();

        assert_eq!(estimates.len(), 1);
        let est = &estimates[EstI(0)];
        assert_eq!(est.atom, 0);
        assert_eq!(est.records, vec![DispI(0), DispI(1)]);
        assert_close!(est.direction, V3([1.0, 0.0, 0.0]));
        assert_close!(est.step, h);
        assert_close!(rel=1e-10, est.value.values(), &[2.0, 0.5][..]);
    }

    #[test]
    fn forward_error_is_linear_in_step() {
        let error = |h: f64| {
            let estimates = compute(
                &quadratic(0.0), &[quadratic(h)], &[along_x(0, h)],
                2, DifferenceScheme::Auto, 1e-3,
            ).unwrap();
            estimates[EstI(0)].value.values()[0] - 2.0
        };
        // error is c * h exactly
        assert_close!(rel=1e-6, error(0.02), 5.0 * 0.02);
        assert_close!(rel=1e-6, error(0.02) / error(0.01), 2.0);
    }

    #[test]
    fn schemes() {
        let reference = quadratic(0.0);
        let displaced = [quadratic(0.01), quadratic(-0.01), quadratic(0.01)];
        let records = [along_x(0, 0.01), along_x(0, -0.01), along_x(1, 0.01)];

        let auto = compute(&reference, &displaced, &records, 2, DifferenceScheme::Auto, 1e-3).unwrap();
        assert_eq!(auto.len(), 2);
        assert_eq!(auto[EstI(1)].records, vec![DispI(2)]);

        let forward = compute(&reference, &displaced, &records, 2, DifferenceScheme::Forward, 1e-3).unwrap();
        assert_eq!(forward.len(), 3);
        // the minus displacement becomes a forward estimate along -x
        assert_close!(forward[EstI(1)].direction, V3([-1.0, 0.0, 0.0]));

        match compute(&reference, &displaced, &records, 2, DifferenceScheme::Central, 1e-3) {
            Err(DerivError::InconsistentDataset(_)) => {},
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn inconsistent_inputs() {
        let reference = quadratic(0.0);
        let check = |result: Result<Indexed<EstI, RawEstimate<GridField>>, DerivError>| match result {
            Err(DerivError::InconsistentDataset(_)) => {},
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        };

        // pair magnitudes differ by 10%
        check(compute(
            &reference, &[quadratic(0.01), quadratic(-0.011)],
            &[along_x(0, 0.01), along_x(0, -0.011)],
            2, DifferenceScheme::Auto, 1e-3,
        ));
        // count mismatch
        check(compute(&reference, &[quadratic(0.01)], &[], 2, DifferenceScheme::Auto, 1e-3));
        // atom out of range
        check(compute(&reference, &[quadratic(0.01)], &[along_x(2, 0.01)], 2, DifferenceScheme::Auto, 1e-3));
        // zero displacement
        check(compute(&reference, &[quadratic(0.01)], &[along_x(0, 0.0)], 2, DifferenceScheme::Auto, 1e-3));
        // shape mismatch
        let wrong = GridField::new([2, 1, 1], 2, vec![0.0; 4]).unwrap();
        check(compute(&reference, &[wrong], &[along_x(0, 0.01)], 2, DifferenceScheme::Auto, 1e-3));
    }

    #[test]
    fn pairs_need_the_same_atom() {
        let reference = quadratic(0.0);
        let estimates = compute(
            &reference, &[quadratic(0.01), quadratic(-0.01)],
            &[along_x(0, 0.01), along_x(1, -0.01)],
            2, DifferenceScheme::Auto, 1e-3,
        ).unwrap();
        assert_eq!(estimates.len(), 2);
    }
}
