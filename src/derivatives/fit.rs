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

use elph_linalg::{left_pseudoinverse, matrix_from_rows};
use itertools::izip;
use serde::{Serialize, Deserialize};

use crate::DerivError;
use crate::expand::Candidate;
use crate::field::Field;

/// Relative residual above which a fit is reported as suspicious.
const RESIDUAL_WARN_THRESHOLD: f64 = 1e-2;

/// The derivative of a field with respect to the cartesian
/// displacement of one atom. `components[k]` is `dF/du_k`.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeTensor<F> {
    pub atom: usize,
    pub components: [F; 3],
}

impl<F> DerivativeTensor<F> {
    pub fn component(&self, axis: usize) -> &F { &self.components[axis] }

    /// Transform each component, e.g. to resample it.
    pub fn try_map<G, E>(self, mut f: impl FnMut(F) -> Result<G, E>) -> Result<DerivativeTensor<G>, E> {
        let DerivativeTensor { atom, components: [x, y, z] } = self;
        Ok(DerivativeTensor { atom, components: [f(x)?, f(y)?, f(z)?] })
    }
}

/// Solve `A X = B` in the least squares sense, where the rows of `A`
/// are the candidate directions and the rows of `B` their values.
///
/// The pseudoinverse is computed once and applied to every entry of the field.
pub fn fit<F: Field>(
    atom: usize,
    candidates: &[Candidate<F>],
    rank_tolerance: f64,
) -> Result<DerivativeTensor<F>, DerivError> {
    let underdetermined = || DerivError::UnderdeterminedFit { atom, candidates: candidates.len() };

    let first = match candidates.first() {
        Some(c) => &c.value,
        None => return Err(underdetermined()),
    };
    if let Some(c) = candidates.iter().find(|c| !c.value.same_shape(first)) {
        dataset_bail!(
            "atom {}: candidate from estimate {} has shape {}, expected {}",
            atom, c.estimate, c.value.shape_description(), first.shape_description(),
        );
    }

    let directions: Vec<_> = candidates.iter().map(|c| c.direction).collect();
    let a = matrix_from_rows(&directions);
    let pinv = left_pseudoinverse(&a, rank_tolerance).map_err(|e| {
        debug!("Atom {}: {}", atom, e);
        underdetermined()
    })?;

    let len = first.values().len();
    let mut solved = [vec![0.0; len], vec![0.0; len], vec![0.0; len]];
    for (k, candidate) in candidates.iter().enumerate() {
        for (c, out) in solved.iter_mut().enumerate() {
            let weight = pinv[(c, k)];
            for (x, &b) in izip!(out.iter_mut(), candidate.value.values()) {
                *x += weight * b;
            }
        }
    }

    let residual = relative_residual(candidates, &solved);
    if residual > RESIDUAL_WARN_THRESHOLD {
        warn!(
            "Atom {}: symmetry-equivalent estimates disagree (relative residual {:.3e})",
            atom, residual,
        );
    } else {
        debug!("Atom {}: fit {} candidates, relative residual {:.3e}", atom, candidates.len(), residual);
    }

    let [x, y, z] = solved;
    Ok(DerivativeTensor {
        atom,
        components: [first.with_values(x), first.with_values(y), first.with_values(z)],
    })
}

// |A X - B| / |B|
fn relative_residual<F: Field>(candidates: &[Candidate<F>], solved: &[Vec<f64>; 3]) -> f64 {
    let (mut num, mut denom) = (0.0, 0.0);
    for candidate in candidates {
        let d = candidate.direction;
        for (i, &b) in candidate.value.values().iter().enumerate() {
            let predicted = d[0] * solved[0][i] + d[1] * solved[1][i] + d[2] * solved[2][i];
            num += (predicted - b) * (predicted - b);
            denom += b * b;
        }
    }
    if denom == 0.0 { 0.0 } else { (num / denom).sqrt() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elph_array_types::V3;
    use elph_assert_close::assert_close;
    use elph_structure::OperI;
    use crate::field::GridField;
    use crate::finite_difference::EstI;

    fn grid(values: Vec<f64>) -> GridField
    { GridField::new([1, 1, values.len()], 1, values).unwrap() }

    // candidate values consistent with the derivative d/du = (x, y, z) per point
    fn candidates(truth: &[V3], directions: &[V3]) -> Vec<Candidate<GridField>> {
        directions.iter().enumerate().map(|(k, d)| {
            let d = d.unit();
            Candidate {
                direction: d,
                value: grid(truth.iter().map(|t| t.dot(&d)).collect()),
                oper: OperI(k),
                estimate: EstI(0),
            }
        }).collect()
    }

    #[test]
    fn exact_for_consistent_candidates() {
        let truth = vec![V3([1.0, -2.0, 0.5]), V3([0.0, 3.0, 4.0]), V3([-1.0, 1.0, 1.0])];
        let directions = vec![
            V3([1.0, 0.0, 0.0]), V3([0.0, 1.0, 0.0]), V3([0.0, 0.0, 1.0]),
            V3([1.0, 1.0, 0.0]), V3([-1.0, 0.0, 2.0]), V3([1.0, 1.0, 1.0]),
        ];
        let tensor = fit(7, &candidates(&truth, &directions), 1e-6).unwrap();
        assert_eq!(tensor.atom, 7);
        for axis in 0..3 {
            let expected: Vec<_> = truth.iter().map(|t| t[axis]).collect();
            assert_close!(abs=1e-12, tensor.component(axis).values(), &expected[..]);
        }
    }

    #[test]
    fn underdetermined() {
        let truth = vec![V3([1.0, 2.0, 3.0])];
        let check = |directions: Vec<V3>| match fit(3, &candidates(&truth, &directions), 1e-6) {
            Err(DerivError::UnderdeterminedFit { atom: 3, candidates }) => {
                assert_eq!(candidates, directions.len());
            },
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        };
        check(vec![]);
        check(vec![V3([1.0, 0.0, 0.0]), V3([0.0, 1.0, 0.0])]);
        // plenty of rows, but all in the xy plane
        check(vec![
            V3([1.0, 0.0, 0.0]), V3([0.0, 1.0, 0.0]),
            V3([1.0, 1.0, 0.0]), V3([-1.0, 0.0, 0.0]),
        ]);
    }

    #[test]
    fn inconsistent_candidates_still_fit() {
        let truth = vec![V3([1.0, 0.0, 0.0])];
        let mut cands = candidates(&truth, &[
            V3([1.0, 0.0, 0.0]), V3([-1.0, 0.0, 0.0]),
            V3([0.0, 1.0, 0.0]), V3([0.0, 0.0, 1.0]),
        ]);
        // the -x estimate says the slope is 0.8 instead of 1
        cands[1].value = grid(vec![-0.8]);
        let tensor = fit(0, &cands, 1e-6).unwrap();
        assert_close!(abs=1e-12, tensor.component(0).values()[0], 0.9);
    }

    #[test]
    fn try_map_keeps_atom() {
        let tensor = DerivativeTensor { atom: 4, components: [1, 2, 3] };
        let mapped = tensor.try_map(|x| Ok::<_, ()>(x * 10)).unwrap();
        assert_eq!(mapped, DerivativeTensor { atom: 4, components: [10, 20, 30] });
    }
}
