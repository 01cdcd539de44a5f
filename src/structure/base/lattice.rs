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

use std::ops::{Mul, Div};
use std::sync::Arc;

use elph_array_types::{V3, M33, M3};
use elph_assert_close::{CheckClose, Tolerances, CheckCloseError};

use crate::util::Tol;

/// Defines a vector basis for periodic boundary conditions in three dimensions.
///
/// Lattice vectors are the rows of the matrix, in angstroms. Fractional row
/// vectors become cartesian by `frac * &lattice`, and the reverse is
/// `cart / &lattice`.
#[derive(Debug, Clone)]
pub struct Lattice {
    matrix: Arc<M33>,
    inverse: Arc<M33>,
}

// Manual impl that doesn't compare the inverse.
impl PartialEq<Lattice> for Lattice {
    fn eq(&self, other: &Lattice) -> bool {
        // deconstruct to get errors when new fields are added
        let Lattice { ref matrix, inverse: _ } = *self;
        matrix == &other.matrix
    }
}

impl Lattice {
    /// Create a lattice from a matrix where the rows are lattice vectors.
    #[inline]
    pub fn new(matrix: &M33) -> Self {
        let inverse = Arc::new(matrix.inv());
        let matrix = Arc::new(*matrix);
        Self { matrix, inverse }
    }

    #[inline(always)]
    pub fn from_vectors(vectors: &[V3; 3]) -> Self {
        Self::new(&M3(*vectors))
    }

    /// Matrix where lattice vectors are rows.
    #[inline]
    pub fn matrix(&self) -> &M33
    { &self.matrix }

    /// Get the (precomputed) inverse of the matrix where lattice vectors are rows.
    #[inline]
    pub fn inverse_matrix(&self) -> &M33
    { &self.inverse }

    #[inline]
    pub fn vectors(&self) -> &[V3; 3]
    { &self.matrix().0 }

    pub fn norms(&self) -> [f64; 3]
    {
        let v = self.vectors();
        [v[0].norm(), v[1].norm(), v[2].norm()]
    }

    /// Get the (positive) volume of the lattice cell.
    pub fn volume(&self) -> f64
    { self.matrix().det().abs() }

    /// Take an integer linear combination of the lattice vectors.
    ///
    /// With a supercell matrix `S`, this produces the supercell lattice.
    pub fn linear_combination(&self, coeffs: &M33<i32>) -> Lattice
    { &coeffs.map(f64::from) * self }

    /// Find the integer matrix `M` such that `self = M * other`.
    ///
    /// This exists when every vector of `self` is a lattice point of `other`,
    /// i.e. when `self` describes a supercell of `other`. `tol` is an
    /// absolute tolerance on the integerness of the elements of `M`.
    pub fn integer_relation(&self, other: &Lattice, tol: f64) -> Option<M33<i32>>
    {
        let m = self.matrix() * other.inverse_matrix();
        match Tol(tol).unfloat_m33(&m) {
            Ok(m) if m.det() != 0 => Some(m),
            _ => None,
        }
    }
}

/// Helper constructors
impl Lattice {
    /// The identity lattice.
    #[inline]
    pub fn eye() -> Self { Self::cubic(1.0) }

    /// A cubic lattice ((a, a, a), (90, 90, 90))
    #[inline]
    pub fn cubic(a: f64) -> Self { Self::orthorhombic(a, a, a) }

    /// An orthorhombic lattice ((a, b, c), (90, 90, 90))
    #[inline]
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Self
    { Self::from(&[[a, 0., 0.], [0., b, 0.], [0., 0., c]]) }
}

/// Defaults to the identity matrix.
impl Default for Lattice {
    #[inline]
    fn default() -> Lattice { Lattice::eye() }
}

impl<'a> From<&'a [[f64; 3]; 3]> for Lattice {
    #[inline(always)]
    fn from(m: &'a [[f64; 3]; 3]) -> Self
    { Lattice::new(&M33::from_array(*m)) }
}

impl<'a, 'b> Mul<&'b Lattice> for &'a M33 {
    type Output = Lattice;

    fn mul(self, other: &'b Lattice) -> Lattice {
        // Let the inverse be computed from scratch,
        // for sustained accuracy after many products
        Lattice::new(&(self * other.matrix()))
    }
}

impl<'a, 'b> Mul<&'b Lattice> for &'a V3 {
    type Output = V3;

    fn mul(self, other: &'b Lattice) -> V3 {
        self * other.matrix()
    }
}

impl<'b> Mul<&'b Lattice> for V3 {
    type Output = V3;

    fn mul(self, other: &'b Lattice) -> V3 {
        self * other.matrix()
    }
}

impl<'a, 'b> Div<&'b Lattice> for &'a V3 {
    type Output = V3;

    fn div(self, other: &'b Lattice) -> V3 {
        self * other.inverse_matrix()
    }
}

impl<'b> Div<&'b Lattice> for V3 {
    type Output = V3;

    fn div(self, other: &'b Lattice) -> V3 {
        self * other.inverse_matrix()
    }
}

impl CheckClose for Lattice {
    fn check_close(&self, other: &Lattice, tol: Tolerances) -> Result<(), CheckCloseError> {
        self.matrix().check_close(other.matrix(), tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_inverse() {
        // matrix whose inverse should be able to be computed exactly
        // by any reasonable matrix inversion algorithm working on f64s
        let matrix = M33::from_array([
            [2.0, 2.0, 0.0],
            [0.0, 4.0, 0.0],
            [0.0, 0.0, 2.0],
        ]);
        let exact_inverse = M33::from_array([
            [0.5, -0.25, 0.0],
            [0.0,  0.25, 0.0],
            [0.0,   0.0, 0.5],
        ]);

        let lattice = Lattice::new(&matrix);
        assert_eq!(&matrix, lattice.matrix());
        assert_eq!(&exact_inverse, lattice.inverse_matrix());
        assert_ne!(&Lattice::eye(), &lattice);
    }

    #[test]
    fn frac_cart_conversion() {
        let lattice = Lattice::from(&[
            [2.0, 0.0, 0.0],
            [1.0, 2.0, 0.0],
            [0.0, 0.0, 4.0],
        ]);
        let frac = V3([0.5, 0.5, 0.25]);
        let cart = frac * &lattice;
        assert_eq!(cart, V3([1.5, 1.0, 1.0]));
        elph_assert_close::assert_close!(cart / &lattice, frac);
    }

    #[test]
    fn supercell_relation() {
        let prim = Lattice::from(&[
            [-1.5, 1.5, 1.5],
            [1.5, -1.5, 1.5],
            [1.5, 1.5, -1.5],
        ]);
        let conventional = Lattice::cubic(3.0);
        let m = conventional.integer_relation(&prim, 1e-8).unwrap();
        assert_eq!(m, M33::from_array([[0, 1, 1], [1, 0, 1], [1, 1, 0]]));
        assert_eq!(prim.integer_relation(&conventional, 1e-8), None);

        let sc = conventional.linear_combination(&M33::from_array([[2, 0, 0], [0, 2, 0], [0, 0, 2]]));
        elph_assert_close::assert_close!(sc.volume(), 8.0 * 27.0);
    }
}
