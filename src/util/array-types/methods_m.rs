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

//! Methods of the 3x3 matrix type.
//!
//! This library primarily uses a row-based formalism; matrices are conceptually
//! understood to be containers of row-vectors. Lattices are stored with one
//! lattice vector per row, so fractional coordinates become cartesian through
//! `frac * lattice`.

use crate::types::*;

use num_traits::{Num, Zero, One};

impl<X> M33<X> {
    /// Construct a matrix from a function on `(row, col)` indices.
    #[inline]
    pub fn from_fn<F>(mut f: F) -> Self
    where F: FnMut(usize, usize) -> X,
    { M3([
        V3([f(0, 0), f(0, 1), f(0, 2)]),
        V3([f(1, 0), f(1, 1), f(1, 2)]),
        V3([f(2, 0), f(2, 1), f(2, 2)]),
    ])}

    /// Construct a matrix from a nested array of rows.
    #[inline]
    pub fn from_array(arr: [[X; 3]; 3]) -> Self
    {
        let [a, b, c] = arr;
        M3([V3(a), V3(b), V3(c)])
    }

    /// Recover the nested array of rows.
    #[inline]
    pub fn into_array(self) -> [[X; 3]; 3]
    {
        let M3([V3(a), V3(b), V3(c)]) = self;
        [a, b, c]
    }

    /// Apply a function to each element.
    #[inline]
    pub fn map<B, F>(&self, mut f: F) -> M33<B>
    where X: Copy, F: FnMut(X) -> B,
    { M33::from_fn(|r, c| f(self[r][c])) }

    /// Apply a fallible function to each element.
    pub fn try_map<B, E, F>(&self, mut f: F) -> Result<M33<B>, E>
    where X: Copy, F: FnMut(X) -> Result<B, E>,
    {
        Ok(M3([
            self[0].try_map(&mut f)?,
            self[1].try_map(&mut f)?,
            self[2].try_map(&mut f)?,
        ]))
    }

    /// Matrix transpose.
    #[inline]
    pub fn t(&self) -> Self
    where X: Copy,
    { M33::from_fn(|r, c| self[c][r]) }

    /// Get the matrix of all zeros.
    #[inline]
    pub fn zero() -> Self
    where X: Zero + Copy,
    { M3([V3::zero(); 3]) }

    /// Get the identity matrix.
    #[inline]
    pub fn eye() -> Self
    where X: Zero + One + Copy,
    { M33::from_fn(|r, c| if r == c { X::one() } else { X::zero() }) }

    /// Read a column as a vector.
    #[inline]
    pub fn col(&self, c: usize) -> V3<X>
    where X: Copy,
    { V3::from_fn(|r| self[r][c]) }
}

impl<X: Num + Copy> M33<X> {
    /// Matrix determinant.
    pub fn det(&self) -> X
    {
        let m = &self.0;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Sum of the diagonal.
    #[inline]
    pub fn trace(&self) -> X
    { self[0][0] + self[1][1] + self[2][2] }

    /// Transposed matrix of cofactors, so that `m * m.adjugate() == det * eye`.
    fn adjugate(&self) -> Self
    {
        let m = &self.0;
        let cof = |r0: usize, r1: usize, c0: usize, c1: usize| {
            m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
        };
        let z = X::zero();
        M3([
            V3([cof(1, 2, 1, 2), z - cof(0, 2, 1, 2), cof(0, 1, 1, 2)]),
            V3([z - cof(1, 2, 0, 2), cof(0, 2, 0, 2), z - cof(0, 1, 0, 2)]),
            V3([cof(1, 2, 0, 1), z - cof(0, 2, 0, 1), cof(0, 1, 0, 1)]),
        ])
    }
}

impl M33 {
    /// Matrix inverse.
    ///
    /// Singular matrices produce non-finite elements; callers that cannot
    /// rule this out should check `det()` first.
    pub fn inv(&self) -> M33
    {
        let det = self.det();
        self.adjugate().map(|x| x / det)
    }

    /// Largest absolute difference between corresponding elements.
    pub fn max_abs_diff(&self, other: &M33) -> f64
    {
        (0..3).flat_map(|r| (0..3).map(move |c| (r, c)))
            .map(|(r, c)| (self[r][c] - other[r][c]).abs())
            .fold(0.0, f64::max)
    }
}

impl M33<i32> {
    /// Inverse of an integer matrix with determinant `±1`.
    ///
    /// Returns `None` for any other determinant, since the inverse would not be integral.
    pub fn unimodular_inv(&self) -> Option<M33<i32>>
    {
        match self.det() {
            1 => Some(self.adjugate()),
            -1 => Some(self.adjugate().map(|x| -x)),
            _ => None,
        }
    }
}

/// Free-function form of `M33::inv`.
#[inline(always)]
pub fn inv(m: &M33) -> M33
{ m.inv() }
