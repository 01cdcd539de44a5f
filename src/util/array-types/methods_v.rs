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

use crate::types::*;

use num_traits::{Num, Zero};

impl<X> V3<X> {
    /// Get a zero vector.
    #[inline(always)]
    pub fn zero() -> Self
    where X: Zero + Copy,
    { V3([X::zero(); 3]) }

    /// Construct a vector from a function on indices.
    #[inline(always)]
    pub fn from_fn<F>(mut f: F) -> Self
    where F: FnMut(usize) -> X,
    { V3([f(0), f(1), f(2)]) }

    /// Apply a function to each element.
    #[inline]
    pub fn map<B, F>(&self, mut f: F) -> V3<B>
    where X: Copy, F: FnMut(X) -> B,
    { V3([f(self.0[0]), f(self.0[1]), f(self.0[2])]) }

    /// Apply a fallible function to each element, short-circuiting on the first error.
    #[inline]
    pub fn try_map<B, E, F>(&self, mut f: F) -> Result<V3<B>, E>
    where X: Copy, F: FnMut(X) -> Result<B, E>,
    { Ok(V3([f(self.0[0])?, f(self.0[1])?, f(self.0[2])?])) }
}

impl<X: Num + Copy> V3<X> {
    /// Dot product.
    #[inline]
    pub fn dot(&self, other: &V3<X>) -> X
    { self.0[0] * other.0[0] + self.0[1] * other.0[1] + self.0[2] * other.0[2] }

    /// Squared Euclidean norm.
    #[inline]
    pub fn sqnorm(&self) -> X
    { self.dot(self) }

    /// Cross product.
    #[inline]
    pub fn cross(&self, other: &V3<X>) -> V3<X>
    {
        let (a, b) = (&self.0, &other.0);
        V3([
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ])
    }
}

impl V3 {
    /// Euclidean norm.
    #[inline]
    pub fn norm(&self) -> f64
    { self.sqnorm().sqrt() }

    /// Vector of unit norm in the same direction.
    ///
    /// Produces NaNs for the zero vector.
    #[inline]
    pub fn unit(&self) -> V3
    { *self / self.norm() }

    /// Round each element to the nearest integer.
    #[inline]
    pub fn round(&self) -> V3
    { self.map(f64::round) }

    /// Reduce each element into the range `[0, 1)`.
    #[inline]
    pub fn fract_positive(&self) -> V3
    { self.map(|x| x - x.floor()) }
}

/// Free-function form of the dot product.
#[inline(always)]
pub fn dot<X: Num + Copy>(a: &V3<X>, b: &V3<X>) -> X
{ a.dot(b) }
