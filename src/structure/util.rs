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

use crate::IntPrecisionError;

use elph_array_types::{V3, M33, M3};

// these f64 -> i32 conversions are written on a silly little type
// simply to avoid having a function with a signature like 'fn f(x: f64, tol: f64)'
// where the arguments could be swapped
pub struct Tol(pub f64);

impl Tol {
    pub fn unfloat(&self, x: f64) -> Result<i32, IntPrecisionError>
    {
        let r = x.round();
        if !((r - x).abs() <= self.0) {
            return Err(IntPrecisionError { value: x });
        }
        Ok(r as i32)
    }

    fn unfloat_v3(&self, v: &V3) -> Result<V3<i32>, IntPrecisionError>
    { v.try_map(|x| self.unfloat(x)) }

    pub fn unfloat_m33(&self, m: &M33) -> Result<M33<i32>, IntPrecisionError>
    {
        Ok(M3([
            self.unfloat_v3(&m[0])?,
            self.unfloat_v3(&m[1])?,
            self.unfloat_v3(&m[2])?,
        ]))
    }
}

/// Fractional difference reduced to the image nearest the origin, per axis.
///
/// This is not the true minimum image for strongly skewed cells, but it is
/// exact whenever the two points coincide modulo the lattice, which is all
/// that position matching needs.
pub(crate) fn reduced_frac_diff(a: &V3, b: &V3) -> V3
{ (a - b).map(|x| x - x.round()) }
