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

//! Periodic structures and the symmetry operations that act on them.

#[macro_use] extern crate log;
#[macro_use] extern crate failure;

#[derive(Debug, Fail)]
#[fail(display = "Not nearly an integer: {}", value)]
pub struct IntPrecisionError {
    value: f64,
}

mod base;
mod oper;
mod util;

//---------------------------
// public reexports; API

pub use crate::base::lattice::Lattice;
pub use crate::base::structure::{Structure, Site};

pub use crate::oper::perm::{Perm, Permute, BadPerm};
pub use crate::oper::symmops::{
    SpaceOp, SymmetryOperationSet, OperationInput, SymmetryError, OperI,
    cartesian_rotation,
};
pub use crate::oper::angular;

pub use crate::util::Tol;
