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

//! Fixed-size 3-vectors and 3x3 matrices.
//!
//! These are used like a public dependency throughout the workspace, so the
//! API is deliberately small: construction, elementwise mapping, products,
//! and the handful of decompositions that crystal geometry needs.

mod types;
mod ops;
mod methods_v;
mod methods_m;

pub use crate::types::*;
pub use crate::methods_v::dot;
pub use crate::methods_m::inv;
