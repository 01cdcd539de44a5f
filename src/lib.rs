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

//! Displacement derivatives of electronic structure fields.
//!
//! This crate gathers the workspace under one name; the work is done in
//! `elph_derivatives`, on top of the types in `elph_structure`.

pub use elph_array_types as array_types;
pub use elph_structure as structure;
pub use elph_derivatives as derivatives;

pub use elph_derivatives::{
    run, RunInput, Snapshot, CellTransform, SymmetryInput,
    Settings, Interpolation, YamlRead, Field,
    DerivativeStore, DerivativeTensor, DerivError, FailResult,
    DisplacementRecord, GridField, ChannelField, ChannelMap, SampledGrid,
    DifferenceScheme, DEFAULT_INTERPOLATION_ACCURACY, fft_mesh_from_cutoff,
};

pub mod logging;

pub use crate::logging::GlobalLogger;
