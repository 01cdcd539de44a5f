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

use elph_structure::SymmetryError;

/// Every failure the derivative pipeline can detect.
///
/// All of these are fatal for a run; nothing is retried and nothing is
/// persisted after one is raised.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DerivError {
    #[error("inconsistent displacement dataset: {0}")]
    InconsistentDataset(String),

    #[error("symmetry mapping failed: {0}")]
    SymmetryMap(String),

    #[error("derivative of atom {atom} is underdetermined by its {candidates} candidate directions")]
    UnderdeterminedFit { atom: usize, candidates: usize },

    #[error("lattice mismatch: {0}")]
    LatticeMismatch(String),

    #[error("incomplete derivative: {0}")]
    IncompleteDerivative(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

impl From<SymmetryError> for DerivError {
    fn from(e: SymmetryError) -> Self { DerivError::SymmetryMap(e.to_string()) }
}

macro_rules! dataset_bail {
    ($($arg:tt)+) => {
        return Err($crate::DerivError::InconsistentDataset(format!($($arg)+)))
    };
}

macro_rules! symmetry_bail {
    ($($arg:tt)+) => {
        return Err($crate::DerivError::SymmetryMap(format!($($arg)+)))
    };
}
