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

//! Settings threaded through `run`.
//!
//! The functions here make use of serde_ignored to catch typos in the config.
//! Use the `YamlRead` trait rather than calling `serde_yaml` directly.

use std::io::Read;

use serde::{Serialize, Deserialize};

use crate::DerivError;
use crate::finite_difference::DifferenceScheme;
use crate::interpolate::DEFAULT_INTERPOLATION_ACCURACY;

/// Newest settings format understood by this crate.
pub const MAX_VERSION: u32 = 1;

/// Provides an alternative to `serde_yaml::from_reader` that warns about
/// unrecognized keys.
pub trait YamlRead: for<'de> Deserialize<'de> {
    fn from_reader(mut r: impl Read) -> Result<Self, serde_yaml::Error>
    { YamlRead::from_dyn_reader(&mut r) }

    fn from_dyn_reader(r: &mut dyn Read) -> Result<Self, serde_yaml::Error> {
        // serde_ignored needs a Deserializer, and serde_yaml only offers
        // one over a Value.
        Self::from_value(serde_yaml::from_reader(r)?)
    }

    fn from_value(value: serde_yaml::Value) -> Result<Self, serde_yaml::Error>;
}

macro_rules! derive_yaml_read {
    ($Type:ty) => {
        impl YamlRead for $Type {
            fn from_value(value: serde_yaml::Value) -> Result<$Type, serde_yaml::Error> {
                serde_ignored::deserialize(
                    value,
                    |path| warn!("Unused config item (possible typo?): {}", path),
                )
            }
        }
    };
}

derive_yaml_read!{Settings}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    #[serde(default = "defaults::version")]
    pub version: u32,

    #[serde(default)]
    pub difference_scheme: DifferenceScheme,

    /// Relative tolerance on the magnitudes of a `±` displacement pair.
    #[serde(default = "defaults::pair_tolerance")]
    pub pair_tolerance: f64,

    /// Cartesian tolerance (angstrom) for validating symmetry operations.
    #[serde(default = "defaults::symprec")]
    pub symprec: f64,

    /// Smallest accepted `sigma_min / sigma_max` of a fit's direction matrix.
    #[serde(default = "defaults::rank_tolerance")]
    pub rank_tolerance: f64,

    /// Resample the local potential derivative onto a primitive-cell mesh.
    ///
    /// When absent, `dV/du` is stored on the supercell grid as computed.
    #[serde(default)]
    pub interpolation: Option<Interpolation>,

    /// Fit atoms in parallel.
    #[serde(default)]
    pub parallel: bool,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Interpolation {
    /// Primitive-cell FFT mesh.
    pub mesh: [usize; 3],

    #[serde(default = "defaults::accuracy")]
    pub accuracy: f64,
}

mod defaults {
    use super::*;

    pub(super) fn version() -> u32 { MAX_VERSION }
    pub(super) fn pair_tolerance() -> f64 { 1e-3 }
    pub(super) fn symprec() -> f64 { 1e-5 }
    pub(super) fn rank_tolerance() -> f64 { 1e-6 }
    pub(super) fn accuracy() -> f64 { DEFAULT_INTERPOLATION_ACCURACY }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            version: defaults::version(),
            difference_scheme: DifferenceScheme::default(),
            pair_tolerance: defaults::pair_tolerance(),
            symprec: defaults::symprec(),
            rank_tolerance: defaults::rank_tolerance(),
            interpolation: None,
            parallel: false,
        }
    }
}

impl Interpolation {
    pub fn new(mesh: [usize; 3]) -> Self
    { Interpolation { mesh, accuracy: defaults::accuracy() } }
}

impl Settings {
    /// Check every value, returning the settings unchanged if they are usable.
    pub fn validated(self) -> Result<Self, DerivError> {
        let bad = |msg: String| Err(DerivError::InvalidSettings(msg));

        if self.version == 0 || self.version > MAX_VERSION {
            return bad(format!("unsupported settings version {} (max {})", self.version, MAX_VERSION));
        }
        if !(self.pair_tolerance >= 0.0 && self.pair_tolerance < 1.0) {
            return bad(format!("pair-tolerance must lie in [0, 1), got {}", self.pair_tolerance));
        }
        if !(self.symprec > 0.0) {
            return bad(format!("symprec must be positive, got {}", self.symprec));
        }
        if !(self.rank_tolerance > 0.0 && self.rank_tolerance < 1.0) {
            return bad(format!("rank-tolerance must lie in (0, 1), got {}", self.rank_tolerance));
        }
        if let Some(interp) = &self.interpolation {
            if interp.mesh.iter().any(|&n| n == 0) {
                return bad(format!("interpolation mesh has a zero dimension: {:?}", interp.mesh));
            }
            if !(interp.accuracy > 0.0 && interp.accuracy < 1.0) {
                return bad(format!("interpolation accuracy must lie in (0, 1), got {}", interp.accuracy));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_document() {
        let settings = Settings::from_reader("{}".as_bytes()).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.validated().is_ok());
    }

    #[test]
    fn kebab_case_keys() {
        let yaml = "
difference-scheme: central
pair-tolerance: 0.0001
interpolation:
  mesh: [12, 12, 12]
parallel: true
";
        let settings = Settings::from_reader(yaml.as_bytes()).unwrap().validated().unwrap();
        assert_eq!(settings.difference_scheme, DifferenceScheme::Central);
        assert_eq!(settings.pair_tolerance, 1e-4);
        assert_eq!(settings.interpolation, Some(Interpolation::new([12, 12, 12])));
        assert!(settings.parallel);
    }

    #[test]
    fn unknown_keys_are_not_fatal() {
        let settings = Settings::from_reader("symprecc: 1e-3\n".as_bytes()).unwrap();
        assert_eq!(settings.symprec, 1e-5);
    }

    #[test]
    fn validation() {
        let check = |settings: Settings| match settings.validated() {
            Err(DerivError::InvalidSettings(_)) => {},
            other => panic!("unexpected: {:?}", other),
        };
        check(Settings { rank_tolerance: 0.0, ..Settings::default() });
        check(Settings { symprec: -1.0, ..Settings::default() });
        check(Settings { version: MAX_VERSION + 1, ..Settings::default() });
        check(Settings { pair_tolerance: f64::NAN, ..Settings::default() });
        check(Settings {
            interpolation: Some(Interpolation { mesh: [4, 0, 4], accuracy: 1e-6 }),
            ..Settings::default()
        });
    }
}
