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

//! The fitted derivatives of one run, and their on-disk container.
//!
//! # Format
//!
//! ```text
//! b"ELPHDVDU"
//! u32 LE       schema major
//! u32 LE       schema minor
//! u64 LE       length of the header in bytes
//! [u8]         JSON header (metadata, and an index into the blob)
//! [f64 LE]     blob
//! ```
//!
//! Any minor version of a known major version can be read. Unrecognized
//! header fields and array kinds are skipped. Minor version 1 added the
//! displacement records and the phonon supercell matrix to the header.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use elph_array_types::{V3, M33};
use elph_byte_tools_plus_float as byte_tools;
use serde::{Serialize, Deserialize};

use crate::{DerivError, FailResult};
use crate::dataset::DisplacementRecord;
use crate::field::{ChannelField, ChannelMap, Field};
use crate::fit::DerivativeTensor;
use crate::interpolate::SampledGrid;

const MAGIC: &[u8; 8] = b"ELPHDVDU";
pub const SCHEMA_MAJOR: u32 = 1;
pub const SCHEMA_MINOR: u32 = 1;

// larger headers are assumed to be corrupt
const MAX_HEADER_LEN: u64 = 1 << 30;

/// Per-atom derivative tensors of one field.
pub type DerivativeMap<F> = BTreeMap<usize, DerivativeTensor<F>>;

/// The result of a run: `dV/du`, `dDij/du` and `dQij/du` for each
/// required atom, for whichever of them were computed.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeStore {
    supercell_matrix: M33<i32>,
    primitive_matrix: M33,
    atom_indices: Vec<usize>,
    displacements: Vec<DisplacementRecord>,
    phonon_supercell_matrix: Option<M33<i32>>,
    dv_du: Option<DerivativeMap<SampledGrid>>,
    ddij_du: Option<DerivativeMap<ChannelField>>,
    dqij_du: Option<DerivativeMap<ChannelField>>,
}

impl DerivativeStore {
    pub(crate) fn new(supercell_matrix: M33<i32>, primitive_matrix: M33, atom_indices: Vec<usize>) -> Self {
        DerivativeStore {
            supercell_matrix, primitive_matrix, atom_indices,
            displacements: vec![], phonon_supercell_matrix: None,
            dv_du: None, ddij_du: None, dqij_du: None,
        }
    }

    pub(crate) fn set_displacements(&mut self, records: Vec<DisplacementRecord>) { self.displacements = records; }
    pub(crate) fn set_phonon_supercell_matrix(&mut self, matrix: Option<M33<i32>>) { self.phonon_supercell_matrix = matrix; }
    pub(crate) fn set_dv_du(&mut self, map: DerivativeMap<SampledGrid>) { self.dv_du = Some(map); }
    pub(crate) fn set_ddij_du(&mut self, map: DerivativeMap<ChannelField>) { self.ddij_du = Some(map); }
    pub(crate) fn set_dqij_du(&mut self, map: DerivativeMap<ChannelField>) { self.dqij_du = Some(map); }

    /// Supercell in terms of the unit cell (rows; `A_super = S A_unit`).
    pub fn supercell_matrix(&self) -> &M33<i32> { &self.supercell_matrix }

    /// Primitive cell in terms of the unit cell (rows; `A_prim = P A_unit`).
    pub fn primitive_matrix(&self) -> &M33 { &self.primitive_matrix }

    /// The supercell atoms whose derivatives are required.
    pub fn atom_indices(&self) -> &[usize] { &self.atom_indices }

    /// The displacements the derivatives were computed from.
    ///
    /// Empty for files of schema 1.0, which did not record them.
    pub fn displacements(&self) -> &[DisplacementRecord] { &self.displacements }

    /// Supercell of the phonon calculation in terms of the unit cell, when it was given.
    pub fn phonon_supercell_matrix(&self) -> Option<&M33<i32>> { self.phonon_supercell_matrix.as_ref() }

    pub fn dv_du(&self) -> Option<&DerivativeMap<SampledGrid>> { self.dv_du.as_ref() }
    pub fn ddij_du(&self) -> Option<&DerivativeMap<ChannelField>> { self.ddij_du.as_ref() }
    pub fn dqij_du(&self) -> Option<&DerivativeMap<ChannelField>> { self.dqij_du.as_ref() }

    /// Check that every computed branch covers every required atom.
    pub fn check_complete(&self) -> Result<(), DerivError> {
        if self.dv_du.is_none() && self.ddij_du.is_none() && self.dqij_du.is_none() {
            return Err(DerivError::IncompleteDerivative("no derivatives were computed".to_string()));
        }
        check_branch("dV/du", &self.atom_indices, self.dv_du.as_ref())?;
        check_branch("dDij/du", &self.atom_indices, self.ddij_du.as_ref())?;
        check_branch("dQij/du", &self.atom_indices, self.dqij_du.as_ref())?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> FailResult<()> {
        self.check_complete()?;
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| format_err!("{}: {}", path.display(), e))?;
        let mut w = BufWriter::new(file);
        self.write_to(&mut w)?;
        w.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> FailResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| format_err!("{}: {}", path.display(), e))?;
        Self::read_from(BufReader::new(file))
    }

    pub fn write_to(&self, mut w: impl Write) -> FailResult<()> {
        self.check_complete()?;

        let mut blob = vec![];
        let mut arrays = vec![];
        if let Some(map) = &self.dv_du {
            push_branch(&mut arrays, &mut blob, ArrayKind::DvDu, map, |f| {
                let shape = GridShape {
                    mesh: f.mesh(),
                    lattice_points: f.lattice_points().to_vec(),
                    num_components: f.num_components(),
                };
                (serde_json::to_value(shape), f.data())
            })?;
        }
        for &(kind, map) in &[(ArrayKind::DdijDu, &self.ddij_du), (ArrayKind::DqijDu, &self.dqij_du)] {
            if let Some(map) = map {
                push_branch(&mut arrays, &mut blob, kind, map, |f| {
                    let shape = ChannelShape { maps: f.maps().to_vec() };
                    (serde_json::to_value(shape), f.values())
                })?;
            }
        }

        let header = Header {
            supercell_matrix: self.supercell_matrix,
            primitive_matrix: self.primitive_matrix,
            atom_indices: self.atom_indices.clone(),
            displacements: self.displacements.clone(),
            phonon_supercell_matrix: self.phonon_supercell_matrix,
            arrays,
        };
        let header = serde_json::to_vec(&header)?;

        w.write_all(MAGIC)?;
        w.write_all(&preamble(SCHEMA_MAJOR, SCHEMA_MINOR, header.len() as u64))?;
        w.write_all(&header)?;
        w.write_all(&byte_tools::f64v_to_le_bytes(&blob))?;
        trace!("Wrote derivative store ({} header bytes, {} values)", header.len(), blob.len());
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> FailResult<Self> {
        let mut magic = [0; 8];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            bail!("not a derivative store (bad magic {:?})", magic);
        }
        let mut words = [0; 16];
        r.read_exact(&mut words)?;
        let major = byte_tools::read_u32_le(&words[0..4]);
        let minor = byte_tools::read_u32_le(&words[4..8]);
        let header_len = byte_tools::read_u64_le(&words[8..16]);
        if major != SCHEMA_MAJOR {
            bail!(
                "derivative store has schema version {}.{}, but only {}.x is supported",
                major, minor, SCHEMA_MAJOR,
            );
        }
        if minor > SCHEMA_MINOR {
            debug!("Reading derivative store of newer minor version {}.{}", major, minor);
        }

        if header_len > MAX_HEADER_LEN {
            bail!("derivative store header claims {} bytes", header_len);
        }
        let mut header = vec![];
        r.by_ref().take(header_len).read_to_end(&mut header)?;
        if header.len() as u64 != header_len {
            bail!("derivative store header is truncated ({} of {} bytes)", header.len(), header_len);
        }
        let header: Header = serde_json::from_slice(&header)?;

        let mut bytes = vec![];
        r.read_to_end(&mut bytes)?;
        let blob = match byte_tools::read_f64v_le_checked(&bytes) {
            Some(blob) => blob,
            None => bail!("derivative store blob has {} bytes, not a multiple of 8", bytes.len()),
        };

        let mut store = DerivativeStore::new(header.supercell_matrix, header.primitive_matrix, header.atom_indices);
        store.set_displacements(header.displacements);
        store.set_phonon_supercell_matrix(header.phonon_supercell_matrix);
        let mut dv_du = Partial::default();
        let mut ddij_du = Partial::default();
        let mut dqij_du = Partial::default();
        for entry in header.arrays {
            let kind = match ArrayKind::parse(&entry.kind) {
                Some(kind) => kind,
                None => {
                    debug!("Skipping array of unknown kind '{}'", entry.kind);
                    continue;
                },
            };
            let data = entry.slice(&blob)?.to_vec();
            match kind {
                ArrayKind::DvDu => {
                    let shape: GridShape = serde_json::from_value(entry.shape.clone())?;
                    let field = SampledGrid::new(shape.mesh, shape.lattice_points, shape.num_components, data)?;
                    dv_du.insert(&entry, field)?;
                },
                ArrayKind::DdijDu | ArrayKind::DqijDu => {
                    let shape: ChannelShape = serde_json::from_value(entry.shape.clone())?;
                    let field = ChannelField::new(shape.maps, data)?;
                    let partial = if kind == ArrayKind::DdijDu { &mut ddij_du } else { &mut dqij_du };
                    partial.insert(&entry, field)?;
                },
            }
        }
        store.dv_du = dv_du.finish()?;
        store.ddij_du = ddij_du.finish()?;
        store.dqij_du = dqij_du.finish()?;
        Ok(store)
    }
}

fn check_branch<F>(name: &str, atoms: &[usize], map: Option<&DerivativeMap<F>>) -> Result<(), DerivError> {
    let map = match map {
        Some(map) => map,
        None => return Ok(()),
    };
    for &atom in atoms {
        match map.get(&atom) {
            Some(tensor) if tensor.atom == atom => {},
            Some(tensor) => {
                return Err(DerivError::IncompleteDerivative(format!(
                    "{}: entry for atom {} is labeled as atom {}", name, atom, tensor.atom,
                )));
            },
            None => {
                return Err(DerivError::IncompleteDerivative(format!(
                    "{}: missing derivative of atom {}", name, atom,
                )));
            },
        }
    }
    Ok(())
}

/// Schema version and header length.
fn preamble(major: u32, minor: u32, header_len: u64) -> [u8; 16] {
    let mut out = [0; 16];
    byte_tools::write_u32_le(&mut out[0..4], major);
    byte_tools::write_u32_le(&mut out[4..8], minor);
    byte_tools::write_u64_le(&mut out[8..16], header_len);
    out
}

//=================================================================
// header

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ArrayKind { DvDu, DdijDu, DqijDu }

impl ArrayKind {
    fn name(self) -> &'static str {
        match self {
            ArrayKind::DvDu => "dv-du",
            ArrayKind::DdijDu => "ddij-du",
            ArrayKind::DqijDu => "dqij-du",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        [ArrayKind::DvDu, ArrayKind::DdijDu, ArrayKind::DqijDu].iter()
            .cloned()
            .find(|kind| kind.name() == s)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Header {
    supercell_matrix: M33<i32>,
    primitive_matrix: M33,
    atom_indices: Vec<usize>,
    #[serde(default)]
    displacements: Vec<DisplacementRecord>,
    #[serde(default)]
    phonon_supercell_matrix: Option<M33<i32>>,
    arrays: Vec<ArrayEntry>,
}

/// Location of one component of one atom's tensor in the blob.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ArrayEntry {
    kind: String,
    atom: usize,
    axis: usize,
    /// In units of f64.
    offset: u64,
    len: u64,
    shape: serde_json::Value,
}

impl ArrayEntry {
    fn slice<'a>(&self, blob: &'a [f64]) -> FailResult<&'a [f64]> {
        let start = self.offset as usize;
        let end = start.checked_add(self.len as usize);
        match end {
            Some(end) if end <= blob.len() => Ok(&blob[start..end]),
            _ => bail!(
                "{} array of atom {} (axis {}) lies outside the blob ({} + {} > {})",
                self.kind, self.atom, self.axis, self.offset, self.len, blob.len(),
            ),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct GridShape {
    mesh: [usize; 3],
    lattice_points: Vec<V3<i32>>,
    num_components: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ChannelShape {
    maps: Vec<ChannelMap>,
}

fn push_branch<F>(
    arrays: &mut Vec<ArrayEntry>,
    blob: &mut Vec<f64>,
    kind: ArrayKind,
    map: &DerivativeMap<F>,
    mut describe: impl FnMut(&F) -> (serde_json::Result<serde_json::Value>, &[f64]),
) -> FailResult<()> {
    for (&atom, tensor) in map {
        for (axis, field) in tensor.components.iter().enumerate() {
            let (shape, values) = describe(field);
            arrays.push(ArrayEntry {
                kind: kind.name().to_string(),
                atom, axis,
                offset: blob.len() as u64,
                len: values.len() as u64,
                shape: shape?,
            });
            blob.extend_from_slice(values);
        }
    }
    Ok(())
}

/// Components of a branch, gathered while reading.
struct Partial<F> {
    components: BTreeMap<usize, [Option<F>; 3]>,
}

impl<F> Default for Partial<F> {
    fn default() -> Self { Partial { components: BTreeMap::new() } }
}

impl<F> Partial<F> {
    fn insert(&mut self, entry: &ArrayEntry, field: F) -> FailResult<()> {
        if entry.axis >= 3 {
            bail!("{} array of atom {} has axis {}", entry.kind, entry.atom, entry.axis);
        }
        let slots = self.components.entry(entry.atom).or_insert_with(|| [None, None, None]);
        if slots[entry.axis].is_some() {
            bail!("duplicate {} array for atom {} axis {}", entry.kind, entry.atom, entry.axis);
        }
        slots[entry.axis] = Some(field);
        Ok(())
    }

    fn finish(self) -> FailResult<Option<DerivativeMap<F>>> {
        if self.components.is_empty() {
            return Ok(None);
        }
        let mut out = BTreeMap::new();
        for (atom, slots) in self.components {
            let components = match slots {
                [Some(x), Some(y), Some(z)] => [x, y, z],
                _ => bail!("derivative of atom {} is missing a component", atom),
            };
            out.insert(atom, DerivativeTensor { atom, components });
        }
        Ok(Some(out))
    }
}
