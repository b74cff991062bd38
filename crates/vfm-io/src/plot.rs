//! Binary plot-file writer.
//!
//! ## Layout (all integers little-endian)
//!
//! ```text
//! header:      magic "VFMP" | u32 version (=1) | u32 n_nodes | u32 n_elems
//! dictionary:  tag "DICT" | u32 variable count | per variable:
//!                u32 id | u8 kind | u32 name length | name bytes (UTF-8)
//! states:      per state: tag "STAT" | u32 ordinal | f64 time |
//!                per variable in dictionary order:
//!                  u32 id | u64 component count | f64 components
//! ```
//!
//! Variable kinds: 0 = per-node vec3, 1 = per-element 3×3 tensor (9
//! components, row-major), 2 = per-element symmetric 3×3 tensor (6
//! components: xx, yy, zz, xy, yz, xz).
//!
//! The layout is frozen; the golden-byte test below pins it.

use crate::error::{IoError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"VFMP";
const VERSION: u32 = 1;
const TAG_DICT: &[u8; 4] = b"DICT";
const TAG_STATE: &[u8; 4] = b"STAT";

/// Kind of a registered plot variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    /// One `vec3` per node
    Vec3Node,
    /// One full 3×3 tensor per element, row-major
    Mat3Elem,
    /// One symmetric 3×3 tensor per element: xx, yy, zz, xy, yz, xz
    Sym3Elem,
}

impl VarKind {
    fn code(&self) -> u8 {
        match self {
            VarKind::Vec3Node => 0,
            VarKind::Mat3Elem => 1,
            VarKind::Sym3Elem => 2,
        }
    }

    /// Number of f64 components one state must carry for this kind.
    fn component_count(&self, n_nodes: usize, n_elems: usize) -> usize {
        match self {
            VarKind::Vec3Node => 3 * n_nodes,
            VarKind::Mat3Elem => 9 * n_elems,
            VarKind::Sym3Elem => 6 * n_elems,
        }
    }
}

/// A registered plot variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: u32,
    pub kind: VarKind,
    pub name: String,
}

/// One time frame of plot data: `(variable id, components)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotState {
    pub ordinal: u32,
    pub time: f64,
    pub data: Vec<(u32, Vec<f64>)>,
}

/// A plot file under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotFile {
    n_nodes: usize,
    n_elems: usize,
    variables: Vec<Variable>,
    states: Vec<PlotState>,
}

impl PlotFile {
    pub fn new(n_nodes: usize, n_elems: usize) -> Self {
        Self {
            n_nodes,
            n_elems,
            variables: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn states(&self) -> &[PlotState] {
        &self.states
    }

    /// Register a variable; ids must be unique.
    pub fn register(&mut self, id: u32, kind: VarKind, name: &str) -> Result<()> {
        if self.variables.iter().any(|v| v.id == id) {
            return Err(IoError::InvalidData(format!(
                "duplicate plot variable id {id}"
            )));
        }
        self.variables.push(Variable {
            id,
            kind,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Append a state. Every registered variable must be present exactly
    /// once with the component count its kind dictates.
    pub fn push_state(&mut self, state: PlotState) -> Result<()> {
        for var in &self.variables {
            let expected = var.kind.component_count(self.n_nodes, self.n_elems);
            let found = state
                .data
                .iter()
                .filter(|(id, _)| *id == var.id)
                .map(|(_, comps)| comps.len())
                .collect::<Vec<_>>();
            match found.as_slice() {
                [len] if *len == expected => {}
                [len] => {
                    return Err(IoError::InvalidData(format!(
                        "state {}: variable '{}' has {len} components, expected {expected}",
                        state.ordinal, var.name
                    )));
                }
                [] => {
                    return Err(IoError::InvalidData(format!(
                        "state {}: variable '{}' is missing",
                        state.ordinal, var.name
                    )));
                }
                _ => {
                    return Err(IoError::InvalidData(format!(
                        "state {}: variable '{}' appears more than once",
                        state.ordinal, var.name
                    )));
                }
            }
        }
        for (id, _) in &state.data {
            if !self.variables.iter().any(|v| v.id == *id) {
                return Err(IoError::InvalidData(format!(
                    "state {}: unregistered variable id {id}",
                    state.ordinal
                )));
            }
        }
        self.states.push(state);
        Ok(())
    }

    /// Serialize the whole file into a writer.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&VERSION.to_le_bytes())?;
        w.write_all(&(self.n_nodes as u32).to_le_bytes())?;
        w.write_all(&(self.n_elems as u32).to_le_bytes())?;

        w.write_all(TAG_DICT)?;
        w.write_all(&(self.variables.len() as u32).to_le_bytes())?;
        for var in &self.variables {
            w.write_all(&var.id.to_le_bytes())?;
            w.write_all(&[var.kind.code()])?;
            let name = var.name.as_bytes();
            w.write_all(&(name.len() as u32).to_le_bytes())?;
            w.write_all(name)?;
        }

        for state in &self.states {
            w.write_all(TAG_STATE)?;
            w.write_all(&state.ordinal.to_le_bytes())?;
            w.write_all(&state.time.to_le_bytes())?;
            // Dictionary order, not insertion order: readers index by the
            // dictionary.
            for var in &self.variables {
                let (_, comps) = state
                    .data
                    .iter()
                    .find(|(id, _)| *id == var.id)
                    .expect("push_state validated presence");
                w.write_all(&var.id.to_le_bytes())?;
                w.write_all(&(comps.len() as u64).to_le_bytes())?;
                for c in comps {
                    w.write_all(&c.to_le_bytes())?;
                }
            }
        }
        Ok(())
    }

    /// Write the file to disk.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Parse a plot file back from its serialized bytes.
    pub fn read_from(bytes: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(bytes);

        if cursor.take(4)? != MAGIC {
            return Err(IoError::InvalidData("bad plot-file magic".to_string()));
        }
        let version = cursor.read_u32()?;
        if version != VERSION {
            return Err(IoError::InvalidData(format!(
                "unsupported plot-file version {version}"
            )));
        }
        let n_nodes = cursor.read_u32()? as usize;
        let n_elems = cursor.read_u32()? as usize;

        if cursor.take(4)? != TAG_DICT {
            return Err(IoError::InvalidData("missing dictionary block".to_string()));
        }
        let n_vars = cursor.read_u32()? as usize;
        let mut plot = PlotFile::new(n_nodes, n_elems);
        for _ in 0..n_vars {
            let id = cursor.read_u32()?;
            let kind = match cursor.read_u8()? {
                0 => VarKind::Vec3Node,
                1 => VarKind::Mat3Elem,
                2 => VarKind::Sym3Elem,
                code => {
                    return Err(IoError::InvalidData(format!(
                        "unknown variable kind code {code}"
                    )));
                }
            };
            let name_len = cursor.read_u32()? as usize;
            let name = String::from_utf8(cursor.take(name_len)?.to_vec())
                .map_err(|_| IoError::InvalidData("variable name is not UTF-8".to_string()))?;
            plot.register(id, kind, &name)?;
        }

        while !cursor.is_at_end() {
            if cursor.take(4)? != TAG_STATE {
                return Err(IoError::InvalidData("expected state block".to_string()));
            }
            let ordinal = cursor.read_u32()?;
            let time = cursor.read_f64()?;
            let mut data = Vec::with_capacity(n_vars);
            for _ in 0..n_vars {
                let id = cursor.read_u32()?;
                let count = cursor.read_u64()? as usize;
                let mut comps = Vec::with_capacity(count);
                for _ in 0..count {
                    comps.push(cursor.read_f64()?);
                }
                data.push((id, comps));
            }
            plot.push_state(PlotState {
                ordinal,
                time,
                data,
            })?;
        }
        Ok(plot)
    }

    /// Read a plot file from disk.
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::read_from(&bytes)
    }
}

/// Bounds-checked little-endian byte reader.
struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(IoError::InvalidData(format!(
                "plot file truncated at byte {}",
                self.pos
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }
}
