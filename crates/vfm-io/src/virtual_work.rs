//! Plain-text virtual-work table.
//!
//! One row per time frame:
//!
//! ```text
//! #Step, IVW1, IVW2, ..., EVW1, EVW2, ...
//! 0, 1.23456e-2, ...
//! ```
//!
//! Values are written in scientific notation with six significant digits.

use crate::error::{IoError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Internal and external virtual work, indexed `[time][virtual field]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualWorkTable {
    pub internal: Vec<Vec<f64>>,
    pub external: Vec<Vec<f64>>,
}

impl VirtualWorkTable {
    pub fn new(internal: Vec<Vec<f64>>, external: Vec<Vec<f64>>) -> Result<Self> {
        if internal.len() != external.len() {
            return Err(IoError::InvalidData(format!(
                "internal table has {} rows, external has {}",
                internal.len(),
                external.len()
            )));
        }
        let n_fields = internal.first().map_or(0, Vec::len);
        for (t, (iw, ew)) in internal.iter().zip(external.iter()).enumerate() {
            if iw.len() != n_fields || ew.len() != n_fields {
                return Err(IoError::InvalidData(format!(
                    "row {t} has inconsistent virtual-field count"
                )));
            }
        }
        Ok(Self { internal, external })
    }

    fn n_fields(&self) -> usize {
        self.internal.first().map_or(0, Vec::len)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        write!(w, "#Step")?;
        for v in 1..=self.n_fields() {
            write!(w, ", IVW{v}")?;
        }
        for v in 1..=self.n_fields() {
            write!(w, ", EVW{v}")?;
        }
        writeln!(w)?;

        for (t, (iw, ew)) in self.internal.iter().zip(self.external.iter()).enumerate() {
            write!(w, "{t}")?;
            for value in iw.iter().chain(ew.iter()) {
                write!(w, ", {value:.5e}")?;
            }
            writeln!(w)?;
        }
        Ok(())
    }

    /// Write the table; the path must carry a `.txt` extension.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
        {
            return Err(IoError::InvalidPath(format!(
                "virtual-work table path must end in .txt: {}",
                path.display()
            )));
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
