//! Output artifacts of an identification run.
//!
//! Two writers live here: the binary plot file consumed by the downstream
//! visualization tooling (fixed little-endian layout, bit-exact), and the
//! optional plain-text virtual-work table.

pub mod error;
pub mod plot;
pub mod virtual_work;

pub use error::{IoError, Result};
pub use plot::{PlotFile, PlotState, VarKind, Variable};
pub use virtual_work::VirtualWorkTable;
