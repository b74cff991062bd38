//! XML input document layer for the virtual-fields identification pipeline.
//!
//! This crate parses the single driving XML document into plain
//! data-transfer structs. It performs well-formedness and numeric parsing
//! only; semantic validation (unknown node ids, frame-count rules, bound
//! checks) belongs to the problem builder downstream.

mod dto;
mod xml;

pub use dto::{
    ElemDto, ElementBlockDto, FacetDto, LoadBlockDto, LoadRowDto, MaterialDto, MeshDto, NodalRowDto,
    NodeDto, OptionsDto, ParamDto, SurfaceDto, TimeBlockDto, VfmDocument, VirtualFieldDto,
};
pub use xml::parse_document;

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

/// Parse failure with the 1-based line of the offending input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

impl VfmDocument {
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| ParseError {
            line: 0,
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        parse_document(&raw)
    }

    pub fn parse_str(raw: &str) -> Result<Self, ParseError> {
        parse_document(raw)
    }
}
