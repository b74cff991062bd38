//! Data-transfer structs mirroring the sections of the input document.

use serde::{Deserialize, Serialize};

/// The whole input document: mesh, material, identification data, options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VfmDocument {
    pub mesh: MeshDto,
    pub material: Option<MaterialDto>,
    pub parameters: Vec<ParamDto>,
    pub measured_displacements: Vec<TimeBlockDto>,
    pub virtual_fields: Vec<VirtualFieldDto>,
    pub measured_loads: Vec<LoadBlockDto>,
    pub options: OptionsDto,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshDto {
    pub nodes: Vec<NodeDto>,
    pub element_blocks: Vec<ElementBlockDto>,
    pub surfaces: Vec<SurfaceDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDto {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One `<Elements>` block: a named domain of same-kind elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementBlockDto {
    /// Element kind string as written in the document ("hex8", "tet4", ...)
    pub kind: String,
    /// Domain name
    pub name: String,
    pub elems: Vec<ElemDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElemDto {
    pub id: i32,
    pub nodes: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceDto {
    pub name: String,
    pub facets: Vec<FacetDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetDto {
    /// Facet kind string ("quad4" or "tri3")
    pub kind: String,
    pub id: i32,
    pub nodes: Vec<i32>,
}

/// Material section: a law name plus named scalar properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDto {
    pub kind: String,
    pub properties: Vec<(String, f64)>,
}

/// One `<param>` row: `init, lo, hi, scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDto {
    pub name: String,
    pub init: f64,
    pub lo: f64,
    pub hi: f64,
    pub scale: f64,
}

/// One `<time>` block of nodal displacement rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBlockDto {
    /// Floating time attribute as written; mapped to an ordinal downstream.
    pub t: f64,
    pub rows: Vec<NodalRowDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodalRowDto {
    pub node_id: i32,
    pub ux: f64,
    pub uy: f64,
    pub uz: f64,
}

/// One virtual displacement field with its own time blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualFieldDto {
    pub name: String,
    pub times: Vec<TimeBlockDto>,
}

/// One `<time>` block of surface resultant rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBlockDto {
    pub t: f64,
    pub rows: Vec<LoadRowDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRowDto {
    pub surface: String,
    pub fx: f64,
    pub fy: f64,
    pub fz: f64,
}

/// Solver and pipeline options; absent values fall back to solver defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsDto {
    /// "levmar" or "constrained-levmar"
    pub solver: Option<String>,
    pub tau: Option<f64>,
    pub grad_tol: Option<f64>,
    pub step_tol: Option<f64>,
    pub obj_tol: Option<f64>,
    pub fd_step: Option<f64>,
    pub max_iterations: Option<usize>,
    pub plane_deformation: bool,
    pub save_virtual_work: Option<String>,
}
