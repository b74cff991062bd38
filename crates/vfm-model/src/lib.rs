//! Mesh and material ecosystem for the virtual-fields identification core.
//!
//! This crate owns what the inverse solver treats as collaborators: mesh
//! topology (nodes, solid domains, named boundary surfaces), element shape
//! functions and Gauss quadrature in the reference configuration, the
//! hyperelastic material library, and the per-integration-point material
//! state.

pub mod builder;
pub mod elements;
pub mod materials;
pub mod mesh;
pub mod point;
pub mod surface;

pub use builder::Model;
pub use elements::{ElementKind, IntegrationRule, NaturalPoint, reference_gradients};
pub use materials::{
    DeviatoricStressLaw, FullStressLaw, MaterialKind, MooneyRivlin, NeoHookean, StressEval,
    UncoupledMooneyRivlin, UncoupledNeoHookean, UncoupledYeoh, Yeoh,
};
pub use mesh::{Domain, Element, Mesh, Node};
pub use point::MaterialPoint;
pub use surface::{Facet, FacetKind, Surface};
