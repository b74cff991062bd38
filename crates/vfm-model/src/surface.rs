//! Named boundary surfaces made of facets.

use crate::elements::ElementKind;

/// Facet kinds allowed on a boundary surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetKind {
    Quad4,
    Tri3,
}

impl FacetKind {
    pub fn num_nodes(&self) -> usize {
        match self {
            FacetKind::Quad4 => 4,
            FacetKind::Tri3 => 3,
        }
    }

    pub fn from_keyword(kind: &str) -> Option<Self> {
        match ElementKind::from_keyword(kind)? {
            ElementKind::Quad4 => Some(FacetKind::Quad4),
            ElementKind::Tri3 => Some(FacetKind::Tri3),
            _ => None,
        }
    }
}

/// One boundary facet.
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    pub kind: FacetKind,
    pub id: i32,
    /// Node ids in connectivity order
    pub nodes: Vec<i32>,
}

impl Facet {
    pub fn validate(&self) -> Result<(), String> {
        let expected = self.kind.num_nodes();
        if self.nodes.len() != expected {
            return Err(format!(
                "facet {} of kind {:?} has {} nodes but expected {}",
                self.id,
                self.kind,
                self.nodes.len(),
                expected
            ));
        }
        Ok(())
    }
}

/// A named surface: an ordered list of facets.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub name: String,
    pub facets: Vec<Facet>,
}

impl Surface {
    /// Node ids belonging to this surface, deduplicated in first-encounter
    /// order. The order is deterministic: it follows facet order, then each
    /// facet's connectivity. The first entry is the surface's representative
    /// node.
    pub fn node_ids(&self) -> Vec<i32> {
        let mut seen = Vec::new();
        for facet in &self.facets {
            for &node in &facet.nodes {
                if !seen.contains(&node) {
                    seen.push(node);
                }
            }
        }
        seen
    }
}
