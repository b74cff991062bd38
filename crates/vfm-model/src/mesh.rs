//! Mesh data structures: nodes, elements, solid domains, surfaces.

use crate::elements::ElementKind;
use crate::point::MaterialPoint;
use crate::surface::Surface;
use nalgebra::Vector3;
use std::collections::HashMap;

/// A node in the mesh (1-based external id from the input document).
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Node {
    pub fn new(id: i32, x: f64, y: f64, z: f64) -> Self {
        Self { id, x, y, z }
    }

    pub fn coords(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// An element: external id plus node connectivity.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: i32,
    pub nodes: Vec<i32>,
}

impl Element {
    pub fn new(id: i32, nodes: Vec<i32>) -> Self {
        Self { id, nodes }
    }

    pub fn validate(&self, kind: ElementKind) -> Result<(), String> {
        let expected = kind.num_nodes();
        if self.nodes.len() != expected {
            return Err(format!(
                "element {} of kind {kind:?} has {} nodes but expected {expected}",
                self.id,
                self.nodes.len()
            ));
        }
        Ok(())
    }
}

/// A named group of same-kind elements with its own material-point storage.
///
/// For solid kinds the domain owns one [`MaterialPoint`] per (element, gauss
/// point), laid out element-major. These points belong to the mesh ecosystem;
/// inverse evaluation reads them only to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub name: String,
    pub kind: ElementKind,
    pub elements: Vec<Element>,
    gauss_per_element: usize,
    points: Vec<MaterialPoint>,
}

impl Domain {
    pub fn new(name: String, kind: ElementKind, elements: Vec<Element>) -> Result<Self, String> {
        for elem in &elements {
            elem.validate(kind)?;
        }
        let gauss_per_element = if kind.is_solid() {
            kind.integration_rule()?.len()
        } else {
            0
        };
        let points = vec![MaterialPoint::reference(); elements.len() * gauss_per_element];
        Ok(Self {
            name,
            kind,
            elements,
            gauss_per_element,
            points,
        })
    }

    /// Gauss points per element (0 for facet domains).
    pub fn gauss_per_element(&self) -> usize {
        self.gauss_per_element
    }

    /// The mesh-owned material point of element `elem_idx` (domain-local) at
    /// gauss index `gp`.
    pub fn material_point(&self, elem_idx: usize, gp: usize) -> Option<&MaterialPoint> {
        if gp >= self.gauss_per_element {
            return None;
        }
        self.points.get(elem_idx * self.gauss_per_element + gp)
    }

    /// Mutable access for forward tools; the inverse pipeline never uses it.
    pub fn material_point_mut(&mut self, elem_idx: usize, gp: usize) -> Option<&mut MaterialPoint> {
        if gp >= self.gauss_per_element {
            return None;
        }
        self.points.get_mut(elem_idx * self.gauss_per_element + gp)
    }
}

/// Complete mesh: nodes, domains, named surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    nodes: Vec<Node>,
    node_index: HashMap<i32, usize>,
    pub domains: Vec<Domain>,
    pub surfaces: Vec<Surface>,
}

impl Mesh {
    pub fn new(
        nodes: Vec<Node>,
        domains: Vec<Domain>,
        surfaces: Vec<Surface>,
    ) -> Result<Self, String> {
        let mut node_index = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            if node_index.insert(node.id, idx).is_some() {
                return Err(format!("duplicate node id {}", node.id));
            }
        }
        let mesh = Self {
            nodes,
            node_index,
            domains,
            surfaces,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in document order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: i32) -> Option<&Node> {
        self.node_index.get(&id).map(|&idx| &self.nodes[idx])
    }

    /// Dense index of a node id in document order.
    pub fn node_position(&self, id: i32) -> Option<usize> {
        self.node_index.get(&id).copied()
    }

    pub fn surface(&self, name: &str) -> Option<&Surface> {
        self.surfaces.iter().find(|s| s.name == name)
    }

    /// Nodal coordinates of an element in connectivity order.
    pub fn element_coords(&self, element: &Element) -> Result<Vec<Vector3<f64>>, String> {
        element
            .nodes
            .iter()
            .map(|&id| {
                self.node(id)
                    .map(Node::coords)
                    .ok_or_else(|| format!("element {} references unknown node {id}", element.id))
            })
            .collect()
    }

    /// Names of domains whose kind is not a solid continuum element.
    pub fn non_solid_domains(&self) -> Vec<&str> {
        self.domains
            .iter()
            .filter(|d| !d.kind.is_solid())
            .map(|d| d.name.as_str())
            .collect()
    }

    fn validate(&self) -> Result<(), String> {
        let mut elem_ids = HashMap::new();
        for domain in &self.domains {
            for elem in &domain.elements {
                if let Some(previous) = elem_ids.insert(elem.id, domain.name.clone()) {
                    return Err(format!(
                        "duplicate element id {} (domains '{previous}' and '{}')",
                        elem.id, domain.name
                    ));
                }
                for &node_id in &elem.nodes {
                    if !self.node_index.contains_key(&node_id) {
                        return Err(format!(
                            "element {} references unknown node {node_id}",
                            elem.id
                        ));
                    }
                }
            }
        }
        for surface in &self.surfaces {
            if surface.facets.is_empty() {
                return Err(format!("surface '{}' has no facets", surface.name));
            }
            for facet in &surface.facets {
                facet.validate()?;
                for &node_id in &facet.nodes {
                    if !self.node_index.contains_key(&node_id) {
                        return Err(format!(
                            "surface '{}' facet {} references unknown node {node_id}",
                            surface.name, facet.id
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
