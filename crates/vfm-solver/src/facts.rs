//! Frozen mesh topology and quadrature facts.
//!
//! Built once from the model mesh during setup and read-only afterwards.
//! Element × integration-point data uses a CSR-like layout: a prefix-sum
//! `offset` table over the ragged per-element gauss counts, so the flat index
//! of (e, g) is `offset[e] + g`.

use nalgebra::Vector3;
use std::collections::HashMap;
use vfm_model::{Mesh, reference_gradients};

/// Immutable mesh facts: cardinalities, id bijections, connectivity,
/// quadrature weights, and reference shape gradients.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFacts {
    n_nodes: usize,
    n_elems: usize,
    node_id2idx: HashMap<i32, usize>,
    elem_id2idx: HashMap<i32, usize>,
    node_ids: Vec<i32>,
    elem_ids: Vec<i32>,
    /// Dense node indices per element, in connectivity order
    elem_nodes: Vec<Vec<usize>>,
    /// (domain index, domain-local element index) per dense element index
    elem_location: Vec<(usize, usize)>,
    gp_per_elem: Vec<usize>,
    /// Prefix sum over `gp_per_elem`; `offset[n_elems]` = total points
    offset: Vec<usize>,
    /// det J₀ · gauss weight per integration point; strictly positive
    jw: Vec<f64>,
    /// Reference shape gradients ∇ₓNₐ per integration point
    grad_n: Vec<Vec<Vector3<f64>>>,
}

impl MeshFacts {
    /// Derive facts from a mesh whose domains are all solid.
    ///
    /// Fails when a domain is not solid, an element references an unknown
    /// node, or `det J₀ · w ≤ 0` at any integration point.
    pub fn build(mesh: &Mesh) -> Result<Self, String> {
        let n_nodes = mesh.num_nodes();
        let mut node_id2idx = HashMap::with_capacity(n_nodes);
        let mut node_ids = Vec::with_capacity(n_nodes);
        for (idx, node) in mesh.nodes().iter().enumerate() {
            node_id2idx.insert(node.id, idx);
            node_ids.push(node.id);
        }

        let mut elem_id2idx = HashMap::new();
        let mut elem_ids = Vec::new();
        let mut elem_nodes = Vec::new();
        let mut elem_location = Vec::new();
        let mut gp_per_elem = Vec::new();
        let mut offset = vec![0usize];
        let mut jw = Vec::new();
        let mut grad_n = Vec::new();

        for (d, domain) in mesh.domains.iter().enumerate() {
            if !domain.kind.is_solid() {
                return Err(format!(
                    "domain '{}' has non-solid element kind {:?}",
                    domain.name, domain.kind
                ));
            }
            let rule = domain.kind.integration_rule()?;
            for (local, elem) in domain.elements.iter().enumerate() {
                let dense = elem_ids.len();
                if elem_id2idx.insert(elem.id, dense).is_some() {
                    return Err(format!("duplicate element id {}", elem.id));
                }
                elem_ids.push(elem.id);
                elem_location.push((d, local));

                let indices = elem
                    .nodes
                    .iter()
                    .map(|id| {
                        node_id2idx.get(id).copied().ok_or_else(|| {
                            format!("element {} references unknown node {id}", elem.id)
                        })
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                elem_nodes.push(indices);

                let coords = mesh.element_coords(elem)?;
                for (g, gp) in rule.points.iter().enumerate() {
                    let dnat = domain.kind.natural_derivatives(&gp.coords)?;
                    let (det, grads) = reference_gradients(&coords, &dnat).map_err(|e| {
                        format!("element {} gauss point {g}: {e}", elem.id)
                    })?;
                    let weight = det * gp.weight;
                    if weight <= 0.0 {
                        return Err(format!(
                            "element {} gauss point {g}: non-positive integration weight {weight:e}",
                            elem.id
                        ));
                    }
                    jw.push(weight);
                    grad_n.push(grads);
                }
                gp_per_elem.push(rule.len());
                offset.push(offset.last().copied().unwrap_or(0) + rule.len());
            }
        }

        Ok(Self {
            n_nodes,
            n_elems: elem_ids.len(),
            node_id2idx,
            elem_id2idx,
            node_ids,
            elem_ids,
            elem_nodes,
            elem_location,
            gp_per_elem,
            offset,
            jw,
            grad_n,
        })
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    pub fn n_elems(&self) -> usize {
        self.n_elems
    }

    /// Total number of integration points across all elements.
    pub fn total_points(&self) -> usize {
        *self.offset.last().unwrap_or(&0)
    }

    pub fn node_index(&self, id: i32) -> Option<usize> {
        self.node_id2idx.get(&id).copied()
    }

    pub fn elem_index(&self, id: i32) -> Option<usize> {
        self.elem_id2idx.get(&id).copied()
    }

    pub fn node_id(&self, idx: usize) -> i32 {
        self.node_ids[idx]
    }

    pub fn elem_id(&self, idx: usize) -> i32 {
        self.elem_ids[idx]
    }

    /// Dense node indices of element `e` in connectivity order.
    pub fn elem_nodes(&self, e: usize) -> &[usize] {
        &self.elem_nodes[e]
    }

    /// (domain index, domain-local element index) of element `e`.
    pub fn elem_location(&self, e: usize) -> (usize, usize) {
        self.elem_location[e]
    }

    pub fn gp_count(&self, e: usize) -> usize {
        self.gp_per_elem[e]
    }

    /// Flat integration-point index of (e, g).
    pub fn point_index(&self, e: usize, g: usize) -> usize {
        self.offset[e] + g
    }

    /// det J₀ · w at (e, g).
    pub fn jw(&self, e: usize, g: usize) -> f64 {
        self.jw[self.offset[e] + g]
    }

    /// Reference shape gradients at (e, g), one per element node.
    pub fn grad_n(&self, e: usize, g: usize) -> &[Vector3<f64>] {
        &self.grad_n[self.offset[e] + g]
    }
}
