//! External virtual work assembly.
//!
//! W_ext(v,t) = Σ_k F_k(t) · u*(v,t,node_k)
//!
//! where F_k(t) is the measured resultant on surface k and node_k is the
//! surface's representative node (the first of its resolved node set).
//!
//! ## Surface contract
//!
//! A surface's resultant force multiplies the virtual displacement read from
//! a single representative node. This is exact only when the virtual field
//! is constant over each load-carrying surface, which holds for the typical
//! rigid-grip setup these measurements come from. A virtual field that
//! varies across a loaded surface is accepted but logged as a warning; the
//! representative-node value still decides the result.

use crate::facts::MeshFacts;
use crate::stores::{LoadSeries, VirtualFieldSet};
use log::warn;
use std::collections::HashMap;
use vfm_model::Mesh;

/// Surface name → dense node indices, resolved once at setup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceMap {
    map: HashMap<String, Vec<usize>>,
}

impl SurfaceMap {
    /// Resolve every surface named by the load series against the mesh.
    ///
    /// Unknown surface names and surfaces with no resolved nodes are fatal.
    pub fn resolve(facts: &MeshFacts, mesh: &Mesh, loads: &LoadSeries) -> Result<Self, String> {
        let mut map = HashMap::new();
        for frame in loads.frames() {
            for load in &frame.loads {
                if map.contains_key(&load.surface) {
                    continue;
                }
                let surface = mesh.surface(&load.surface).ok_or_else(|| {
                    format!("load references unknown surface '{}'", load.surface)
                })?;
                let indices = surface
                    .node_ids()
                    .iter()
                    .map(|&id| {
                        facts.node_index(id).ok_or_else(|| {
                            format!(
                                "surface '{}' references unknown node {id}",
                                load.surface
                            )
                        })
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                if indices.is_empty() {
                    return Err(format!("surface '{}' has no resolved nodes", load.surface));
                }
                map.insert(load.surface.clone(), indices);
            }
        }
        Ok(Self { map })
    }

    pub fn nodes(&self, surface: &str) -> Option<&[usize]> {
        self.map.get(surface).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Assemble the flattened external-work vector `W_ext[v·T + t]` with T the
/// load frame count. θ-independent; computed once during setup.
pub fn assemble_external_work(
    map: &SurfaceMap,
    fields: &VirtualFieldSet,
    loads: &LoadSeries,
) -> Result<Vec<f64>, String> {
    let t_count = loads.len();
    let n_vf = fields.len();
    if t_count == 0 || n_vf == 0 {
        return Ok(Vec::new());
    }
    fields.validate_frame_counts(t_count)?;

    let mut out = vec![0.0; n_vf * t_count];
    for (v, field) in fields.fields().iter().enumerate() {
        for (t, frame) in loads.frames().iter().enumerate() {
            let u_star = field.frame_for(t)?;
            for load in &frame.loads {
                let nodes = map.nodes(&load.surface).ok_or_else(|| {
                    format!("surface '{}' was not resolved at setup", load.surface)
                })?;
                let rep = nodes[0];
                let u_rep = u_star.get(rep);

                let varies = nodes.iter().any(|&n| (u_star.get(n) - u_rep).norm() > 1e-12);
                if varies {
                    warn!(
                        "virtual field '{}' varies across loaded surface '{}'; \
                         using its representative node",
                        field.name, load.surface
                    );
                }

                out[v * t_count + t] += load.force.dot(&u_rep);
            }
        }
    }
    Ok(out)
}
