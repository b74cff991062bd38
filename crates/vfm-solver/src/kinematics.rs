//! Kinematic reconstruction of deformation gradient fields.
//!
//! For a nodal displacement field u the deformation gradient at integration
//! point (e, g) is assembled on the reference configuration:
//!
//! F(e,g) = I + Σₐ u(nodeOf(e,a)) ⊗ ∇ₓNₐ(e,g)
//!
//! The summation order is the fixed element connectivity order, so identical
//! inputs reconstruct bit-identical fields. The underlying mesh state is
//! never touched.

use crate::facts::MeshFacts;
use crate::stores::{NodalField, ReferenceTensorField, TensorSeries};
use nalgebra::Matrix3;

/// Reconstruction switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconstructOptions {
    /// Clear out-of-plane shears and enforce out-of-plane incompressibility
    /// (F₂₂ = 1/(F₀₀·F₁₁)). Used for measured data from in-plane full-field
    /// setups; never for virtual fields.
    pub plane_deformation: bool,
    /// Fail when det F ≤ 0 at any integration point.
    pub guard_determinant: bool,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            plane_deformation: false,
            guard_determinant: true,
        }
    }
}

/// Plane-deformation post-pass. Idempotent: a second application leaves the
/// tensor unchanged.
pub fn apply_plane_deformation(f: &mut Matrix3<f64>) {
    f[(0, 2)] = 0.0;
    f[(1, 2)] = 0.0;
    f[(2, 0)] = 0.0;
    f[(2, 1)] = 0.0;
    f[(2, 2)] = 1.0 / (f[(0, 0)] * f[(1, 1)]);
}

/// Reconstruct one deformation-gradient field from one nodal field.
///
/// `label` names the source in diagnostics ("measured", a virtual-field
/// name); `t` is the frame ordinal being reconstructed.
pub fn reconstruct_frame(
    facts: &MeshFacts,
    u: &NodalField,
    opts: ReconstructOptions,
    label: &str,
    t: usize,
) -> Result<ReferenceTensorField, String> {
    if u.len() != facts.n_nodes() {
        return Err(format!(
            "{label} frame {t}: displacement field has {} nodes, mesh has {}",
            u.len(),
            facts.n_nodes()
        ));
    }

    let mut field = ReferenceTensorField::identity(facts.total_points());
    for e in 0..facts.n_elems() {
        let nodes = facts.elem_nodes(e);
        for g in 0..facts.gp_count(e) {
            let grads = facts.grad_n(e, g);
            let mut f = Matrix3::identity();
            for (a, &node) in nodes.iter().enumerate() {
                f += u.get(node) * grads[a].transpose();
            }
            if opts.plane_deformation {
                apply_plane_deformation(&mut f);
            }
            if opts.guard_determinant {
                let det = f.determinant();
                if det <= 0.0 {
                    return Err(format!(
                        "{label} frame {t}: det(F) = {det:e} ≤ 0 at element {} gauss point {g}",
                        facts.elem_id(e)
                    ));
                }
            }
            *field.at_mut(facts.point_index(e, g)) = f;
        }
    }
    Ok(field)
}

/// Reconstruct a whole series, one tensor field per displacement frame.
pub fn reconstruct_series(
    facts: &MeshFacts,
    frames: &[NodalField],
    opts: ReconstructOptions,
    label: &str,
) -> Result<TensorSeries, String> {
    let mut out = Vec::with_capacity(frames.len());
    for (t, u) in frames.iter().enumerate() {
        out.push(reconstruct_frame(facts, u, opts, label, t)?);
    }
    Ok(TensorSeries::new(out))
}
