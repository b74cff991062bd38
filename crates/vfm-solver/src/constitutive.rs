//! Constitutive driver: stress recomputation for a parameter trial.
//!
//! For every (t, e, g) the driver clones the mesh's own material point,
//! injects the reconstructed deformation gradient, and evaluates the Cauchy
//! stress through the material's stress provider. The first Piola stress
//! follows as P = J σ F⁻ᵀ. Mesh-owned material points are read-only here;
//! all trial state lives in the clones.
//!
//! ## Uncoupled materials
//!
//! Laws with a deviatoric/volumetric split expose only the deviatoric
//! Cauchy stress. The total stress is recovered with the plane-stress
//! identification convention σ_zz = 0:
//!
//! σ = dev − dev₂₂ · I
//!
//! This is a deliberate modeling choice; identification results from
//! uncoupled laws depend on it.

use crate::facts::MeshFacts;
use crate::stores::{ReferenceTensorField, StressStore, TensorSeries};
use nalgebra::Matrix3;
use vfm_model::{MaterialPoint, Model, StressEval};

/// Recompute Cauchy and first Piola stresses for every frame of the
/// deformation series under the model's current parameters.
pub fn evaluate_stresses(
    facts: &MeshFacts,
    model: &Model,
    deformation: &TensorSeries,
) -> Result<StressStore, String> {
    let total = facts.total_points();
    let mut cauchy_frames = Vec::with_capacity(deformation.len());
    let mut piola_frames = Vec::with_capacity(deformation.len());

    for t in 0..deformation.len() {
        let f_field = deformation
            .frame(t)
            .ok_or_else(|| format!("deformation store has no frame {t}"))?;
        if f_field.len() != total {
            return Err(format!(
                "deformation frame {t} has {} points, mesh facts have {total}",
                f_field.len()
            ));
        }

        let mut cauchy = ReferenceTensorField::zeros(total);
        let mut piola = ReferenceTensorField::zeros(total);

        for e in 0..facts.n_elems() {
            let (dom, local) = facts.elem_location(e);
            let domain = &model.mesh.domains[dom];
            for g in 0..facts.gp_count(e) {
                let point = facts.point_index(e, g);
                let f = *f_field.at(point);
                let det = f.determinant();
                if det <= 0.0 {
                    return Err(format!(
                        "frame {t}: det(F) = {det:e} ≤ 0 at element {} gauss point {g}",
                        facts.elem_id(e)
                    ));
                }

                let mesh_point = domain.material_point(local, g).ok_or_else(|| {
                    format!(
                        "no material point for element {} gauss point {g}",
                        facts.elem_id(e)
                    )
                })?;
                let trial = mesh_point.trial_clone(f);
                let sigma = cauchy_stress(&model.material.stress_eval(), &trial);
                debug_assert!(
                    (sigma - sigma.transpose()).norm() <= 1e-10 * (1.0 + sigma.norm()),
                    "constitutive law returned a non-symmetric Cauchy stress"
                );

                let f_inv = f.try_inverse().ok_or_else(|| {
                    format!(
                        "frame {t}: singular deformation gradient at element {} gauss point {g}",
                        facts.elem_id(e)
                    )
                })?;
                let p = sigma * f_inv.transpose() * det;

                *cauchy.at_mut(point) = sigma;
                *piola.at_mut(point) = p;
            }
        }

        cauchy_frames.push(cauchy);
        piola_frames.push(piola);
    }

    StressStore::new(
        TensorSeries::new(cauchy_frames),
        TensorSeries::new(piola_frames),
    )
}

/// Total Cauchy stress from the material's stress provider.
fn cauchy_stress(eval: &StressEval<'_>, trial: &MaterialPoint) -> Matrix3<f64> {
    match eval {
        StressEval::Full(law) => law.cauchy_stress(trial),
        StressEval::Deviatoric(law) => {
            let dev = law.deviatoric_cauchy_stress(trial);
            dev - Matrix3::identity() * dev[(2, 2)]
        }
    }
}
