//! Problem assembly and the optimization run loop.
//!
//! Setup builds every θ-independent quantity once: mesh facts, displacement
//! stores, measured and virtual deformation gradients, the surface map, and
//! the external virtual work vector. The run loop then minimizes
//!
//! r(θ)[v·T + t] = W_int(θ, v, t) − W_ext(v, t)
//!
//! re-evaluating parameters, stresses, and internal work inside the residual
//! callback. On any non-success exit the parameters and the stress store are
//! restored to the θ₀ state before the error is surfaced.

use crate::cancel::{CancelFlag, CancelGuard};
use crate::constitutive::evaluate_stresses;
use crate::external_work::{SurfaceMap, assemble_external_work};
use crate::facts::MeshFacts;
use crate::internal_work::assemble_internal_work;
use crate::kinematics::{ReconstructOptions, reconstruct_series};
use crate::levmar;
use crate::options::SolveOptions;
use crate::params::{ParameterApplier, ParameterSet, ParameterSpec};
use crate::stores::{
    DisplacementSeries, LoadFrame, LoadSeries, NodalField, StressStore, SurfaceLoad, TensorSeries,
    VirtualField, VirtualFieldSet,
};
use log::{info, warn};
use nalgebra::{DVector, Vector3};
use serde::Serialize;
use std::path::{Path, PathBuf};
use vfm_config::{TimeBlockDto, VfmDocument};
use vfm_io::VirtualWorkTable;
use vfm_model::Model;

/// Duplicate-time detection for floating `t` attributes.
const TIME_EPSILON: f64 = 1e-12;

/// A fully assembled identification problem.
#[derive(Debug)]
pub struct VfmProblem {
    model: Model,
    facts: MeshFacts,
    measured_u: DisplacementSeries,
    virtual_u: VirtualFieldSet,
    loads: LoadSeries,
    measured_f: TensorSeries,
    virtual_f: Vec<TensorSeries>,
    surface_map: SurfaceMap,
    external_work: Vec<f64>,
    params: ParameterSet,
    applier: ParameterApplier,
    stress: StressStore,
    options: SolveOptions,
    cancel: CancelFlag,
}

/// Result of a successful run, serializable for machine consumption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub parameters: Vec<(String, f64)>,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub grad_inf_norm: f64,
    pub step_norm: f64,
    pub damping: f64,
    pub iterations: usize,
    pub stop_reason: String,
    pub n_residual_evals: usize,
    pub n_jacobian_evals: usize,
    pub n_linear_solves: usize,
}

impl VfmProblem {
    /// End-to-end setup: validate the document, build every frozen store,
    /// reconstruct deformation gradients, resolve surfaces, precompute the
    /// external work, and evaluate the θ₀ stress state. Any failure aborts
    /// with a descriptive message and no partially built problem escapes.
    pub fn setup(doc: &VfmDocument) -> Result<Self, String> {
        let options = SolveOptions::from_dto(&doc.options)?;

        let specs: Vec<ParameterSpec> = doc
            .parameters
            .iter()
            .map(|p| ParameterSpec {
                name: p.name.clone(),
                init: p.init,
                lo: p.lo,
                hi: p.hi,
                scale: p.scale,
            })
            .collect();
        let mut params = ParameterSet::new(specs)?;

        let mut model = Model::from_document(doc)?;
        let non_solid = model.mesh.non_solid_domains();
        if !non_solid.is_empty() {
            return Err(format!(
                "model contains non-solid domains: {}",
                non_solid.join(", ")
            ));
        }
        let facts = MeshFacts::build(&model.mesh)?;

        let blocks = order_time_blocks(&doc.measured_displacements, "MeasuredDisplacements")?;
        if blocks.is_empty() {
            return Err("no measured displacement frames".to_string());
        }
        let mut measured_u = DisplacementSeries::new(facts.n_nodes());
        for block in &blocks {
            let field = nodal_field_from_block(&facts, block, "MeasuredDisplacements")?;
            measured_u.push(block.t, field)?;
        }
        let t_count = measured_u.len();

        let loads = build_load_series(doc)?;
        if loads.len() != t_count {
            return Err(format!(
                "measured displacements have {t_count} frames but loads have {}; \
                 the timelines must match",
                loads.len()
            ));
        }

        if doc.virtual_fields.is_empty() {
            return Err("no virtual displacement fields".to_string());
        }
        let mut virtual_u = VirtualFieldSet::new(facts.n_nodes());
        for vf in &doc.virtual_fields {
            let blocks = order_time_blocks(&vf.times, &vf.name)?;
            if blocks.is_empty() {
                return Err(format!("virtual field '{}' has no frames", vf.name));
            }
            let frames = blocks
                .iter()
                .map(|b| nodal_field_from_block(&facts, b, &vf.name))
                .collect::<Result<Vec<_>, String>>()?;
            virtual_u.push(VirtualField::new(vf.name.clone(), frames))?;
        }
        virtual_u.validate_frame_counts(t_count)?;

        let measured_f = reconstruct_series(
            &facts,
            measured_u.frames(),
            ReconstructOptions {
                plane_deformation: options.plane_deformation,
                guard_determinant: true,
            },
            "measured",
        )?;
        let mut virtual_f = Vec::with_capacity(virtual_u.len());
        for field in virtual_u.fields() {
            virtual_f.push(reconstruct_series(
                &facts,
                field.frames(),
                ReconstructOptions {
                    plane_deformation: false,
                    guard_determinant: true,
                },
                &field.name,
            )?);
        }

        let surface_map = SurfaceMap::resolve(&facts, &model.mesh, &loads)?;
        let external_work = assemble_external_work(&surface_map, &virtual_u, &loads)?;

        let applier = ParameterApplier::resolve(&model.material, &params)?;
        let theta0 = params.initial_values();
        applier.apply(&mut model.material, &mut params, &theta0)?;
        let stress = evaluate_stresses(&facts, &model, &measured_f)?;

        info!(
            "problem ready: {} nodes, {} elements, {} integration points, {} frames, \
             {} virtual fields, {} parameters",
            facts.n_nodes(),
            facts.n_elems(),
            facts.total_points(),
            t_count,
            virtual_u.len(),
            params.len()
        );

        Ok(Self {
            model,
            facts,
            measured_u,
            virtual_u,
            loads,
            measured_f,
            virtual_f,
            surface_map,
            external_work,
            params,
            applier,
            stress,
            options,
            cancel: CancelFlag::new(),
        })
    }

    /// The flag polled by the residual callback; clone it to cancel from
    /// another thread or a signal handler.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn facts(&self) -> &MeshFacts {
        &self.facts
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }

    pub fn measured_displacements(&self) -> &DisplacementSeries {
        &self.measured_u
    }

    pub fn virtual_fields(&self) -> &VirtualFieldSet {
        &self.virtual_u
    }

    pub fn loads(&self) -> &LoadSeries {
        &self.loads
    }

    pub fn measured_deformation(&self) -> &TensorSeries {
        &self.measured_f
    }

    pub fn virtual_deformation(&self) -> &[TensorSeries] {
        &self.virtual_f
    }

    pub fn surface_map(&self) -> &SurfaceMap {
        &self.surface_map
    }

    pub fn external_work(&self) -> &[f64] {
        &self.external_work
    }

    pub fn stress(&self) -> &StressStore {
        &self.stress
    }

    /// Minimize the virtual-work residual.
    ///
    /// On success the converged parameters are committed and the stress
    /// store reflects θ*. On failure or cancellation the parameters and
    /// stresses are restored to θ₀ and the error message is returned.
    pub fn run(&mut self) -> Result<RunSummary, String> {
        let t_count = self.measured_u.len();
        let n_residuals = self.virtual_u.len() * t_count;
        if n_residuals == 0 {
            return Err("nothing to identify: the residual vector is empty".to_string());
        }

        // The minimizer works on scaled variables θ/s to keep the normal
        // equations well conditioned when parameter magnitudes differ by
        // orders of magnitude.
        let scales: Vec<f64> = self
            .params
            .params()
            .iter()
            .map(|p| p.spec.scale.abs())
            .collect();
        let theta0_phys = self.params.values();
        let m = theta0_phys.len();
        let theta0 = DVector::from_iterator(
            m,
            theta0_phys.iter().zip(&scales).map(|(v, s)| v / s),
        );
        let lo = DVector::from_iterator(
            m,
            self.params
                .lower_bounds()
                .iter()
                .zip(&scales)
                .map(|(v, s)| v / s),
        );
        let hi = DVector::from_iterator(
            m,
            self.params
                .upper_bounds()
                .iter()
                .zip(&scales)
                .map(|(v, s)| v / s),
        );
        let lm_opts = self.options.lm;

        info!(
            "starting {:?} with {} residuals and {} parameters",
            self.options.mode, n_residuals, m
        );

        let _guard = CancelGuard::install(&self.cancel);

        let result = {
            let mut ctx = ResidualCtx {
                facts: &self.facts,
                model: &mut self.model,
                params: &mut self.params,
                applier: &self.applier,
                measured_f: &self.measured_f,
                virtual_f: &self.virtual_f,
                external_work: &self.external_work,
                stress: &mut self.stress,
                cancel: &self.cancel,
                eval_index: 0,
                failure: None,
            };
            let scales = &scales;
            levmar::minimize(
                &mut |theta_scaled, out| {
                    let theta_phys: Vec<f64> = theta_scaled
                        .iter()
                        .zip(scales)
                        .map(|(v, s)| v * s)
                        .collect();
                    ctx.eval(&theta_phys, out)
                },
                &theta0,
                n_residuals,
                &lo,
                &hi,
                &lm_opts,
            )
        };

        match result {
            Ok(outcome) => {
                let theta_star: Vec<f64> = outcome
                    .theta
                    .iter()
                    .zip(&scales)
                    .map(|(v, s)| v * s)
                    .collect();
                self.applier
                    .apply(&mut self.model.material, &mut self.params, &theta_star)?;
                self.stress = evaluate_stresses(&self.facts, &self.model, &self.measured_f)?;

                let report = outcome.report;
                info!(
                    "terminated: {} after {} iterations",
                    report.stop_reason.describe(),
                    report.iterations
                );
                info!(
                    "cost {:.6e} -> {:.6e}, |J'e|_inf {:.3e}, |dp| {:.3e}, damping {:.3e}",
                    report.initial_cost,
                    report.final_cost,
                    report.grad_inf_norm,
                    report.step_norm,
                    report.damping
                );
                info!(
                    "{} residual evaluations, {} jacobians, {} linear solves",
                    report.n_residual_evals, report.n_jacobian_evals, report.n_linear_solves
                );
                for p in self.params.params() {
                    info!("  {} = {:.12e}", p.spec.name, p.value);
                }

                Ok(RunSummary {
                    parameters: self
                        .params
                        .params()
                        .iter()
                        .map(|p| (p.spec.name.clone(), p.value))
                        .collect(),
                    initial_cost: report.initial_cost,
                    final_cost: report.final_cost,
                    grad_inf_norm: report.grad_inf_norm,
                    step_norm: report.step_norm,
                    damping: report.damping,
                    iterations: report.iterations,
                    stop_reason: report.stop_reason.describe().to_string(),
                    n_residual_evals: report.n_residual_evals,
                    n_jacobian_evals: report.n_jacobian_evals,
                    n_linear_solves: report.n_linear_solves,
                })
            }
            Err(message) => {
                warn!("optimization failed: {message}; restoring initial parameters");
                if let Err(e) =
                    self.applier
                        .apply(&mut self.model.material, &mut self.params, &theta0_phys)
                {
                    warn!("failed to restore initial parameters: {e}");
                }
                match evaluate_stresses(&self.facts, &self.model, &self.measured_f) {
                    Ok(stress) => self.stress = stress,
                    Err(e) => warn!("failed to rebuild initial stresses: {e}"),
                }
                Err(message)
            }
        }
    }

    /// Write the binary plot artifact for the current (post-run) state.
    pub fn write_plot(&self, path: &Path) -> Result<(), String> {
        let plot = crate::export::build_plot_file(self)?;
        plot.write_file(path)
            .map_err(|e| format!("failed to write plot file {}: {e}", path.display()))
    }

    /// Write the virtual-work table when the options request one. Returns
    /// the path written to.
    pub fn write_virtual_work(&self) -> Result<Option<PathBuf>, String> {
        let Some(path) = &self.options.save_virtual_work else {
            return Ok(None);
        };
        let t_count = self.stress.len();
        let n_vf = self.virtual_u.len();

        let flat_internal =
            assemble_internal_work(&self.facts, &self.virtual_f, &self.stress.piola)?;
        let mut internal = vec![vec![0.0; n_vf]; t_count];
        let mut external = vec![vec![0.0; n_vf]; t_count];
        for v in 0..n_vf {
            for t in 0..t_count {
                internal[t][v] = flat_internal[v * t_count + t];
                external[t][v] = self.external_work[v * t_count + t];
            }
        }

        let table = VirtualWorkTable::new(internal, external).map_err(|e| e.to_string())?;
        table
            .write_file(path)
            .map_err(|e| format!("failed to write virtual-work table: {e}"))?;
        Ok(Some(path.clone()))
    }
}

/// Residual evaluation context: parameter application, stress recomputation,
/// and internal-work assembly, with failure latching and cancellation.
struct ResidualCtx<'a> {
    facts: &'a MeshFacts,
    model: &'a mut Model,
    params: &'a mut ParameterSet,
    applier: &'a ParameterApplier,
    measured_f: &'a TensorSeries,
    virtual_f: &'a [TensorSeries],
    external_work: &'a [f64],
    stress: &'a mut StressStore,
    cancel: &'a CancelFlag,
    eval_index: usize,
    failure: Option<String>,
}

impl ResidualCtx<'_> {
    fn eval(&mut self, theta: &[f64], out: &mut DVector<f64>) -> Result<(), String> {
        // Once latched, every subsequent call fails fast with zeros so the
        // minimizer winds down without consuming garbage.
        if let Some(message) = &self.failure {
            out.fill(0.0);
            return Err(message.clone());
        }
        if self.cancel.is_cancelled() {
            let message = "optimization interrupted".to_string();
            self.failure = Some(message.clone());
            out.fill(0.0);
            return Err(message);
        }

        self.eval_index += 1;
        match self.try_eval(theta, out) {
            Ok(()) => Ok(()),
            Err(message) => {
                self.failure = Some(message.clone());
                out.fill(0.0);
                Err(message)
            }
        }
    }

    fn try_eval(&mut self, theta: &[f64], out: &mut DVector<f64>) -> Result<(), String> {
        self.applier
            .apply(&mut self.model.material, self.params, theta)?;

        *self.stress = evaluate_stresses(self.facts, self.model, self.measured_f)?;
        let internal = assemble_internal_work(self.facts, self.virtual_f, &self.stress.piola)?;

        if internal.len() != self.external_work.len() {
            return Err(format!(
                "residual dimension {} differs from external-work dimension {}",
                internal.len(),
                self.external_work.len()
            ));
        }
        if out.len() != internal.len() {
            return Err(format!(
                "residual buffer has length {}, expected {}",
                out.len(),
                internal.len()
            ));
        }
        for (i, iw) in internal.iter().enumerate() {
            out[i] = iw - self.external_work[i];
        }

        let cost_text = if self.external_work.is_empty() {
            "N/A".to_string()
        } else {
            let cost = 0.5 * out.iter().map(|x| x * x).sum::<f64>();
            format!("{cost:.6e}")
        };
        let values = self
            .params
            .params()
            .iter()
            .map(|p| format!("{} = {:.9e}", p.spec.name, p.value))
            .collect::<Vec<_>>()
            .join(", ");
        info!("eval {:>4}: cost {cost_text}  [{values}]", self.eval_index);
        Ok(())
    }
}

/// Order time blocks by their floating `t` attribute; equal times (within
/// 1e-12) are fatal. The returned order defines the ordinal frame indices.
fn order_time_blocks<'a>(
    blocks: &'a [TimeBlockDto],
    section: &str,
) -> Result<Vec<&'a TimeBlockDto>, String> {
    let mut ordered: Vec<&TimeBlockDto> = blocks.iter().collect();
    for block in &ordered {
        if !block.t.is_finite() {
            return Err(format!("{section}: non-finite time attribute {}", block.t));
        }
    }
    ordered.sort_by(|a, b| a.t.partial_cmp(&b.t).expect("times are finite"));
    for pair in ordered.windows(2) {
        if (pair[1].t - pair[0].t).abs() <= TIME_EPSILON {
            return Err(format!(
                "{section}: duplicate time {} (times must be distinct)",
                pair[0].t
            ));
        }
    }
    Ok(ordered)
}

fn nodal_field_from_block(
    facts: &MeshFacts,
    block: &TimeBlockDto,
    section: &str,
) -> Result<NodalField, String> {
    let mut field = NodalField::zeros(facts.n_nodes());
    for row in &block.rows {
        let idx = facts.node_index(row.node_id).ok_or_else(|| {
            format!(
                "{section} time {}: unknown node id {}",
                block.t, row.node_id
            )
        })?;
        field.set(idx, Vector3::new(row.ux, row.uy, row.uz));
    }
    Ok(field)
}

fn build_load_series(doc: &VfmDocument) -> Result<LoadSeries, String> {
    let mut ordered: Vec<_> = doc.measured_loads.iter().collect();
    for block in &ordered {
        if !block.t.is_finite() {
            return Err(format!(
                "MeasuredLoads: non-finite time attribute {}",
                block.t
            ));
        }
    }
    ordered.sort_by(|a, b| a.t.partial_cmp(&b.t).expect("times are finite"));
    for pair in ordered.windows(2) {
        if (pair[1].t - pair[0].t).abs() <= TIME_EPSILON {
            return Err(format!(
                "MeasuredLoads: duplicate time {} (times must be distinct)",
                pair[0].t
            ));
        }
    }

    let frames = ordered
        .into_iter()
        .map(|block| LoadFrame {
            time: block.t,
            loads: block
                .rows
                .iter()
                .map(|row| SurfaceLoad {
                    surface: row.surface.clone(),
                    force: Vector3::new(row.fx, row.fy, row.fz),
                })
                .collect(),
        })
        .collect();
    Ok(LoadSeries::new(frames))
}
