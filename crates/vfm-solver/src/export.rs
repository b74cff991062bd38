//! Plot-frame assembly for the binary export.
//!
//! One state per time index of the longest of the measured, virtual, and
//! stress timelines. Variables are element-averaged where they live at
//! integration points; data missing at a time index is emitted as identity
//! (deformation gradients) or zero (displacements and stresses).

use crate::facts::MeshFacts;
use crate::problem::VfmProblem;
use crate::stores::ReferenceTensorField;
use nalgebra::Matrix3;
use vfm_io::{PlotFile, PlotState, VarKind};

const VAR_DISPLACEMENT: u32 = 1;
const VAR_DEFORMATION: u32 = 2;
const VAR_CAUCHY: u32 = 3;
const VAR_PIOLA: u32 = 4;
/// Virtual-field variables start here, two ids per field.
const VAR_VIRTUAL_BASE: u32 = 10;

/// Assemble the complete plot file for the problem's current state.
pub fn build_plot_file(problem: &VfmProblem) -> Result<PlotFile, String> {
    let facts = problem.facts();
    let n_nodes = facts.n_nodes();
    let n_elems = facts.n_elems();

    let mut plot = PlotFile::new(n_nodes, n_elems);
    let register = |plot: &mut PlotFile, id, kind, name: &str| {
        plot.register(id, kind, name).map_err(|e| e.to_string())
    };
    register(&mut plot, VAR_DISPLACEMENT, VarKind::Vec3Node, "displacement")?;
    register(
        &mut plot,
        VAR_DEFORMATION,
        VarKind::Mat3Elem,
        "deformation gradient",
    )?;
    register(&mut plot, VAR_CAUCHY, VarKind::Sym3Elem, "Cauchy stress")?;
    register(&mut plot, VAR_PIOLA, VarKind::Mat3Elem, "PK1 stress")?;
    for (v, field) in problem.virtual_fields().fields().iter().enumerate() {
        let base = VAR_VIRTUAL_BASE + 2 * v as u32;
        register(
            &mut plot,
            base,
            VarKind::Vec3Node,
            &format!("virtual displacement ({})", field.name),
        )?;
        register(
            &mut plot,
            base + 1,
            VarKind::Mat3Elem,
            &format!("virtual deformation gradient ({})", field.name),
        )?;
    }

    let t_virtual = problem
        .virtual_fields()
        .fields()
        .iter()
        .map(|f| f.frame_count())
        .max()
        .unwrap_or(0);
    let t_count = problem
        .measured_displacements()
        .len()
        .max(problem.stress().len())
        .max(t_virtual);

    for t in 0..t_count {
        let time = problem
            .measured_displacements()
            .time(t)
            .or_else(|| problem.loads().frame(t).map(|f| f.time))
            .unwrap_or(t as f64);

        let mut data: Vec<(u32, Vec<f64>)> = Vec::new();

        let displacement = match problem.measured_displacements().frame(t) {
            Some(u) => flatten_nodal(u.iter().copied()),
            None => vec![0.0; 3 * n_nodes],
        };
        data.push((VAR_DISPLACEMENT, displacement));

        let deformation = match problem.measured_deformation().frames().get(t) {
            Some(field) => flatten_full(&element_average(facts, field)),
            None => flatten_full(&vec![Matrix3::identity(); n_elems]),
        };
        data.push((VAR_DEFORMATION, deformation));

        let cauchy = match problem.stress().cauchy.frames().get(t) {
            Some(field) => flatten_sym(&element_average(facts, field)),
            None => vec![0.0; 6 * n_elems],
        };
        data.push((VAR_CAUCHY, cauchy));

        let piola = match problem.stress().piola.frames().get(t) {
            Some(field) => flatten_full(&element_average(facts, field)),
            None => vec![0.0; 9 * n_elems],
        };
        data.push((VAR_PIOLA, piola));

        for (v, field) in problem.virtual_fields().fields().iter().enumerate() {
            let base = VAR_VIRTUAL_BASE + 2 * v as u32;
            let u_star = match field.frames().get(t) {
                Some(u) => flatten_nodal(u.iter().copied()),
                None => vec![0.0; 3 * n_nodes],
            };
            data.push((base, u_star));

            let f_star = match problem.virtual_deformation()[v].frames().get(t) {
                Some(f) => flatten_full(&element_average(facts, f)),
                None => flatten_full(&vec![Matrix3::identity(); n_elems]),
            };
            data.push((base + 1, f_star));
        }

        plot.push_state(PlotState {
            ordinal: t as u32,
            time,
            data,
        })
        .map_err(|e| e.to_string())?;
    }

    Ok(plot)
}

/// Arithmetic mean over each element's integration points.
fn element_average(facts: &MeshFacts, field: &ReferenceTensorField) -> Vec<Matrix3<f64>> {
    (0..facts.n_elems())
        .map(|e| {
            let gp = facts.gp_count(e);
            let mut sum = Matrix3::zeros();
            for g in 0..gp {
                sum += field.at(facts.point_index(e, g));
            }
            sum / gp as f64
        })
        .collect()
}

fn flatten_nodal(values: impl Iterator<Item = nalgebra::Vector3<f64>>) -> Vec<f64> {
    let mut out = Vec::new();
    for v in values {
        out.extend_from_slice(&[v.x, v.y, v.z]);
    }
    out
}

/// Row-major nine components per tensor.
fn flatten_full(tensors: &[Matrix3<f64>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(9 * tensors.len());
    for m in tensors {
        for i in 0..3 {
            for j in 0..3 {
                out.push(m[(i, j)]);
            }
        }
    }
    out
}

/// Symmetric packing: xx, yy, zz, xy, yz, xz.
fn flatten_sym(tensors: &[Matrix3<f64>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(6 * tensors.len());
    for m in tensors {
        out.extend_from_slice(&[
            m[(0, 0)],
            m[(1, 1)],
            m[(2, 2)],
            m[(0, 1)],
            m[(1, 2)],
            m[(0, 2)],
        ]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::VfmProblem;
    use approx::assert_relative_eq;
    use vfm_config::parse_document;

    fn two_frame_problem() -> VfmProblem {
        let doc = parse_document(
            r#"
<vfm>
  <Mesh>
    <Nodes>
      <node id="1">0,0,0</node>
      <node id="2">1,0,0</node>
      <node id="3">1,1,0</node>
      <node id="4">0,1,0</node>
      <node id="5">0,0,1</node>
      <node id="6">1,0,1</node>
      <node id="7">1,1,1</node>
      <node id="8">0,1,1</node>
    </Nodes>
    <Elements type="hex8" name="block">
      <elem id="1">1,2,3,4,5,6,7,8</elem>
    </Elements>
    <Surface name="xplus">
      <quad4 id="1">2,3,7,6</quad4>
    </Surface>
  </Mesh>
  <Material type="neo-Hookean"><mu>1.0</mu><k>1000.0</k></Material>
  <Parameters>
    <param name="mu">1.0, 0.01, 10.0, 1.0</param>
  </Parameters>
  <MeasuredDisplacements>
    <time t="1.0">
      <node id="2">0.05, 0, 0</node>
      <node id="3">0.05, 0, 0</node>
      <node id="6">0.05, 0, 0</node>
      <node id="7">0.05, 0, 0</node>
    </time>
    <time t="2.0">
      <node id="2">0.10, 0, 0</node>
      <node id="3">0.10, 0, 0</node>
      <node id="6">0.10, 0, 0</node>
      <node id="7">0.10, 0, 0</node>
    </time>
  </MeasuredDisplacements>
  <VirtualDisplacements>
    <field name="rigid-x">
      <time t="1.0">
        <node id="1">1,0,0</node>
        <node id="2">1,0,0</node>
        <node id="3">1,0,0</node>
        <node id="4">1,0,0</node>
        <node id="5">1,0,0</node>
        <node id="6">1,0,0</node>
        <node id="7">1,0,0</node>
        <node id="8">1,0,0</node>
      </time>
    </field>
  </VirtualDisplacements>
  <MeasuredLoads>
    <time t="1.0">
      <surface name="xplus">0.1,0,0</surface>
    </time>
    <time t="2.0">
      <surface name="xplus">0.2,0,0</surface>
    </time>
  </MeasuredLoads>
</vfm>
"#,
        )
        .unwrap();
        VfmProblem::setup(&doc).unwrap()
    }

    #[test]
    fn registers_core_and_virtual_variables() {
        let problem = two_frame_problem();
        let plot = build_plot_file(&problem).unwrap();
        let names: Vec<&str> = plot.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "displacement",
                "deformation gradient",
                "Cauchy stress",
                "PK1 stress",
                "virtual displacement (rigid-x)",
                "virtual deformation gradient (rigid-x)",
            ]
        );
    }

    #[test]
    fn emits_one_state_per_frame_with_times() {
        let problem = two_frame_problem();
        let plot = build_plot_file(&problem).unwrap();
        assert_eq!(plot.states().len(), 2);
        assert_eq!(plot.states()[0].time, 1.0);
        assert_eq!(plot.states()[1].time, 2.0);
    }

    #[test]
    fn missing_virtual_frames_fill_with_defaults() {
        let problem = two_frame_problem();
        let plot = build_plot_file(&problem).unwrap();

        // The single-frame virtual field has no data at t = 1: zero
        // displacement, identity gradient.
        let state = &plot.states()[1];
        let u_star = &state
            .data
            .iter()
            .find(|(id, _)| *id == VAR_VIRTUAL_BASE)
            .unwrap()
            .1;
        assert!(u_star.iter().all(|&x| x == 0.0));

        let f_star = &state
            .data
            .iter()
            .find(|(id, _)| *id == VAR_VIRTUAL_BASE + 1)
            .unwrap()
            .1;
        assert_eq!(f_star.len(), 9);
        assert_relative_eq!(f_star[0], 1.0, epsilon = 1e-15);
        assert_relative_eq!(f_star[4], 1.0, epsilon = 1e-15);
        assert_relative_eq!(f_star[8], 1.0, epsilon = 1e-15);
        assert_relative_eq!(f_star[1], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn element_average_matches_homogeneous_state() {
        let problem = two_frame_problem();
        let plot = build_plot_file(&problem).unwrap();

        // Uniaxial stretch is homogeneous: the element average equals the
        // pointwise deformation gradient.
        let state = &plot.states()[0];
        let f_avg = &state
            .data
            .iter()
            .find(|(id, _)| *id == VAR_DEFORMATION)
            .unwrap()
            .1;
        assert_relative_eq!(f_avg[0], 1.05, epsilon = 1e-12);
        assert_relative_eq!(f_avg[4], 1.0, epsilon = 1e-12);
        assert_relative_eq!(f_avg[8], 1.0, epsilon = 1e-12);
    }
}
