//! End-to-end identification scenarios on a single unit-cube hex8 element
//! with a neo-Hookean material.
//!
//! The measured data are manufactured: nodal displacements for a homogeneous
//! uniaxial stretch and surface resultants computed by forward-evaluating
//! the law at the true parameters. The runs then recover those parameters
//! from perturbed starting points.

use approx::assert_relative_eq;
use nalgebra::Matrix3;
use vfm_config::parse_document;
use vfm_model::{FullStressLaw, MaterialPoint, NeoHookean};
use vfm_solver::{VfmProblem, assemble_internal_work};

/// First Piola stress of the neo-Hookean law under uniaxial stretch λ along
/// x with free lateral kinematics F = diag(λ, 1, 1).
fn uniaxial_piola(mu: f64, k: f64, lambda: f64) -> Matrix3<f64> {
    let law = NeoHookean { mu, k };
    let f = Matrix3::new(lambda, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
    let pt = MaterialPoint::reference().trial_clone(f);
    let sigma = law.cauchy_stress(&pt);
    sigma * f.try_inverse().unwrap().transpose() * f.determinant()
}

const MESH: &str = r#"
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
    <Surface name="yplus">
      <quad4 id="2">3,4,8,7</quad4>
    </Surface>
  </Mesh>
"#;

/// Virtual field u* = x·e_x: unit translation of the +x face, linear ramp
/// inside. Nodes at x = 0 stay at rest and are omitted (zero default).
fn stretch_x_frame(t: f64) -> String {
    format!(
        r#"<time t="{t}">
        <node id="2">1,0,0</node>
        <node id="3">1,0,0</node>
        <node id="6">1,0,0</node>
        <node id="7">1,0,0</node>
      </time>"#
    )
}

/// Virtual field u* = y·e_y.
fn stretch_y_frame(t: f64) -> String {
    format!(
        r#"<time t="{t}">
        <node id="3">0,1,0</node>
        <node id="4">0,1,0</node>
        <node id="7">0,1,0</node>
        <node id="8">0,1,0</node>
      </time>"#
    )
}

/// Measured nodal displacements of F = diag(λ, 1, 1) on the unit cube.
fn uniaxial_frame(t: f64, lambda: f64) -> String {
    let u = lambda - 1.0;
    format!(
        r#"<time t="{t}">
        <node id="2">{u:.17e},0,0</node>
        <node id="3">{u:.17e},0,0</node>
        <node id="6">{u:.17e},0,0</node>
        <node id="7">{u:.17e},0,0</node>
      </time>"#
    )
}

/// S1: zero measurements, zero loads. The residual vanishes for any θ and
/// the driver stops at θ₀ without taking a step.
#[test]
fn identity_scenario_keeps_initial_parameters() {
    let doc = parse_document(&format!(
        r#"
<vfm>
  {MESH}
  <Material type="neo-Hookean"><mu>1.0</mu><k>1000.0</k></Material>
  <Parameters>
    <param name="mu">0.7, 0.01, 10.0, 1.0</param>
  </Parameters>
  <MeasuredDisplacements>
    <time t="1.0"></time>
  </MeasuredDisplacements>
  <VirtualDisplacements>
    <field name="stretch-x">{vf}</field>
  </VirtualDisplacements>
  <MeasuredLoads>
    <time t="1.0">
      <surface name="xplus">0,0,0</surface>
    </time>
  </MeasuredLoads>
</vfm>
"#,
        vf = stretch_x_frame(1.0)
    ))
    .unwrap();

    let mut problem = VfmProblem::setup(&doc).unwrap();

    // F ≡ I and σ ≡ 0 at θ₀.
    let f = problem.measured_deformation().frame(0).unwrap();
    for p in 0..problem.facts().total_points() {
        assert_relative_eq!((f.at(p) - Matrix3::identity()).norm(), 0.0, epsilon = 1e-14);
        assert_relative_eq!(
            problem.stress().cauchy.frame(0).unwrap().at(p).norm(),
            0.0,
            epsilon = 1e-13
        );
    }
    assert_eq!(problem.external_work(), &[0.0]);

    let summary = problem.run().unwrap();
    assert!(summary.iterations <= 1);
    assert_relative_eq!(summary.final_cost, 0.0, epsilon = 1e-24);
    assert_eq!(summary.parameters, vec![("mu".to_string(), 0.7)]);
}

fn uniaxial_doc(lambda: f64, load_x: f64, mu_init: f64, mu_hi: f64) -> String {
    format!(
        r#"
<vfm>
  {MESH}
  <Material type="neo-Hookean"><mu>1.0</mu><k>1000.0</k></Material>
  <Parameters>
    <param name="mu">{mu_init}, 0.01, {mu_hi}, 1.0</param>
  </Parameters>
  <MeasuredDisplacements>
    {measured}
  </MeasuredDisplacements>
  <VirtualDisplacements>
    <field name="stretch-x">{vf}</field>
  </VirtualDisplacements>
  <MeasuredLoads>
    <time t="1.0">
      <surface name="xplus">{load_x:.17e},0,0</surface>
    </time>
  </MeasuredLoads>
</vfm>
"#,
        measured = uniaxial_frame(1.0, lambda),
        vf = stretch_x_frame(1.0)
    )
}

/// S2: recover μ = 1 from μ₀ = 0.7 against a manufactured uniaxial test.
#[test]
fn uniaxial_scenario_recovers_shear_modulus() {
    let lambda = 1.10;
    let p_true = uniaxial_piola(1.0, 1000.0, lambda);
    let doc = parse_document(&uniaxial_doc(lambda, p_true[(0, 0)], 0.7, 10.0)).unwrap();

    let mut problem = VfmProblem::setup(&doc).unwrap();
    let summary = problem.run().unwrap();

    assert_eq!(summary.parameters.len(), 1);
    assert_relative_eq!(summary.parameters[0].1, 1.0, epsilon = 1e-6);
    assert!(summary.final_cost < 1e-14);

    // The committed stress store reflects θ*.
    let sigma = problem.stress().cauchy.frame(0).unwrap().at(0);
    let law = NeoHookean { mu: summary.parameters[0].1, k: 1000.0 };
    let f = Matrix3::new(lambda, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
    let expected = law.cauchy_stress(&MaterialPoint::reference().trial_clone(f));
    assert_relative_eq!((sigma - expected).norm(), 0.0, epsilon = 1e-10);
}

/// Determinism: two identical runs give bitwise-identical results.
#[test]
fn identical_runs_are_bitwise_identical() {
    let lambda = 1.10;
    let p_true = uniaxial_piola(1.0, 1000.0, lambda);
    let source = uniaxial_doc(lambda, p_true[(0, 0)], 0.7, 10.0);

    let run = || {
        let doc = parse_document(&source).unwrap();
        let mut problem = VfmProblem::setup(&doc).unwrap();
        let summary = problem.run().unwrap();
        (summary, problem.stress().clone())
    };

    let (summary_a, stress_a) = run();
    let (summary_b, stress_b) = run();
    assert_eq!(summary_a.parameters, summary_b.parameters);
    assert_eq!(summary_a.iterations, summary_b.iterations);
    assert_eq!(summary_a.n_residual_evals, summary_b.n_residual_evals);
    assert_eq!(stress_a, stress_b);
}

/// S3: two virtual fields, two frames, two parameters.
#[test]
fn multi_field_scenario_recovers_both_parameters() {
    let (mu_true, k_true) = (1.0, 1000.0);
    let lambdas = [1.05, 1.10];
    let p1 = uniaxial_piola(mu_true, k_true, lambdas[0]);
    let p2 = uniaxial_piola(mu_true, k_true, lambdas[1]);

    let doc = parse_document(&format!(
        r#"
<vfm>
  {MESH}
  <Material type="neo-Hookean"><mu>1.0</mu><k>1000.0</k></Material>
  <Parameters>
    <param name="mu">0.7, 0.01, 10.0, 1.0</param>
    <param name="k">800.0, 1.0, 5000.0, 1.0</param>
  </Parameters>
  <MeasuredDisplacements>
    {m1}
    {m2}
  </MeasuredDisplacements>
  <VirtualDisplacements>
    <field name="stretch-x">{vx1}{vx2}</field>
    <field name="stretch-y">{vy1}{vy2}</field>
  </VirtualDisplacements>
  <MeasuredLoads>
    <time t="1.0">
      <surface name="xplus">{fx1:.17e},0,0</surface>
      <surface name="yplus">0,{fy1:.17e},0</surface>
    </time>
    <time t="2.0">
      <surface name="xplus">{fx2:.17e},0,0</surface>
      <surface name="yplus">0,{fy2:.17e},0</surface>
    </time>
  </MeasuredLoads>
</vfm>
"#,
        m1 = uniaxial_frame(1.0, lambdas[0]),
        m2 = uniaxial_frame(2.0, lambdas[1]),
        vx1 = stretch_x_frame(1.0),
        vx2 = stretch_x_frame(2.0),
        vy1 = stretch_y_frame(1.0),
        vy2 = stretch_y_frame(2.0),
        fx1 = p1[(0, 0)],
        fy1 = p1[(1, 1)],
        fx2 = p2[(0, 0)],
        fy2 = p2[(1, 1)],
    ))
    .unwrap();

    let mut problem = VfmProblem::setup(&doc).unwrap();
    // Residual has length nVF · T = 4.
    assert_eq!(problem.external_work().len(), 4);

    let summary = problem.run().unwrap();
    assert_relative_eq!(summary.parameters[0].1, mu_true, epsilon = 1e-5);
    assert_relative_eq!(summary.parameters[1].1, k_true, max_relative = 1e-5);
    assert!(summary.final_cost < 1e-12);
}

/// S4: a biting upper bound pins μ at 0.9 with a non-vanishing gradient.
#[test]
fn biting_bound_pins_parameter() {
    let lambda = 1.10;
    let p_true = uniaxial_piola(1.0, 1000.0, lambda);
    let doc = parse_document(&uniaxial_doc(lambda, p_true[(0, 0)], 0.7, 0.9)).unwrap();

    let mut problem = VfmProblem::setup(&doc).unwrap();
    let summary = problem.run().unwrap();

    assert_eq!(summary.parameters[0].1, 0.9);
    assert!(summary.grad_inf_norm > 0.0);
    assert!(summary.final_cost > 0.0);
}

/// S5: a cancelled run fails with "optimization interrupted" and restores
/// parameters and stresses to the θ₀ state bitwise.
#[test]
fn cancelled_run_restores_initial_state() {
    let lambda = 1.10;
    let p_true = uniaxial_piola(1.0, 1000.0, lambda);
    let doc = parse_document(&uniaxial_doc(lambda, p_true[(0, 0)], 0.7, 10.0)).unwrap();

    let mut problem = VfmProblem::setup(&doc).unwrap();
    let stress_before = problem.stress().clone();
    let values_before = problem.params().values();

    problem.cancel_flag().cancel();
    let err = problem.run().expect_err("cancelled run must fail");
    assert!(err.contains("optimization interrupted"));

    assert_eq!(problem.params().values(), values_before);
    assert_eq!(problem.stress(), &stress_before);
    assert_eq!(problem.model().material.param(0), Some(values_before[0]));
}

/// The unconstrained solver variant recovers the same parameter.
#[test]
fn unconstrained_solver_recovers_parameter() {
    let lambda = 1.10;
    let p_true = uniaxial_piola(1.0, 1000.0, lambda);
    let mut source = uniaxial_doc(lambda, p_true[(0, 0)], 0.7, 10.0);
    source = source.replace(
        "</vfm>",
        "  <Options><solver>levmar</solver></Options>\n</vfm>",
    );
    let doc = parse_document(&source).unwrap();

    let mut problem = VfmProblem::setup(&doc).unwrap();
    let summary = problem.run().unwrap();
    assert_relative_eq!(summary.parameters[0].1, 1.0, epsilon = 1e-6);
}

/// S6: a single-frame virtual field applies frame 0 at every time, so a
/// time-constant stress state yields identical internal work at every t.
#[test]
fn single_frame_virtual_field_is_time_invariant() {
    let lambda = 1.08;
    let p_true = uniaxial_piola(1.0, 1000.0, lambda);
    let measured: String = (1..=5).map(|t| uniaxial_frame(t as f64, lambda)).collect();
    let loads: String = (1..=5)
        .map(|t| {
            format!(
                r#"<time t="{t}.0">
      <surface name="xplus">{:.17e},0,0</surface>
    </time>"#,
                p_true[(0, 0)]
            )
        })
        .collect();

    let doc = parse_document(&format!(
        r#"
<vfm>
  {MESH}
  <Material type="neo-Hookean"><mu>1.0</mu><k>1000.0</k></Material>
  <Parameters>
    <param name="mu">1.0, 0.01, 10.0, 1.0</param>
  </Parameters>
  <MeasuredDisplacements>
    {measured}
  </MeasuredDisplacements>
  <VirtualDisplacements>
    <field name="stretch-x">{vf}</field>
  </VirtualDisplacements>
  <MeasuredLoads>
    {loads}
  </MeasuredLoads>
</vfm>
"#,
        vf = stretch_x_frame(1.0)
    ))
    .unwrap();

    let problem = VfmProblem::setup(&doc).unwrap();
    let internal = assemble_internal_work(
        problem.facts(),
        problem.virtual_deformation(),
        &problem.stress().piola,
    )
    .unwrap();

    assert_eq!(internal.len(), 5);
    for t in 1..5 {
        assert_relative_eq!(internal[t], internal[0], epsilon = 1e-13);
    }
}

/// S7: a load naming an unknown surface aborts setup with the surface name.
#[test]
fn unknown_surface_aborts_setup() {
    let doc = parse_document(&format!(
        r#"
<vfm>
  {MESH}
  <Material type="neo-Hookean"><mu>1.0</mu><k>1000.0</k></Material>
  <Parameters>
    <param name="mu">0.7, 0.01, 10.0, 1.0</param>
  </Parameters>
  <MeasuredDisplacements>
    <time t="1.0"></time>
  </MeasuredDisplacements>
  <VirtualDisplacements>
    <field name="stretch-x">{vf}</field>
  </VirtualDisplacements>
  <MeasuredLoads>
    <time t="1.0">
      <surface name="zminus">0,0,1</surface>
    </time>
  </MeasuredLoads>
</vfm>
"#,
        vf = stretch_x_frame(1.0)
    ))
    .unwrap();

    let err = VfmProblem::setup(&doc).expect_err("unknown surface must abort setup");
    assert!(err.contains("zminus"));
}

/// Mixed hex8/tet4 domains: ragged integration-point storage end to end.
/// Both solids carry the same homogeneous stretch, so the internal work
/// integrates P_xx over the combined reference volume 1 + 1/6.
#[test]
fn mixed_domains_recover_parameter() {
    let lambda = 1.10;
    let p_true = uniaxial_piola(1.0, 1000.0, lambda);
    let load = p_true[(0, 0)] * (1.0 + 1.0 / 6.0);
    let u = lambda - 1.0;

    let doc = parse_document(&format!(
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
      <node id="9">0,0,2</node>
      <node id="10">1,0,2</node>
      <node id="11">0,1,2</node>
      <node id="12">0,0,3</node>
    </Nodes>
    <Elements type="hex8" name="block">
      <elem id="1">1,2,3,4,5,6,7,8</elem>
    </Elements>
    <Elements type="tet4" name="pad">
      <elem id="2">9,10,11,12</elem>
    </Elements>
    <Surface name="xplus">
      <quad4 id="1">2,3,7,6</quad4>
    </Surface>
  </Mesh>
  <Material type="neo-Hookean"><mu>1.0</mu><k>1000.0</k></Material>
  <Parameters>
    <param name="mu">0.7, 0.01, 10.0, 1.0</param>
  </Parameters>
  <MeasuredDisplacements>
    <time t="1.0">
      <node id="2">{u:.17e},0,0</node>
      <node id="3">{u:.17e},0,0</node>
      <node id="6">{u:.17e},0,0</node>
      <node id="7">{u:.17e},0,0</node>
      <node id="10">{u:.17e},0,0</node>
    </time>
  </MeasuredDisplacements>
  <VirtualDisplacements>
    <field name="stretch-x">
      <time t="1.0">
        <node id="2">1,0,0</node>
        <node id="3">1,0,0</node>
        <node id="6">1,0,0</node>
        <node id="7">1,0,0</node>
        <node id="10">1,0,0</node>
      </time>
    </field>
  </VirtualDisplacements>
  <MeasuredLoads>
    <time t="1.0">
      <surface name="xplus">{load:.17e},0,0</surface>
    </time>
  </MeasuredLoads>
</vfm>
"#
    ))
    .unwrap();

    let mut problem = VfmProblem::setup(&doc).unwrap();
    // 8 hex gauss points plus 1 tet point.
    assert_eq!(problem.facts().total_points(), 9);
    assert_eq!(problem.facts().gp_count(0), 8);
    assert_eq!(problem.facts().gp_count(1), 1);

    let summary = problem.run().unwrap();
    assert_relative_eq!(summary.parameters[0].1, 1.0, epsilon = 1e-6);
}

/// The uncoupled deviatoric/volumetric pipeline (σ_zz = 0 recovery) also
/// closes the virtual-work balance at the true shear modulus.
#[test]
fn uncoupled_material_recovers_shear_modulus() {
    use vfm_model::{DeviatoricStressLaw, UncoupledNeoHookean};

    let lambda: f64 = 1.10;
    let law = UncoupledNeoHookean { mu: 1.0, k: 1000.0 };
    let f = Matrix3::new(lambda, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
    let pt = MaterialPoint::reference().trial_clone(f);
    let dev = law.deviatoric_cauchy_stress(&pt);
    let sigma = dev - Matrix3::identity() * dev[(2, 2)];
    let p_true = sigma * f.try_inverse().unwrap().transpose() * f.determinant();

    let mut source = uniaxial_doc(lambda, p_true[(0, 0)], 0.6, 10.0);
    source = source.replace(
        r#"<Material type="neo-Hookean">"#,
        r#"<Material type="uncoupled neo-Hookean">"#,
    );
    let doc = parse_document(&source).unwrap();

    let mut problem = VfmProblem::setup(&doc).unwrap();
    let summary = problem.run().unwrap();
    assert_relative_eq!(summary.parameters[0].1, 1.0, epsilon = 1e-6);

    // The committed stresses honor the σ_zz = 0 convention.
    let sigma = problem.stress().cauchy.frame(0).unwrap().at(0);
    assert_relative_eq!(sigma[(2, 2)], 0.0, epsilon = 1e-12);
}

/// A reporting scale far from 1 conditions the optimization variables but
/// leaves the identified physical value unchanged.
#[test]
fn parameter_scale_does_not_change_the_identified_value() {
    let lambda = 1.10;
    let p_true = uniaxial_piola(1.0, 1000.0, lambda);
    let mut source = uniaxial_doc(lambda, p_true[(0, 0)], 0.7, 10.0);
    source = source.replace("0.7, 0.01, 10, 1.0", "0.7, 0.01, 10, 0.001");
    let doc = parse_document(&source).unwrap();

    let mut problem = VfmProblem::setup(&doc).unwrap();
    let summary = problem.run().unwrap();
    assert_relative_eq!(summary.parameters[0].1, 1.0, epsilon = 1e-6);
}

/// A plane-deformation run reconstructs the out-of-plane stretch from
/// in-plane incompressibility.
#[test]
fn plane_deformation_mode_shapes_measured_gradient() {
    let lambda: f64 = 1.10;
    let p_true = uniaxial_piola(1.0, 1000.0, lambda);
    let mut source = uniaxial_doc(lambda, p_true[(0, 0)], 0.7, 10.0);
    source = source.replace(
        "</vfm>",
        "  <Options><plane_deformation>true</plane_deformation></Options>\n</vfm>",
    );
    let doc = parse_document(&source).unwrap();

    let problem = VfmProblem::setup(&doc).unwrap();
    let f = problem.measured_deformation().frame(0).unwrap();
    for p in 0..problem.facts().total_points() {
        assert_relative_eq!(f.at(p)[(2, 2)], 1.0 / lambda, epsilon = 1e-12);
    }
}
