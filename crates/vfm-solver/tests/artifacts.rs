//! Artifact emission after a completed run: the binary plot file and the
//! optional virtual-work table.

use nalgebra::Matrix3;
use std::fs;
use vfm_config::parse_document;
use vfm_model::{FullStressLaw, MaterialPoint, NeoHookean};
use vfm_solver::VfmProblem;

/// Resultant on the +x face consistent with F = diag(1.05, 1, 1) at the true
/// parameters (μ = 1, k = 1000).
fn consistent_load() -> f64 {
    let law = NeoHookean { mu: 1.0, k: 1000.0 };
    let f = Matrix3::new(1.05, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
    let pt = MaterialPoint::reference().trial_clone(f);
    let sigma = law.cauchy_stress(&pt);
    let p = sigma * f.try_inverse().unwrap().transpose() * f.determinant();
    p[(0, 0)]
}

fn doc_with_options(options: &str) -> String {
    let load = consistent_load();
    format!(
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
    <param name="mu">0.8, 0.01, 10.0, 1.0</param>
  </Parameters>
  <MeasuredDisplacements>
    <time t="1.0">
      <node id="2">0.05,0,0</node>
      <node id="3">0.05,0,0</node>
      <node id="6">0.05,0,0</node>
      <node id="7">0.05,0,0</node>
    </time>
  </MeasuredDisplacements>
  <VirtualDisplacements>
    <field name="stretch-x">
      <time t="1.0">
        <node id="2">1,0,0</node>
        <node id="3">1,0,0</node>
        <node id="6">1,0,0</node>
        <node id="7">1,0,0</node>
      </time>
    </field>
  </VirtualDisplacements>
  <MeasuredLoads>
    <time t="1.0">
      <surface name="xplus">{load:.17e},0,0</surface>
    </time>
  </MeasuredLoads>
  {options}
</vfm>
"#
    )
}

#[test]
fn plot_file_is_written_after_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let plot_path = dir.path().join("run.vpl");

    let doc = parse_document(&doc_with_options("")).unwrap();
    let mut problem = VfmProblem::setup(&doc).unwrap();
    problem.run().unwrap();
    problem.write_plot(&plot_path).unwrap();

    let bytes = fs::read(&plot_path).unwrap();
    assert_eq!(&bytes[..4], b"VFMP");
    assert!(bytes.windows(4).any(|w| w == b"DICT"));
    assert!(bytes.windows(4).any(|w| w == b"STAT"));
}

#[test]
fn virtual_work_table_is_written_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let table_path = dir.path().join("work.txt");
    let options = format!(
        "<Options><save_virtual_work>{}</save_virtual_work></Options>",
        table_path.display()
    );

    let doc = parse_document(&doc_with_options(&options)).unwrap();
    let mut problem = VfmProblem::setup(&doc).unwrap();
    problem.run().unwrap();

    let written = problem.write_virtual_work().unwrap();
    assert_eq!(written.as_deref(), Some(table_path.as_path()));

    let text = fs::read_to_string(&table_path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("#Step, IVW1, EVW1"));
    let row = lines.next().expect("one data row");
    assert!(row.starts_with("0, "));
    // After convergence internal and external work coincide.
    let cols: Vec<&str> = row.split(", ").collect();
    let ivw: f64 = cols[1].parse().unwrap();
    let evw: f64 = cols[2].parse().unwrap();
    assert!((ivw - evw).abs() < 1e-6, "ivw {ivw} vs evw {evw}");
}

#[test]
fn no_virtual_work_table_without_the_option() {
    let doc = parse_document(&doc_with_options("")).unwrap();
    let mut problem = VfmProblem::setup(&doc).unwrap();
    problem.run().unwrap();
    assert_eq!(problem.write_virtual_work().unwrap(), None);
}
