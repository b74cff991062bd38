//! Internal virtual work assembly.
//!
//! W_int(v,t) = Σ_{e,g} P(t,e,g) : G(v,t,e,g) · jw(e,g)
//!
//! with G = F* − I the virtual displacement gradient. The contraction is the
//! full double dot over all nine components; neither tensor is assumed
//! symmetric. Results are packed into a dense vector indexed `v·T + t`.

use crate::facts::MeshFacts;
use crate::stores::TensorSeries;
use nalgebra::Matrix3;

/// Full double contraction A : B.
fn double_contraction(a: &Matrix3<f64>, b: &Matrix3<f64>) -> f64 {
    let mut sum = 0.0;
    for i in 0..3 {
        for j in 0..3 {
            sum += a[(i, j)] * b[(i, j)];
        }
    }
    sum
}

/// Assemble the flattened internal-work vector `W_int[v·T + t]`.
///
/// `virtual_f[v]` holds the reconstructed virtual deformation series of
/// field v: one frame (time-invariant) or exactly T frames, T being the
/// stress frame count. Returns an empty vector when there are no stress
/// frames or no virtual fields.
pub fn assemble_internal_work(
    facts: &MeshFacts,
    virtual_f: &[TensorSeries],
    piola: &TensorSeries,
) -> Result<Vec<f64>, String> {
    let t_count = piola.len();
    let n_vf = virtual_f.len();
    if t_count == 0 || n_vf == 0 {
        return Ok(Vec::new());
    }

    let total = facts.total_points();
    for (v, series) in virtual_f.iter().enumerate() {
        let n = series.len();
        if n != 1 && n != t_count {
            return Err(format!(
                "virtual deformation store {v} has {n} frames; expected 1 or {t_count}"
            ));
        }
    }

    let mut out = vec![0.0; n_vf * t_count];
    for (v, series) in virtual_f.iter().enumerate() {
        for t in 0..t_count {
            let p_field = piola
                .frame(t)
                .ok_or_else(|| format!("stress store has no frame {t}"))?;
            if p_field.len() != total {
                return Err(format!(
                    "stress frame {t} has {} points, mesh facts have {total}",
                    p_field.len()
                ));
            }
            let g_field = series
                .frame_for(t)
                .ok_or_else(|| format!("virtual deformation store {v} has no frame {t}"))?;
            if g_field.len() != total {
                return Err(format!(
                    "virtual deformation store {v} has {} points, mesh facts have {total}",
                    g_field.len()
                ));
            }

            let mut work = 0.0;
            for e in 0..facts.n_elems() {
                for g in 0..facts.gp_count(e) {
                    let point = facts.point_index(e, g);
                    let grad = g_field.at(point) - Matrix3::identity();
                    work += double_contraction(p_field.at(point), &grad) * facts.jw(e, g);
                }
            }
            out[v * t_count + t] = work;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::ReferenceTensorField;
    use approx::assert_relative_eq;
    use vfm_config::parse_document;
    use vfm_model::Model;

    fn cube_facts() -> MeshFacts {
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
  </Mesh>
  <Material type="neo-Hookean"><mu>1.0</mu><k>1000.0</k></Material>
</vfm>
"#,
        )
        .unwrap();
        MeshFacts::build(&Model::from_document(&doc).unwrap().mesh).unwrap()
    }

    fn uniform_field(facts: &MeshFacts, m: Matrix3<f64>) -> ReferenceTensorField {
        let mut field = ReferenceTensorField::zeros(facts.total_points());
        for p in 0..facts.total_points() {
            *field.at_mut(p) = m;
        }
        field
    }

    #[test]
    fn empty_inputs_give_empty_vector() {
        let facts = cube_facts();
        let piola = TensorSeries::new(vec![]);
        assert!(assemble_internal_work(&facts, &[], &piola).unwrap().is_empty());

        let piola = TensorSeries::new(vec![uniform_field(&facts, Matrix3::identity())]);
        assert!(assemble_internal_work(&facts, &[], &piola).unwrap().is_empty());
    }

    #[test]
    fn homogeneous_state_integrates_to_volume_times_contraction() {
        let facts = cube_facts();
        let p = Matrix3::new(2.0, 0.5, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 3.0);
        // F* carries a uniform gradient G = F* − I with a non-symmetric part.
        let g = Matrix3::new(0.1, 0.2, 0.0, -0.05, 0.3, 0.0, 0.0, 0.0, 0.4);
        let f_star = g + Matrix3::identity();

        let piola = TensorSeries::new(vec![uniform_field(&facts, p)]);
        let virt = vec![TensorSeries::new(vec![uniform_field(&facts, f_star)])];
        let out = assemble_internal_work(&facts, &virt, &piola).unwrap();

        assert_eq!(out.len(), 1);
        // Unit cube volume: W = P : G.
        let expected = 2.0 * 0.1 + 0.5 * 0.2 + 1.0 * 0.3 + 3.0 * 0.4;
        assert_relative_eq!(out[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn single_frame_virtual_field_applies_to_every_time() {
        let facts = cube_facts();
        let p1 = uniform_field(&facts, Matrix3::identity() * 2.0);
        let p2 = uniform_field(&facts, Matrix3::identity() * 4.0);
        let f_star = uniform_field(
            &facts,
            Matrix3::identity() + Matrix3::identity() * 0.1,
        );

        let piola = TensorSeries::new(vec![p1, p2]);
        let virt = vec![TensorSeries::new(vec![f_star])];
        let out = assemble_internal_work(&facts, &virt, &piola).unwrap();

        assert_eq!(out.len(), 2);
        // G = 0.1 I, so W(t) = 0.1 · tr(P_t) · volume.
        assert_relative_eq!(out[0], 0.1 * 6.0, epsilon = 1e-12);
        assert_relative_eq!(out[1], 0.1 * 12.0, epsilon = 1e-12);
    }

    #[test]
    fn flattening_is_field_major() {
        let facts = cube_facts();
        let piola = TensorSeries::new(vec![
            uniform_field(&facts, Matrix3::identity()),
            uniform_field(&facts, Matrix3::identity() * 2.0),
        ]);
        let virt_a = TensorSeries::new(vec![uniform_field(
            &facts,
            Matrix3::identity() * 1.1,
        )]);
        let virt_b = TensorSeries::new(vec![uniform_field(
            &facts,
            Matrix3::identity() * 1.2,
        )]);

        let out = assemble_internal_work(&facts, &[virt_a, virt_b], &piola).unwrap();
        assert_eq!(out.len(), 4);
        // out[v·T + t]: field 0 occupies the first T entries.
        assert_relative_eq!(out[0], 0.1 * 3.0, epsilon = 1e-12);
        assert_relative_eq!(out[1], 0.1 * 6.0, epsilon = 1e-12);
        assert_relative_eq!(out[2], 0.2 * 3.0, epsilon = 1e-12);
        assert_relative_eq!(out[3], 0.2 * 6.0, epsilon = 1e-12);
    }

    #[test]
    fn bad_frame_counts_are_fatal() {
        let facts = cube_facts();
        let piola = TensorSeries::new(vec![
            uniform_field(&facts, Matrix3::identity()),
            uniform_field(&facts, Matrix3::identity()),
            uniform_field(&facts, Matrix3::identity()),
        ]);
        let virt = vec![TensorSeries::new(vec![
            uniform_field(&facts, Matrix3::identity()),
            uniform_field(&facts, Matrix3::identity()),
        ])];
        let err = assemble_internal_work(&facts, &virt, &piola)
            .expect_err("2 frames against T=3 should fail");
        assert!(err.contains("expected 1 or 3"));
    }

    #[test]
    fn shape_mismatch_is_fatal() {
        let facts = cube_facts();
        let piola = TensorSeries::new(vec![ReferenceTensorField::zeros(3)]);
        let virt = vec![TensorSeries::new(vec![uniform_field(
            &facts,
            Matrix3::identity(),
        )])];
        let err = assemble_internal_work(&facts, &virt, &piola)
            .expect_err("short stress frame should fail");
        assert!(err.contains("stress frame 0"));
    }
}
