//! Model assembly from the parsed input document.

use crate::elements::ElementKind;
use crate::materials::MaterialKind;
use crate::mesh::{Domain, Element, Mesh, Node};
use crate::surface::{Facet, FacetKind, Surface};
use vfm_config::VfmDocument;

/// A complete model: mesh plus the constitutive law under identification.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub mesh: Mesh,
    pub material: MaterialKind,
}

impl Model {
    /// Build mesh and material from the document, validating ids, element
    /// arities, and material properties. Identification data (displacements,
    /// loads, parameters) stays in the document for the problem builder.
    pub fn from_document(doc: &VfmDocument) -> Result<Self, String> {
        let nodes: Vec<Node> = doc
            .mesh
            .nodes
            .iter()
            .map(|n| Node::new(n.id, n.x, n.y, n.z))
            .collect();
        if nodes.is_empty() {
            return Err("model has no nodes".to_string());
        }

        let mut domains = Vec::with_capacity(doc.mesh.element_blocks.len());
        for block in &doc.mesh.element_blocks {
            let kind = ElementKind::from_keyword(&block.kind)
                .ok_or_else(|| format!("unknown element kind '{}'", block.kind))?;
            let elements = block
                .elems
                .iter()
                .map(|e| Element::new(e.id, e.nodes.clone()))
                .collect();
            domains.push(Domain::new(block.name.clone(), kind, elements)?);
        }
        if domains.iter().all(|d| d.elements.is_empty()) {
            return Err("model has no elements".to_string());
        }

        let mut surfaces = Vec::with_capacity(doc.mesh.surfaces.len());
        for dto in &doc.mesh.surfaces {
            if surfaces.iter().any(|s: &Surface| s.name == dto.name) {
                return Err(format!("duplicate surface name '{}'", dto.name));
            }
            let facets = dto
                .facets
                .iter()
                .map(|f| {
                    let kind = FacetKind::from_keyword(&f.kind)
                        .ok_or_else(|| format!("unknown facet kind '{}'", f.kind))?;
                    Ok(Facet {
                        kind,
                        id: f.id,
                        nodes: f.nodes.clone(),
                    })
                })
                .collect::<Result<Vec<_>, String>>()?;
            surfaces.push(Surface {
                name: dto.name.clone(),
                facets,
            });
        }

        let mesh = Mesh::new(nodes, domains, surfaces)?;

        let material_dto = doc
            .material
            .as_ref()
            .ok_or_else(|| "model has no <Material> section".to_string())?;
        let material = MaterialKind::from_properties(&material_dto.kind, &material_dto.properties)?;

        Ok(Model { mesh, material })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfm_config::parse_document;

    fn cube_doc(material: &str) -> String {
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
  {material}
</vfm>
"#
        )
    }

    #[test]
    fn builds_model_from_document() {
        let doc = parse_document(&cube_doc(
            r#"<Material type="neo-Hookean"><mu>1.0</mu><k>1000.0</k></Material>"#,
        ))
        .unwrap();
        let model = Model::from_document(&doc).expect("model should build");
        assert_eq!(model.mesh.num_nodes(), 8);
        assert_eq!(model.mesh.domains.len(), 1);
        assert_eq!(model.mesh.domains[0].gauss_per_element(), 8);
        assert_eq!(model.material.name(), "neo-Hookean");
    }

    #[test]
    fn missing_material_section_fails() {
        let doc = parse_document(&cube_doc("")).unwrap();
        let err = Model::from_document(&doc).expect_err("missing material should fail");
        assert!(err.contains("no <Material>"));
    }

    #[test]
    fn unknown_element_kind_fails() {
        let doc = parse_document(
            r#"
<vfm>
  <Mesh>
    <Nodes><node id="1">0,0,0</node></Nodes>
    <Elements type="shell9" name="weird">
      <elem id="1">1</elem>
    </Elements>
  </Mesh>
  <Material type="neo-Hookean"><mu>1</mu><k>10</k></Material>
</vfm>
"#,
        )
        .unwrap();
        let err = Model::from_document(&doc).expect_err("unknown kind should fail");
        assert!(err.contains("unknown element kind 'shell9'"));
    }

    #[test]
    fn empty_mesh_fails() {
        let doc = parse_document(
            r#"
<vfm>
  <Mesh>
    <Nodes><node id="1">0,0,0</node></Nodes>
  </Mesh>
  <Material type="neo-Hookean"><mu>1</mu><k>10</k></Material>
</vfm>
"#,
        )
        .unwrap();
        let err = Model::from_document(&doc).expect_err("empty mesh should fail");
        assert!(err.contains("no elements"));
    }
}
