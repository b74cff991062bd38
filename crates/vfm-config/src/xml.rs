//! Pull-based reader for the driving XML document.
//!
//! Built on `quick_xml`'s event API rather than serde deserialization so
//! every diagnostic can carry the 1-based line of the offending input.

use crate::ParseError;
use crate::dto::*;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Parse a complete `<vfm>` document from a string.
pub fn parse_document(src: &str) -> Result<VfmDocument, ParseError> {
    let mut parser = Parser::new(src);
    parser.parse_root()
}

struct Parser<'a> {
    reader: Reader<&'a [u8]>,
    src: &'a str,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        let mut reader = Reader::from_str(src);
        reader.trim_text(true);
        Self { reader, src }
    }

    /// 1-based line of the reader's current position.
    fn line(&self) -> usize {
        let pos = self.reader.buffer_position().min(self.src.len());
        self.src.as_bytes()[..pos].iter().filter(|&&b| b == b'\n').count() + 1
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line(),
            message: message.into(),
        }
    }

    fn next_event(&mut self) -> Result<Event<'a>, ParseError> {
        match self.reader.read_event() {
            Ok(ev) => Ok(ev),
            Err(e) => Err(ParseError {
                line: self.line(),
                message: format!("malformed XML: {e}"),
            }),
        }
    }

    fn tag_name(e: &BytesStart<'_>) -> String {
        String::from_utf8_lossy(e.name().as_ref()).into_owned()
    }

    fn attr_opt(&self, e: &BytesStart<'_>, name: &str) -> Result<Option<String>, ParseError> {
        match e.try_get_attribute(name) {
            Ok(Some(attr)) => match attr.unescape_value() {
                Ok(v) => Ok(Some(v.into_owned())),
                Err(err) => Err(self.err(format!("bad attribute {name}: {err}"))),
            },
            Ok(None) => Ok(None),
            Err(err) => Err(self.err(format!("bad attribute {name}: {err}"))),
        }
    }

    fn attr_req(&self, e: &BytesStart<'_>, name: &str) -> Result<String, ParseError> {
        self.attr_opt(e, name)?.ok_or_else(|| {
            self.err(format!(
                "<{}> is missing required attribute '{name}'",
                Self::tag_name(e)
            ))
        })
    }

    /// Inner text of a leaf element, consuming through its end tag.
    fn leaf_text(&mut self, e: &BytesStart<'a>) -> Result<String, ParseError> {
        match self.reader.read_text(e.name()) {
            Ok(text) => Ok(text.trim().to_string()),
            Err(err) => Err(ParseError {
                line: self.line(),
                message: format!("bad text in <{}>: {err}", Self::tag_name(e)),
            }),
        }
    }

    /// Skip an element we do not recognize, including all of its children.
    fn skip_element(&mut self, e: &BytesStart<'a>) -> Result<(), ParseError> {
        self.reader
            .read_to_end(e.name())
            .map(|_| ())
            .map_err(|err| ParseError {
                line: self.line(),
                message: format!("malformed XML: {err}"),
            })
    }

    fn parse_f64(&self, s: &str) -> Result<f64, ParseError> {
        s.parse::<f64>()
            .map_err(|_| self.err(format!("invalid number: '{s}'")))
    }

    fn parse_f64_list(&self, s: &str) -> Result<Vec<f64>, ParseError> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| self.parse_f64(p))
            .collect()
    }

    fn parse_i32_list(&self, s: &str) -> Result<Vec<i32>, ParseError> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<i32>()
                    .map_err(|_| self.err(format!("invalid integer: '{p}'")))
            })
            .collect()
    }

    fn parse_id_attr(&self, e: &BytesStart<'_>) -> Result<i32, ParseError> {
        let raw = self.attr_req(e, "id")?;
        raw.parse::<i32>()
            .map_err(|_| self.err(format!("invalid id attribute: '{raw}'")))
    }

    fn parse_root(&mut self) -> Result<VfmDocument, ParseError> {
        // Skip the declaration and anything else before the root element.
        let root = loop {
            match self.next_event()? {
                Event::Start(e) => break e,
                Event::Decl(_) | Event::Comment(_) | Event::Text(_) | Event::PI(_)
                | Event::DocType(_) => continue,
                Event::Eof => return Err(self.err("empty document")),
                other => {
                    return Err(self.err(format!("unexpected content before root: {other:?}")));
                }
            }
        };
        if root.name().as_ref() != b"vfm" {
            return Err(self.err(format!(
                "expected root element <vfm>, found <{}>",
                Self::tag_name(&root)
            )));
        }

        let mut doc = VfmDocument::default();
        let mut seen: Vec<String> = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e) => {
                    let name = Self::tag_name(&e);
                    // <Optimization> is an alias for <Options>; track both
                    // under one key so the pair cannot appear together.
                    let key = if name == "Optimization" {
                        "Options".to_string()
                    } else {
                        name.clone()
                    };
                    if seen.contains(&key) {
                        return Err(self.err(format!("duplicate <{name}> section")));
                    }
                    match name.as_str() {
                        "Mesh" => doc.mesh = self.parse_mesh()?,
                        "Material" => doc.material = Some(self.parse_material(&e)?),
                        "Parameters" => doc.parameters = self.parse_parameters()?,
                        "MeasuredDisplacements" => {
                            doc.measured_displacements = self.parse_time_blocks("MeasuredDisplacements")?
                        }
                        "VirtualDisplacements" => {
                            doc.virtual_fields = self.parse_virtual_displacements()?
                        }
                        "MeasuredLoads" => doc.measured_loads = self.parse_loads()?,
                        "Options" | "Optimization" => doc.options = self.parse_options(&name)?,
                        _ => {
                            self.skip_element(&e)?;
                            continue;
                        }
                    }
                    seen.push(key);
                }
                Event::End(e) if e.name().as_ref() == b"vfm" => break,
                Event::Eof => return Err(self.err("unexpected end of document inside <vfm>")),
                Event::Comment(_) | Event::Text(_) => continue,
                other => return Err(self.err(format!("unexpected content: {other:?}"))),
            }
        }
        Ok(doc)
    }

    fn parse_mesh(&mut self) -> Result<MeshDto, ParseError> {
        let mut mesh = MeshDto::default();
        loop {
            match self.next_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"Nodes" => mesh.nodes = self.parse_nodes()?,
                    b"Elements" => {
                        let block = self.parse_element_block(&e, mesh.element_blocks.len())?;
                        mesh.element_blocks.push(block);
                    }
                    b"Surface" => {
                        let surface = self.parse_surface(&e)?;
                        mesh.surfaces.push(surface);
                    }
                    _ => self.skip_element(&e)?,
                },
                Event::End(e) if e.name().as_ref() == b"Mesh" => break,
                Event::Eof => return Err(self.err("unexpected end of document inside <Mesh>")),
                Event::Comment(_) | Event::Text(_) => continue,
                other => return Err(self.err(format!("unexpected content in <Mesh>: {other:?}"))),
            }
        }
        Ok(mesh)
    }

    fn parse_nodes(&mut self) -> Result<Vec<NodeDto>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e) if e.name().as_ref() == b"node" => {
                    let id = self.parse_id_attr(&e)?;
                    let text = self.leaf_text(&e)?;
                    let coords = self.parse_f64_list(&text)?;
                    if coords.len() != 3 {
                        return Err(self.err(format!(
                            "node {id}: expected 3 coordinates, found {}",
                            coords.len()
                        )));
                    }
                    nodes.push(NodeDto {
                        id,
                        x: coords[0],
                        y: coords[1],
                        z: coords[2],
                    });
                }
                Event::End(e) if e.name().as_ref() == b"Nodes" => break,
                Event::Eof => return Err(self.err("unexpected end of document inside <Nodes>")),
                Event::Comment(_) | Event::Text(_) => continue,
                other => return Err(self.err(format!("unexpected content in <Nodes>: {other:?}"))),
            }
        }
        Ok(nodes)
    }

    fn parse_element_block(
        &mut self,
        start: &BytesStart<'a>,
        index: usize,
    ) -> Result<ElementBlockDto, ParseError> {
        let kind = self.attr_req(start, "type")?;
        let name = self
            .attr_opt(start, "name")?
            .unwrap_or_else(|| format!("domain{}", index + 1));
        let mut elems = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e) if e.name().as_ref() == b"elem" => {
                    let id = self.parse_id_attr(&e)?;
                    let text = self.leaf_text(&e)?;
                    let nodes = self.parse_i32_list(&text)?;
                    elems.push(ElemDto { id, nodes });
                }
                Event::End(e) if e.name().as_ref() == b"Elements" => break,
                Event::Eof => return Err(self.err("unexpected end of document inside <Elements>")),
                Event::Comment(_) | Event::Text(_) => continue,
                other => {
                    return Err(self.err(format!("unexpected content in <Elements>: {other:?}")));
                }
            }
        }
        Ok(ElementBlockDto { kind, name, elems })
    }

    fn parse_surface(&mut self, start: &BytesStart<'a>) -> Result<SurfaceDto, ParseError> {
        let name = self.attr_req(start, "name")?;
        let mut facets = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e)
                    if e.name().as_ref() == b"quad4" || e.name().as_ref() == b"tri3" =>
                {
                    let kind = Self::tag_name(&e);
                    let id = self.parse_id_attr(&e)?;
                    let text = self.leaf_text(&e)?;
                    let nodes = self.parse_i32_list(&text)?;
                    facets.push(FacetDto { kind, id, nodes });
                }
                Event::End(e) if e.name().as_ref() == b"Surface" => break,
                Event::Eof => return Err(self.err("unexpected end of document inside <Surface>")),
                Event::Comment(_) | Event::Text(_) => continue,
                other => {
                    return Err(self.err(format!("unexpected content in <Surface>: {other:?}")));
                }
            }
        }
        Ok(SurfaceDto { name, facets })
    }

    fn parse_material(&mut self, start: &BytesStart<'a>) -> Result<MaterialDto, ParseError> {
        let kind = self.attr_req(start, "type")?;
        let mut properties = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e) => {
                    let name = Self::tag_name(&e);
                    let text = self.leaf_text(&e)?;
                    let value = self.parse_f64(&text)?;
                    properties.push((name, value));
                }
                Event::End(e) if e.name().as_ref() == b"Material" => break,
                Event::Eof => return Err(self.err("unexpected end of document inside <Material>")),
                Event::Comment(_) | Event::Text(_) => continue,
                other => {
                    return Err(self.err(format!("unexpected content in <Material>: {other:?}")));
                }
            }
        }
        Ok(MaterialDto { kind, properties })
    }

    fn parse_parameters(&mut self) -> Result<Vec<ParamDto>, ParseError> {
        let mut params = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e) if e.name().as_ref() == b"param" => {
                    let name = self.attr_req(&e, "name")?;
                    let text = self.leaf_text(&e)?;
                    let values = self.parse_f64_list(&text)?;
                    // Accept `init, lo, hi` with an implicit scale of 1.
                    if values.len() != 3 && values.len() != 4 {
                        return Err(self.err(format!(
                            "param '{name}': expected 'init, lo, hi[, scale]', found {} values",
                            values.len()
                        )));
                    }
                    params.push(ParamDto {
                        name,
                        init: values[0],
                        lo: values[1],
                        hi: values[2],
                        scale: values.get(3).copied().unwrap_or(1.0),
                    });
                }
                Event::End(e) if e.name().as_ref() == b"Parameters" => break,
                Event::Eof => {
                    return Err(self.err("unexpected end of document inside <Parameters>"));
                }
                Event::Comment(_) | Event::Text(_) => continue,
                other => {
                    return Err(self.err(format!("unexpected content in <Parameters>: {other:?}")));
                }
            }
        }
        Ok(params)
    }

    fn parse_time_attr(&self, e: &BytesStart<'_>) -> Result<f64, ParseError> {
        let raw = self.attr_req(e, "t")?;
        self.parse_f64(&raw)
    }

    fn parse_time_block(&mut self, start: &BytesStart<'a>) -> Result<TimeBlockDto, ParseError> {
        let t = self.parse_time_attr(start)?;
        let mut rows = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e) if e.name().as_ref() == b"node" => {
                    let node_id = self.parse_id_attr(&e)?;
                    let text = self.leaf_text(&e)?;
                    let comps = self.parse_f64_list(&text)?;
                    if comps.len() != 3 {
                        return Err(self.err(format!(
                            "node {node_id}: expected 3 displacement components, found {}",
                            comps.len()
                        )));
                    }
                    rows.push(NodalRowDto {
                        node_id,
                        ux: comps[0],
                        uy: comps[1],
                        uz: comps[2],
                    });
                }
                Event::End(e) if e.name().as_ref() == b"time" => break,
                Event::Eof => return Err(self.err("unexpected end of document inside <time>")),
                Event::Comment(_) | Event::Text(_) => continue,
                other => return Err(self.err(format!("unexpected content in <time>: {other:?}"))),
            }
        }
        Ok(TimeBlockDto { t, rows })
    }

    fn parse_time_blocks(&mut self, section: &str) -> Result<Vec<TimeBlockDto>, ParseError> {
        let mut blocks = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e) if e.name().as_ref() == b"time" => {
                    blocks.push(self.parse_time_block(&e)?);
                }
                Event::End(e) if e.name().as_ref() == section.as_bytes() => break,
                Event::Eof => {
                    return Err(self.err(format!("unexpected end of document inside <{section}>")));
                }
                Event::Comment(_) | Event::Text(_) => continue,
                other => {
                    return Err(self.err(format!("unexpected content in <{section}>: {other:?}")));
                }
            }
        }
        Ok(blocks)
    }

    /// Either named `<field>` blocks or the legacy layout with bare `<time>`
    /// blocks, which is read as a single anonymous field.
    fn parse_virtual_displacements(&mut self) -> Result<Vec<VirtualFieldDto>, ParseError> {
        let mut fields = Vec::new();
        let mut legacy_times = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e) if e.name().as_ref() == b"field" => {
                    let name = self
                        .attr_opt(&e, "name")?
                        .unwrap_or_else(|| format!("vf{}", fields.len() + 1));
                    let mut times = Vec::new();
                    loop {
                        match self.next_event()? {
                            Event::Start(t) if t.name().as_ref() == b"time" => {
                                times.push(self.parse_time_block(&t)?);
                            }
                            Event::End(t) if t.name().as_ref() == b"field" => break,
                            Event::Eof => {
                                return Err(
                                    self.err("unexpected end of document inside <field>")
                                );
                            }
                            Event::Comment(_) | Event::Text(_) => continue,
                            other => {
                                return Err(self
                                    .err(format!("unexpected content in <field>: {other:?}")));
                            }
                        }
                    }
                    fields.push(VirtualFieldDto { name, times });
                }
                Event::Start(e) if e.name().as_ref() == b"time" => {
                    legacy_times.push(self.parse_time_block(&e)?);
                }
                Event::End(e) if e.name().as_ref() == b"VirtualDisplacements" => break,
                Event::Eof => {
                    return Err(
                        self.err("unexpected end of document inside <VirtualDisplacements>")
                    );
                }
                Event::Comment(_) | Event::Text(_) => continue,
                other => {
                    return Err(self.err(format!(
                        "unexpected content in <VirtualDisplacements>: {other:?}"
                    )));
                }
            }
        }
        if !legacy_times.is_empty() {
            if !fields.is_empty() {
                return Err(self.err(
                    "cannot mix named <field> blocks with bare <time> blocks \
                     in <VirtualDisplacements>",
                ));
            }
            fields.push(VirtualFieldDto {
                name: "vf1".to_string(),
                times: legacy_times,
            });
        }
        Ok(fields)
    }

    fn parse_loads(&mut self) -> Result<Vec<LoadBlockDto>, ParseError> {
        let mut blocks = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e) if e.name().as_ref() == b"time" => {
                    let t = self.parse_time_attr(&e)?;
                    let mut rows = Vec::new();
                    loop {
                        match self.next_event()? {
                            Event::Start(s) if s.name().as_ref() == b"surface" => {
                                let surface = self.attr_req(&s, "name")?;
                                let text = self.leaf_text(&s)?;
                                let comps = self.parse_f64_list(&text)?;
                                if comps.len() != 3 {
                                    return Err(self.err(format!(
                                        "surface '{surface}': expected 3 force components, \
                                         found {}",
                                        comps.len()
                                    )));
                                }
                                rows.push(LoadRowDto {
                                    surface,
                                    fx: comps[0],
                                    fy: comps[1],
                                    fz: comps[2],
                                });
                            }
                            Event::End(s) if s.name().as_ref() == b"time" => break,
                            Event::Eof => {
                                return Err(self.err("unexpected end of document inside <time>"));
                            }
                            Event::Comment(_) | Event::Text(_) => continue,
                            other => {
                                return Err(
                                    self.err(format!("unexpected content in <time>: {other:?}"))
                                );
                            }
                        }
                    }
                    blocks.push(LoadBlockDto { t, rows });
                }
                Event::End(e) if e.name().as_ref() == b"MeasuredLoads" => break,
                Event::Eof => {
                    return Err(self.err("unexpected end of document inside <MeasuredLoads>"));
                }
                Event::Comment(_) | Event::Text(_) => continue,
                other => {
                    return Err(
                        self.err(format!("unexpected content in <MeasuredLoads>: {other:?}"))
                    );
                }
            }
        }
        Ok(blocks)
    }

    fn parse_options(&mut self, section: &str) -> Result<OptionsDto, ParseError> {
        let mut options = OptionsDto::default();
        loop {
            match self.next_event()? {
                Event::Start(e) => {
                    let name = Self::tag_name(&e);
                    let text = self.leaf_text(&e)?;
                    match name.as_str() {
                        "solver" => options.solver = Some(text),
                        "tau" => options.tau = Some(self.parse_f64(&text)?),
                        "grad_tol" => options.grad_tol = Some(self.parse_f64(&text)?),
                        "step_tol" => options.step_tol = Some(self.parse_f64(&text)?),
                        "obj_tol" => options.obj_tol = Some(self.parse_f64(&text)?),
                        "fd_step" => options.fd_step = Some(self.parse_f64(&text)?),
                        "max_iterations" => {
                            options.max_iterations = Some(text.parse::<usize>().map_err(|_| {
                                self.err(format!("invalid max_iterations: '{text}'"))
                            })?)
                        }
                        "plane_deformation" => {
                            options.plane_deformation = match text.as_str() {
                                "true" | "1" => true,
                                "false" | "0" => false,
                                other => {
                                    return Err(self.err(format!(
                                        "invalid plane_deformation value: '{other}'"
                                    )));
                                }
                            }
                        }
                        "save_virtual_work" => options.save_virtual_work = Some(text),
                        _ => {
                            return Err(self.err(format!("unknown option <{name}>")));
                        }
                    }
                }
                Event::End(e) if e.name().as_ref() == section.as_bytes() => break,
                Event::Eof => {
                    return Err(self.err(format!("unexpected end of document inside <{section}>")));
                }
                Event::Comment(_) | Event::Text(_) => continue,
                other => {
                    return Err(self.err(format!("unexpected content in <{section}>: {other:?}")));
                }
            }
        }
        Ok(options)
    }
}
