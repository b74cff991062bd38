//! Dense nodal fields, time-indexed displacement stores, surface-load
//! frames, and ragged element × integration-point tensor storage.
//!
//! Time is indexed by ordinal frame number. Floating times from the input
//! document are mapped to ordinals once during problem building; the values
//! are kept only for reporting and plot frames.

use nalgebra::{Matrix3, Vector3};

/// A dense per-node vector field.
#[derive(Debug, Clone, PartialEq)]
pub struct NodalField {
    data: Vec<Vector3<f64>>,
}

impl NodalField {
    /// An all-zero field over `n_nodes` nodes.
    pub fn zeros(n_nodes: usize) -> Self {
        Self {
            data: vec![Vector3::zeros(); n_nodes],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, idx: usize) -> Vector3<f64> {
        self.data[idx]
    }

    pub fn set(&mut self, idx: usize, value: Vector3<f64>) {
        self.data[idx] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vector3<f64>> {
        self.data.iter()
    }

    /// True when every component of every node is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|v| v.x == 0.0 && v.y == 0.0 && v.z == 0.0)
    }
}

/// Measured nodal displacements, one field per time frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementSeries {
    n_nodes: usize,
    times: Vec<f64>,
    frames: Vec<NodalField>,
}

impl DisplacementSeries {
    pub fn new(n_nodes: usize) -> Self {
        Self {
            n_nodes,
            times: Vec::new(),
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self, time: f64, frame: NodalField) -> Result<(), String> {
        if frame.len() != self.n_nodes {
            return Err(format!(
                "displacement frame has {} nodes, mesh has {}",
                frame.len(),
                self.n_nodes
            ));
        }
        self.times.push(time);
        self.frames.push(frame);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, t: usize) -> Option<&NodalField> {
        self.frames.get(t)
    }

    pub fn frames(&self) -> &[NodalField] {
        &self.frames
    }

    pub fn time(&self, t: usize) -> Option<f64> {
        self.times.get(t).copied()
    }
}

/// One admissible virtual displacement field.
///
/// A field carries either exactly one frame (time-invariant) or exactly T
/// frames, T being the measured/load frame count; `frame_for` implements
/// that dispatch and [`VirtualFieldSet::validate_frame_counts`] rejects any
/// other length.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualField {
    pub name: String,
    frames: Vec<NodalField>,
}

impl VirtualField {
    pub fn new(name: String, frames: Vec<NodalField>) -> Self {
        Self { name, frames }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[NodalField] {
        &self.frames
    }

    /// Frame used at time `t`: frame 0 for single-frame fields, frame `t`
    /// otherwise.
    pub fn frame_for(&self, t: usize) -> Result<&NodalField, String> {
        let t_eff = if self.frames.len() == 1 { 0 } else { t };
        self.frames.get(t_eff).ok_or_else(|| {
            format!(
                "virtual field '{}' has no frame {t_eff} (has {})",
                self.name,
                self.frames.len()
            )
        })
    }
}

/// All virtual fields of a problem.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualFieldSet {
    n_nodes: usize,
    fields: Vec<VirtualField>,
}

impl VirtualFieldSet {
    pub fn new(n_nodes: usize) -> Self {
        Self {
            n_nodes,
            fields: Vec::new(),
        }
    }

    pub fn push(&mut self, field: VirtualField) -> Result<(), String> {
        for frame in field.frames() {
            if frame.len() != self.n_nodes {
                return Err(format!(
                    "virtual field '{}' frame has {} nodes, mesh has {}",
                    field.name,
                    frame.len(),
                    self.n_nodes
                ));
            }
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, v: usize) -> Option<&VirtualField> {
        self.fields.get(v)
    }

    pub fn fields(&self) -> &[VirtualField] {
        &self.fields
    }

    /// Every field must carry exactly 1 or exactly `t_count` frames.
    pub fn validate_frame_counts(&self, t_count: usize) -> Result<(), String> {
        for field in &self.fields {
            let n = field.frame_count();
            if n != 1 && n != t_count {
                return Err(format!(
                    "virtual field '{}' has {n} frames; expected 1 or {t_count}",
                    field.name
                ));
            }
        }
        Ok(())
    }
}

/// One resultant force on a named surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLoad {
    pub surface: String,
    pub force: Vector3<f64>,
}

/// All surface resultants at one time.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFrame {
    pub time: f64,
    pub loads: Vec<SurfaceLoad>,
}

/// Time series of measured surface loads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSeries {
    frames: Vec<LoadFrame>,
}

impl LoadSeries {
    pub fn new(frames: Vec<LoadFrame>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, t: usize) -> Option<&LoadFrame> {
        self.frames.get(t)
    }

    pub fn frames(&self) -> &[LoadFrame] {
        &self.frames
    }
}

/// Ragged element × integration-point storage of 3×3 tensors, shaped to a
/// mesh-facts point count and addressed by flat point index.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTensorField {
    data: Vec<Matrix3<f64>>,
}

impl ReferenceTensorField {
    pub fn identity(total_points: usize) -> Self {
        Self {
            data: vec![Matrix3::identity(); total_points],
        }
    }

    pub fn zeros(total_points: usize) -> Self {
        Self {
            data: vec![Matrix3::zeros(); total_points],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn at(&self, point: usize) -> &Matrix3<f64> {
        &self.data[point]
    }

    pub fn at_mut(&mut self, point: usize) -> &mut Matrix3<f64> {
        &mut self.data[point]
    }
}

/// Time series of tensor fields sharing one shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorSeries {
    frames: Vec<ReferenceTensorField>,
}

impl TensorSeries {
    pub fn new(frames: Vec<ReferenceTensorField>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, t: usize) -> Option<&ReferenceTensorField> {
        self.frames.get(t)
    }

    pub fn frames(&self) -> &[ReferenceTensorField] {
        &self.frames
    }

    /// Frame dispatch shared with [`VirtualField::frame_for`]: single-frame
    /// series are time-invariant.
    pub fn frame_for(&self, t: usize) -> Option<&ReferenceTensorField> {
        if self.frames.len() == 1 {
            self.frames.first()
        } else {
            self.frames.get(t)
        }
    }
}

/// Cauchy and first Piola stresses, paired frame by frame.
///
/// Rewritten in full on every residual evaluation; both series always share
/// the ragged shape of the deformation store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StressStore {
    pub cauchy: TensorSeries,
    pub piola: TensorSeries,
}

impl StressStore {
    pub fn new(cauchy: TensorSeries, piola: TensorSeries) -> Result<Self, String> {
        if cauchy.len() != piola.len() {
            return Err(format!(
                "stress store has {} Cauchy frames but {} Piola frames",
                cauchy.len(),
                piola.len()
            ));
        }
        Ok(Self { cauchy, piola })
    }

    pub fn len(&self) -> usize {
        self.cauchy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cauchy.is_empty()
    }
}
