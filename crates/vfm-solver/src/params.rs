//! Identification parameters and their application to the material.

use serde::{Deserialize, Serialize};
use vfm_model::MaterialKind;

/// Declaration of one unknown scalar parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Name resolved against the material's parameter table
    pub name: String,
    /// Starting value θ₀
    pub init: f64,
    /// Lower bound
    pub lo: f64,
    /// Upper bound
    pub hi: f64,
    /// Reporting scale; must be non-zero
    pub scale: f64,
}

impl ParameterSpec {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("parameter has an empty name".to_string());
        }
        if !self.init.is_finite() {
            return Err(format!("parameter '{}' has non-finite init", self.name));
        }
        if !self.lo.is_finite() || !self.hi.is_finite() {
            return Err(format!("parameter '{}' has non-finite bounds", self.name));
        }
        if self.lo > self.hi {
            return Err(format!(
                "parameter '{}' has lo = {} > hi = {}",
                self.name, self.lo, self.hi
            ));
        }
        if self.init < self.lo || self.init > self.hi {
            return Err(format!(
                "parameter '{}' has init = {} outside [{}, {}]",
                self.name, self.init, self.lo, self.hi
            ));
        }
        if self.scale == 0.0 || !self.scale.is_finite() {
            return Err(format!(
                "parameter '{}' has invalid scale {}",
                self.name, self.scale
            ));
        }
        Ok(())
    }
}

/// A declared parameter together with its current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub spec: ParameterSpec,
    pub value: f64,
}

/// The ordered set of unknowns of one identification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new(specs: Vec<ParameterSpec>) -> Result<Self, String> {
        if specs.is_empty() {
            return Err("no parameters declared".to_string());
        }
        for spec in &specs {
            spec.validate()?;
        }
        for (i, a) in specs.iter().enumerate() {
            if specs[..i].iter().any(|b| b.name == a.name) {
                return Err(format!("duplicate parameter name '{}'", a.name));
            }
        }
        let params = specs
            .into_iter()
            .map(|spec| {
                let value = spec.init;
                Parameter { spec, value }
            })
            .collect();
        Ok(Self { params })
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    pub fn initial_values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.spec.init).collect()
    }

    pub fn lower_bounds(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.spec.lo).collect()
    }

    pub fn upper_bounds(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.spec.hi).collect()
    }

    fn set_value(&mut self, i: usize, value: f64) {
        self.params[i].value = value;
    }
}

/// Resolves parameter names against the material once, then mirrors trial
/// vectors into the material's backing store on every application.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterApplier {
    indices: Vec<usize>,
}

impl ParameterApplier {
    /// Resolve every declared name; an unresolvable name is fatal here, not
    /// at apply time.
    pub fn resolve(material: &MaterialKind, set: &ParameterSet) -> Result<Self, String> {
        let indices = set
            .params()
            .iter()
            .map(|p| {
                material.param_index(&p.spec.name).ok_or_else(|| {
                    format!(
                        "material '{}' has no parameter '{}' (available: {})",
                        material.name(),
                        p.spec.name,
                        material.param_names().join(", ")
                    )
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self { indices })
    }

    /// Write θ into the material and mirror each component into the
    /// parameter records. Nothing is committed on a dimension mismatch.
    pub fn apply(
        &self,
        material: &mut MaterialKind,
        set: &mut ParameterSet,
        theta: &[f64],
    ) -> Result<(), String> {
        if theta.len() != self.indices.len() {
            return Err(format!(
                "parameter vector has {} entries, expected {}",
                theta.len(),
                self.indices.len()
            ));
        }
        for (i, (&idx, &value)) in self.indices.iter().zip(theta.iter()).enumerate() {
            if !material.set_param(idx, value) {
                return Err(format!(
                    "lost backing store for parameter '{}'",
                    set.params()[i].spec.name
                ));
            }
            set.set_value(i, value);
        }
        Ok(())
    }
}
