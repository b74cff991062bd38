//! Uncoupled (deviatoric/volumetric split) hyperelastic laws.
//!
//! These laws evaluate only the deviatoric Cauchy stress from the isochoric
//! deformation B̄ = J^(-2/3) B. The volumetric pressure is deliberately not
//! part of the evaluation; the inverse driver recovers it from its own
//! plane-stress convention. The bulk modulus k is still a resolvable
//! parameter so identification runs can constrain it.

use super::{DeviatoricStressLaw, deviator};
use crate::point::MaterialPoint;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Uncoupled neo-Hookean: dev σ = μ/J · dev(B̄)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncoupledNeoHookean {
    /// Shear modulus μ
    pub mu: f64,
    /// Bulk modulus k (volumetric part only; unused by the deviatoric eval)
    pub k: f64,
}

impl DeviatoricStressLaw for UncoupledNeoHookean {
    fn deviatoric_cauchy_stress(&self, pt: &MaterialPoint) -> Matrix3<f64> {
        let b_bar = pt.isochoric_left_cauchy_green();
        deviator(&b_bar) * (self.mu / pt.volume_ratio)
    }
}

/// Uncoupled Mooney-Rivlin: dev σ = 2/J · dev[(c₁ + c₂ Ī₁) B̄ − c₂ B̄²]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncoupledMooneyRivlin {
    /// First distortional coefficient c₁
    pub c1: f64,
    /// Second distortional coefficient c₂
    pub c2: f64,
    /// Bulk modulus k (volumetric part only; unused by the deviatoric eval)
    pub k: f64,
}

impl DeviatoricStressLaw for UncoupledMooneyRivlin {
    fn deviatoric_cauchy_stress(&self, pt: &MaterialPoint) -> Matrix3<f64> {
        let b_bar = pt.isochoric_left_cauchy_green();
        let i1_bar = b_bar.trace();
        let inner = b_bar * (self.c1 + self.c2 * i1_bar) - b_bar * b_bar * self.c2;
        deviator(&inner) * (2.0 / pt.volume_ratio)
    }
}
