//! Compressible neo-Hookean law.
//!
//! Strain energy density:
//!
//! W(F) = μ/2 (I₁ − 3) − μ ln J + λ/2 (ln J)²
//!
//! with J = det F, I₁ = tr(B), B = F Fᵀ, and λ = k − 2μ/3 derived from the
//! shear modulus μ and bulk modulus k. The Cauchy stress follows as
//!
//! σ = μ/J (B − I) + λ/J ln J · I
//!
//! which vanishes identically at F = I.

use super::FullStressLaw;
use crate::point::MaterialPoint;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeoHookean {
    /// Shear modulus μ
    pub mu: f64,
    /// Bulk modulus k
    pub k: f64,
}

impl NeoHookean {
    /// First Lamé parameter λ = k − 2μ/3
    pub fn lambda(&self) -> f64 {
        self.k - 2.0 * self.mu / 3.0
    }
}

impl FullStressLaw for NeoHookean {
    fn cauchy_stress(&self, pt: &MaterialPoint) -> Matrix3<f64> {
        let j = pt.volume_ratio;
        let b = pt.left_cauchy_green();
        let i = Matrix3::identity();
        (b - i) * (self.mu / j) + i * (self.lambda() * j.ln() / j)
    }
}
