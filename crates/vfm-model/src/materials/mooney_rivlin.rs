//! Compressible Mooney-Rivlin law.
//!
//! Strain energy density:
//!
//! W(F) = c₁(I₁ − 3) + c₂(I₂ − 3) − 2(c₁ + 2c₂) ln J + k/2 (ln J)²
//!
//! The logarithmic term makes the reference state stress-free. The Cauchy
//! stress is
//!
//! σ = 2/J [ (c₁ + c₂ I₁) B − c₂ B² ] − 2(c₁ + 2c₂)/J · I + k ln J / J · I
//!
//! with B = F Fᵀ and I₁ = tr B.

use super::FullStressLaw;
use crate::point::MaterialPoint;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MooneyRivlin {
    /// First distortional coefficient c₁
    pub c1: f64,
    /// Second distortional coefficient c₂
    pub c2: f64,
    /// Bulk modulus k
    pub k: f64,
}

impl FullStressLaw for MooneyRivlin {
    fn cauchy_stress(&self, pt: &MaterialPoint) -> Matrix3<f64> {
        let j = pt.volume_ratio;
        let b = pt.left_cauchy_green();
        let i1 = b.trace();
        let i = Matrix3::identity();

        (b * (self.c1 + self.c2 * i1) - b * b * self.c2) * (2.0 / j)
            + i * ((self.k * j.ln() - 2.0 * (self.c1 + 2.0 * self.c2)) / j)
    }
}
