//! Yeoh (reduced polynomial) laws.
//!
//! Coupled form:
//!
//! W(F) = Σᵢ cᵢ (I₁ − 3)ⁱ − 2c₁ ln J + k/2 (ln J)²,  i = 1..3
//!
//! giving the Cauchy stress
//!
//! σ = 2/J [c₁ + 2c₂(I₁ − 3) + 3c₃(I₁ − 3)²] B − 2c₁/J · I + k ln J / J · I
//!
//! which vanishes at F = I. The uncoupled variant evaluates the same
//! reduced-polynomial response on the isochoric invariants and returns only
//! the deviatoric stress.

use super::{DeviatoricStressLaw, FullStressLaw, deviator};
use crate::point::MaterialPoint;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Yeoh {
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
    /// Bulk modulus k
    pub k: f64,
}

fn reduced_polynomial_slope(c1: f64, c2: f64, c3: f64, i1_minus_3: f64) -> f64 {
    c1 + 2.0 * c2 * i1_minus_3 + 3.0 * c3 * i1_minus_3 * i1_minus_3
}

impl FullStressLaw for Yeoh {
    fn cauchy_stress(&self, pt: &MaterialPoint) -> Matrix3<f64> {
        let j = pt.volume_ratio;
        let b = pt.left_cauchy_green();
        let slope = reduced_polynomial_slope(self.c1, self.c2, self.c3, b.trace() - 3.0);
        let i = Matrix3::identity();
        b * (2.0 * slope / j) + i * ((self.k * j.ln() - 2.0 * self.c1) / j)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncoupledYeoh {
    pub c1: f64,
    pub c2: f64,
    pub c3: f64,
    /// Bulk modulus k (volumetric part only; unused by the deviatoric eval)
    pub k: f64,
}

impl DeviatoricStressLaw for UncoupledYeoh {
    fn deviatoric_cauchy_stress(&self, pt: &MaterialPoint) -> Matrix3<f64> {
        let b_bar = pt.isochoric_left_cauchy_green();
        let slope = reduced_polynomial_slope(self.c1, self.c2, self.c3, b_bar.trace() - 3.0);
        deviator(&b_bar) * (2.0 * slope / pt.volume_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stress_free_in_reference_state() {
        let coupled = Yeoh {
            c1: 0.5,
            c2: 0.05,
            c3: 0.01,
            k: 500.0,
        };
        let uncoupled = UncoupledYeoh {
            c1: 0.5,
            c2: 0.05,
            c3: 0.01,
            k: 500.0,
        };
        let pt = MaterialPoint::reference();
        assert_relative_eq!(coupled.cauchy_stress(&pt).norm(), 0.0, epsilon = 1e-13);
        assert_relative_eq!(
            uncoupled.deviatoric_cauchy_stress(&pt).norm(),
            0.0,
            epsilon = 1e-13
        );
    }

    #[test]
    fn first_order_yeoh_matches_neo_hookean() {
        // With c₂ = c₃ = 0 the coupled Yeoh law is the neo-Hookean law with
        // μ = 2c₁ and λ = k.
        use super::super::neo_hookean::NeoHookean;

        let yeoh = Yeoh {
            c1: 0.5,
            c2: 0.0,
            c3: 0.0,
            k: 100.0,
        };
        let mu = 2.0 * yeoh.c1;
        let nh = NeoHookean {
            mu,
            k: yeoh.k + 2.0 * mu / 3.0,
        };

        let f = Matrix3::new(1.2, 0.1, 0.0, 0.0, 0.95, 0.0, 0.0, 0.0, 1.05);
        let pt = MaterialPoint::reference().trial_clone(f);
        assert_relative_eq!(
            (yeoh.cauchy_stress(&pt) - nh.cauchy_stress(&pt)).norm(),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn higher_orders_stiffen_the_response() {
        let soft = Yeoh {
            c1: 0.5,
            c2: 0.0,
            c3: 0.0,
            k: 100.0,
        };
        let stiff = Yeoh {
            c1: 0.5,
            c2: 0.2,
            c3: 0.1,
            k: 100.0,
        };
        let f = Matrix3::new(1.5, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let pt = MaterialPoint::reference().trial_clone(f);
        assert!(stiff.cauchy_stress(&pt)[(0, 0)] > soft.cauchy_stress(&pt)[(0, 0)]);
    }

    #[test]
    fn uncoupled_deviatoric_stress_is_traceless() {
        let law = UncoupledYeoh {
            c1: 0.4,
            c2: 0.1,
            c3: 0.02,
            k: 900.0,
        };
        let f = Matrix3::new(1.3, 0.1, 0.0, 0.0, 0.85, 0.05, 0.0, 0.0, 1.1);
        let pt = MaterialPoint::reference().trial_clone(f);
        assert_relative_eq!(
            law.deviatoric_cauchy_stress(&pt).trace(),
            0.0,
            epsilon = 1e-12
        );
    }
}
