//! Per-integration-point material state.

use nalgebra::{Matrix3, Vector3};

/// State carried at one integration point.
///
/// The mesh owns one of these per (element, gauss point). Inverse evaluation
/// never mutates mesh-owned points; it works on [`MaterialPoint::trial_clone`]
/// copies whose deformation gradient has been replaced and whose scratch
/// fields are zeroed.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialPoint {
    /// Deformation gradient F
    pub deformation_gradient: Matrix3<f64>,
    /// Volume ratio J = det F
    pub volume_ratio: f64,
    /// Material point velocity
    pub velocity: Vector3<f64>,
    /// Material point acceleration
    pub acceleration: Vector3<f64>,
    /// Spatial velocity gradient
    pub velocity_gradient: Matrix3<f64>,
    /// Strain energy accumulated by a forward solve, if any
    pub stored_energy: f64,
}

impl MaterialPoint {
    /// A point in the undeformed reference state.
    pub fn reference() -> Self {
        Self {
            deformation_gradient: Matrix3::identity(),
            volume_ratio: 1.0,
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            velocity_gradient: Matrix3::zeros(),
            stored_energy: 0.0,
        }
    }

    /// An owned copy prepared for a stress trial: the supplied deformation
    /// gradient is injected, `volume_ratio` is recomputed, and every scratch
    /// field is zeroed so no forward-solve history leaks into the trial.
    pub fn trial_clone(&self, deformation_gradient: Matrix3<f64>) -> Self {
        Self {
            deformation_gradient,
            volume_ratio: deformation_gradient.determinant(),
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
            velocity_gradient: Matrix3::zeros(),
            stored_energy: 0.0,
        }
    }

    /// Left Cauchy-Green tensor B = F Fᵀ
    pub fn left_cauchy_green(&self) -> Matrix3<f64> {
        let f = &self.deformation_gradient;
        f * f.transpose()
    }

    /// Isochoric left Cauchy-Green tensor B̄ = J^(-2/3) B
    pub fn isochoric_left_cauchy_green(&self) -> Matrix3<f64> {
        self.left_cauchy_green() * self.volume_ratio.powf(-2.0 / 3.0)
    }
}

impl Default for MaterialPoint {
    fn default() -> Self {
        Self::reference()
    }
}
