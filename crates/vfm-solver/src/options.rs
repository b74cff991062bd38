//! Solve options derived from the document's Options section.

use crate::levmar::LmOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vfm_config::OptionsDto;

/// Which minimizer variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverMode {
    /// Unconstrained Levenberg–Marquardt
    Levmar,
    /// Box-bounded Levenberg–Marquardt
    ConstrainedLevmar,
}

/// Everything the run loop needs beyond the problem data.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOptions {
    pub mode: SolverMode,
    pub lm: LmOptions,
    pub plane_deformation: bool,
    pub save_virtual_work: Option<PathBuf>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            mode: SolverMode::ConstrainedLevmar,
            lm: LmOptions {
                bounded: true,
                ..Default::default()
            },
            plane_deformation: false,
            save_virtual_work: None,
        }
    }
}

impl SolveOptions {
    /// Translate the DTO; unspecified values keep solver defaults.
    pub fn from_dto(dto: &OptionsDto) -> Result<Self, String> {
        let mode = match dto.solver.as_deref() {
            None => SolverMode::ConstrainedLevmar,
            Some("levmar") => SolverMode::Levmar,
            Some("constrained-levmar") => SolverMode::ConstrainedLevmar,
            Some(other) => {
                return Err(format!(
                    "unknown solver '{other}' (expected 'levmar' or 'constrained-levmar')"
                ));
            }
        };

        let mut lm = LmOptions {
            bounded: mode == SolverMode::ConstrainedLevmar,
            ..Default::default()
        };
        if let Some(tau) = dto.tau {
            if !(tau > 0.0) {
                return Err(format!("tau must be positive, got {tau}"));
            }
            lm.tau = tau;
        }
        if let Some(v) = dto.grad_tol {
            lm.grad_tol = v;
        }
        if let Some(v) = dto.step_tol {
            lm.step_tol = v;
        }
        if let Some(v) = dto.obj_tol {
            lm.obj_tol = v;
        }
        if let Some(v) = dto.fd_step {
            if !(v > 0.0) {
                return Err(format!("fd_step must be positive, got {v}"));
            }
            lm.fd_step = v;
        }
        if let Some(v) = dto.max_iterations {
            lm.max_iterations = v;
        }

        let save_virtual_work = match &dto.save_virtual_work {
            None => None,
            Some(path) => {
                let path = PathBuf::from(path);
                if !path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
                {
                    return Err(format!(
                        "save_virtual_work path must end in .txt: {}",
                        path.display()
                    ));
                }
                Some(path)
            }
        };

        Ok(Self {
            mode,
            lm,
            plane_deformation: dto.plane_deformation,
            save_virtual_work,
        })
    }
}
