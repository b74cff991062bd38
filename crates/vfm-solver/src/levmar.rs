//! Bounded Levenberg–Marquardt minimization of ½‖r(θ)‖².
//!
//! Classic additive-damping trust-region scheme with a forward-difference
//! Jacobian:
//!
//! 1. Solve (JᵀJ + μI) Δθ = −Jᵀr
//! 2. Project θ + Δθ onto the box [lo, hi] (bounded mode)
//! 3. Accept when the cost decreases; shrink μ on success, grow it by ν
//!    (doubling ν) on rejection
//!
//! # Convergence Criteria
//!
//! - **Gradient**: ‖Jᵀr‖_∞ ≤ grad_tol
//! - **Step**: ‖Δθ‖ ≤ step_tol · (‖θ‖ + step_tol)
//! - **Objective**: ‖r‖² ≤ obj_tol
//!
//! The driver is deterministic: identical inputs take identical iteration
//! paths and return identical results.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Solver options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmOptions {
    /// Initial damping scale: μ₀ = τ · max diag(JᵀJ)
    pub tau: f64,
    /// Gradient tolerance on ‖Jᵀr‖_∞
    pub grad_tol: f64,
    /// Relative step tolerance on ‖Δθ‖
    pub step_tol: f64,
    /// Objective tolerance on ‖r‖²
    pub obj_tol: f64,
    /// Forward-difference step scale
    pub fd_step: f64,
    /// Maximum outer iterations
    pub max_iterations: usize,
    /// Project every trial point onto the box bounds
    pub bounded: bool,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            tau: 1e-3,
            grad_tol: 1e-15,
            step_tol: 1e-15,
            obj_tol: 1e-17,
            fd_step: 1e-6,
            max_iterations: 100,
            bounded: false,
        }
    }
}

/// Why the iteration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// ‖Jᵀr‖_∞ fell below the gradient tolerance
    SmallGradient,
    /// ‖Δθ‖ fell below the step tolerance
    SmallStep,
    /// ‖r‖² fell below the objective tolerance
    SmallResidual,
    /// Iteration limit exhausted
    MaxIterations,
    /// The damped normal matrix could not be factored
    SingularNormalMatrix,
    /// The residual produced non-finite values that damping could not avoid
    InvalidResidual,
}

impl StopReason {
    pub fn describe(&self) -> &'static str {
        match self {
            StopReason::SmallGradient => "small gradient",
            StopReason::SmallStep => "small step",
            StopReason::SmallResidual => "small residual",
            StopReason::MaxIterations => "maximum iterations reached",
            StopReason::SingularNormalMatrix => "singular normal matrix",
            StopReason::InvalidResidual => "non-finite residual values",
        }
    }
}

/// Termination report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmReport {
    /// ½‖r(θ₀)‖²
    pub initial_cost: f64,
    /// ½‖r(θ*)‖²
    pub final_cost: f64,
    /// ‖Jᵀr‖_∞ at termination
    pub grad_inf_norm: f64,
    /// ‖Δθ‖ of the last attempted step
    pub step_norm: f64,
    /// μ / max diag(JᵀJ) at termination
    pub damping: f64,
    /// Outer iterations taken
    pub iterations: usize,
    pub stop_reason: StopReason,
    /// Residual evaluations (including finite differences)
    pub n_residual_evals: usize,
    /// Jacobian rebuilds
    pub n_jacobian_evals: usize,
    /// Linear solves of the damped normal equations
    pub n_linear_solves: usize,
}

/// Result of a minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct LmOutcome {
    pub theta: DVector<f64>,
    pub report: LmReport,
}

/// Minimize ½‖r(θ)‖² starting from θ₀, optionally subject to lo ≤ θ ≤ hi.
///
/// The callback fills the preallocated residual vector; an `Err` from it
/// aborts the run immediately and is propagated verbatim.
pub fn minimize<F>(
    residual: &mut F,
    theta0: &DVector<f64>,
    n_residuals: usize,
    lo: &DVector<f64>,
    hi: &DVector<f64>,
    opts: &LmOptions,
) -> Result<LmOutcome, String>
where
    F: FnMut(&DVector<f64>, &mut DVector<f64>) -> Result<(), String>,
{
    let m = theta0.len();
    if m == 0 {
        return Err("cannot minimize over an empty parameter vector".to_string());
    }
    if n_residuals == 0 {
        return Err("cannot minimize an empty residual vector".to_string());
    }
    if lo.len() != m || hi.len() != m {
        return Err(format!(
            "bound vectors have lengths {}/{}, expected {m}",
            lo.len(),
            hi.len()
        ));
    }
    if opts.bounded {
        for i in 0..m {
            if lo[i] > hi[i] {
                return Err(format!(
                    "invalid bounds for variable {i}: lo = {} > hi = {}",
                    lo[i], hi[i]
                ));
            }
        }
    }

    let clamp = |theta: &mut DVector<f64>| {
        if opts.bounded {
            for i in 0..m {
                theta[i] = theta[i].clamp(lo[i], hi[i]);
            }
        }
    };

    let mut n_residual_evals = 0usize;
    let mut n_jacobian_evals = 0usize;
    let mut n_linear_solves = 0usize;

    let mut theta = theta0.clone();
    clamp(&mut theta);

    let mut r = DVector::zeros(n_residuals);
    residual(&theta, &mut r)?;
    n_residual_evals += 1;
    if !r.iter().all(|x| x.is_finite()) {
        return Err("non-finite residual at the starting point".to_string());
    }

    let mut cost2 = r.norm_squared();
    let initial_cost = 0.5 * cost2;

    let mut jac = fd_jacobian(residual, &theta, &r, lo, hi, opts, &mut n_residual_evals)?;
    n_jacobian_evals += 1;
    let mut a = jac.transpose() * &jac;
    let mut g = jac.transpose() * &r;

    let diag_max = a.diagonal().max();
    let mut mu = opts.tau * if diag_max > 0.0 { diag_max } else { 1.0 };
    let mut nu = 2.0f64;

    let mut stop = None;
    let mut iterations = 0usize;
    let mut step_norm = 0.0;

    if g.amax() <= opts.grad_tol {
        stop = Some(StopReason::SmallGradient);
    } else if cost2 <= opts.obj_tol {
        stop = Some(StopReason::SmallResidual);
    }

    while stop.is_none() {
        if iterations >= opts.max_iterations {
            stop = Some(StopReason::MaxIterations);
            break;
        }
        iterations += 1;

        let mut damped = a.clone();
        for i in 0..m {
            damped[(i, i)] += mu;
        }
        n_linear_solves += 1;
        let neg_g = -&g;
        let dp = match damped.clone().cholesky() {
            Some(chol) => chol.solve(&neg_g),
            None => match damped.lu().solve(&neg_g) {
                Some(x) => x,
                None => {
                    stop = Some(StopReason::SingularNormalMatrix);
                    break;
                }
            },
        };
        step_norm = dp.norm();
        if step_norm <= opts.step_tol * (theta.norm() + opts.step_tol) {
            stop = Some(StopReason::SmallStep);
            break;
        }

        let mut theta_new = &theta + &dp;
        clamp(&mut theta_new);
        let dp_actual = &theta_new - &theta;
        // A fully clamped step cannot make progress: converged at a bound.
        if opts.bounded
            && dp_actual.norm() <= opts.step_tol * (theta.norm() + opts.step_tol)
        {
            stop = Some(StopReason::SmallStep);
            break;
        }

        let mut r_new = DVector::zeros(n_residuals);
        residual(&theta_new, &mut r_new)?;
        n_residual_evals += 1;

        let finite = r_new.iter().all(|x| x.is_finite());
        let cost2_new = if finite { r_new.norm_squared() } else { f64::INFINITY };

        if finite && cost2_new < cost2 {
            // Gain ratio against the old gradient, before any state moves.
            let denom = dp_actual.dot(&((&dp_actual * mu) - &g));
            let rho = if denom > 0.0 {
                (cost2 - cost2_new) / denom
            } else {
                1.0
            };

            theta = theta_new;
            r = r_new;
            cost2 = cost2_new;

            if cost2 <= opts.obj_tol {
                stop = Some(StopReason::SmallResidual);
                break;
            }

            jac = fd_jacobian(residual, &theta, &r, lo, hi, opts, &mut n_residual_evals)?;
            n_jacobian_evals += 1;
            a = jac.transpose() * &jac;
            g = jac.transpose() * &r;
            if g.amax() <= opts.grad_tol {
                stop = Some(StopReason::SmallGradient);
                break;
            }

            // Nielsen damping update.
            mu *= (1.0f64 / 3.0).max(1.0 - (2.0 * rho - 1.0).powi(3));
            nu = 2.0;
        } else {
            mu *= nu;
            nu *= 2.0;
            if !nu.is_finite() || !mu.is_finite() {
                stop = Some(if finite {
                    StopReason::SingularNormalMatrix
                } else {
                    StopReason::InvalidResidual
                });
                break;
            }
        }
    }

    let stop_reason = stop.unwrap_or(StopReason::MaxIterations);
    let diag_max = a.diagonal().max();
    let report = LmReport {
        initial_cost,
        final_cost: 0.5 * cost2,
        grad_inf_norm: g.amax(),
        step_norm,
        damping: mu / if diag_max > 0.0 { diag_max } else { 1.0 },
        iterations,
        stop_reason,
        n_residual_evals,
        n_jacobian_evals,
        n_linear_solves,
    };
    Ok(LmOutcome { theta, report })
}

/// Forward-difference Jacobian, column by column.
///
/// The step is scaled to the variable magnitude; in bounded mode a step that
/// would leave the box is flipped backwards.
fn fd_jacobian<F>(
    residual: &mut F,
    theta: &DVector<f64>,
    r0: &DVector<f64>,
    lo: &DVector<f64>,
    hi: &DVector<f64>,
    opts: &LmOptions,
    n_residual_evals: &mut usize,
) -> Result<DMatrix<f64>, String>
where
    F: FnMut(&DVector<f64>, &mut DVector<f64>) -> Result<(), String>,
{
    let m = theta.len();
    let n = r0.len();
    let mut jac = DMatrix::zeros(n, m);
    let mut r_pert = DVector::zeros(n);

    for j in 0..m {
        let mut d = opts.fd_step * theta[j].abs().max(1.0);
        if opts.bounded && theta[j] + d > hi[j] {
            if theta[j] - d >= lo[j] {
                d = -d;
            } else {
                // Interval narrower than the step: use whatever room exists.
                let up = hi[j] - theta[j];
                let down = theta[j] - lo[j];
                d = if up >= down { up } else { -down };
            }
        }
        if d == 0.0 {
            // Variable pinned by lo == hi; its column stays zero.
            continue;
        }
        let mut theta_pert = theta.clone();
        theta_pert[j] += d;

        residual(&theta_pert, &mut r_pert)?;
        *n_residual_evals += 1;

        for i in 0..n {
            jac[(i, j)] = (r_pert[i] - r0[i]) / d;
        }
    }
    Ok(jac)
}
