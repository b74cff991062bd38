//! Inverse identification of hyperelastic parameters by the Virtual Fields
//! Method.
//!
//! Given full-field nodal displacement measurements, one or more admissible
//! virtual displacement fields, and resultant forces on named boundary
//! surfaces, the solver finds the material parameter vector θ that balances
//! internal and external virtual work at every (virtual field, time) pair:
//!
//! r(θ)[v·T + t] = W_int(θ, v, t) − W_ext(v, t)
//!
//! W_int(v,t) = Σ_{e,g} P(θ,t,e,g) : (F*(v,t,e,g) − I) · det J₀ · w_g
//! W_ext(v,t) = Σ_k  F_k(t) · u*(v,t,node_k)
//!
//! ½‖r‖² is minimized by a bounded Levenberg–Marquardt driver with a
//! forward-difference Jacobian. The external work is θ-independent and is
//! precomputed once during setup.

pub mod cancel;
pub mod constitutive;
pub mod export;
pub mod external_work;
pub mod facts;
pub mod internal_work;
pub mod kinematics;
pub mod levmar;
pub mod options;
pub mod params;
pub mod problem;
pub mod stores;

pub use cancel::{CancelFlag, CancelGuard, trigger_active};
pub use constitutive::evaluate_stresses;
pub use export::build_plot_file;
pub use external_work::{SurfaceMap, assemble_external_work};
pub use facts::MeshFacts;
pub use internal_work::assemble_internal_work;
pub use kinematics::{ReconstructOptions, reconstruct_frame, reconstruct_series};
pub use levmar::{LmOptions, LmOutcome, LmReport, StopReason, minimize};
pub use options::{SolveOptions, SolverMode};
pub use params::{Parameter, ParameterApplier, ParameterSet, ParameterSpec};
pub use problem::{RunSummary, VfmProblem};
pub use stores::{
    DisplacementSeries, LoadFrame, LoadSeries, NodalField, ReferenceTensorField, StressStore,
    SurfaceLoad, TensorSeries, VirtualField, VirtualFieldSet,
};
