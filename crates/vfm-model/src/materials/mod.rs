//! Hyperelastic material library.
//!
//! Stresses are functions of the current deformation gradient and the scalar
//! parameters only; no history variables exist. Every law satisfies
//! σ(I) = 0.
//!
//! The provider interface is a two-variant choice: a law either evaluates the
//! full Cauchy stress or, for uncoupled (deviatoric/volumetric split) laws,
//! a deviatoric Cauchy stress that the inverse driver completes with its
//! pressure-recovery convention. Callers branch on [`StressEval`], never on
//! concrete law types.

mod mooney_rivlin;
mod neo_hookean;
mod uncoupled;
mod yeoh;

pub use mooney_rivlin::MooneyRivlin;
pub use neo_hookean::NeoHookean;
pub use uncoupled::{UncoupledMooneyRivlin, UncoupledNeoHookean};
pub use yeoh::{UncoupledYeoh, Yeoh};

use crate::point::MaterialPoint;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// A law that evaluates the full Cauchy stress.
pub trait FullStressLaw {
    fn cauchy_stress(&self, pt: &MaterialPoint) -> Matrix3<f64>;
}

/// A law with an uncoupled deviatoric/volumetric split that evaluates only
/// the deviatoric Cauchy stress.
pub trait DeviatoricStressLaw {
    fn deviatoric_cauchy_stress(&self, pt: &MaterialPoint) -> Matrix3<f64>;
}

/// Two-variant stress provider handed to the inverse driver.
pub enum StressEval<'a> {
    Full(&'a dyn FullStressLaw),
    Deviatoric(&'a dyn DeviatoricStressLaw),
}

/// The constitutive model attached to a mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialKind {
    NeoHookean(NeoHookean),
    MooneyRivlin(MooneyRivlin),
    Yeoh(Yeoh),
    UncoupledNeoHookean(UncoupledNeoHookean),
    UncoupledMooneyRivlin(UncoupledMooneyRivlin),
    UncoupledYeoh(UncoupledYeoh),
}

impl MaterialKind {
    /// Law name as written in input documents.
    pub fn name(&self) -> &'static str {
        match self {
            MaterialKind::NeoHookean(_) => "neo-Hookean",
            MaterialKind::MooneyRivlin(_) => "Mooney-Rivlin",
            MaterialKind::Yeoh(_) => "Yeoh",
            MaterialKind::UncoupledNeoHookean(_) => "uncoupled neo-Hookean",
            MaterialKind::UncoupledMooneyRivlin(_) => "uncoupled Mooney-Rivlin",
            MaterialKind::UncoupledYeoh(_) => "uncoupled Yeoh",
        }
    }

    /// Build a material from its document keyword and named properties.
    ///
    /// Every property the law declares must be present; unknown property
    /// names are rejected.
    pub fn from_properties(kind: &str, properties: &[(String, f64)]) -> Result<Self, String> {
        let lookup = |name: &str| -> Result<f64, String> {
            properties
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| *v)
                .ok_or_else(|| format!("material '{kind}' is missing property '{name}'"))
        };
        let check_known = |known: &[&str]| -> Result<(), String> {
            for (k, _) in properties {
                if !known.contains(&k.as_str()) {
                    return Err(format!("material '{kind}' has unknown property '{k}'"));
                }
            }
            Ok(())
        };

        let normalized = kind.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "neo-hookean" => {
                check_known(&["mu", "k"])?;
                Ok(MaterialKind::NeoHookean(NeoHookean {
                    mu: lookup("mu")?,
                    k: lookup("k")?,
                }))
            }
            "mooney-rivlin" => {
                check_known(&["c1", "c2", "k"])?;
                Ok(MaterialKind::MooneyRivlin(MooneyRivlin {
                    c1: lookup("c1")?,
                    c2: lookup("c2")?,
                    k: lookup("k")?,
                }))
            }
            "uncoupled neo-hookean" => {
                check_known(&["mu", "k"])?;
                Ok(MaterialKind::UncoupledNeoHookean(UncoupledNeoHookean {
                    mu: lookup("mu")?,
                    k: lookup("k")?,
                }))
            }
            "uncoupled mooney-rivlin" => {
                check_known(&["c1", "c2", "k"])?;
                Ok(MaterialKind::UncoupledMooneyRivlin(UncoupledMooneyRivlin {
                    c1: lookup("c1")?,
                    c2: lookup("c2")?,
                    k: lookup("k")?,
                }))
            }
            "yeoh" => {
                check_known(&["c1", "c2", "c3", "k"])?;
                Ok(MaterialKind::Yeoh(Yeoh {
                    c1: lookup("c1")?,
                    c2: lookup("c2")?,
                    c3: lookup("c3")?,
                    k: lookup("k")?,
                }))
            }
            "uncoupled yeoh" => {
                check_known(&["c1", "c2", "c3", "k"])?;
                Ok(MaterialKind::UncoupledYeoh(UncoupledYeoh {
                    c1: lookup("c1")?,
                    c2: lookup("c2")?,
                    c3: lookup("c3")?,
                    k: lookup("k")?,
                }))
            }
            _ => Err(format!("unknown material type '{kind}'")),
        }
    }

    /// Stress provider for this law.
    pub fn stress_eval(&self) -> StressEval<'_> {
        match self {
            MaterialKind::NeoHookean(law) => StressEval::Full(law),
            MaterialKind::MooneyRivlin(law) => StressEval::Full(law),
            MaterialKind::Yeoh(law) => StressEval::Full(law),
            MaterialKind::UncoupledNeoHookean(law) => StressEval::Deviatoric(law),
            MaterialKind::UncoupledMooneyRivlin(law) => StressEval::Deviatoric(law),
            MaterialKind::UncoupledYeoh(law) => StressEval::Deviatoric(law),
        }
    }

    /// Names of the writable scalar parameters, in index order.
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            MaterialKind::NeoHookean(_) | MaterialKind::UncoupledNeoHookean(_) => &["mu", "k"],
            MaterialKind::MooneyRivlin(_) | MaterialKind::UncoupledMooneyRivlin(_) => {
                &["c1", "c2", "k"]
            }
            MaterialKind::Yeoh(_) | MaterialKind::UncoupledYeoh(_) => &["c1", "c2", "c3", "k"],
        }
    }

    /// Resolve a parameter name to its writable index.
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.param_names().iter().position(|n| *n == name)
    }

    /// Current value of the parameter at `idx`.
    pub fn param(&self, idx: usize) -> Option<f64> {
        match self {
            MaterialKind::NeoHookean(law) => [law.mu, law.k].get(idx).copied(),
            MaterialKind::UncoupledNeoHookean(law) => [law.mu, law.k].get(idx).copied(),
            MaterialKind::MooneyRivlin(law) => [law.c1, law.c2, law.k].get(idx).copied(),
            MaterialKind::UncoupledMooneyRivlin(law) => [law.c1, law.c2, law.k].get(idx).copied(),
            MaterialKind::Yeoh(law) => [law.c1, law.c2, law.c3, law.k].get(idx).copied(),
            MaterialKind::UncoupledYeoh(law) => [law.c1, law.c2, law.c3, law.k].get(idx).copied(),
        }
    }

    /// Write the parameter at `idx`; returns false when the index is out of
    /// range.
    pub fn set_param(&mut self, idx: usize, value: f64) -> bool {
        let slot: Option<&mut f64> = match self {
            MaterialKind::NeoHookean(law) => match idx {
                0 => Some(&mut law.mu),
                1 => Some(&mut law.k),
                _ => None,
            },
            MaterialKind::UncoupledNeoHookean(law) => match idx {
                0 => Some(&mut law.mu),
                1 => Some(&mut law.k),
                _ => None,
            },
            MaterialKind::MooneyRivlin(law) => match idx {
                0 => Some(&mut law.c1),
                1 => Some(&mut law.c2),
                2 => Some(&mut law.k),
                _ => None,
            },
            MaterialKind::UncoupledMooneyRivlin(law) => match idx {
                0 => Some(&mut law.c1),
                1 => Some(&mut law.c2),
                2 => Some(&mut law.k),
                _ => None,
            },
            MaterialKind::Yeoh(law) => match idx {
                0 => Some(&mut law.c1),
                1 => Some(&mut law.c2),
                2 => Some(&mut law.c3),
                3 => Some(&mut law.k),
                _ => None,
            },
            MaterialKind::UncoupledYeoh(law) => match idx {
                0 => Some(&mut law.c1),
                1 => Some(&mut law.c2),
                2 => Some(&mut law.c3),
                3 => Some(&mut law.k),
                _ => None,
            },
        };
        match slot {
            Some(s) => {
                *s = value;
                true
            }
            None => false,
        }
    }
}

/// Deviatoric part of a tensor: dev(A) = A − tr(A)/3 · I
pub(crate) fn deviator(a: &Matrix3<f64>) -> Matrix3<f64> {
    a - Matrix3::identity() * (a.trace() / 3.0)
}
