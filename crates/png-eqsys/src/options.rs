//! Options for projected nodal gradient systems, loadable from YAML.

use std::path::Path;

use png_solver::SolverOptions;
use serde::{Deserialize, Serialize};

use crate::error::{EqSysError, EqSysResult};

/// How the mass operator is formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MassTreatment {
    /// Row-summed, i.e. the dual nodal volume on the diagonal.
    #[default]
    Lumped,
    /// Full `N_i N_j` integral.
    Consistent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PngOptions {
    pub mass: MassTreatment,
    /// Dimensionless weight of the wall and symmetry constraints.
    pub penalty: f64,
    pub solver: SolverOptions,
    /// Report residuals and stale nodes
    pub output: bool,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self {
            mass: MassTreatment::default(),
            penalty: 1e8,
            solver: SolverOptions::default(),
            output: true,
        }
    }
}

impl PngOptions {
    pub fn validate(&self) -> EqSysResult<()> {
        let check = |ok: bool, what: &str| {
            if ok {
                Ok(())
            } else {
                Err(EqSysError::Configuration {
                    what: what.to_string(),
                })
            }
        };
        check(
            self.penalty.is_finite() && self.penalty > 0.0,
            "penalty must be positive",
        )?;
        check(
            self.solver.rel_tol.is_finite() && self.solver.rel_tol > 0.0,
            "solver.rel_tol must be positive",
        )?;
        check(
            self.solver.abs_tol.is_finite() && self.solver.abs_tol > 0.0,
            "solver.abs_tol must be positive",
        )?;
        check(
            self.solver.max_iterations > 0,
            "solver.max_iterations must be positive",
        )
    }
}

pub fn from_yaml_str(text: &str) -> EqSysResult<PngOptions> {
    let opts: PngOptions = serde_yaml::from_str(text)?;
    opts.validate()?;
    Ok(opts)
}

pub fn load_yaml(path: &Path) -> EqSysResult<PngOptions> {
    let content = std::fs::read_to_string(path)?;
    from_yaml_str(&content)
}
