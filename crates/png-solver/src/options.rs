//! Linear solver configuration.

use serde::{Deserialize, Serialize};

/// Which collective solver to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Block-Jacobi preconditioned conjugate gradient.
    #[default]
    #[serde(alias = "cg")]
    ConjugateGradient,
    /// Dense LU of the gathered global system (small problems only).
    #[serde(alias = "lu")]
    DirectLu,
}

impl SolverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::ConjugateGradient => "cg",
            SolverKind::DirectLu => "direct_lu",
        }
    }
}

/// Linear solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub kind: SolverKind,
    /// Maximum CG iterations
    pub max_iterations: usize,
    /// Residual reduction relative to the right-hand side norm
    pub rel_tol: f64,
    /// Absolute residual floor
    pub abs_tol: f64,
    /// Largest global unknown count accepted by the dense path
    pub max_direct_unknowns: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            kind: SolverKind::default(),
            max_iterations: 500,
            rel_tol: 1e-12,
            abs_tol: 1e-14,
            max_direct_unknowns: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_options_defaults() {
        let opts = SolverOptions::default();
        assert_eq!(opts.kind, SolverKind::ConjugateGradient);
        assert_eq!(opts.max_iterations, 500);
        assert_eq!(opts.kind.as_str(), "cg");
    }
}
