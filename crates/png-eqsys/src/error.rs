//! Error types for equation-system setup and solves.

use png_mesh::MeshError;
use png_solver::LinearSolverError;
use thiserror::Error;

/// Errors raised by equation systems.
///
/// `Configuration`, `Lifecycle` and `NotFound` are setup defects and fatal
/// to a run. `SolverFailure` is reported to the caller, which decides
/// whether to retry.
#[derive(Error, Debug)]
pub enum EqSysError {
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    #[error("Lifecycle error: {what}")]
    Lifecycle { what: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Solver failure: {what}")]
    SolverFailure { what: String },

    #[error("Parallel inconsistency: {what}")]
    ParallelInconsistency { what: String },

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),

    #[error("Linear system error: {0}")]
    Linear(LinearSolverError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EqSysResult<T> = Result<T, EqSysError>;

impl From<LinearSolverError> for EqSysError {
    fn from(e: LinearSolverError) -> Self {
        match e {
            LinearSolverError::NotConverged { .. } | LinearSolverError::Breakdown { .. } => {
                EqSysError::SolverFailure {
                    what: e.to_string(),
                }
            }
            other => EqSysError::Linear(other),
        }
    }
}
