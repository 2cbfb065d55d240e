//! Error types for linear-system operations.

use png_mesh::MeshError;
use thiserror::Error;

/// Errors that can occur while assembling or solving a linear system.
#[derive(Error, Debug)]
pub enum LinearSolverError {
    #[error("Convergence failed after {iterations} iterations (residual {residual:e})")]
    NotConverged { iterations: usize, residual: f64 },

    #[error("Solver breakdown: {what}")]
    Breakdown { what: String },

    #[error("Entry ({row}, {col}) is outside the sparsity pattern")]
    SparsityMismatch { row: usize, col: usize },

    #[error("Dimension mismatch: {what}")]
    DimensionMismatch { what: String },

    #[error("Direct solve of {unknowns} unknowns exceeds the limit of {limit}")]
    TooLarge { unknowns: usize, limit: usize },

    #[error("Mesh error: {0}")]
    Mesh(#[from] MeshError),
}

pub type LinearSolverResult<T> = Result<T, LinearSolverError>;
