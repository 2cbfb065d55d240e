//! Linear-system layer for nodal equation systems.
//!
//! This crate provides a block-sparse matrix whose sparsity follows mesh
//! connectivity, accumulation primitives for element and face kernels, and
//! collective solvers that work across the ranks of a decomposed mesh:
//! a block-Jacobi preconditioned conjugate gradient and a dense LU path for
//! small systems.

pub mod cg;
pub mod direct;
pub mod error;
pub mod options;
pub mod shared;
pub mod system;

pub use error::{LinearSolverError, LinearSolverResult};
pub use options::{SolverKind, SolverOptions};
pub use system::{LinearSystem, SolveReport};
