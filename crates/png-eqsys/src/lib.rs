//! png-eqsys: projected nodal gradient equation system.
//!
//! Region algorithms contribute to a shared linear system through an
//! ordered driver; [`ProjectedNodalGradientEquationSystem`] owns the
//! registrations, the lifecycle and the assemble-and-solve cycle;
//! [`EquationSystems`] advances a set of systems once per outer iteration.

pub mod algorithm;
pub mod algorithms;
pub mod bc;
pub mod driver;
pub mod equation_system;
pub mod error;
pub mod options;
pub mod png;

pub use algorithm::{AssemblyContext, NodalGradAlgorithm};
pub use bc::{
    BoundaryKind, ContributionSupport, InflowBoundaryConditionData, OpenBoundaryConditionData,
    SymmetryBoundaryConditionData, WallBoundaryConditionData,
};
pub use driver::AssembleNodalGradAlgorithmDriver;
pub use equation_system::{EquationSystem, EquationSystems, EquationType, Phase, SolveOwnership};
pub use error::{EqSysError, EqSysResult};
pub use options::{MassTreatment, PngOptions, from_yaml_str, load_yaml};
pub use png::{CycleReport, ProjectedNodalGradientEquationSystem};
