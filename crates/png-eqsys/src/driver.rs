//! Ordered execution of region algorithms.

use png_core::timing::{Timer, cycle_timing};
use png_solver::LinearSystem;

use crate::algorithm::{AssemblyContext, NodalGradAlgorithm};
use crate::error::EqSysResult;

/// Owns the registered algorithms and runs them in a fixed order: interior
/// algorithms first, then boundary algorithms, each group in registration
/// order.
#[derive(Default)]
pub struct AssembleNodalGradAlgorithmDriver {
    interior: Vec<Box<dyn NodalGradAlgorithm>>,
    boundary: Vec<Box<dyn NodalGradAlgorithm>>,
}

impl AssembleNodalGradAlgorithmDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_interior(&mut self, alg: Box<dyn NodalGradAlgorithm>) {
        self.interior.push(alg);
    }

    pub fn add_boundary(&mut self, alg: Box<dyn NodalGradAlgorithm>) {
        self.boundary.push(alg);
    }

    pub fn len(&self) -> usize {
        self.interior.len() + self.boundary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Algorithms in execution order.
    pub fn algorithms(&self) -> impl Iterator<Item = &dyn NodalGradAlgorithm> {
        self.interior.iter().chain(&self.boundary).map(|a| a.as_ref())
    }

    /// Run every algorithm exactly once.
    pub fn execute(&self, ctx: &AssemblyContext<'_>, sys: &mut LinearSystem) -> EqSysResult<()> {
        let timer = Timer::start("assembly");
        for alg in self.algorithms() {
            tracing::trace!(algorithm = alg.name(), "executing");
            alg.execute(ctx, sys)?;
        }
        timer.stop_into(&cycle_timing::ASSEMBLY);
        Ok(())
    }
}

impl std::fmt::Debug for AssembleNodalGradAlgorithmDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.algorithms().map(|a| a.name()))
            .finish()
    }
}
