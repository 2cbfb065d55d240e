//! The equation-system capability and the orchestrator that drives it.

use std::fmt;

use png_core::PartId;
use png_mesh::{Realm, Topology};

use crate::bc::{
    BoundaryKind, ContributionSupport, InflowBoundaryConditionData, OpenBoundaryConditionData,
    SymmetryBoundaryConditionData, WallBoundaryConditionData,
};
use crate::error::{EqSysError, EqSysResult};

/// Physical equation an equation system solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquationType {
    ProjectedNodalGradient,
    ScalarTransport,
}

impl EquationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquationType::ProjectedNodalGradient => "projected_nodal_gradient",
            EquationType::ScalarTransport => "scalar_transport",
        }
    }
}

impl fmt::Display for EquationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who advances an equation system each outer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolveOwnership {
    /// Advanced by the orchestrator through its own hook.
    SelfDriven,
    /// Advanced from inside another equation system's hook.
    ExternallyDriven,
}

impl SolveOwnership {
    /// `manages_solve == true` means another system manages this one.
    pub fn from_manages_solve(manages_solve: bool) -> Self {
        if manages_solve {
            SolveOwnership::ExternallyDriven
        } else {
            SolveOwnership::SelfDriven
        }
    }
}

/// Setup and solve phases, strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Unconfigured,
    Configured,
    Initialized,
    Solving,
}

/// Capability every equation system provides to the orchestrator.
///
/// Boundary support is declared per kind with no default, so each system
/// decides explicitly which kinds it handles.
pub trait EquationSystem {
    fn name(&self) -> &str;

    fn equation_type(&self) -> EquationType;

    /// Names of the nodal fields this system owns.
    fn dof_names(&self) -> Vec<&str>;

    fn ownership(&self) -> SolveOwnership;

    fn support(&self, kind: BoundaryKind) -> ContributionSupport;

    fn register_nodal_fields(&mut self, realm: &mut Realm, parts: &[PartId]) -> EqSysResult<()>;

    fn register_interior_algorithm(&mut self, realm: &Realm, part: PartId) -> EqSysResult<()>;

    fn register_wall_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &WallBoundaryConditionData,
    ) -> EqSysResult<()>;

    fn register_inflow_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &InflowBoundaryConditionData,
    ) -> EqSysResult<()>;

    fn register_open_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &OpenBoundaryConditionData,
    ) -> EqSysResult<()>;

    fn register_symmetry_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &SymmetryBoundaryConditionData,
    ) -> EqSysResult<()>;

    fn register_non_conformal_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
    ) -> EqSysResult<()>;

    fn register_overset_bc(&mut self) -> EqSysResult<()>;

    fn initialize(&mut self, realm: &mut Realm) -> EqSysResult<()>;

    fn reinitialize_linear_system(&mut self, realm: &mut Realm) -> EqSysResult<()>;

    /// Per-outer-iteration hook.
    fn solve_and_update(&mut self, realm: &mut Realm) -> EqSysResult<()>;
}

/// Ordered collection of equation systems sharing one realm.
#[derive(Default)]
pub struct EquationSystems {
    systems: Vec<Box<dyn EquationSystem>>,
}

impl EquationSystems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a system; names must be unique.
    pub fn add(&mut self, system: Box<dyn EquationSystem>) -> EqSysResult<usize> {
        if self.get(system.name()).is_some() {
            return Err(EqSysError::Configuration {
                what: format!("equation system '{}' registered twice", system.name()),
            });
        }
        tracing::debug!(
            name = system.name(),
            equation = %system.equation_type(),
            ownership = ?system.ownership(),
            "equation system added"
        );
        self.systems.push(system);
        Ok(self.systems.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&dyn EquationSystem> {
        self.systems
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn EquationSystem + 'static)> {
        self.systems
            .iter_mut()
            .find(|s| s.name() == name)
            .map(|s| s.as_mut())
    }

    pub fn names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    pub fn initialize(&mut self, realm: &mut Realm) -> EqSysResult<()> {
        for sys in &mut self.systems {
            sys.initialize(realm)?;
        }
        Ok(())
    }

    pub fn reinitialize_linear_systems(&mut self, realm: &mut Realm) -> EqSysResult<()> {
        for sys in &mut self.systems {
            sys.reinitialize_linear_system(realm)?;
        }
        Ok(())
    }

    /// Run one outer iteration: bump the realm's counter, then call every
    /// self-driven system's hook in registration order.
    pub fn solve_and_update(&mut self, realm: &mut Realm) -> EqSysResult<()> {
        let iteration = realm.begin_outer_iteration();
        for sys in &mut self.systems {
            if sys.ownership() == SolveOwnership::ExternallyDriven {
                tracing::trace!(name = sys.name(), iteration, "skipped, driven by its parent");
                continue;
            }
            sys.solve_and_update(realm)?;
        }
        Ok(())
    }
}
