//! The projected nodal gradient equation system.
//!
//! Computes a nodal approximation of `∇q` for a scalar nodal field `q` by
//! solving the Galerkin projection `M · dqdx = ∫ N_i ∇q dV + boundary terms`
//! in increment form: `M · δ = b − M · dqdx_old`, `dqdx ← dqdx_old + δ`.
//! The increment is kept in the working field.

use std::collections::BTreeMap;

use png_core::timing::{Timer, cycle_timing};
use png_core::{NodeId, PartId};
use png_mesh::{FieldHandle, MeshError, Part, PartKind, Realm, Topology};
use png_solver::{LinearSystem, SolveReport};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::algorithm::{AssemblyContext, NodalGradAlgorithm};
use crate::algorithms::{
    BoundaryValueNodalGradAlgorithm, InteriorNodalGradAlgorithm, NormalConstraint,
    WallNodalGradAlgorithm,
};
use crate::bc::{
    BoundaryKind, ContributionSupport, InflowBoundaryConditionData, OpenBoundaryConditionData,
    SymmetryBoundaryConditionData, WallBoundaryConditionData,
};
use crate::driver::AssembleNodalGradAlgorithmDriver;
use crate::equation_system::{EquationSystem, EquationType, Phase, SolveOwnership};
use crate::error::{EqSysError, EqSysResult};
use crate::options::PngOptions;

/// Summary of one assemble-and-solve cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outer_iteration: u64,
    /// Entry point that ran the cycle
    pub driven_by: SolveOwnership,
    pub solve: SolveReport,
    /// Local nodes no algorithm contributed to; their gradient is stale.
    pub stale_nodes: Vec<NodeId>,
    /// Global 2-norm of the increment
    pub increment_norm: f64,
}

/// What ranks compare at initialization.
#[derive(Serialize)]
struct RegistrationRecord<'a> {
    name: &'a str,
    equation: &'static str,
    dof: &'a str,
    delta: &'a str,
    independent: &'a str,
    self_driven: bool,
    spatial_dim: usize,
    field_parts: &'a [String],
    interior: &'a [String],
    boundary: &'a [(String, BoundaryKind)],
    data_map: &'a BTreeMap<BoundaryKind, String>,
    options: &'a PngOptions,
}

pub struct ProjectedNodalGradientEquationSystem {
    eq_sys_name: String,
    equation_type: EquationType,
    dof_name: String,
    delta_name: String,
    independent_dof_name: String,
    ownership: SolveOwnership,
    options: PngOptions,
    phase: Phase,

    field_parts: Vec<String>,
    interior: Vec<String>,
    boundary: Vec<(String, BoundaryKind)>,
    data_map: BTreeMap<BoundaryKind, String>,
    driver: AssembleNodalGradAlgorithmDriver,

    linsys: Option<LinearSystem>,
    last_cycle: Option<(u64, SolveOwnership)>,
    last_report: Option<CycleReport>,
}

impl ProjectedNodalGradientEquationSystem {
    pub fn new(
        eq_sys_name: impl Into<String>,
        equation_type: EquationType,
        dof_name: impl Into<String>,
        delta_name: impl Into<String>,
        independent_dof_name: impl Into<String>,
        ownership: SolveOwnership,
    ) -> Self {
        Self {
            eq_sys_name: eq_sys_name.into(),
            equation_type,
            dof_name: dof_name.into(),
            delta_name: delta_name.into(),
            independent_dof_name: independent_dof_name.into(),
            ownership,
            options: PngOptions::default(),
            phase: Phase::Unconfigured,
            field_parts: Vec::new(),
            interior: Vec::new(),
            boundary: Vec::new(),
            data_map: BTreeMap::new(),
            driver: AssembleNodalGradAlgorithmDriver::new(),
            linsys: None,
            last_cycle: None,
            last_report: None,
        }
    }

    /// Conventional names for the gradient of `q`: `dqdx`, `qTmp` and
    /// `PNGrad_q`.
    pub fn for_independent_field(q: &str, ownership: SolveOwnership) -> Self {
        Self::new(
            format!("PNGrad_{}", q),
            EquationType::ProjectedNodalGradient,
            format!("d{}dx", q),
            format!("{}Tmp", q),
            q,
            ownership,
        )
    }

    pub fn with_options(mut self, options: PngOptions) -> EqSysResult<Self> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    pub fn options(&self) -> &PngOptions {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn dof_name(&self) -> &str {
        &self.dof_name
    }

    pub fn delta_name(&self) -> &str {
        &self.delta_name
    }

    pub fn independent_dof_name(&self) -> &str {
        &self.independent_dof_name
    }

    pub fn driver(&self) -> &AssembleNodalGradAlgorithmDriver {
        &self.driver
    }

    pub fn linear_system(&self) -> Option<&LinearSystem> {
        self.linsys.as_ref()
    }

    pub fn last_report(&self) -> Option<&CycleReport> {
        self.last_report.as_ref()
    }

    pub fn data_map(&self) -> &BTreeMap<BoundaryKind, String> {
        &self.data_map
    }

    /// Silence residual and stale-node reporting.
    pub fn deactivate_output(&mut self) {
        self.options.output = false;
    }

    pub fn set_data_map(&mut self, kind: BoundaryKind, name: impl Into<String>) -> EqSysResult<()> {
        self.require_setup_phase("set_data_map")?;
        self.data_map.insert(kind, name.into());
        Ok(())
    }

    pub fn get_name_given_bc(&self, kind: BoundaryKind) -> EqSysResult<&str> {
        self.data_map
            .get(&kind)
            .map(String::as_str)
            .ok_or_else(|| EqSysError::NotFound {
                what: format!(
                    "no data source registered for {} boundaries of '{}'",
                    kind, self.eq_sys_name
                ),
            })
    }

    /// Hex digest of the registration state, identical on every rank of a
    /// consistent setup.
    pub fn registration_fingerprint(&self, spatial_dim: usize) -> EqSysResult<String> {
        Ok(format!("{:x}", self.digest(spatial_dim)?))
    }

    fn digest(&self, spatial_dim: usize) -> EqSysResult<sha2::digest::Output<Sha256>> {
        let record = RegistrationRecord {
            name: &self.eq_sys_name,
            equation: self.equation_type.as_str(),
            dof: &self.dof_name,
            delta: &self.delta_name,
            independent: &self.independent_dof_name,
            self_driven: self.ownership == SolveOwnership::SelfDriven,
            spatial_dim,
            field_parts: &self.field_parts,
            interior: &self.interior,
            boundary: &self.boundary,
            data_map: &self.data_map,
            options: &self.options,
        };
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&record)?);
        Ok(hasher.finalize())
    }

    fn require_setup_phase(&self, op: &str) -> EqSysResult<()> {
        if self.phase >= Phase::Initialized {
            return Err(EqSysError::Lifecycle {
                what: format!("{} on '{}' after initialize", op, self.eq_sys_name),
            });
        }
        Ok(())
    }

    fn require_initialized(&self, op: &str) -> EqSysResult<()> {
        if self.phase < Phase::Initialized {
            return Err(EqSysError::Lifecycle {
                what: format!("{} on '{}' before initialize", op, self.eq_sys_name),
            });
        }
        Ok(())
    }

    fn lookup_part<'r>(&self, realm: &'r Realm, part: PartId) -> EqSysResult<&'r Part> {
        realm.mesh().part(part).ok_or_else(|| EqSysError::NotFound {
            what: format!("part {} for '{}'", part, self.eq_sys_name),
        })
    }

    fn register_boundary(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        kind: BoundaryKind,
        source: &str,
        algorithm: impl FnOnce(String) -> Box<dyn NodalGradAlgorithm>,
    ) -> EqSysResult<()> {
        self.require_setup_phase("boundary registration")?;
        self.require_support(kind)?;
        let part = self.lookup_part(realm, part)?;
        if part.kind != PartKind::Side {
            return Err(EqSysError::Configuration {
                what: format!("{} boundary on '{}': not a side part", kind, part.name),
            });
        }
        if self.boundary.iter().any(|(p, k)| *p == part.name && *k == kind) {
            return Err(EqSysError::Configuration {
                what: format!("{} boundary on '{}' registered twice", kind, part.name),
            });
        }
        let mesh = realm.mesh();
        if let Some(face) = mesh
            .part_faces(part.id)
            .iter()
            .filter_map(|&f| mesh.face(f))
            .find(|f| f.topology != topology)
        {
            return Err(EqSysError::Configuration {
                what: format!(
                    "{} boundary on '{}': expected {} faces, found {}",
                    kind, part.name, topology, face.topology
                ),
            });
        }

        if let Some(previous) = self.data_map.insert(kind, source.to_string()) {
            if previous != source {
                tracing::debug!(%kind, %previous, %source, "boundary data source replaced");
            }
        }
        self.driver.add_boundary(algorithm(part.name.clone()));
        self.boundary.push((part.name.clone(), kind));
        self.phase = self.phase.max(Phase::Configured);
        tracing::debug!(system = %self.eq_sys_name, part = %part.name, %kind, "boundary registered");
        Ok(())
    }

    /// Fail unless `support` reports a contribution kernel for `kind`.
    fn require_support(&self, kind: BoundaryKind) -> EqSysResult<()> {
        match self.support(kind) {
            ContributionSupport::Supported => Ok(()),
            ContributionSupport::Unsupported => Err(EqSysError::Configuration {
                what: format!(
                    "{} boundaries have no contribution kernel in '{}'",
                    kind, self.eq_sys_name
                ),
            }),
        }
    }

    fn handles(&self, realm: &Realm) -> EqSysResult<(FieldHandle, FieldHandle, FieldHandle)> {
        let fields = realm.fields();
        let find = |name: &str| {
            fields.handle(name).ok_or_else(|| EqSysError::Configuration {
                what: format!("field '{}' of '{}' is not declared", name, self.eq_sys_name),
            })
        };
        Ok((
            find(&self.dof_name)?,
            find(&self.delta_name)?,
            find(&self.independent_dof_name)?,
        ))
    }

    fn build_linear_system(&self, realm: &Realm) -> EqSysResult<LinearSystem> {
        let mut names: Vec<&str> = self
            .interior
            .iter()
            .chain(self.boundary.iter().map(|(p, _)| p))
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        let parts = realm.part_ids(&names)?;
        Ok(LinearSystem::build(realm.mesh(), &parts, realm.spatial_dim()))
    }

    /// Zero the linear system and run every algorithm once, leaving the raw
    /// contributions in place.
    pub fn execute_algorithms(&mut self, realm: &Realm) -> EqSysResult<()> {
        self.require_initialized("assemble")?;
        let (dqdx, _, independent) = self.handles(realm)?;
        let linsys = self.linsys.as_mut().ok_or_else(|| EqSysError::Lifecycle {
            what: format!("'{}' has no linear system", self.eq_sys_name),
        })?;

        linsys.zero();
        let ctx = AssemblyContext {
            mesh: realm.mesh(),
            fields: realm.fields(),
            independent,
            dqdx,
            options: &self.options,
            data_map: &self.data_map,
        };
        self.driver.execute(&ctx, linsys)
    }

    /// Run every algorithm and close the directions nothing constrained.
    /// Returns the local nodes of the gradient field whose value is at least
    /// partly kept from the previous cycle.
    pub fn assemble(&mut self, realm: &Realm) -> EqSysResult<Vec<NodeId>> {
        self.execute_algorithms(realm)?;
        let linsys = self.linsys.as_mut().ok_or_else(|| EqSysError::Lifecycle {
            what: format!("'{}' has no linear system", self.eq_sys_name),
        })?;
        let mut stale = linsys.finalize(realm.comm(), realm.mesh())?;

        // nodes carrying the gradient that no registered part reaches
        let mesh = realm.mesh();
        for name in &self.field_parts {
            if let Some(part) = mesh.part_by_name(name) {
                stale.extend(
                    mesh.part_nodes(part.id)
                        .into_iter()
                        .filter(|&n| linsys.dofs().block(n).is_none()),
                );
            }
        }
        stale.sort_unstable();
        stale.dedup();
        Ok(stale)
    }

    fn run_cycle(&mut self, realm: &mut Realm, entry: SolveOwnership) -> EqSysResult<()> {
        self.require_initialized("solve")?;
        let iteration = realm.outer_iteration();
        if let Some((last, by)) = self.last_cycle {
            if last == iteration && by != entry {
                return Err(EqSysError::Lifecycle {
                    what: format!(
                        "'{}' already advanced in outer iteration {} through the {:?} entry point",
                        self.eq_sys_name, iteration, by
                    ),
                });
            }
        }

        let stale = self.assemble(realm)?;
        let (dqdx, delta, _) = self.handles(realm)?;
        let linsys = self.linsys.as_ref().ok_or_else(|| EqSysError::Lifecycle {
            what: format!("'{}' has no linear system", self.eq_sys_name),
        })?;
        let (x, solve) = linsys.solve(realm.comm(), realm.mesh(), &self.options.solver)?;

        let timer = Timer::start("scatter");
        let dim = realm.spatial_dim();
        let mut local_sq = 0.0;
        {
            let (mesh, fields) = realm.split_mut();
            fields.values_mut(delta).fill(0.0);
            for (b, &node) in linsys.dofs().active_nodes().iter().enumerate() {
                let inc = &x[b * dim..(b + 1) * dim];
                fields.set_node_value(delta, node, inc);
                let updated: Vec<f64> = fields
                    .node_value(dqdx, node)
                    .iter()
                    .zip(inc)
                    .map(|(g, d)| g + d)
                    .collect();
                fields.set_node_value(dqdx, node, &updated);
                if mesh.is_owned(node) {
                    local_sq += inc.iter().map(|d| d * d).sum::<f64>();
                }
            }
        }
        realm.copy_owned_to_shared(dqdx)?;
        timer.stop_into(&cycle_timing::SCATTER);
        let mut sq = [local_sq];
        realm.comm().all_reduce_sum(&mut sq).map_err(EqSysError::from)?;
        let increment_norm = sq[0].sqrt();

        if self.options.output {
            tracing::info!(
                system = %self.eq_sys_name,
                iteration,
                solver = solve.kind.as_str(),
                iterations = solve.iterations,
                residual = solve.residual_norm,
                increment = increment_norm,
                "projected nodal gradient solved"
            );
            if !stale.is_empty() {
                tracing::warn!(
                    system = %self.eq_sys_name,
                    rank = realm.comm().rank(),
                    count = stale.len(),
                    "nodes with no contributions keep their previous gradient"
                );
            }
        }

        self.phase = Phase::Solving;
        self.last_cycle = Some((iteration, entry));
        self.last_report = Some(CycleReport {
            outer_iteration: iteration,
            driven_by: entry,
            solve,
            stale_nodes: stale,
            increment_norm,
        });
        Ok(())
    }

    /// Cycle entry point for a parent system that manages this one.
    pub fn solve_and_update_external(&mut self, realm: &mut Realm) -> EqSysResult<()> {
        self.run_cycle(realm, SolveOwnership::ExternallyDriven)
    }

    /// Run a cycle if `ownership` matches how this instance is driven.
    pub fn advance(&mut self, realm: &mut Realm, ownership: SolveOwnership) -> EqSysResult<()> {
        if ownership != self.ownership {
            return Err(EqSysError::Lifecycle {
                what: format!(
                    "'{}' is {:?} but was advanced as {:?}",
                    self.eq_sys_name, self.ownership, ownership
                ),
            });
        }
        self.run_cycle(realm, ownership)
    }
}

impl EquationSystem for ProjectedNodalGradientEquationSystem {
    fn name(&self) -> &str {
        &self.eq_sys_name
    }

    fn equation_type(&self) -> EquationType {
        self.equation_type
    }

    fn dof_names(&self) -> Vec<&str> {
        vec![&self.dof_name, &self.delta_name]
    }

    fn ownership(&self) -> SolveOwnership {
        self.ownership
    }

    fn support(&self, kind: BoundaryKind) -> ContributionSupport {
        match kind {
            BoundaryKind::Wall
            | BoundaryKind::Inflow
            | BoundaryKind::Open
            | BoundaryKind::Symmetry => ContributionSupport::Supported,
            BoundaryKind::NonConformal | BoundaryKind::Overset => ContributionSupport::Unsupported,
        }
    }

    fn register_nodal_fields(&mut self, realm: &mut Realm, parts: &[PartId]) -> EqSysResult<()> {
        self.require_setup_phase("register_nodal_fields")?;
        let names = parts
            .iter()
            .map(|&p| self.lookup_part(realm, p).map(|part| part.name.clone()))
            .collect::<EqSysResult<Vec<_>>>()?;

        let dim = realm.spatial_dim();
        for field in [&self.dof_name, &self.delta_name] {
            realm
                .fields_mut()
                .declare(field, dim, parts)
                .map_err(|e| match e {
                    MeshError::FieldMismatch { .. } => EqSysError::Configuration {
                        what: e.to_string(),
                    },
                    other => EqSysError::Mesh(other),
                })?;
        }

        self.field_parts.extend(names);
        self.field_parts.sort_unstable();
        self.field_parts.dedup();
        self.phase = self.phase.max(Phase::Configured);
        Ok(())
    }

    fn register_interior_algorithm(&mut self, realm: &Realm, part: PartId) -> EqSysResult<()> {
        self.require_setup_phase("register_interior_algorithm")?;
        let part = self.lookup_part(realm, part)?;
        if part.kind != PartKind::Volume {
            return Err(EqSysError::Configuration {
                what: format!("interior algorithm on '{}': not a volume part", part.name),
            });
        }
        if self.interior.contains(&part.name) {
            return Err(EqSysError::Configuration {
                what: format!("interior algorithm on '{}' registered twice", part.name),
            });
        }
        self.driver
            .add_interior(Box::new(InteriorNodalGradAlgorithm::new(part.name.clone())));
        self.interior.push(part.name.clone());
        self.phase = self.phase.max(Phase::Configured);
        tracing::debug!(system = %self.eq_sys_name, part = %part.name, "interior registered");
        Ok(())
    }

    fn register_wall_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &WallBoundaryConditionData,
    ) -> EqSysResult<()> {
        let constraint = NormalConstraint::Wall {
            fallback: data.normal_gradient,
        };
        self.register_boundary(realm, part, topology, BoundaryKind::Wall, &data.source, |p| {
            Box::new(WallNodalGradAlgorithm::new(p, constraint)) as Box<dyn NodalGradAlgorithm>
        })
    }

    fn register_inflow_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &InflowBoundaryConditionData,
    ) -> EqSysResult<()> {
        self.register_boundary(realm, part, topology, BoundaryKind::Inflow, &data.source, |p| {
            Box::new(BoundaryValueNodalGradAlgorithm::new(p, BoundaryKind::Inflow)) as Box<dyn NodalGradAlgorithm>
        })
    }

    fn register_open_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &OpenBoundaryConditionData,
    ) -> EqSysResult<()> {
        self.register_boundary(realm, part, topology, BoundaryKind::Open, &data.source, |p| {
            Box::new(BoundaryValueNodalGradAlgorithm::new(p, BoundaryKind::Open)) as Box<dyn NodalGradAlgorithm>
        })
    }

    fn register_symmetry_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &SymmetryBoundaryConditionData,
    ) -> EqSysResult<()> {
        self.register_boundary(realm, part, topology, BoundaryKind::Symmetry, &data.source, |p| {
            Box::new(WallNodalGradAlgorithm::new(p, NormalConstraint::Symmetry)) as Box<dyn NodalGradAlgorithm>
        })
    }

    fn register_non_conformal_bc(
        &mut self,
        _realm: &Realm,
        _part: PartId,
        _topology: Topology,
    ) -> EqSysResult<()> {
        self.require_support(BoundaryKind::NonConformal)
    }

    fn register_overset_bc(&mut self) -> EqSysResult<()> {
        self.require_support(BoundaryKind::Overset)
    }

    fn initialize(&mut self, realm: &mut Realm) -> EqSysResult<()> {
        if self.phase >= Phase::Initialized {
            return Err(EqSysError::Lifecycle {
                what: format!("'{}' initialized twice", self.eq_sys_name),
            });
        }

        let digest = self.digest(realm.spatial_dim())?;
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        let mine = u64::from_le_bytes(word);
        let all = realm.comm().all_gather_u64(mine)?;
        if all.iter().any(|&v| v != mine) {
            let differing: Vec<usize> = all
                .iter()
                .enumerate()
                .filter(|&(_, &v)| v != all[0])
                .map(|(r, _)| r)
                .collect();
            return Err(EqSysError::ParallelInconsistency {
                what: format!(
                    "registrations of '{}' differ from rank 0 on ranks {:?}",
                    self.eq_sys_name, differing
                ),
            });
        }

        let (_, _, independent) = self.handles(realm)?;
        if realm.fields().components(independent) != 1 {
            return Err(EqSysError::Configuration {
                what: format!(
                    "independent field '{}' of '{}' must be scalar",
                    self.independent_dof_name, self.eq_sys_name
                ),
            });
        }

        self.linsys = Some(self.build_linear_system(realm)?);
        self.phase = Phase::Initialized;
        tracing::debug!(
            system = %self.eq_sys_name,
            algorithms = self.driver.len(),
            rows = self.linsys.as_ref().map_or(0, |s| s.row_count()),
            "initialized"
        );
        Ok(())
    }

    fn reinitialize_linear_system(&mut self, realm: &mut Realm) -> EqSysResult<()> {
        self.require_initialized("reinitialize_linear_system")?;
        let linsys = self.build_linear_system(realm)?;
        tracing::debug!(
            system = %self.eq_sys_name,
            rows = linsys.row_count(),
            mesh_generation = realm.mesh_generation(),
            "linear system rebuilt"
        );
        self.linsys = Some(linsys);
        Ok(())
    }

    fn solve_and_update(&mut self, realm: &mut Realm) -> EqSysResult<()> {
        if self.ownership == SolveOwnership::ExternallyDriven {
            return Err(EqSysError::Lifecycle {
                what: format!(
                    "'{}' is driven by its parent; use solve_and_update_external",
                    self.eq_sys_name
                ),
            });
        }
        self.run_cycle(realm, SolveOwnership::SelfDriven)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conventional_names() {
        let png = ProjectedNodalGradientEquationSystem::for_independent_field(
            "t",
            SolveOwnership::SelfDriven,
        );
        assert_eq!(png.name(), "PNGrad_t");
        assert_eq!(png.dof_names(), vec!["dtdx", "tTmp"]);
        assert_eq!(png.independent_dof_name(), "t");
        assert_eq!(png.equation_type(), EquationType::ProjectedNodalGradient);
    }

    #[test]
    fn fingerprint_tracks_registration_state() {
        let make = || {
            ProjectedNodalGradientEquationSystem::for_independent_field(
                "q",
                SolveOwnership::SelfDriven,
            )
        };
        let a = make();
        let mut b = make();
        let fp = |s: &ProjectedNodalGradientEquationSystem, dim| s.registration_fingerprint(dim).unwrap();
        assert_eq!(fp(&a, 3), fp(&b, 3));
        assert_ne!(fp(&a, 2), fp(&a, 3));

        b.set_data_map(BoundaryKind::Wall, "dqdn").unwrap();
        assert_ne!(fp(&a, 3), fp(&b, 3));
    }

    #[test]
    fn fingerprint_serializes_every_boundary_kind_key() {
        let mut png =
            ProjectedNodalGradientEquationSystem::for_independent_field("q", SolveOwnership::SelfDriven);
        let empty = png.registration_fingerprint(3).unwrap();
        for kind in BoundaryKind::ALL {
            png.set_data_map(kind, format!("{}_source", kind)).unwrap();
        }
        let full = png.registration_fingerprint(3).unwrap();
        assert_eq!(full.len(), 64);
        assert_ne!(full, empty);
    }
}
