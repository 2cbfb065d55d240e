//! Multi-rank behavior and orchestration.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::*;
use png_core::PartId;
use png_eqsys::{
    BoundaryKind, ContributionSupport, EqSysError, EqSysResult, EquationSystem, EquationSystems,
    EquationType, InflowBoundaryConditionData, MassTreatment, OpenBoundaryConditionData,
    PngOptions, ProjectedNodalGradientEquationSystem, SolveOwnership,
    SymmetryBoundaryConditionData, WallBoundaryConditionData,
};
use png_mesh::{
    BLOCK_PART, Communicator, Mesh, Realm, Topology, box_mesh_3d, decompose, partition_by_axis,
    run_ranks,
};

fn q_exact(x: &[f64; 3]) -> f64 {
    x[0] * x[0] + x[1] * x[2]
}

/// Full setup on any realm; returns dqdx keyed by global node id.
fn project(mut realm: Realm, mass: MassTreatment, with_wall: bool) -> BTreeMap<u64, Vec<f64>> {
    let q_open = realm.fields_mut().declare("q_open", 1, &[]).unwrap();
    {
        let (mesh, fields) = realm.split_mut();
        fields.fill_with(q_open, mesh, |x| vec![q_exact(x) + 0.1 * x[1]]);
    }
    let opts = PngOptions {
        mass,
        ..Default::default()
    };
    let mut png = interior_system(&mut realm, SolveOwnership::SelfDriven, opts);
    if with_wall {
        let xmin = part(&realm, "xmin");
        let wall = WallBoundaryConditionData::new("none").with_normal_gradient(0.3);
        png.register_wall_bc(&realm, xmin, Topology::Quad4, &wall).unwrap();
    }
    let xmax = part(&realm, "xmax");
    png.register_open_bc(&realm, xmax, Topology::Quad4, &OpenBoundaryConditionData::new("q_open"))
        .unwrap();
    png.initialize(&mut realm).unwrap();
    png.solve_and_update(&mut realm).unwrap();

    realm
        .mesh()
        .nodes()
        .iter()
        .map(|n| (n.global_id, gradient(&realm, n.id)))
        .collect()
}

fn global_mesh() -> Mesh {
    box_mesh_3d([4, 2, 2], [2.0, 1.0, 1.0]).unwrap()
}

#[test]
fn two_ranks_reproduce_the_serial_gradient() {
    for (mass, with_wall) in [(MassTreatment::Lumped, true), (MassTreatment::Consistent, false)] {
        let serial = project(serial_with_q(global_mesh(), q_exact), mass, with_wall);

        let global = global_mesh();
        let owner = partition_by_axis(&global, 2, 0);
        let locals = decompose(&global, &owner, 2).unwrap();
        let per_rank = run_ranks(2, |comm| {
            let rank = comm.rank();
            let realm = with_q(Realm::new(locals[rank].clone(), Arc::new(comm)), q_exact);
            project(realm, mass, with_wall)
        });

        for values in &per_rank {
            for (g, v) in values {
                assert_close(v, &serial[g], 1e-9);
            }
        }
        let covered: usize = per_rank.iter().map(BTreeMap::len).sum();
        assert!(covered > serial.len());
    }
}

#[test]
fn diverging_registrations_are_detected() {
    let global = global_mesh();
    let owner = partition_by_axis(&global, 2, 0);
    let locals = decompose(&global, &owner, 2).unwrap();

    let results = run_ranks(2, |comm| {
        let rank = comm.rank();
        let mut realm = with_q(Realm::new(locals[rank].clone(), Arc::new(comm)), q_exact);
        let mut png =
            interior_system(&mut realm, SolveOwnership::SelfDriven, PngOptions::default());
        if rank == 1 {
            let ymin = part(&realm, "ymin");
            png.register_symmetry_bc(
                &realm,
                ymin,
                Topology::Quad4,
                &SymmetryBoundaryConditionData::new("sym"),
            )
            .unwrap();
        }
        png.initialize(&mut realm)
    });

    for r in results {
        assert!(matches!(r, Err(EqSysError::ParallelInconsistency { .. })));
    }
}

/// A scalar equation that refreshes its gradient through a managed child.
struct ScaledScalar {
    gradient: ProjectedNodalGradientEquationSystem,
}

impl EquationSystem for ScaledScalar {
    fn name(&self) -> &str {
        "scaled_scalar"
    }

    fn equation_type(&self) -> EquationType {
        EquationType::ScalarTransport
    }

    fn dof_names(&self) -> Vec<&str> {
        vec!["q"]
    }

    fn ownership(&self) -> SolveOwnership {
        SolveOwnership::SelfDriven
    }

    fn support(&self, kind: BoundaryKind) -> ContributionSupport {
        self.gradient.support(kind)
    }

    fn register_nodal_fields(&mut self, realm: &mut Realm, parts: &[PartId]) -> EqSysResult<()> {
        self.gradient.register_nodal_fields(realm, parts)
    }

    fn register_interior_algorithm(&mut self, realm: &Realm, part: PartId) -> EqSysResult<()> {
        self.gradient.register_interior_algorithm(realm, part)
    }

    fn register_wall_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &WallBoundaryConditionData,
    ) -> EqSysResult<()> {
        self.gradient.register_wall_bc(realm, part, topology, data)
    }

    fn register_inflow_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &InflowBoundaryConditionData,
    ) -> EqSysResult<()> {
        self.gradient.register_inflow_bc(realm, part, topology, data)
    }

    fn register_open_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &OpenBoundaryConditionData,
    ) -> EqSysResult<()> {
        self.gradient.register_open_bc(realm, part, topology, data)
    }

    fn register_symmetry_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
        data: &SymmetryBoundaryConditionData,
    ) -> EqSysResult<()> {
        self.gradient.register_symmetry_bc(realm, part, topology, data)
    }

    fn register_non_conformal_bc(
        &mut self,
        realm: &Realm,
        part: PartId,
        topology: Topology,
    ) -> EqSysResult<()> {
        self.gradient.register_non_conformal_bc(realm, part, topology)
    }

    fn register_overset_bc(&mut self) -> EqSysResult<()> {
        self.gradient.register_overset_bc()
    }

    fn initialize(&mut self, realm: &mut Realm) -> EqSysResult<()> {
        self.gradient.initialize(realm)
    }

    fn reinitialize_linear_system(&mut self, realm: &mut Realm) -> EqSysResult<()> {
        self.gradient.reinitialize_linear_system(realm)
    }

    fn solve_and_update(&mut self, realm: &mut Realm) -> EqSysResult<()> {
        let q = realm.fields().require("q")?;
        realm.fields_mut().values_mut(q).iter_mut().for_each(|v| *v *= 2.0);
        self.gradient.solve_and_update_external(realm)
    }
}

#[test]
fn orchestrator_drives_parent_managed_gradient() {
    let mut realm = serial_with_q(box_mesh_3d([2, 1, 1], [2.0, 1.0, 1.0]).unwrap(), |x| x[0]);
    let block = realm.part_ids(&[BLOCK_PART]).unwrap();

    // parent-managed gradient of q
    let mut parent = ScaledScalar {
        gradient: ProjectedNodalGradientEquationSystem::for_independent_field(
            "q",
            SolveOwnership::ExternallyDriven,
        ),
    };
    parent.register_nodal_fields(&mut realm, &block).unwrap();
    parent.register_interior_algorithm(&realm, block[0]).unwrap();

    // self-driven gradient of s = y
    let s = realm.fields_mut().declare("s", 1, &block).unwrap();
    {
        let (mesh, fields) = realm.split_mut();
        fields.fill_with(s, mesh, |x| vec![x[1]]);
    }
    let mut grad_s =
        ProjectedNodalGradientEquationSystem::for_independent_field("s", SolveOwnership::SelfDriven);
    grad_s.register_nodal_fields(&mut realm, &block).unwrap();
    grad_s.register_interior_algorithm(&realm, block[0]).unwrap();

    // managed by someone not in this collection, so never advanced here
    let mut orphan = ProjectedNodalGradientEquationSystem::new(
        "orphan",
        EquationType::ProjectedNodalGradient,
        "dsdx_orphan",
        "sTmp_orphan",
        "s",
        SolveOwnership::ExternallyDriven,
    );
    orphan.register_nodal_fields(&mut realm, &block).unwrap();
    orphan.register_interior_algorithm(&realm, block[0]).unwrap();

    let mut systems = EquationSystems::new();
    systems.add(Box::new(parent)).unwrap();
    systems.add(Box::new(grad_s)).unwrap();
    systems.add(Box::new(orphan)).unwrap();
    assert_eq!(systems.names(), vec!["scaled_scalar", "PNGrad_s", "orphan"]);

    systems.initialize(&mut realm).unwrap();
    for expected in [2.0, 4.0] {
        systems.solve_and_update(&mut realm).unwrap();
        for node in realm.mesh().nodes() {
            assert_close(&gradient(&realm, node.id), &[expected, 0.0, 0.0], 1e-10);
            assert_close(&field(&realm, "dsdx", node.id), &[0.0, 1.0, 0.0], 1e-10);
            assert_eq!(field(&realm, "dsdx_orphan", node.id), vec![0.0; 3]);
        }
    }
    assert_eq!(realm.outer_iteration(), 2);
}

#[test]
fn orchestrator_rejects_duplicate_names() {
    let mut systems = EquationSystems::new();
    let make =
        || ProjectedNodalGradientEquationSystem::for_independent_field("q", SolveOwnership::SelfDriven);
    systems.add(Box::new(make())).unwrap();
    assert!(matches!(
        systems.add(Box::new(make())),
        Err(EqSysError::Configuration { .. })
    ));
    assert!(systems.get("PNGrad_q").is_some());
    assert!(systems.get_mut("PNGrad_q").is_some());
}
