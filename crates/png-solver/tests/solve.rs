//! Collective solve tests for png-solver.

use std::collections::BTreeMap;

use png_mesh::{
    Communicator, Mesh, SerialComm, box_mesh_2d, decompose, partition_by_axis, run_ranks,
};
use png_core::timing::{self, cycle_timing};
use png_solver::{LinearSystem, SolverKind, SolverOptions};

/// SPD element matrix `2 I - J / 4` and a rhs depending on global ids.
fn assemble(mesh: &Mesh) -> LinearSystem {
    let block = mesh.require_part("block_1").unwrap().id;
    let mut sys = LinearSystem::build(mesh, &[block], 1);
    for elem in mesh.elements() {
        let mut lhs = vec![-0.25; 16];
        for i in 0..4 {
            lhs[i * 5] += 2.0;
        }
        let rhs: Vec<f64> = elem
            .nodes
            .iter()
            .map(|&n| 1.0 + 0.1 * mesh.nodes()[n.idx()].global_id as f64)
            .collect();
        sys.sum_into(&elem.nodes, &lhs, &rhs).unwrap();
    }
    sys
}

fn by_global(mesh: &Mesh, sys: &LinearSystem, x: &[f64]) -> BTreeMap<u64, f64> {
    sys.dofs()
        .active_nodes()
        .iter()
        .enumerate()
        .map(|(b, &n)| (mesh.nodes()[n.idx()].global_id, x[b]))
        .collect()
}

#[test]
fn cg_matches_direct_lu() {
    let mesh = box_mesh_2d([4, 3], [1.0, 1.0]).unwrap();
    let sys = assemble(&mesh);

    let (x_cg, cg) = sys.solve(&SerialComm, &mesh, &SolverOptions::default()).unwrap();
    let lu_opts = SolverOptions {
        kind: SolverKind::DirectLu,
        ..Default::default()
    };
    let (x_lu, lu) = sys.solve(&SerialComm, &mesh, &lu_opts).unwrap();

    assert!(cg.iterations > 1);
    assert_eq!(lu.kind, SolverKind::DirectLu);
    for (a, b) in x_cg.iter().zip(&x_lu) {
        assert!((a - b).abs() < 1e-10, "{} vs {}", a, b);
    }
}

#[test]
fn two_ranks_reproduce_serial_solution() {
    let global = box_mesh_2d([4, 2], [2.0, 1.0]).unwrap();
    let serial_sys = assemble(&global);
    let (x, _) = serial_sys
        .solve(&SerialComm, &global, &SolverOptions::default())
        .unwrap();
    let serial = by_global(&global, &serial_sys, &x);

    let owner = partition_by_axis(&global, 2, 0);
    let locals = decompose(&global, &owner, 2).unwrap();

    for kind in [SolverKind::ConjugateGradient, SolverKind::DirectLu] {
        let per_rank = run_ranks(2, |comm| {
            let mesh = &locals[comm.rank()];
            let sys = assemble(mesh);
            let opts = SolverOptions {
                kind,
                ..Default::default()
            };
            let (x, _) = sys.solve(&comm, mesh, &opts).unwrap();
            by_global(mesh, &sys, &x)
        });

        let mut seen = 0;
        for rank_values in &per_rank {
            for (g, v) in rank_values {
                assert!((serial[g] - v).abs() < 1e-10, "node {} under {:?}", g, kind);
                seen += 1;
            }
        }
        // shared nodes appear on both ranks
        assert!(seen > serial.len());
    }
}

#[test]
fn not_converged_is_reported() {
    let mesh = box_mesh_2d([6, 6], [1.0, 1.0]).unwrap();
    let sys = assemble(&mesh);
    let opts = SolverOptions {
        max_iterations: 1,
        ..Default::default()
    };
    let err = sys.solve(&SerialComm, &mesh, &opts).unwrap_err();
    assert!(matches!(
        err,
        png_solver::LinearSolverError::NotConverged { iterations: 1, .. }
    ));
}

#[test]
fn split_rank_deficient_block_is_closed_on_both_ranks() {
    let global = box_mesh_2d([2, 1], [2.0, 1.0]).unwrap();
    let owner = partition_by_axis(&global, 2, 0);
    let locals = decompose(&global, &owner, 2).unwrap();
    timing::enable_timing();
    let sums_before = cycle_timing::SHARED_SUM.count();

    let per_rank = run_ranks(2, |comm| {
        let mesh = &locals[comm.rank()];
        let block = mesh.require_part("block_1").unwrap().id;
        let mut sys = LinearSystem::build(mesh, &[block], 2);
        // each rank holds half of the penalty n nᵀ, n = (1, 1)/√2
        let node = mesh.local_node(1).unwrap();
        sys.sum_into(&[node], &[0.25; 4], &[1.0, 0.0]).unwrap();
        let open = sys.finalize(&comm, mesh).unwrap();
        assert!(open.contains(&node));

        let (x, _) = sys.solve(&comm, mesh, &SolverOptions::default()).unwrap();
        let b = sys.dofs().block(node).unwrap();
        (x[2 * b], x[2 * b + 1])
    });

    for (x, y) in per_rank {
        // normal part of the rhs only: (2, 0) minus its tangential component
        assert!((x - 1.0).abs() < 1e-10, "{}", x);
        assert!((y - 1.0).abs() < 1e-10, "{}", y);
    }
    assert!(cycle_timing::SHARED_SUM.count() > sums_before);
}
