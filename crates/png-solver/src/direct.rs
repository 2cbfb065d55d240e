//! Dense LU of the gathered global system.
//!
//! Every rank assembles its partial rows into a global dense matrix indexed
//! by global node id, the matrices are summed across ranks and each rank
//! solves the same system. Only meant for small problems and for checking
//! the iterative path.

use nalgebra::{DMatrix, DVector};
use png_core::timing::{Timer, cycle_timing};
use png_mesh::{Communicator, Mesh};

use crate::error::{LinearSolverError, LinearSolverResult};
use crate::options::{SolverKind, SolverOptions};
use crate::system::{LinearSystem, SolveReport};

pub fn solve(
    sys: &LinearSystem,
    comm: &dyn Communicator,
    mesh: &Mesh,
    options: &SolverOptions,
) -> LinearSolverResult<(Vec<f64>, SolveReport)> {
    let timer = Timer::start("direct_lu");
    let c = sys.components();
    let global_nodes = mesh.global_node_count();
    let n = global_nodes * c;
    if n > options.max_direct_unknowns {
        return Err(LinearSolverError::TooLarge {
            unknowns: n,
            limit: options.max_direct_unknowns,
        });
    }

    let global_block: Vec<usize> = sys
        .dofs()
        .active_nodes()
        .iter()
        .map(|&node| mesh.nodes()[node.idx()].global_id as usize)
        .collect();
    let grow = |row: usize| global_block[row / c] * c + row % c;

    // matrix, rhs and an activity flag per global node in one exchange
    let mut buf = vec![0.0; n * n + n + global_nodes];
    let (row_ptr, cols, values) = sys.csr();
    for row in 0..sys.row_count() {
        let gr = grow(row);
        for k in row_ptr[row]..row_ptr[row + 1] {
            buf[gr * n + grow(cols[k])] += values[k];
        }
        buf[n * n + gr] += sys.rhs()[row];
    }
    for &g in &global_block {
        buf[n * n + n + g] = 1.0;
    }
    comm.all_reduce_sum(&mut buf)?;

    let (mat, rest) = buf.split_at(n * n);
    let (rhs, active) = rest.split_at(n);
    let mut a = DMatrix::from_row_slice(n, n, mat);
    for (g, &flag) in active.iter().enumerate() {
        if flag == 0.0 {
            for comp in 0..c {
                a[(g * c + comp, g * c + comp)] = 1.0;
            }
        }
    }
    let b = DVector::from_column_slice(rhs);

    let sol = a.clone().lu().solve(&b).ok_or_else(|| LinearSolverError::Breakdown {
        what: "singular matrix in LU factorization".to_string(),
    })?;
    let residual_norm = (&a * &sol - &b).norm();
    let rhs_norm = b.norm();

    let x = (0..sys.row_count()).map(|row| sol[grow(row)]).collect();
    timer.stop_into(&cycle_timing::SOLVE);

    Ok((
        x,
        SolveReport {
            kind: SolverKind::DirectLu,
            iterations: 1,
            rhs_norm,
            residual_norm,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use png_mesh::{SerialComm, box_mesh_2d};

    #[test]
    fn size_limit_is_enforced() {
        let mesh = box_mesh_2d([4, 4], [1.0, 1.0]).unwrap();
        let block = mesh.require_part("block_1").unwrap().id;
        let sys = LinearSystem::build(&mesh, &[block], 2);
        let opts = SolverOptions {
            kind: SolverKind::DirectLu,
            max_direct_unknowns: 10,
            ..Default::default()
        };
        let err = solve(&sys, &SerialComm, &mesh, &opts).unwrap_err();
        assert!(matches!(err, LinearSolverError::TooLarge { unknowns: 50, limit: 10 }));
    }
}
