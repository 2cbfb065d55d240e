//! Block-Jacobi preconditioned conjugate gradient across ranks.

use nalgebra::DMatrix;
use png_core::timing::{Timer, cycle_timing};
use png_mesh::{Communicator, Mesh};

use crate::error::{LinearSolverError, LinearSolverResult};
use crate::options::{SolverKind, SolverOptions};
use crate::shared::{dot, owned_blocks, sum_shared_blocks};
use crate::system::{LinearSystem, SolveReport};

/// Inverted diagonal blocks, one `c x c` matrix per active node.
struct BlockJacobi {
    c: usize,
    inv: Vec<DMatrix<f64>>,
}

impl BlockJacobi {
    fn new(sys: &LinearSystem, comm: &dyn Communicator, mesh: &Mesh) -> LinearSolverResult<Self> {
        let c = sys.components();
        let mut diag = sys.diagonal_blocks();
        sum_shared_blocks(comm, mesh, sys.dofs(), &mut diag, c * c)?;

        let inv = diag
            .chunks(c * c)
            .enumerate()
            .map(|(b, blk)| {
                DMatrix::from_row_slice(c, c, blk).try_inverse().ok_or_else(|| {
                    let node = sys.dofs().active_nodes()[b];
                    LinearSolverError::Breakdown {
                        what: format!("singular diagonal block at node {}", node),
                    }
                })
            })
            .collect::<LinearSolverResult<Vec<_>>>()?;
        Ok(Self { c, inv })
    }

    fn apply(&self, r: &[f64], z: &mut [f64]) {
        let c = self.c;
        for (b, m) in self.inv.iter().enumerate() {
            for i in 0..c {
                z[b * c + i] = (0..c).map(|j| m[(i, j)] * r[b * c + j]).sum();
            }
        }
    }
}

/// Solve `A x = b` where `A` and `b` are the sum over ranks of each rank's
/// partial system.
pub fn solve(
    sys: &LinearSystem,
    comm: &dyn Communicator,
    mesh: &Mesh,
    options: &SolverOptions,
) -> LinearSolverResult<(Vec<f64>, SolveReport)> {
    let timer = Timer::start("cg");
    let c = sys.components();
    let n = sys.row_count();
    let owned = owned_blocks(mesh, sys.dofs());

    let mut b = sys.rhs().to_vec();
    sum_shared_blocks(comm, mesh, sys.dofs(), &mut b, c)?;
    let precond = BlockJacobi::new(sys, comm, mesh)?;

    let matvec = |x: &[f64], y: &mut [f64]| -> LinearSolverResult<()> {
        sys.local_matvec(x, y);
        sum_shared_blocks(comm, mesh, sys.dofs(), y, c)
    };

    let rhs_norm = dot(comm, &owned, c, &b, &b)?.sqrt();
    let tol = (options.rel_tol * rhs_norm).max(options.abs_tol);
    let mut x = vec![0.0; n];

    if rhs_norm <= options.abs_tol {
        timer.stop_into(&cycle_timing::SOLVE);
        return Ok((
            x,
            SolveReport {
                kind: SolverKind::ConjugateGradient,
                iterations: 0,
                rhs_norm,
                residual_norm: rhs_norm,
            },
        ));
    }

    let mut r = b;
    let mut z = vec![0.0; n];
    precond.apply(&r, &mut z);
    let mut p = z.clone();
    let mut q = vec![0.0; n];
    let mut rz = dot(comm, &owned, c, &r, &z)?;
    let mut residual = rhs_norm;

    for k in 1..=options.max_iterations {
        matvec(&p, &mut q)?;
        let pq = dot(comm, &owned, c, &p, &q)?;
        if !(pq.is_finite() && pq > 0.0) {
            return Err(LinearSolverError::Breakdown {
                what: format!("p^T A p = {:e} at iteration {}", pq, k),
            });
        }
        let alpha = rz / pq;
        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * q[i];
        }

        residual = dot(comm, &owned, c, &r, &r)?.sqrt();
        tracing::trace!(iteration = k, residual, "cg");
        if residual <= tol {
            timer.stop_into(&cycle_timing::SOLVE);
            return Ok((
                x,
                SolveReport {
                    kind: SolverKind::ConjugateGradient,
                    iterations: k,
                    rhs_norm,
                    residual_norm: residual,
                },
            ));
        }

        precond.apply(&r, &mut z);
        let rz_next = dot(comm, &owned, c, &r, &z)?;
        let beta = rz_next / rz;
        rz = rz_next;
        for i in 0..n {
            p[i] = z[i] + beta * p[i];
        }
    }

    timer.stop_into(&cycle_timing::SOLVE);
    Err(LinearSolverError::NotConverged {
        iterations: options.max_iterations,
        residual,
    })
}
