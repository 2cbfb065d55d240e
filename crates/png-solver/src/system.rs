//! Block-sparse linear system over the active nodes of a set of parts.

use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};
use png_core::{NodeId, PartId};
use png_mesh::{Communicator, DofMap, Mesh};
use rayon::prelude::*;

use crate::error::{LinearSolverError, LinearSolverResult};
use crate::options::{SolverKind, SolverOptions};
use crate::shared;
use crate::{cg, direct};

/// Outcome of a successful solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    pub kind: SolverKind,
    pub iterations: usize,
    /// Global 2-norm of the right-hand side
    pub rhs_norm: f64,
    /// Global 2-norm of the final residual
    pub residual_norm: f64,
}

/// Sparse matrix plus right-hand side, one `components x components` block
/// per pair of connected active nodes.
///
/// The sparsity pattern is fixed when the system is built. Each rank holds
/// only its own partial contributions; shared rows are summed inside the
/// solvers.
#[derive(Debug, Clone)]
pub struct LinearSystem {
    dofs: DofMap,
    row_ptr: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
    rhs: Vec<f64>,
    touched: Vec<bool>,
}

impl LinearSystem {
    /// Build the pattern from the elements of volume parts and the faces of
    /// side parts in `parts`.
    pub fn build(mesh: &Mesh, parts: &[PartId], components: usize) -> Self {
        let dofs = DofMap::from_parts(mesh, parts, components);
        let mut neighbors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); dofs.node_count()];

        let mut couple = |nodes: &[NodeId]| {
            let blocks: Vec<usize> = nodes.iter().filter_map(|&n| dofs.block(n)).collect();
            for &a in &blocks {
                neighbors[a].extend(blocks.iter().copied());
            }
        };
        for &p in parts {
            for &e in mesh.part_elements(p) {
                if let Some(elem) = mesh.element(e) {
                    couple(&elem.nodes);
                }
            }
            for &f in mesh.part_faces(p) {
                if let Some(face) = mesh.face(f) {
                    couple(&face.nodes);
                }
            }
        }

        let c = components;
        let mut row_ptr = Vec::with_capacity(dofs.row_count() + 1);
        let mut cols = Vec::new();
        row_ptr.push(0);
        for nbrs in &neighbors {
            for _ in 0..c {
                for &b in nbrs {
                    cols.extend((0..c).map(|cb| b * c + cb));
                }
                row_ptr.push(cols.len());
            }
        }

        tracing::debug!(
            rows = dofs.row_count(),
            nonzeros = cols.len(),
            "linear system pattern built"
        );

        Self {
            values: vec![0.0; cols.len()],
            rhs: vec![0.0; dofs.row_count()],
            touched: vec![false; dofs.row_count()],
            dofs,
            row_ptr,
            cols,
        }
    }

    pub fn dofs(&self) -> &DofMap {
        &self.dofs
    }

    pub fn components(&self) -> usize {
        self.dofs.components()
    }

    pub fn row_count(&self) -> usize {
        self.dofs.row_count()
    }

    pub fn nonzeros(&self) -> usize {
        self.cols.len()
    }

    pub fn rhs(&self) -> &[f64] {
        &self.rhs
    }

    /// Clear matrix, right-hand side and touch flags.
    pub fn zero(&mut self) {
        self.values.fill(0.0);
        self.rhs.fill(0.0);
        self.touched.fill(false);
    }

    fn entry(&self, row: usize, col: usize) -> LinearSolverResult<usize> {
        let (lo, hi) = (self.row_ptr[row], self.row_ptr[row + 1]);
        self.cols[lo..hi]
            .binary_search(&col)
            .map(|k| lo + k)
            .map_err(|_| LinearSolverError::SparsityMismatch { row, col })
    }

    /// Matrix entry, zero outside the pattern.
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.entry(row, col).map(|k| self.values[k]).unwrap_or(0.0)
    }

    /// Accumulate a local contribution over `nodes`.
    ///
    /// `lhs` is row-major of size `(n*c) x (n*c)` and `rhs` has `n*c`
    /// entries, both ordered node-major then component.
    pub fn sum_into(&mut self, nodes: &[NodeId], lhs: &[f64], rhs: &[f64]) -> LinearSolverResult<()> {
        let c = self.components();
        let m = nodes.len() * c;
        if lhs.len() != m * m || rhs.len() != m {
            return Err(LinearSolverError::DimensionMismatch {
                what: format!(
                    "local system for {} nodes needs {}x{} lhs and {} rhs, got {} and {}",
                    nodes.len(),
                    m,
                    m,
                    m,
                    lhs.len(),
                    rhs.len()
                ),
            });
        }
        let rows = self.local_rows(nodes)?;
        for (i, &ri) in rows.iter().enumerate() {
            self.rhs[ri] += rhs[i];
            for (j, &rj) in rows.iter().enumerate() {
                let v = lhs[i * m + j];
                if v != 0.0 {
                    let k = self.entry(ri, rj)?;
                    self.values[k] += v;
                    self.touched[ri] = true;
                }
            }
        }
        Ok(())
    }

    /// Accumulate into the right-hand side only. Rows receiving only
    /// right-hand side contributions still count as untouched.
    pub fn sum_into_rhs(&mut self, nodes: &[NodeId], rhs: &[f64]) -> LinearSolverResult<()> {
        let c = self.components();
        if rhs.len() != nodes.len() * c {
            return Err(LinearSolverError::DimensionMismatch {
                what: format!("rhs for {} nodes needs {} entries, got {}", nodes.len(), nodes.len() * c, rhs.len()),
            });
        }
        let rows = self.local_rows(nodes)?;
        for (i, &r) in rows.iter().enumerate() {
            self.rhs[r] += rhs[i];
        }
        Ok(())
    }

    fn local_rows(&self, nodes: &[NodeId]) -> LinearSolverResult<Vec<usize>> {
        let c = self.components();
        let mut rows = Vec::with_capacity(nodes.len() * c);
        for &n in nodes {
            for comp in 0..c {
                rows.push(self.dofs.row(n, comp)?);
            }
        }
        Ok(rows)
    }

    /// Close every direction of a node block that no rank constrained, and
    /// return the nodes that had such a direction.
    ///
    /// Rows with no nonzero matrix entry on any rank get a unit diagonal and
    /// zero right-hand side. A block that is still rank deficient after that
    /// (a penalty on one face normal with nothing else at the node) gets the
    /// projector onto its null space added, scaled by the block's largest
    /// eigenvalue, and the right-hand side loses its component along that
    /// space.
    pub fn finalize(&mut self, comm: &dyn Communicator, mesh: &Mesh) -> LinearSolverResult<Vec<NodeId>> {
        let c = self.components();
        let mut flags: Vec<f64> = self.touched.iter().map(|&t| f64::from(u8::from(t))).collect();
        shared::sum_shared_blocks(comm, mesh, &self.dofs, &mut flags, c)?;

        let mut open = vec![false; self.dofs.node_count()];
        for (r, &f) in flags.iter().enumerate() {
            if f == 0.0 {
                let k = self.entry(r, r)?;
                self.values[k] = 1.0;
                self.rhs[r] = 0.0;
                open[r / c] = true;
            }
        }

        let mut diag = self.diagonal_blocks();
        shared::sum_shared_blocks(comm, mesh, &self.dofs, &mut diag, c * c)?;
        for (b, blk) in diag.chunks(c * c).enumerate() {
            let (scale, null) = null_space(DMatrix::from_row_slice(c, c, blk));
            if null.is_empty() {
                continue;
            }
            let base = b * c;
            for v in &null {
                let along: f64 = (0..c).map(|i| v[i] * self.rhs[base + i]).sum();
                for i in 0..c {
                    self.rhs[base + i] -= along * v[i];
                    for j in 0..c {
                        let k = self.entry(base + i, base + j)?;
                        self.values[k] += scale * v[i] * v[j];
                    }
                }
            }
            open[b] = true;
        }

        Ok(open
            .iter()
            .zip(self.dofs.active_nodes())
            .filter(|&(&o, _)| o)
            .map(|(_, &n)| n)
            .collect())
    }

    /// `y = A x` with this rank's partial matrix.
    pub(crate) fn local_matvec(&self, x: &[f64], y: &mut [f64]) {
        y.par_iter_mut().enumerate().for_each(|(row, yi)| {
            let (lo, hi) = (self.row_ptr[row], self.row_ptr[row + 1]);
            *yi = self.cols[lo..hi]
                .iter()
                .zip(&self.values[lo..hi])
                .map(|(&col, &v)| v * x[col])
                .sum();
        });
    }

    /// Diagonal `c x c` blocks, row-major, one per active node.
    pub(crate) fn diagonal_blocks(&self) -> Vec<f64> {
        let c = self.components();
        let mut out = vec![0.0; self.dofs.node_count() * c * c];
        for b in 0..self.dofs.node_count() {
            for i in 0..c {
                for j in 0..c {
                    out[b * c * c + i * c + j] = self.value(b * c + i, b * c + j);
                }
            }
        }
        out
    }

    /// Row pointer, column and value slices.
    pub(crate) fn csr(&self) -> (&[usize], &[usize], &[f64]) {
        (&self.row_ptr, &self.cols, &self.values)
    }

    /// Solve collectively. The returned solution is indexed like the rows
    /// and is identical on every copy of a shared node.
    pub fn solve(
        &self,
        comm: &dyn Communicator,
        mesh: &Mesh,
        options: &SolverOptions,
    ) -> LinearSolverResult<(Vec<f64>, SolveReport)> {
        match options.kind {
            SolverKind::ConjugateGradient => cg::solve(self, comm, mesh, options),
            SolverKind::DirectLu => direct::solve(self, comm, mesh, options),
        }
    }
}

/// Eigenvalues below this fraction of the largest one count as zero.
const NULL_TOL: f64 = 1e-12;

/// Orthonormal basis of the null space of a symmetric block, together with
/// the block's largest eigenvalue magnitude (1 for a zero block).
fn null_space(block: DMatrix<f64>) -> (f64, Vec<DVector<f64>>) {
    let n = block.nrows();
    if block.amax() == 0.0 {
        let basis = (0..n)
            .map(|i| DVector::from_fn(n, |r, _| f64::from(u8::from(r == i))))
            .collect();
        return (1.0, basis);
    }
    let eig = block.symmetric_eigen();
    let scale = eig.eigenvalues.amax();
    let basis = eig
        .eigenvalues
        .iter()
        .enumerate()
        .filter(|&(_, &l)| l.abs() <= NULL_TOL * scale)
        .map(|(i, _)| eig.eigenvectors.column(i).into_owned())
        .collect();
    (scale, basis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use png_mesh::{SerialComm, box_mesh_2d};

    fn block_system(cells: [usize; 2], c: usize) -> (Mesh, LinearSystem) {
        let mesh = box_mesh_2d(cells, [1.0, 1.0]).unwrap();
        let block = mesh.require_part("block_1").unwrap().id;
        let sys = LinearSystem::build(&mesh, &[block], c);
        (mesh, sys)
    }

    #[test]
    fn single_quad_is_fully_coupled() {
        let (_, sys) = block_system([1, 1], 2);
        assert_eq!(sys.row_count(), 8);
        assert_eq!(sys.nonzeros(), 64);
    }

    #[test]
    fn sum_into_accumulates() {
        let (mesh, mut sys) = block_system([1, 1], 1);
        let nodes = mesh.elements()[0].nodes.clone();
        let mut lhs = vec![0.0; 16];
        for i in 0..4 {
            lhs[i * 4 + i] = 2.0;
        }
        sys.sum_into(&nodes, &lhs, &[1.0; 4]).unwrap();
        sys.sum_into(&nodes, &lhs, &[1.0; 4]).unwrap();
        assert_eq!(sys.value(0, 0), 4.0);
        assert_eq!(sys.rhs(), &[2.0; 4]);

        sys.zero();
        assert_eq!(sys.value(0, 0), 0.0);
        assert_eq!(sys.rhs(), &[0.0; 4]);
    }

    #[test]
    fn coupling_outside_pattern_is_rejected() {
        // nodes 0 and 2 of a 2x1 strip share no element
        let (_, mut sys) = block_system([2, 1], 1);
        let nodes = [NodeId::from_index(0), NodeId::from_index(2)];
        let err = sys
            .sum_into(&nodes, &[0.0, 1.0, 1.0, 0.0], &[0.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, LinearSolverError::SparsityMismatch { .. }));
    }

    #[test]
    fn wrong_local_size_is_rejected() {
        let (_, mut sys) = block_system([1, 1], 2);
        let err = sys
            .sum_into(&[NodeId::from_index(0)], &[1.0], &[0.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, LinearSolverError::DimensionMismatch { .. }));
    }

    #[test]
    fn finalize_reports_untouched_nodes() {
        let (mesh, mut sys) = block_system([2, 1], 1);
        let first = mesh.elements()[0].nodes.clone();
        let mut lhs = vec![0.0; 16];
        for i in 0..4 {
            lhs[i * 5] = 1.0;
        }
        sys.sum_into(&first, &lhs, &[0.0; 4]).unwrap();
        sys.sum_into_rhs(&[NodeId::from_index(2)], &[5.0]).unwrap();

        let untouched = sys.finalize(&SerialComm, &mesh).unwrap();
        assert_eq!(untouched, vec![NodeId::from_index(2), NodeId::from_index(5)]);
        assert_eq!(sys.value(2, 2), 1.0);
        assert_eq!(sys.rhs()[2], 0.0);
    }

    #[test]
    fn zero_rows_of_a_touched_node_are_untouched() {
        let (mesh, mut sys) = block_system([1, 1], 2);
        let node = NodeId::from_index(0);
        sys.sum_into(&[node], &[3.0, 0.0, 0.0, 0.0], &[1.0, 1.0]).unwrap();
        let untouched = sys.finalize(&SerialComm, &mesh).unwrap();
        assert_eq!(untouched.len(), 4);
        assert_eq!(sys.value(0, 0), 3.0);
        assert_eq!(sys.value(1, 1), 1.0);
        assert_eq!(sys.rhs(), &[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn rank_deficient_block_gets_its_null_space_closed() {
        let (mesh, mut sys) = block_system([1, 1], 2);
        let node = NodeId::from_index(0);
        // n nᵀ for n = (1, 1)/√2, with a right-hand side that also points
        // along the tangent (-1, 1)/√2
        sys.sum_into(&[node], &[0.5, 0.5, 0.5, 0.5], &[2.0, 0.0]).unwrap();

        let open = sys.finalize(&SerialComm, &mesh).unwrap();
        assert!(open.contains(&node));
        for (i, j, expected) in [(0, 0, 1.0), (0, 1, 0.0), (1, 0, 0.0), (1, 1, 1.0)] {
            assert!((sys.value(i, j) - expected).abs() < 1e-12, "entry ({}, {})", i, j);
        }
        assert!((sys.rhs()[0] - 1.0).abs() < 1e-12);
        assert!((sys.rhs()[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn full_rank_blocks_are_left_alone() {
        let (mesh, mut sys) = block_system([1, 1], 2);
        let nodes = mesh.elements()[0].nodes.clone();
        let mut lhs = vec![0.0; 64];
        for i in 0..8 {
            lhs[i * 9] = 2.0;
        }
        sys.sum_into(&nodes, &lhs, &[1.0; 8]).unwrap();
        let open = sys.finalize(&SerialComm, &mesh).unwrap();
        assert!(open.is_empty());
        assert_eq!(sys.value(3, 3), 2.0);
        assert_eq!(sys.rhs(), &[1.0; 8]);
    }
}
