//! The region-algorithm seam and the assembly context handed to it.

use std::collections::BTreeMap;

use png_core::NodeId;
use png_mesh::{FieldHandle, FieldRegistry, Mesh};
use png_solver::LinearSystem;
use rayon::prelude::*;

use crate::bc::BoundaryKind;
use crate::error::EqSysResult;
use crate::options::PngOptions;

/// Read-only view of everything a region algorithm needs during assembly.
pub struct AssemblyContext<'a> {
    pub mesh: &'a Mesh,
    pub fields: &'a FieldRegistry,
    /// Scalar field whose gradient is projected
    pub independent: FieldHandle,
    /// Current gradient, used for the increment form
    pub dqdx: FieldHandle,
    pub options: &'a PngOptions,
    pub data_map: &'a BTreeMap<BoundaryKind, String>,
}

impl AssemblyContext<'_> {
    pub fn dim(&self) -> usize {
        self.mesh.spatial_dim()
    }

    /// Field named by the data map for `kind`, if both exist.
    pub fn source_field(&self, kind: BoundaryKind) -> Option<FieldHandle> {
        self.data_map
            .get(&kind)
            .and_then(|name| self.fields.handle(name))
    }

    /// First component of `field` at each of `nodes`.
    pub fn scalar_values(&self, field: FieldHandle, nodes: &[NodeId]) -> Vec<f64> {
        nodes
            .iter()
            .map(|&n| self.fields.node_value(field, n)[0])
            .collect()
    }
}

/// One contribution kernel bound to one part.
pub trait NodalGradAlgorithm: Send + Sync {
    fn name(&self) -> &str;

    /// Part the algorithm iterates over.
    fn part_name(&self) -> &str;

    /// Add this algorithm's contributions to `sys`.
    fn execute(&self, ctx: &AssemblyContext<'_>, sys: &mut LinearSystem) -> EqSysResult<()>;
}

/// Dense local system over a few nodes, `dim` unknowns per node.
#[derive(Debug, Clone)]
pub(crate) struct LocalContribution {
    pub nodes: Vec<NodeId>,
    dim: usize,
    pub lhs: Vec<f64>,
    pub rhs: Vec<f64>,
}

impl LocalContribution {
    pub fn new(nodes: Vec<NodeId>, dim: usize) -> Self {
        let m = nodes.len() * dim;
        Self {
            nodes,
            dim,
            lhs: vec![0.0; m * m],
            rhs: vec![0.0; m],
        }
    }

    fn size(&self) -> usize {
        self.nodes.len() * self.dim
    }

    /// Add `v` to the entry coupling component `a` of node `i` with
    /// component `b` of node `j`.
    pub fn add_lhs(&mut self, i: usize, a: usize, j: usize, b: usize, v: f64) {
        let m = self.size();
        self.lhs[(i * self.dim + a) * m + j * self.dim + b] += v;
    }

    pub fn add_rhs(&mut self, i: usize, a: usize, v: f64) {
        self.rhs[i * self.dim + a] += v;
    }

    /// Turn `lhs x = rhs` into `lhs dx = rhs - lhs x_old`.
    pub fn to_increment_form(&mut self, fields: &FieldRegistry, dqdx: FieldHandle) {
        let m = self.size();
        let old: Vec<f64> = self
            .nodes
            .iter()
            .flat_map(|&n| fields.node_value(dqdx, n).iter().copied())
            .collect();
        for r in 0..m {
            let row = &self.lhs[r * m..(r + 1) * m];
            self.rhs[r] -= row.iter().zip(&old).map(|(a, x)| a * x).sum::<f64>();
        }
    }

    pub fn scatter(&self, sys: &mut LinearSystem) -> EqSysResult<()> {
        sys.sum_into(&self.nodes, &self.lhs, &self.rhs)?;
        Ok(())
    }

    pub fn scatter_rhs(&self, sys: &mut LinearSystem) -> EqSysResult<()> {
        sys.sum_into_rhs(&self.nodes, &self.rhs)?;
        Ok(())
    }
}

/// Compute locals for `items` on the rayon pool, then scatter them in item
/// order so the summation order never depends on scheduling.
pub(crate) fn compute_and_scatter<T, F>(
    items: &[T],
    sys: &mut LinearSystem,
    rhs_only: bool,
    f: F,
) -> EqSysResult<()>
where
    T: Sync,
    F: Fn(&T) -> EqSysResult<LocalContribution> + Send + Sync,
{
    let locals = items.par_iter().map(f).collect::<EqSysResult<Vec<_>>>()?;
    for local in &locals {
        if rhs_only {
            local.scatter_rhs(sys)?;
        } else {
            local.scatter(sys)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_form_subtracts_lhs_times_old() {
        let mut fields = FieldRegistry::new(2);
        let h = fields.declare("dqdx", 2, &[]).unwrap();
        fields.set_node_value(h, NodeId::from_index(1), &[3.0, 4.0]);

        let mut local = LocalContribution::new(vec![NodeId::from_index(1)], 2);
        local.add_lhs(0, 0, 0, 0, 2.0);
        local.add_lhs(0, 1, 0, 1, 1.0);
        local.add_rhs(0, 0, 10.0);
        local.to_increment_form(&fields, h);
        assert_eq!(local.rhs, vec![4.0, -4.0]);
    }
}
