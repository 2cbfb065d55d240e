//! A rank-local mesh together with its fields and communicator.

use std::sync::Arc;

use png_core::PartId;

use crate::error::MeshResult;
use crate::field::{FieldHandle, FieldRegistry};
use crate::mesh::Mesh;
use crate::parallel::{self, Communicator, SerialComm};

/// Everything an equation system needs from the mesh side on one rank.
pub struct Realm {
    mesh: Mesh,
    fields: FieldRegistry,
    comm: Arc<dyn Communicator>,
    outer_iteration: u64,
    mesh_generation: u64,
}

impl Realm {
    pub fn new(mesh: Mesh, comm: Arc<dyn Communicator>) -> Self {
        let fields = FieldRegistry::new(mesh.num_nodes());
        Self {
            mesh,
            fields,
            comm,
            outer_iteration: 0,
            mesh_generation: 0,
        }
    }

    /// Single-rank realm.
    pub fn serial(mesh: Mesh) -> Self {
        Self::new(mesh, Arc::new(SerialComm))
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldRegistry {
        &mut self.fields
    }

    /// Mesh and fields together, for kernels that read one and write the other.
    pub fn split_mut(&mut self) -> (&Mesh, &mut FieldRegistry) {
        (&self.mesh, &mut self.fields)
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    pub fn spatial_dim(&self) -> usize {
        self.mesh.spatial_dim()
    }

    /// Resolve part names to ids.
    pub fn part_ids(&self, names: &[&str]) -> MeshResult<Vec<PartId>> {
        names
            .iter()
            .map(|n| self.mesh.require_part(n).map(|p| p.id))
            .collect()
    }

    /// Counter of the enclosing outer nonlinear iteration.
    pub fn outer_iteration(&self) -> u64 {
        self.outer_iteration
    }

    pub fn begin_outer_iteration(&mut self) -> u64 {
        self.outer_iteration += 1;
        self.outer_iteration
    }

    /// Incremented every time the mesh is replaced.
    pub fn mesh_generation(&self) -> u64 {
        self.mesh_generation
    }

    /// Replace the mesh (e.g. after adaptation), carrying field values over
    /// by global node id.
    pub fn remesh(&mut self, mesh: Mesh) {
        self.fields.remap(&self.mesh, &mesh);
        tracing::debug!(
            old_nodes = self.mesh.num_nodes(),
            new_nodes = mesh.num_nodes(),
            "mesh replaced"
        );
        self.mesh = mesh;
        self.mesh_generation += 1;
    }

    /// Sum shared-node copies of a field across ranks.
    pub fn parallel_sum(&mut self, handle: FieldHandle) -> MeshResult<()> {
        let c = self.fields.components(handle);
        parallel::parallel_sum_nodal(
            self.comm.as_ref(),
            &self.mesh,
            self.fields.values_mut(handle),
            c,
        )
    }

    /// Copy owner values of a field to every shared copy.
    pub fn copy_owned_to_shared(&mut self, handle: FieldHandle) -> MeshResult<()> {
        let c = self.fields.components(handle);
        parallel::copy_owned_to_shared(
            self.comm.as_ref(),
            &self.mesh,
            self.fields.values_mut(handle),
            c,
        )
    }
}
