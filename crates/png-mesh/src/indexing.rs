//! Stable indexing for linear-system integration.
//!
//! Provides the bidirectional mapping between (node, component) pairs and
//! contiguous row indices (0..N) over the active nodes of a set of parts.

use png_core::{NodeId, PartId};

use crate::error::{MeshError, MeshResult};
use crate::mesh::Mesh;

/// Row layout for a nodal unknown with `components` entries per node.
///
/// Only nodes touched by the given parts are active; rows are ordered by
/// local node id, then component.
#[derive(Debug, Clone)]
pub struct DofMap {
    components: usize,
    /// Contiguous list of active nodes (index -> NodeId).
    active: Vec<NodeId>,
    /// Reverse lookup sized to the local node count; None if inactive.
    node_to_idx: Vec<Option<usize>>,
}

impl DofMap {
    /// Build a map over the union of nodes touched by `parts`.
    pub fn from_parts(mesh: &Mesh, parts: &[PartId], components: usize) -> Self {
        let mut active: Vec<NodeId> = parts.iter().flat_map(|&p| mesh.part_nodes(p)).collect();
        active.sort_unstable();
        active.dedup();

        let mut node_to_idx = vec![None; mesh.num_nodes()];
        for (i, n) in active.iter().enumerate() {
            node_to_idx[n.idx()] = Some(i);
        }

        Self {
            components,
            active,
            node_to_idx,
        }
    }

    pub fn components(&self) -> usize {
        self.components
    }

    /// Active nodes in row order.
    pub fn active_nodes(&self) -> &[NodeId] {
        &self.active
    }

    pub fn node_count(&self) -> usize {
        self.active.len()
    }

    pub fn row_count(&self) -> usize {
        self.active.len() * self.components
    }

    /// Block index of a node, if active.
    pub fn block(&self, node: NodeId) -> Option<usize> {
        self.node_to_idx.get(node.idx()).and_then(|&b| b)
    }

    /// Row of component `comp` of `node`.
    pub fn row(&self, node: NodeId, comp: usize) -> MeshResult<usize> {
        self.block(node)
            .map(|b| b * self.components + comp)
            .ok_or(MeshError::IdNotFound { what: "NodeId" })
    }

    /// Node and component owning `row`.
    pub fn node_of_row(&self, row: usize) -> MeshResult<(NodeId, usize)> {
        self.active
            .get(row / self.components.max(1))
            .map(|&n| (n, row % self.components.max(1)))
            .ok_or(MeshError::IdNotFound { what: "row" })
    }
}
