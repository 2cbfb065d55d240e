//! Incremental mesh builder.

use std::collections::HashMap;

use png_core::{ElemId, FaceId, GlobalNodeId, NodeId, PartId};

use crate::error::MeshResult;
use crate::mesh::{Element, Face, Mesh, Node, Part, PartKind};
use crate::topology::Topology;
use crate::validate;

/// Builder for constructing a mesh incrementally.
///
/// Use `add_part`, `add_node`, `add_element` and `add_face` to build up the
/// mesh, then call `build()` to validate and freeze it into an immutable
/// `Mesh`.
#[derive(Debug)]
pub struct MeshBuilder {
    spatial_dim: usize,
    rank: usize,
    global_node_count: Option<usize>,
    nodes: Vec<Node>,
    elements: Vec<Element>,
    faces: Vec<Face>,
    parts: Vec<Part>,
    shared_nodes: Vec<NodeId>,
}

impl MeshBuilder {
    /// Create an empty builder for a single-rank mesh.
    pub fn new(spatial_dim: usize) -> Self {
        Self {
            spatial_dim,
            rank: 0,
            global_node_count: None,
            nodes: Vec::new(),
            elements: Vec::new(),
            faces: Vec::new(),
            parts: Vec::new(),
            shared_nodes: Vec::new(),
        }
    }

    /// Create an empty builder for one rank of a decomposed mesh.
    pub(crate) fn for_rank(spatial_dim: usize, rank: usize, global_node_count: usize) -> Self {
        Self {
            rank,
            global_node_count: Some(global_node_count),
            ..Self::new(spatial_dim)
        }
    }

    /// Add a part and return its ID.
    pub fn add_part(&mut self, name: impl Into<String>, kind: PartKind) -> PartId {
        let id = PartId::from_usize(self.parts.len());
        self.parts.push(Part {
            id,
            name: name.into(),
            kind,
        });
        id
    }

    /// Add a node; its global id equals its local index.
    pub fn add_node(&mut self, coords: [f64; 3]) -> NodeId {
        let global_id = self.nodes.len() as GlobalNodeId;
        self.add_node_with_global(coords, global_id, self.rank)
    }

    pub(crate) fn add_node_with_global(
        &mut self,
        coords: [f64; 3],
        global_id: GlobalNodeId,
        owner: usize,
    ) -> NodeId {
        let id = NodeId::from_usize(self.nodes.len());
        self.nodes.push(Node {
            id,
            global_id,
            coords,
            owner,
        });
        id
    }

    pub(crate) fn mark_shared(&mut self, node: NodeId) {
        self.shared_nodes.push(node);
    }

    /// Add a volume element to `part`.
    pub fn add_element(&mut self, part: PartId, topology: Topology, nodes: Vec<NodeId>) -> ElemId {
        let id = ElemId::from_usize(self.elements.len());
        self.elements.push(Element {
            id,
            topology,
            nodes,
            part,
        });
        id
    }

    /// Add a boundary face of `parent` to side part `part`.
    pub fn add_face(
        &mut self,
        part: PartId,
        topology: Topology,
        nodes: Vec<NodeId>,
        parent: ElemId,
    ) -> FaceId {
        let id = FaceId::from_usize(self.faces.len());
        self.faces.push(Face {
            id,
            topology,
            nodes,
            parent,
            part,
        });
        id
    }

    /// Validate and freeze the mesh.
    pub fn build(self) -> MeshResult<Mesh> {
        validate::validate_structure(
            self.spatial_dim,
            &self.nodes,
            &self.elements,
            &self.faces,
            &self.parts,
        )?;

        let mut part_elements = vec![Vec::new(); self.parts.len()];
        for e in &self.elements {
            part_elements[e.part.idx()].push(e.id);
        }
        let mut part_faces = vec![Vec::new(); self.parts.len()];
        for f in &self.faces {
            part_faces[f.part.idx()].push(f.id);
        }

        let global_to_local: HashMap<GlobalNodeId, NodeId> =
            self.nodes.iter().map(|n| (n.global_id, n.id)).collect();

        let mut shared_nodes = self.shared_nodes;
        shared_nodes.sort_unstable();
        shared_nodes.dedup();

        Ok(Mesh {
            spatial_dim: self.spatial_dim,
            rank: self.rank,
            global_node_count: self.global_node_count.unwrap_or(self.nodes.len()),
            nodes: self.nodes,
            elements: self.elements,
            faces: self.faces,
            parts: self.parts,
            part_elements,
            part_faces,
            shared_nodes,
            global_to_local,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeshError;

    fn unit_quad(b: &mut MeshBuilder) -> (PartId, Vec<NodeId>) {
        let block = b.add_part("block", PartKind::Volume);
        let nodes = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
            .iter()
            .map(|p| b.add_node([p[0], p[1], 0.0]))
            .collect();
        (block, nodes)
    }

    #[test]
    fn builder_basic() {
        let mut b = MeshBuilder::new(2);
        let (block, n) = unit_quad(&mut b);
        let e = b.add_element(block, Topology::Quad4, n.clone());
        let wall = b.add_part("wall", PartKind::Side);
        b.add_face(wall, Topology::Line2, vec![n[0], n[1]], e);

        let mesh = b.build().unwrap();
        assert_eq!(mesh.nodes().len(), 4);
        assert_eq!(mesh.part_elements(block), &[e]);
        assert_eq!(mesh.part_faces(wall).len(), 1);
        assert_eq!(mesh.global_node_count(), 4);
        assert_eq!(mesh.local_node(2), Some(n[2]));
    }

    #[test]
    fn builder_rejects_wrong_node_count() {
        let mut b = MeshBuilder::new(2);
        let (block, n) = unit_quad(&mut b);
        b.add_element(block, Topology::Quad4, n[..3].to_vec());
        let err = b.build().unwrap_err();
        assert!(matches!(err, MeshError::NodeCount { expected: 4, actual: 3, .. }));
    }

    #[test]
    fn builder_rejects_face_off_parent() {
        let mut b = MeshBuilder::new(2);
        let (block, n) = unit_quad(&mut b);
        let stray = b.add_node([5.0, 5.0, 0.0]);
        let e = b.add_element(block, Topology::Quad4, n.clone());
        let wall = b.add_part("wall", PartKind::Side);
        b.add_face(wall, Topology::Line2, vec![n[0], stray], e);
        assert!(matches!(
            b.build().unwrap_err(),
            MeshError::FaceNotOnParent { .. }
        ));
    }

    #[test]
    fn builder_rejects_element_on_side_part() {
        let mut b = MeshBuilder::new(2);
        let (_, n) = unit_quad(&mut b);
        let wall = b.add_part("wall", PartKind::Side);
        b.add_element(wall, Topology::Quad4, n);
        assert!(matches!(
            b.build().unwrap_err(),
            MeshError::PartKindMismatch { .. }
        ));
    }
}
