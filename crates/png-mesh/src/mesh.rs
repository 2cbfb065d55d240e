//! Core mesh data structures.

use std::collections::HashMap;

use png_core::{ElemId, FaceId, GlobalNodeId, NodeId, PartId};

use crate::error::{MeshError, MeshResult};
use crate::topology::Topology;

/// What a part groups together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    /// A set of volume elements.
    Volume,
    /// A set of boundary faces.
    Side,
}

/// A named grouping of elements or faces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub id: PartId,
    pub name: String,
    pub kind: PartKind,
}

/// A mesh vertex.
///
/// `global_id` is identical on every rank that references the node;
/// `owner` is the rank responsible for its solution value.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub global_id: GlobalNodeId,
    pub coords: [f64; 3],
    pub owner: usize,
}

/// A volume element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: ElemId,
    pub topology: Topology,
    pub nodes: Vec<NodeId>,
    pub part: PartId,
}

/// A boundary face attached to one parent element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Face {
    pub id: FaceId,
    pub topology: Topology,
    pub nodes: Vec<NodeId>,
    pub parent: ElemId,
    pub part: PartId,
}

/// A validated, immutable rank-local mesh.
///
/// On a single rank this is the whole mesh; after decomposition each rank
/// holds its owned elements, the faces attached to them, every node those
/// reference, and the list of nodes shared with other ranks.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub(crate) spatial_dim: usize,
    pub(crate) rank: usize,
    pub(crate) global_node_count: usize,
    pub(crate) nodes: Vec<Node>,
    pub(crate) elements: Vec<Element>,
    pub(crate) faces: Vec<Face>,
    pub(crate) parts: Vec<Part>,
    pub(crate) part_elements: Vec<Vec<ElemId>>,
    pub(crate) part_faces: Vec<Vec<FaceId>>,
    pub(crate) shared_nodes: Vec<NodeId>,
    pub(crate) global_to_local: HashMap<GlobalNodeId, NodeId>,
}

impl Mesh {
    pub fn spatial_dim(&self) -> usize {
        self.spatial_dim
    }

    /// Rank this mesh lives on.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of nodes across all ranks.
    pub fn global_node_count(&self) -> usize {
        self.global_node_count
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.idx())
    }

    pub fn element(&self, id: ElemId) -> Option<&Element> {
        self.elements.get(id.idx())
    }

    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id.idx())
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(id.idx())
    }

    pub fn part_by_name(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    /// Look up a part by name, failing with `UnknownPart`.
    pub fn require_part(&self, name: &str) -> MeshResult<&Part> {
        self.part_by_name(name).ok_or_else(|| MeshError::UnknownPart {
            name: name.to_string(),
        })
    }

    /// Elements of a volume part, in element order.
    pub fn part_elements(&self, id: PartId) -> &[ElemId] {
        self.part_elements
            .get(id.idx())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Faces of a side part, in face order.
    pub fn part_faces(&self, id: PartId) -> &[FaceId] {
        self.part_faces
            .get(id.idx())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Sorted, de-duplicated nodes touched by a part.
    pub fn part_nodes(&self, id: PartId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .part_elements(id)
            .iter()
            .filter_map(|&e| self.element(e))
            .flat_map(|e| e.nodes.iter().copied())
            .chain(
                self.part_faces(id)
                    .iter()
                    .filter_map(|&f| self.face(f))
                    .flat_map(|f| f.nodes.iter().copied()),
            )
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Nodes referenced by more than one rank, sorted by local id.
    pub fn shared_nodes(&self) -> &[NodeId] {
        &self.shared_nodes
    }

    pub fn is_owned(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.owner == self.rank)
    }

    /// Local id of a node given its global id.
    pub fn local_node(&self, global_id: GlobalNodeId) -> Option<NodeId> {
        self.global_to_local.get(&global_id).copied()
    }

    /// Coordinates of the given nodes, in order.
    pub fn coords_of(&self, nodes: &[NodeId]) -> Vec<[f64; 3]> {
        nodes
            .iter()
            .map(|&n| self.nodes.get(n.idx()).map(|n| n.coords).unwrap_or_default())
            .collect()
    }

    /// Arithmetic mean of an element's node coordinates.
    pub fn element_centroid(&self, elem: &Element) -> [f64; 3] {
        let mut c = [0.0; 3];
        for x in self.coords_of(&elem.nodes) {
            for k in 0..3 {
                c[k] += x[k];
            }
        }
        let n = elem.nodes.len().max(1) as f64;
        c.map(|v| v / n)
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::MeshBuilder;
    use crate::topology::Topology;

    use super::*;

    #[test]
    fn part_nodes_are_sorted_and_unique() {
        let mut b = MeshBuilder::new(2);
        let block = b.add_part("block", PartKind::Volume);
        let n: Vec<_> = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 1.0]]
            .iter()
            .map(|p| b.add_node([p[0], p[1], 0.0]))
            .collect();
        b.add_element(block, Topology::Quad4, vec![n[0], n[1], n[4], n[3]]);
        b.add_element(block, Topology::Quad4, vec![n[1], n[2], n[5], n[4]]);
        let mesh = b.build().unwrap();

        let nodes = mesh.part_nodes(block);
        assert_eq!(nodes.len(), 6);
        assert!(nodes.windows(2).all(|w| w[0] < w[1]));
        assert!(mesh.shared_nodes().is_empty());
        assert!(mesh.is_owned(n[0]));
    }

    #[test]
    fn require_part_reports_name() {
        let mut b = MeshBuilder::new(2);
        b.add_part("block", PartKind::Volume);
        let mesh = b.build().unwrap();
        let err = mesh.require_part("wall").unwrap_err();
        assert_eq!(
            err,
            MeshError::UnknownPart {
                name: "wall".into()
            }
        );
    }
}
