//! Mesh validation logic.

use std::collections::HashSet;

use png_core::PartId;

use crate::error::{MeshError, MeshResult};
use crate::mesh::{Element, Face, Node, Part, PartKind};
use crate::topology::Topology;

fn check_part(parts: &[Part], part: PartId, expected: PartKind) -> MeshResult<()> {
    let p = parts
        .get(part.idx())
        .ok_or(MeshError::InvalidPartRef { part })?;
    if p.kind != expected {
        return Err(MeshError::PartKindMismatch {
            part: p.name.clone(),
            expected,
        });
    }
    Ok(())
}

fn is_volume_topology(topology: Topology, spatial_dim: usize) -> bool {
    topology.parametric_dim() == spatial_dim && !topology.face_topologies().is_empty()
}

/// Validate the mesh structure: all references exist, connectivity lengths
/// match topologies, faces sit on their parents, parts are of the right kind.
pub(crate) fn validate_structure(
    spatial_dim: usize,
    nodes: &[Node],
    elements: &[Element],
    faces: &[Face],
    parts: &[Part],
) -> MeshResult<()> {
    if !(2..=3).contains(&spatial_dim) {
        return Err(MeshError::InvalidSpatialDim { dim: spatial_dim });
    }

    // Part names must be unique
    let mut names = HashSet::new();
    for p in parts {
        if !names.insert(p.name.as_str()) {
            return Err(MeshError::DuplicatePart {
                name: p.name.clone(),
            });
        }
    }

    for (i, e) in elements.iter().enumerate() {
        if !is_volume_topology(e.topology, spatial_dim) {
            return Err(MeshError::TopologyDimension {
                topology: e.topology,
                spatial_dim,
            });
        }
        if e.nodes.len() != e.topology.num_nodes() {
            return Err(MeshError::NodeCount {
                topology: e.topology,
                expected: e.topology.num_nodes(),
                actual: e.nodes.len(),
            });
        }
        for &n in &e.nodes {
            if n.idx() >= nodes.len() {
                return Err(MeshError::InvalidNodeRef {
                    entity: "Element",
                    index: i,
                    node: n,
                });
            }
        }
        check_part(parts, e.part, PartKind::Volume)?;
    }

    for (i, f) in faces.iter().enumerate() {
        if f.nodes.len() != f.topology.num_nodes() {
            return Err(MeshError::NodeCount {
                topology: f.topology,
                expected: f.topology.num_nodes(),
                actual: f.nodes.len(),
            });
        }
        for &n in &f.nodes {
            if n.idx() >= nodes.len() {
                return Err(MeshError::InvalidNodeRef {
                    entity: "Face",
                    index: i,
                    node: n,
                });
            }
        }
        let parent = elements
            .get(f.parent.idx())
            .ok_or(MeshError::InvalidParentRef {
                face: f.id,
                parent: f.parent,
            })?;
        if !parent.topology.face_topologies().contains(&f.topology) {
            return Err(MeshError::FaceTopologyMismatch {
                face: f.id,
                parent: parent.topology,
                face_topology: f.topology,
            });
        }
        if !f.nodes.iter().all(|n| parent.nodes.contains(n)) {
            return Err(MeshError::FaceNotOnParent {
                face: f.id,
                parent: f.parent,
            });
        }
        check_part(parts, f.part, PartKind::Side)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MeshBuilder;

    #[test]
    fn rejects_bad_dimension() {
        let b = MeshBuilder::new(4);
        assert_eq!(
            b.build().unwrap_err(),
            MeshError::InvalidSpatialDim { dim: 4 }
        );
    }

    #[test]
    fn rejects_duplicate_part_names() {
        let mut b = MeshBuilder::new(3);
        b.add_part("block", PartKind::Volume);
        b.add_part("block", PartKind::Side);
        assert!(matches!(
            b.build().unwrap_err(),
            MeshError::DuplicatePart { .. }
        ));
    }

    #[test]
    fn rejects_2d_element_in_3d() {
        let mut b = MeshBuilder::new(3);
        let block = b.add_part("block", PartKind::Volume);
        let n: Vec<_> = (0..3).map(|i| b.add_node([i as f64, 0.0, 0.0])).collect();
        b.add_element(block, Topology::Tri3, n);
        assert!(matches!(
            b.build().unwrap_err(),
            MeshError::TopologyDimension { .. }
        ));
    }
}
