//! Element-based decomposition of a global mesh into rank-local meshes.

use std::collections::BTreeMap;

use png_core::{ElemId, NodeId};

use crate::builder::MeshBuilder;
use crate::error::{MeshError, MeshResult};
use crate::mesh::Mesh;

/// Assign elements to `nranks` slabs along `axis` by centroid coordinate.
pub fn partition_by_axis(mesh: &Mesh, nranks: usize, axis: usize) -> Vec<usize> {
    let nranks = nranks.max(1);
    let axis = axis.min(mesh.spatial_dim() - 1);
    let centroids: Vec<f64> = mesh
        .elements()
        .iter()
        .map(|e| mesh.element_centroid(e)[axis])
        .collect();
    let lo = centroids.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = centroids.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = (hi - lo).max(f64::MIN_POSITIVE);
    centroids
        .iter()
        .map(|c| (((c - lo) / span) * nranks as f64).floor().min((nranks - 1) as f64) as usize)
        .collect()
}

/// Split `mesh` into one local mesh per rank.
///
/// `element_owner[e]` is the rank owning element `e`. Each rank receives its
/// elements, the faces whose parent it owns, and every node those touch.
/// A node is owned by the lowest rank touching it and is shared when more
/// than one rank touches it. All parts are replicated on every rank so
/// that part lookups by name agree everywhere.
pub fn decompose(mesh: &Mesh, element_owner: &[usize], nranks: usize) -> MeshResult<Vec<Mesh>> {
    if element_owner.len() != mesh.elements().len() {
        return Err(MeshError::Parallel {
            what: format!(
                "element owner list has {} entries for {} elements",
                element_owner.len(),
                mesh.elements().len()
            ),
        });
    }
    if let Some(&bad) = element_owner.iter().find(|&&r| r >= nranks) {
        return Err(MeshError::Parallel {
            what: format!("element assigned to rank {} of {}", bad, nranks),
        });
    }

    // Ranks touching each global node, ascending
    let mut touching: Vec<Vec<usize>> = vec![Vec::new(); mesh.num_nodes()];
    for (e, &r) in mesh.elements().iter().zip(element_owner) {
        for n in &e.nodes {
            let t = &mut touching[n.idx()];
            if !t.contains(&r) {
                t.push(r);
            }
        }
    }
    for t in &mut touching {
        t.sort_unstable();
    }

    (0..nranks)
        .map(|rank| {
            let mut b = MeshBuilder::for_rank(mesh.spatial_dim(), rank, mesh.global_node_count());
            for p in mesh.parts() {
                b.add_part(p.name.clone(), p.kind);
            }

            // Local nodes in global order keeps local numbering deterministic
            let mut local: BTreeMap<usize, NodeId> = BTreeMap::new();
            for n in mesh.nodes() {
                if touching[n.id.idx()].contains(&rank) {
                    let owner = touching[n.id.idx()][0];
                    let id = b.add_node_with_global(n.coords, n.global_id, owner);
                    if touching[n.id.idx()].len() > 1 {
                        b.mark_shared(id);
                    }
                    local.insert(n.id.idx(), id);
                }
            }
            let map = |nodes: &[NodeId]| -> Vec<NodeId> {
                nodes.iter().filter_map(|n| local.get(&n.idx()).copied()).collect()
            };

            let mut local_elem: BTreeMap<usize, ElemId> = BTreeMap::new();
            for (e, &r) in mesh.elements().iter().zip(element_owner) {
                if r == rank {
                    let id = b.add_element(e.part, e.topology, map(&e.nodes));
                    local_elem.insert(e.id.idx(), id);
                }
            }
            for f in mesh.faces() {
                if let Some(&parent) = local_elem.get(&f.parent.idx()) {
                    b.add_face(f.part, f.topology, map(&f.nodes), parent);
                }
            }
            b.build()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::box_mesh_2d;

    #[test]
    fn two_rank_split_shares_interface_column() {
        let mesh = box_mesh_2d([4, 2], [4.0, 2.0]).unwrap();
        let owner = partition_by_axis(&mesh, 2, 0);
        assert_eq!(owner.iter().filter(|&&r| r == 0).count(), 4);

        let locals = decompose(&mesh, &owner, 2).unwrap();
        assert_eq!(locals.len(), 2);
        // 3x3 nodes per half, interface column of 3 shared nodes
        assert_eq!(locals[0].num_nodes(), 9);
        assert_eq!(locals[1].num_nodes(), 9);
        assert_eq!(locals[0].shared_nodes().len(), 3);
        assert_eq!(locals[1].shared_nodes().len(), 3);

        // rank 0 owns the interface
        for &n in locals[1].shared_nodes() {
            assert!(!locals[1].is_owned(n));
        }
        for &n in locals[0].shared_nodes() {
            assert!(locals[0].is_owned(n));
        }

        // parts replicated, faces follow their parents
        assert_eq!(locals[1].parts().len(), mesh.parts().len());
        let xmin = locals[1].require_part("xmin").unwrap().id;
        assert!(locals[1].part_faces(xmin).is_empty());
        assert_eq!(locals[0].part_faces(xmin).len(), 2);
    }

    #[test]
    fn rejects_out_of_range_owner() {
        let mesh = box_mesh_2d([1, 1], [1.0, 1.0]).unwrap();
        assert!(decompose(&mesh, &[3], 2).is_err());
    }
}
