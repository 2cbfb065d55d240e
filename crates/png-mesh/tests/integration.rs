//! Integration tests for png-mesh.

use png_mesh::{
    DofMap, MeshBuilder, PartKind, Topology, box_mesh_3d, decompose, element_points,
    partition_by_axis,
};

#[test]
fn build_single_tet_with_side() {
    let mut b = MeshBuilder::new(3);
    let block = b.add_part("block", PartKind::Volume);
    let wall = b.add_part("wall", PartKind::Side);
    let n: Vec<_> = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ]
    .iter()
    .map(|&x| b.add_node(x))
    .collect();
    let e = b.add_element(block, Topology::Tet4, n.clone());
    b.add_face(wall, Topology::Tri3, vec![n[0], n[2], n[1]], e);

    let mesh = b.build().unwrap();
    assert_eq!(mesh.part_nodes(wall), vec![n[0], n[1], n[2]]);

    let elem = mesh.element(e).unwrap();
    let pts = element_points(elem.topology, &mesh.coords_of(&elem.nodes), 3).unwrap();
    let vol: f64 = pts.iter().map(|p| p.weight).sum();
    assert!((vol - 1.0 / 6.0).abs() < 1e-14);
}

#[test]
fn tet_face_must_be_tri() {
    let mut b = MeshBuilder::new(3);
    let block = b.add_part("block", PartKind::Volume);
    let wall = b.add_part("wall", PartKind::Side);
    let n: Vec<_> = (0..4)
        .map(|i| b.add_node([(i == 1) as u8 as f64, (i == 2) as u8 as f64, (i == 3) as u8 as f64]))
        .collect();
    let e = b.add_element(block, Topology::Tet4, n.clone());
    b.add_face(wall, Topology::Line2, vec![n[0], n[1]], e);
    assert!(b.build().is_err());
}

#[test]
fn decomposition_preserves_element_count_and_global_ids() {
    let mesh = box_mesh_3d([4, 2, 2], [4.0, 1.0, 1.0]).unwrap();
    let owner = partition_by_axis(&mesh, 3, 0);
    let locals = decompose(&mesh, &owner, 3).unwrap();

    let total: usize = locals.iter().map(|m| m.elements().len()).sum();
    assert_eq!(total, mesh.elements().len());

    for local in &locals {
        assert_eq!(local.global_node_count(), mesh.num_nodes());
        for node in local.nodes() {
            let g = mesh.node(png_core::NodeId::from_usize(node.global_id as usize)).unwrap();
            assert_eq!(g.coords, node.coords);
        }
    }

    // every owned node appears exactly once across ranks
    let owned: usize = locals
        .iter()
        .map(|m| m.nodes().iter().filter(|n| m.is_owned(n.id)).count())
        .sum();
    assert_eq!(owned, mesh.num_nodes());
}

#[test]
fn dof_map_over_block_covers_all_nodes() {
    let mesh = box_mesh_3d([1, 1, 1], [1.0, 1.0, 1.0]).unwrap();
    let block = mesh.require_part("block_1").unwrap().id;
    let map = DofMap::from_parts(&mesh, &[block], 3);
    assert_eq!(map.row_count(), 24);
}
