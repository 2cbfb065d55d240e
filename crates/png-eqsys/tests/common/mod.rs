#![allow(dead_code)]

use png_core::NodeId;
use png_eqsys::{EquationSystem, PngOptions, ProjectedNodalGradientEquationSystem, SolveOwnership};
use png_mesh::{BLOCK_PART, Mesh, Realm};

/// Declare the scalar `q` on the block and fill it from `f`.
pub fn with_q(mut realm: Realm, f: impl Fn(&[f64; 3]) -> f64) -> Realm {
    let block = realm.part_ids(&[BLOCK_PART]).unwrap();
    let h = realm.fields_mut().declare("q", 1, &block).unwrap();
    let (mesh, fields) = realm.split_mut();
    fields.fill_with(h, mesh, |x| vec![f(x)]);
    realm
}

pub fn serial_with_q(mesh: Mesh, f: impl Fn(&[f64; 3]) -> f64) -> Realm {
    with_q(Realm::serial(mesh), f)
}

/// Gradient system for `q` with fields and the interior algorithm on the
/// block.
pub fn interior_system(
    realm: &mut Realm,
    ownership: SolveOwnership,
    options: PngOptions,
) -> ProjectedNodalGradientEquationSystem {
    let mut png = ProjectedNodalGradientEquationSystem::for_independent_field("q", ownership)
        .with_options(options)
        .unwrap();
    let block = realm.part_ids(&[BLOCK_PART]).unwrap();
    png.register_nodal_fields(realm, &block).unwrap();
    png.register_interior_algorithm(realm, block[0]).unwrap();
    png
}

pub fn part(realm: &Realm, name: &str) -> png_core::PartId {
    realm.part_ids(&[name]).unwrap()[0]
}

pub fn field(realm: &Realm, name: &str, node: NodeId) -> Vec<f64> {
    let h = realm.fields().require(name).unwrap();
    realm.fields().node_value(h, node).to_vec()
}

pub fn gradient(realm: &Realm, node: NodeId) -> Vec<f64> {
    field(realm, "dqdx", node)
}

pub fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() <= tol, "{:?} vs {:?}", actual, expected);
    }
}
