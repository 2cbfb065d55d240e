//! Structured box meshes for tests and the command-line driver.

use png_core::{ElemId, NodeId};

use crate::builder::MeshBuilder;
use crate::error::{MeshError, MeshResult};
use crate::mesh::{Mesh, PartKind};
use crate::topology::Topology;

/// Name of the single volume part of generated meshes.
pub const BLOCK_PART: &str = "block_1";

/// `[0, lx] x [0, ly]` split into `nx x ny` quads.
///
/// Parts: `block_1` (volume) and the sides `xmin`, `xmax`, `ymin`, `ymax`.
pub fn box_mesh_2d(cells: [usize; 2], lengths: [f64; 2]) -> MeshResult<Mesh> {
    let [nx, ny] = cells;
    if nx == 0 || ny == 0 {
        return Err(MeshError::InvalidArg {
            what: "box mesh needs at least one cell per direction",
        });
    }
    let mut b = MeshBuilder::new(2);
    let block = b.add_part(BLOCK_PART, PartKind::Volume);
    let sides = ["xmin", "xmax", "ymin", "ymax"].map(|s| b.add_part(s, PartKind::Side));

    let node = |i: usize, j: usize| NodeId::from_usize(i + (nx + 1) * j);
    for j in 0..=ny {
        for i in 0..=nx {
            b.add_node([
                lengths[0] * i as f64 / nx as f64,
                lengths[1] * j as f64 / ny as f64,
                0.0,
            ]);
        }
    }

    let mut elem = vec![ElemId::from_index(0); nx * ny];
    for j in 0..ny {
        for i in 0..nx {
            elem[i + nx * j] = b.add_element(
                block,
                Topology::Quad4,
                vec![node(i, j), node(i + 1, j), node(i + 1, j + 1), node(i, j + 1)],
            );
        }
    }

    for j in 0..ny {
        b.add_face(sides[0], Topology::Line2, vec![node(0, j + 1), node(0, j)], elem[nx * j]);
        b.add_face(
            sides[1],
            Topology::Line2,
            vec![node(nx, j), node(nx, j + 1)],
            elem[nx - 1 + nx * j],
        );
    }
    for i in 0..nx {
        b.add_face(sides[2], Topology::Line2, vec![node(i, 0), node(i + 1, 0)], elem[i]);
        b.add_face(
            sides[3],
            Topology::Line2,
            vec![node(i + 1, ny), node(i, ny)],
            elem[i + nx * (ny - 1)],
        );
    }

    b.build()
}

/// `[0, lx] x [0, ly] x [0, lz]` split into `nx x ny x nz` hexahedra.
///
/// Parts: `block_1` (volume) and the sides `xmin`, `xmax`, `ymin`, `ymax`,
/// `zmin`, `zmax`.
pub fn box_mesh_3d(cells: [usize; 3], lengths: [f64; 3]) -> MeshResult<Mesh> {
    let [nx, ny, nz] = cells;
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(MeshError::InvalidArg {
            what: "box mesh needs at least one cell per direction",
        });
    }
    let mut b = MeshBuilder::new(3);
    let block = b.add_part(BLOCK_PART, PartKind::Volume);
    let sides =
        ["xmin", "xmax", "ymin", "ymax", "zmin", "zmax"].map(|s| b.add_part(s, PartKind::Side));

    let node = |i: usize, j: usize, k: usize| NodeId::from_usize(i + (nx + 1) * (j + (ny + 1) * k));
    for k in 0..=nz {
        for j in 0..=ny {
            for i in 0..=nx {
                b.add_node([
                    lengths[0] * i as f64 / nx as f64,
                    lengths[1] * j as f64 / ny as f64,
                    lengths[2] * k as f64 / nz as f64,
                ]);
            }
        }
    }

    let eidx = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);
    let mut elem = vec![ElemId::from_index(0); nx * ny * nz];
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                elem[eidx(i, j, k)] = b.add_element(
                    block,
                    Topology::Hex8,
                    vec![
                        node(i, j, k),
                        node(i + 1, j, k),
                        node(i + 1, j + 1, k),
                        node(i, j + 1, k),
                        node(i, j, k + 1),
                        node(i + 1, j, k + 1),
                        node(i + 1, j + 1, k + 1),
                        node(i, j + 1, k + 1),
                    ],
                );
            }
        }
    }

    for k in 0..nz {
        for j in 0..ny {
            for (side, i, e) in [(sides[0], 0, 0), (sides[1], nx, nx - 1)] {
                b.add_face(
                    side,
                    Topology::Quad4,
                    vec![node(i, j, k), node(i, j + 1, k), node(i, j + 1, k + 1), node(i, j, k + 1)],
                    elem[eidx(e, j, k)],
                );
            }
        }
    }
    for k in 0..nz {
        for i in 0..nx {
            for (side, j, e) in [(sides[2], 0, 0), (sides[3], ny, ny - 1)] {
                b.add_face(
                    side,
                    Topology::Quad4,
                    vec![node(i, j, k), node(i + 1, j, k), node(i + 1, j, k + 1), node(i, j, k + 1)],
                    elem[eidx(i, e, k)],
                );
            }
        }
    }
    for j in 0..ny {
        for i in 0..nx {
            for (side, k, e) in [(sides[4], 0, 0), (sides[5], nz, nz - 1)] {
                b.add_face(
                    side,
                    Topology::Quad4,
                    vec![node(i, j, k), node(i + 1, j, k), node(i + 1, j + 1, k), node(i, j + 1, k)],
                    elem[eidx(i, j, e)],
                );
            }
        }
    }

    b.build()
}
