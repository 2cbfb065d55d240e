//! Reference elements: node counts, shape functions and quadrature rules.

use core::fmt;

/// Reference topology of an element or a boundary face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topology {
    /// Two-node line (2D boundary face).
    Line2,
    /// Three-node triangle (2D element or 3D boundary face).
    Tri3,
    /// Four-node quadrilateral (2D element or 3D boundary face).
    Quad4,
    /// Four-node tetrahedron.
    Tet4,
    /// Eight-node hexahedron.
    Hex8,
}

/// A quadrature point in reference coordinates.
#[derive(Debug, Clone, Copy)]
pub struct QuadPoint {
    pub xi: [f64; 3],
    pub weight: f64,
}

const GAUSS2: f64 = 0.577_350_269_189_625_8;

const QUAD4_CORNERS: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

const HEX8_CORNERS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

impl Topology {
    pub fn name(self) -> &'static str {
        match self {
            Topology::Line2 => "line2",
            Topology::Tri3 => "tri3",
            Topology::Quad4 => "quad4",
            Topology::Tet4 => "tet4",
            Topology::Hex8 => "hex8",
        }
    }

    pub fn num_nodes(self) -> usize {
        match self {
            Topology::Line2 => 2,
            Topology::Tri3 => 3,
            Topology::Quad4 => 4,
            Topology::Tet4 => 4,
            Topology::Hex8 => 8,
        }
    }

    /// Parametric dimension of the reference element.
    pub fn parametric_dim(self) -> usize {
        match self {
            Topology::Line2 => 1,
            Topology::Tri3 | Topology::Quad4 => 2,
            Topology::Tet4 | Topology::Hex8 => 3,
        }
    }

    /// Topology of the boundary faces of this element, if it is a volume
    /// element for some spatial dimension.
    pub fn face_topologies(self) -> &'static [Topology] {
        match self {
            Topology::Line2 => &[],
            Topology::Tri3 | Topology::Quad4 => &[Topology::Line2],
            Topology::Tet4 => &[Topology::Tri3],
            Topology::Hex8 => &[Topology::Quad4],
        }
    }

    /// Shape function values at `xi`.
    pub fn shape(self, xi: &[f64; 3]) -> Vec<f64> {
        let [x, y, z] = *xi;
        match self {
            Topology::Line2 => vec![0.5 * (1.0 - x), 0.5 * (1.0 + x)],
            Topology::Tri3 => vec![1.0 - x - y, x, y],
            Topology::Quad4 => QUAD4_CORNERS
                .iter()
                .map(|c| 0.25 * (1.0 + c[0] * x) * (1.0 + c[1] * y))
                .collect(),
            Topology::Tet4 => vec![1.0 - x - y - z, x, y, z],
            Topology::Hex8 => HEX8_CORNERS
                .iter()
                .map(|c| 0.125 * (1.0 + c[0] * x) * (1.0 + c[1] * y) * (1.0 + c[2] * z))
                .collect(),
        }
    }

    /// Shape function derivatives with respect to reference coordinates.
    ///
    /// Entry `a` holds `[dN_a/dxi, dN_a/deta, dN_a/dzeta]`; unused
    /// parametric directions are zero.
    pub fn shape_derivs(self, xi: &[f64; 3]) -> Vec<[f64; 3]> {
        let [x, y, z] = *xi;
        match self {
            Topology::Line2 => vec![[-0.5, 0.0, 0.0], [0.5, 0.0, 0.0]],
            Topology::Tri3 => vec![[-1.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            Topology::Quad4 => QUAD4_CORNERS
                .iter()
                .map(|c| {
                    [
                        0.25 * c[0] * (1.0 + c[1] * y),
                        0.25 * c[1] * (1.0 + c[0] * x),
                        0.0,
                    ]
                })
                .collect(),
            Topology::Tet4 => vec![
                [-1.0, -1.0, -1.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            Topology::Hex8 => HEX8_CORNERS
                .iter()
                .map(|c| {
                    [
                        0.125 * c[0] * (1.0 + c[1] * y) * (1.0 + c[2] * z),
                        0.125 * c[1] * (1.0 + c[0] * x) * (1.0 + c[2] * z),
                        0.125 * c[2] * (1.0 + c[0] * x) * (1.0 + c[1] * y),
                    ]
                })
                .collect(),
        }
    }

    /// Quadrature rule exact for products of two shape functions.
    pub fn quadrature(self) -> Vec<QuadPoint> {
        match self {
            Topology::Line2 => [-GAUSS2, GAUSS2]
                .iter()
                .map(|&x| QuadPoint {
                    xi: [x, 0.0, 0.0],
                    weight: 1.0,
                })
                .collect(),
            Topology::Tri3 => {
                let a = 1.0 / 6.0;
                let b = 2.0 / 3.0;
                [[a, a], [b, a], [a, b]]
                    .iter()
                    .map(|p| QuadPoint {
                        xi: [p[0], p[1], 0.0],
                        weight: 1.0 / 6.0,
                    })
                    .collect()
            }
            Topology::Quad4 => {
                let mut pts = Vec::with_capacity(4);
                for &y in &[-GAUSS2, GAUSS2] {
                    for &x in &[-GAUSS2, GAUSS2] {
                        pts.push(QuadPoint {
                            xi: [x, y, 0.0],
                            weight: 1.0,
                        });
                    }
                }
                pts
            }
            Topology::Tet4 => {
                let a = 0.585_410_196_624_968_5;
                let b = 0.138_196_601_125_010_5;
                [[b, b, b], [a, b, b], [b, a, b], [b, b, a]]
                    .iter()
                    .map(|&xi| QuadPoint {
                        xi,
                        weight: 1.0 / 24.0,
                    })
                    .collect()
            }
            Topology::Hex8 => {
                let mut pts = Vec::with_capacity(8);
                for &z in &[-GAUSS2, GAUSS2] {
                    for &y in &[-GAUSS2, GAUSS2] {
                        for &x in &[-GAUSS2, GAUSS2] {
                            pts.push(QuadPoint {
                                xi: [x, y, z],
                                weight: 1.0,
                            });
                        }
                    }
                }
                pts
            }
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
