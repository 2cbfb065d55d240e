//! Isoparametric kinematics for elements and boundary faces.

use nalgebra::{DMatrix, Vector3};

use crate::error::{MeshError, MeshResult};
use crate::topology::Topology;

/// Shape data at one element quadrature point.
#[derive(Debug, Clone)]
pub struct ElementPoint {
    /// Shape function values.
    pub shape: Vec<f64>,
    /// Physical shape function gradients; only the first `spatial_dim`
    /// entries of each row are meaningful.
    pub grad: Vec<[f64; 3]>,
    /// Quadrature weight times Jacobian determinant.
    pub weight: f64,
}

/// Shape data at one face quadrature point.
#[derive(Debug, Clone)]
pub struct FacePoint {
    pub shape: Vec<f64>,
    /// Unit normal pointing away from the parent element.
    pub normal: [f64; 3],
    /// Quadrature weight times surface Jacobian.
    pub weight: f64,
}

/// Evaluate shape functions, physical gradients and integration weights at
/// every quadrature point of a volume element.
pub fn element_points(
    topology: Topology,
    coords: &[[f64; 3]],
    spatial_dim: usize,
) -> MeshResult<Vec<ElementPoint>> {
    let n = topology.num_nodes();
    if coords.len() != n {
        return Err(MeshError::NodeCount {
            topology,
            expected: n,
            actual: coords.len(),
        });
    }
    let dim = spatial_dim;

    topology
        .quadrature()
        .iter()
        .map(|qp| {
            let shape = topology.shape(&qp.xi);
            let dref = topology.shape_derivs(&qp.xi);

            // J[i][k] = d x_i / d xi_k
            let mut jac = DMatrix::<f64>::zeros(dim, dim);
            for (a, x) in coords.iter().enumerate() {
                for i in 0..dim {
                    for k in 0..dim {
                        jac[(i, k)] += x[i] * dref[a][k];
                    }
                }
            }
            let det = jac.determinant();
            if det <= 0.0 || !det.is_finite() {
                return Err(MeshError::DegenerateGeometry { topology, det });
            }
            let inv = jac
                .try_inverse()
                .ok_or(MeshError::DegenerateGeometry { topology, det })?;

            // dN/dx_i = sum_k dN/dxi_k * dxi_k/dx_i
            let grad = dref
                .iter()
                .map(|d| {
                    let mut g = [0.0; 3];
                    for i in 0..dim {
                        for k in 0..dim {
                            g[i] += d[k] * inv[(k, i)];
                        }
                    }
                    g
                })
                .collect();

            Ok(ElementPoint {
                shape,
                grad,
                weight: det * qp.weight,
            })
        })
        .collect()
}

/// Evaluate shape functions, outward normals and surface weights at every
/// quadrature point of a boundary face.
///
/// `interior` is any point strictly inside the parent element (its centroid
/// is the usual choice); normals are flipped to point away from it.
pub fn face_points(
    topology: Topology,
    coords: &[[f64; 3]],
    spatial_dim: usize,
    interior: [f64; 3],
) -> MeshResult<Vec<FacePoint>> {
    let n = topology.num_nodes();
    if coords.len() != n {
        return Err(MeshError::NodeCount {
            topology,
            expected: n,
            actual: coords.len(),
        });
    }
    if topology.parametric_dim() + 1 != spatial_dim {
        return Err(MeshError::TopologyDimension {
            topology,
            spatial_dim,
        });
    }

    let mut centroid = Vector3::zeros();
    for x in coords {
        centroid += Vector3::from(*x);
    }
    centroid /= n as f64;
    let outward = centroid - Vector3::from(interior);

    topology
        .quadrature()
        .iter()
        .map(|qp| {
            let shape = topology.shape(&qp.xi);
            let dref = topology.shape_derivs(&qp.xi);

            let mut t1 = Vector3::zeros();
            let mut t2 = Vector3::zeros();
            for (a, x) in coords.iter().enumerate() {
                let x = Vector3::from(*x);
                t1 += x * dref[a][0];
                t2 += x * dref[a][1];
            }
            let raw = if spatial_dim == 2 {
                Vector3::new(t1.y, -t1.x, 0.0)
            } else {
                t1.cross(&t2)
            };
            let area = raw.norm();
            if area <= 0.0 || !area.is_finite() {
                return Err(MeshError::DegenerateGeometry {
                    topology,
                    det: area,
                });
            }
            let mut unit = raw / area;
            if unit.dot(&outward) < 0.0 {
                unit = -unit;
            }

            Ok(FacePoint {
                shape,
                normal: [unit.x, unit.y, unit.z],
                weight: area * qp.weight,
            })
        })
        .collect()
}

/// Volume (or area in 2D) of an element.
pub fn element_measure(
    topology: Topology,
    coords: &[[f64; 3]],
    spatial_dim: usize,
) -> MeshResult<f64> {
    Ok(element_points(topology, coords, spatial_dim)?
        .iter()
        .map(|p| p.weight)
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT_HEX: [[f64; 3]; 8] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ];

    #[test]
    fn hex_volume_and_linear_gradient() {
        let coords: Vec<[f64; 3]> = UNIT_HEX
            .iter()
            .map(|x| [2.0 * x[0], x[1], 0.5 * x[2]])
            .collect();
        assert!((element_measure(Topology::Hex8, &coords, 3).unwrap() - 1.0).abs() < 1e-13);

        // q = 3x - y + 2z has a constant gradient
        let q: Vec<f64> = coords.iter().map(|x| 3.0 * x[0] - x[1] + 2.0 * x[2]).collect();
        for p in element_points(Topology::Hex8, &coords, 3).unwrap() {
            let mut g = [0.0; 3];
            for (a, qa) in q.iter().enumerate() {
                for i in 0..3 {
                    g[i] += qa * p.grad[a][i];
                }
            }
            assert!((g[0] - 3.0).abs() < 1e-12);
            assert!((g[1] + 1.0).abs() < 1e-12);
            assert!((g[2] - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn tri_area() {
        let coords = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        assert!((element_measure(Topology::Tri3, &coords, 2).unwrap() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn tet_volume() {
        let coords = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let v = element_measure(Topology::Tet4, &coords, 3).unwrap();
        assert!((v - 1.0 / 6.0).abs() < 1e-14);
    }

    #[test]
    fn inverted_element_is_rejected() {
        let coords = [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]];
        assert!(matches!(
            element_points(Topology::Tri3, &coords, 2).unwrap_err(),
            MeshError::DegenerateGeometry { .. }
        ));
    }

    #[test]
    fn face_normal_points_outward() {
        // bottom face of the unit hex, listed counter-clockwise from above
        let face = [UNIT_HEX[0], UNIT_HEX[1], UNIT_HEX[2], UNIT_HEX[3]];
        let pts = face_points(Topology::Quad4, &face, 3, [0.5, 0.5, 0.5]).unwrap();
        let area: f64 = pts.iter().map(|p| p.weight).sum();
        assert!((area - 1.0).abs() < 1e-13);
        for p in &pts {
            assert!((p.normal[2] + 1.0).abs() < 1e-14);
        }
    }

    #[test]
    fn line_normal_in_2d() {
        let face = [[1.0, 0.0, 0.0], [1.0, 2.0, 0.0]];
        let pts = face_points(Topology::Line2, &face, 2, [0.5, 1.0, 0.0]).unwrap();
        let len: f64 = pts.iter().map(|p| p.weight).sum();
        assert!((len - 2.0).abs() < 1e-14);
        assert!((pts[0].normal[0] - 1.0).abs() < 1e-14);
    }
}
