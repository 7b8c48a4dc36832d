use fenris_physics::assembly::ReferenceShapeFunctions;
use nalgebra::{Matrix3, Point3, Vector3};

const QUAD4_NODES: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

const HEX8_NODES: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

/// Bilinear quadrilateral on $[-1, 1]^2$.
///
/// The node coordinates may be embedded in three dimensions, which makes this a surface
/// element.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Quad4;

impl ReferenceShapeFunctions<f64> for Quad4 {
    fn reference_dim(&self) -> usize {
        2
    }

    fn num_nodes(&self) -> usize {
        4
    }

    fn populate_basis(&self, basis: &mut [f64], xi: &Point3<f64>) {
        for (phi, [a, b]) in basis.iter_mut().zip(QUAD4_NODES) {
            *phi = 0.25 * (1.0 + a * xi.x) * (1.0 + b * xi.y);
        }
    }

    fn populate_gradients(&self, gradients: &mut [Vector3<f64>], xi: &Point3<f64>) {
        for (grad, [a, b]) in gradients.iter_mut().zip(QUAD4_NODES) {
            *grad = Vector3::new(
                0.25 * a * (1.0 + b * xi.y),
                0.25 * b * (1.0 + a * xi.x),
                0.0,
            );
        }
    }

    fn provides_hessians(&self) -> bool {
        true
    }

    fn populate_hessians(&self, hessians: &mut [Matrix3<f64>], _xi: &Point3<f64>) {
        for (hessian, [a, b]) in hessians.iter_mut().zip(QUAD4_NODES) {
            let cross = 0.25 * a * b;
            *hessian = Matrix3::new(0.0, cross, 0.0, cross, 0.0, 0.0, 0.0, 0.0, 0.0);
        }
    }
}

/// Trilinear hexahedron on $[-1, 1]^3$.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Hex8;

impl ReferenceShapeFunctions<f64> for Hex8 {
    fn reference_dim(&self) -> usize {
        3
    }

    fn num_nodes(&self) -> usize {
        8
    }

    fn populate_basis(&self, basis: &mut [f64], xi: &Point3<f64>) {
        for (phi, [a, b, c]) in basis.iter_mut().zip(HEX8_NODES) {
            *phi = 0.125 * (1.0 + a * xi.x) * (1.0 + b * xi.y) * (1.0 + c * xi.z);
        }
    }

    fn populate_gradients(&self, gradients: &mut [Vector3<f64>], xi: &Point3<f64>) {
        for (grad, [a, b, c]) in gradients.iter_mut().zip(HEX8_NODES) {
            let (fx, fy, fz) = (1.0 + a * xi.x, 1.0 + b * xi.y, 1.0 + c * xi.z);
            *grad = Vector3::new(0.125 * a * fy * fz, 0.125 * b * fx * fz, 0.125 * c * fx * fy);
        }
    }

    fn provides_hessians(&self) -> bool {
        true
    }

    fn populate_hessians(&self, hessians: &mut [Matrix3<f64>], xi: &Point3<f64>) {
        for (hessian, [a, b, c]) in hessians.iter_mut().zip(HEX8_NODES) {
            let (fx, fy, fz) = (1.0 + a * xi.x, 1.0 + b * xi.y, 1.0 + c * xi.z);
            let xy = 0.125 * a * b * fz;
            let xz = 0.125 * a * c * fy;
            let yz = 0.125 * b * c * fx;
            *hessian = Matrix3::new(0.0, xy, xz, xy, 0.0, yz, xz, yz, 0.0);
        }
    }
}

/// [`Hex8`] without second derivatives, as provided by hosts that only evaluate gradients.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FirstOrderHex8;

impl ReferenceShapeFunctions<f64> for FirstOrderHex8 {
    fn reference_dim(&self) -> usize {
        3
    }

    fn num_nodes(&self) -> usize {
        8
    }

    fn populate_basis(&self, basis: &mut [f64], xi: &Point3<f64>) {
        Hex8.populate_basis(basis, xi)
    }

    fn populate_gradients(&self, gradients: &mut [Vector3<f64>], xi: &Point3<f64>) {
        Hex8.populate_gradients(gradients, xi)
    }
}
