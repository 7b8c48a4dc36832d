//! Strategies for property-based testing of the closure functions.
use ::proptest::prelude::*;
use nalgebra::{Matrix3, Vector3};

/// Pointwise input of the Spalart-Allmaras closures.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClosureSample {
    pub nu: f64,
    pub nu_molecular: f64,
    pub wall_distance: f64,
    pub vorticity: f64,
}

/// Samples with positive working variable and wall distance.
///
/// The ranges cover several orders of magnitude of the viscosity ratio $\chi$ and of the
/// destruction ratio $r$, including values beyond the limiter $r_\text{lin}$.
pub fn closure_sample() -> impl Strategy<Value = ClosureSample> {
    (1e-3..1e2f64, 1e-2..1e1f64, 1e-2..1e1f64, 0.0..1e2f64).prop_map(
        |(nu, nu_molecular, wall_distance, vorticity)| ClosureSample {
            nu,
            nu_molecular,
            wall_distance,
            vorticity,
        },
    )
}

pub fn vector3() -> impl Strategy<Value = Vector3<f64>> {
    // Keep the range small so that products of vectors stay well within floating point range
    let range = -10.0..10.0;
    [range.clone(), range.clone(), range].prop_map(|[x, y, z]| Vector3::new(x, y, z))
}

/// Velocity gradients $\partial u_a / \partial x_j$ with bounded entries.
pub fn velocity_gradient3() -> impl Strategy<Value = Matrix3<f64>> {
    [vector3(), vector3(), vector3()].prop_map(|[r0, r1, r2]| Matrix3::from_rows(&[r0.transpose(), r1.transpose(), r2.transpose()]))
}
