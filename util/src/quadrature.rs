//! Tensor-product Gauss rules on reference cubes, with points padded to three dimensions.
use nalgebra::Point3;

fn gauss_2() -> [f64; 2] {
    let a = 1.0 / 3.0f64.sqrt();
    [-a, a]
}

/// The 2x2 Gauss rule on $[-1, 1]^2$, exact for bicubic polynomials.
pub fn quad_gauss_2x2() -> (Vec<f64>, Vec<Point3<f64>>) {
    let mut points = Vec::new();
    for y in gauss_2() {
        for x in gauss_2() {
            points.push(Point3::new(x, y, 0.0));
        }
    }
    (vec![1.0; points.len()], points)
}

/// The 2x2x2 Gauss rule on $[-1, 1]^3$.
pub fn hex_gauss_2x2x2() -> (Vec<f64>, Vec<Point3<f64>>) {
    let mut points = Vec::new();
    for z in gauss_2() {
        for y in gauss_2() {
            for x in gauss_2() {
                points.push(Point3::new(x, y, z));
            }
        }
    }
    (vec![1.0; points.len()], points)
}
