//! Test support shared by the crates of the workspace: reference elements, quadrature rules,
//! element fixtures and finite difference checks.
use fenris_physics::assembly::{AssemblyContext, ElementFeValues};
use nalgebra::{DMatrix, DVector, Point3};

pub mod elements;
pub mod quadrature;

pub use elements::{FirstOrderHex8, Hex8, Quad4};

/// Asserts that evaluating the expression panics.
#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $e));
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", std::stringify!($e));
        }
    }};
}

/// Approximates the Jacobian of `f` at `x` with central differences.
pub fn approximate_jacobian_fd(x: &DVector<f64>, h: f64, mut f: impl FnMut(&DVector<f64>) -> DVector<f64>) -> DMatrix<f64> {
    let f0 = f(x);
    let mut result = DMatrix::zeros(f0.len(), x.len());
    let mut x_plus = x.clone();
    let mut x_minus = x.clone();
    for j in 0..x.len() {
        x_plus.copy_from(x);
        x_plus[j] += h;
        x_minus.copy_from(x);
        x_minus[j] -= h;

        // result[.., j] := (f+ - f-) / 2h
        let mut column_j = result.column_mut(j);
        column_j += f(&x_plus);
        column_j -= f(&x_minus);
        column_j /= 2.0 * h;
    }
    result
}

/// A hexahedron spanning the given box, with hessians.
pub fn hex8_fe_values(min: [f64; 3], max: [f64; 3]) -> ElementFeValues<f64> {
    let (weights, points) = quadrature::hex_gauss_2x2x2();
    ElementFeValues::from_reference_element(&Hex8, &box_nodes(min, max), &weights, &points)
        .expect("Reference hexahedron must be valid")
}

/// Same as [`hex8_fe_values`], but without second derivatives.
pub fn first_order_hex8_fe_values(min: [f64; 3], max: [f64; 3]) -> ElementFeValues<f64> {
    let (weights, points) = quadrature::hex_gauss_2x2x2();
    ElementFeValues::from_reference_element(&FirstOrderHex8, &box_nodes(min, max), &weights, &points)
        .expect("Reference hexahedron must be valid")
}

fn box_nodes(min: [f64; 3], max: [f64; 3]) -> [Point3<f64>; 8] {
    let [x0, y0, z0] = min;
    let [x1, y1, z1] = max;
    [
        Point3::new(x0, y0, z0),
        Point3::new(x1, y0, z0),
        Point3::new(x1, y1, z0),
        Point3::new(x0, y1, z0),
        Point3::new(x0, y0, z1),
        Point3::new(x1, y0, z1),
        Point3::new(x1, y1, z1),
        Point3::new(x0, y1, z1),
    ]
}

/// A quadrilateral element with the given (possibly embedded) node positions.
pub fn quad4_fe_values(nodes: [Point3<f64>; 4]) -> ElementFeValues<f64> {
    let (weights, points) = quadrature::quad_gauss_2x2();
    ElementFeValues::from_reference_element(&Quad4, &nodes, &weights, &points)
        .expect("Quadrilateral must be valid")
}

/// A context in which all `n_variables` variables share the same element.
pub fn shared_element_context(fe: ElementFeValues<f64>, n_variables: usize, solution: DVector<f64>) -> AssemblyContext<f64> {
    let variable_fe = vec![0; n_variables];
    AssemblyContext::new(vec![fe], &variable_fe, solution).expect("Context data must be consistent")
}

/// Assembles a residual after replacing the element solution.
pub fn residual_at(
    context: &AssemblyContext<f64>,
    solution: &DVector<f64>,
    mut assemble: impl FnMut(bool, &mut AssemblyContext<f64>) -> eyre::Result<()>,
) -> DVector<f64> {
    let mut context = context.clone();
    context.buffers_mut().clear();
    context
        .set_solution(solution.clone())
        .expect("Solution length must match");
    assemble(false, &mut context).expect("Assembly must succeed");
    context.buffers().residual().clone()
}

/// Assembles a residual after replacing the element solution rate.
pub fn residual_at_rate(
    context: &AssemblyContext<f64>,
    rate: &DVector<f64>,
    mut assemble: impl FnMut(bool, &mut AssemblyContext<f64>) -> eyre::Result<()>,
) -> DVector<f64> {
    let mut context = context.clone();
    context.buffers_mut().clear();
    context
        .set_solution_rate(rate.clone())
        .expect("Rate length must match");
    assemble(false, &mut context).expect("Assembly must succeed");
    context.buffers().residual().clone()
}

/// Returns the analytic Jacobian of an assembly routine and its finite difference approximation
/// with respect to the element solution.
pub fn solution_jacobians(
    context: &AssemblyContext<f64>,
    h: f64,
    mut assemble: impl FnMut(bool, &mut AssemblyContext<f64>) -> eyre::Result<()>,
) -> (DMatrix<f64>, DMatrix<f64>) {
    let mut analytic = context.clone();
    analytic.buffers_mut().clear();
    assemble(true, &mut analytic).expect("Assembly must succeed");
    let x = context.state().solution().clone();
    let fd = approximate_jacobian_fd(&x, h, |x| residual_at(context, x, &mut assemble));
    (analytic.buffers().jacobian().clone(), fd)
}

/// Same as [`solution_jacobians`], but with respect to the element solution rate.
pub fn rate_jacobians(
    context: &AssemblyContext<f64>,
    h: f64,
    mut assemble: impl FnMut(bool, &mut AssemblyContext<f64>) -> eyre::Result<()>,
) -> (DMatrix<f64>, DMatrix<f64>) {
    let mut analytic = context.clone();
    analytic.buffers_mut().clear();
    assemble(true, &mut analytic).expect("Assembly must succeed");
    let rate = context.state().solution_rate().clone();
    let fd = approximate_jacobian_fd(&rate, h, |x| residual_at_rate(context, x, &mut assemble));
    (analytic.buffers().jacobian().clone(), fd)
}
