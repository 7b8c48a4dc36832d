use crate::nalgebra::{DMatrix, Matrix3, Point3, Scalar, Vector3};
use crate::Real;
use eyre::eyre;
use itertools::izip;

/// Shape functions of a reference element.
///
/// All quantities are padded to three dimensions: reference coordinates beyond
/// [`reference_dim`](Self::reference_dim) are ignored and the corresponding gradient and
/// hessian entries must be zero.
pub trait ReferenceShapeFunctions<T: Real> {
    fn reference_dim(&self) -> usize;

    fn num_nodes(&self) -> usize;

    fn populate_basis(&self, basis: &mut [T], xi: &Point3<T>);

    fn populate_gradients(&self, gradients: &mut [Vector3<T>], xi: &Point3<T>);

    /// Whether [`populate_hessians`](Self::populate_hessians) provides second derivatives.
    fn provides_hessians(&self) -> bool {
        false
    }

    fn populate_hessians(&self, hessians: &mut [Matrix3<T>], _xi: &Point3<T>) {
        hessians.fill(Matrix3::zeros());
    }
}

/// Shape function data of one finite element type on one element, at every quadrature point.
///
/// Physical gradients are obtained through the (pseudo-)inverse of the reference Jacobian, so
/// that surface elements embedded in three dimensions are supported. Physical second
/// derivatives neglect the curvature of the mapping and are exact for affine elements.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementFeValues<T: Scalar> {
    n_dofs: usize,
    reference_dim: usize,
    has_hessians: bool,
    jxw: Vec<T>,
    xyz: Vec<Point3<T>>,
    // Per-dof data is stored as [qp * n_dofs + i]
    phi: Vec<T>,
    dphi: Vec<Vector3<T>>,
    d2phi: Vec<Matrix3<T>>,
    reference_dphi: Vec<Vector3<T>>,
    reference_jacobians: Vec<Matrix3<T>>,
    inverse_jacobians: Vec<Matrix3<T>>,
}

impl<T: Real> ElementFeValues<T> {
    /// Evaluates the isoparametric mapping defined by the element nodes at the given
    /// reference quadrature points.
    ///
    /// Returns an error if the number of nodes does not match the element or if the mapping
    /// is degenerate at a quadrature point.
    #[allow(non_snake_case)]
    pub fn from_reference_element<Element>(
        element: &Element,
        nodes: &[Point3<T>],
        weights: &[T],
        points: &[Point3<T>],
    ) -> eyre::Result<Self>
    where
        Element: ReferenceShapeFunctions<T>,
    {
        let n = element.num_nodes();
        let r = element.reference_dim();
        if nodes.len() != n {
            return Err(eyre!(
                "element has {n} nodes, but {} node coordinates were given",
                nodes.len()
            ));
        }
        if weights.len() != points.len() {
            return Err(eyre!("number of quadrature weights must match number of points"));
        }
        if r == 0 || r > 3 {
            return Err(eyre!("reference dimension must be 1, 2 or 3, got {r}"));
        }

        let n_qp = points.len();
        let mut values = Self {
            n_dofs: n,
            reference_dim: r,
            has_hessians: element.provides_hessians(),
            jxw: Vec::with_capacity(n_qp),
            xyz: Vec::with_capacity(n_qp),
            phi: vec![T::zero(); n * n_qp],
            dphi: vec![Vector3::zeros(); n * n_qp],
            d2phi: vec![Matrix3::zeros(); n * n_qp],
            reference_dphi: vec![Vector3::zeros(); n * n_qp],
            reference_jacobians: Vec::with_capacity(n_qp),
            inverse_jacobians: Vec::with_capacity(n_qp),
        };

        let mut reference_hessians = vec![Matrix3::zeros(); n];
        for (qp, (w, xi)) in weights.iter().zip(points).enumerate() {
            let range = qp * n..(qp + 1) * n;
            element.populate_basis(&mut values.phi[range.clone()], xi);
            element.populate_gradients(&mut values.reference_dphi[range.clone()], xi);
            element.populate_hessians(&mut reference_hessians, xi);

            let mut x = Vector3::zeros();
            let mut J = Matrix3::zeros();
            for (X_i, phi_i, grad_i) in izip!(nodes, &values.phi[range.clone()], &values.reference_dphi[range.clone()]) {
                x += X_i.coords * *phi_i;
                for k in 0..r {
                    let mut column = J.column_mut(k);
                    column += X_i.coords * grad_i[k];
                }
            }

            // Metric of the (possibly embedded) reference map: g = J_r^T J_r
            let J_r = J.columns(0, r).clone_owned();
            let g: DMatrix<T> = J_r.transpose() * &J_r;
            let det_g = g.determinant();
            if !(det_g > T::zero()) {
                return Err(eyre!("degenerate element mapping at quadrature point {qp}"));
            }
            let g_inv = g
                .try_inverse()
                .ok_or_else(|| eyre!("singular element metric at quadrature point {qp}"))?;
            let pseudo_inverse = g_inv * J_r.transpose();
            let mut J_inv = Matrix3::zeros();
            for k in 0..r {
                for j in 0..3 {
                    J_inv[(k, j)] = pseudo_inverse[(k, j)];
                }
            }
            let J_inv_t = J_inv.transpose();

            for (i, hessian) in reference_hessians.iter().enumerate() {
                let idx = qp * n + i;
                values.dphi[idx] = J_inv_t * values.reference_dphi[idx];
                values.d2phi[idx] = J_inv_t * hessian * J_inv;
            }

            values.jxw.push(*w * det_g.sqrt());
            values.xyz.push(Point3::from(x));
            values.reference_jacobians.push(J);
            values.inverse_jacobians.push(J_inv);
        }

        Ok(values)
    }
}

impl<T: Real> ElementFeValues<T> {
    pub fn n_dofs(&self) -> usize {
        self.n_dofs
    }

    pub fn n_qpoints(&self) -> usize {
        self.jxw.len()
    }

    pub fn reference_dim(&self) -> usize {
        self.reference_dim
    }

    pub fn has_hessians(&self) -> bool {
        self.has_hessians
    }

    /// Quadrature weight times the Jacobian determinant of the mapping.
    pub fn jxw(&self, qp: usize) -> T {
        self.jxw[qp]
    }

    pub fn xyz(&self, qp: usize) -> &Point3<T> {
        &self.xyz[qp]
    }

    pub fn phi(&self, i: usize, qp: usize) -> T {
        self.phi[qp * self.n_dofs + i]
    }

    /// Gradient of shape function `i` with respect to physical coordinates.
    pub fn dphi(&self, i: usize, qp: usize) -> &Vector3<T> {
        &self.dphi[qp * self.n_dofs + i]
    }

    /// Hessian of shape function `i` with respect to physical coordinates.
    ///
    /// Zero unless [`has_hessians`](Self::has_hessians) is true.
    pub fn d2phi(&self, i: usize, qp: usize) -> &Matrix3<T> {
        &self.d2phi[qp * self.n_dofs + i]
    }

    /// Gradient of shape function `i` with respect to reference coordinates.
    pub fn reference_dphi(&self, i: usize, qp: usize) -> &Vector3<T> {
        &self.reference_dphi[qp * self.n_dofs + i]
    }

    /// The matrix whose columns are the reference tangents $\partial \vec x / \partial \xi_k$.
    pub fn reference_jacobian(&self, qp: usize) -> &Matrix3<T> {
        &self.reference_jacobians[qp]
    }

    /// The matrix whose rows are $\partial \xi_k / \partial \vec x$.
    pub fn inverse_jacobian(&self, qp: usize) -> &Matrix3<T> {
        &self.inverse_jacobians[qp]
    }
}
