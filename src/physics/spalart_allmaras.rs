use crate::assembly::{AssemblyContext, ElementState};
use crate::function::{field_function_from_input, FieldFunction, MissingFunctionPolicy};
use crate::input::Input;
use crate::nalgebra::{Matrix3, Point3, Vector3};
use crate::physics::{density_from_input, JacobianModel, Physics, StrongFormResidual};
use crate::turbulence::{
    destruction_function, source_function, vorticity_magnitude, vorticity_magnitude_derivative,
    SpalartAllmarasParameters,
};
use crate::variables::{System, TurbulenceVariables, VariableIndex, VelocityVariables};
use crate::viscosity::MolecularViscosity;
use crate::Real;
use numeric_literals::replace_float_literals;
use std::fmt;

pub const SPALART_ALLMARAS: &str = "SpalartAllmaras";

const SECTION: &str = "Physics/SpalartAllmaras";
const WALL_DISTANCE_KEY: &str = "Physics/SpalartAllmaras/wall_distance";
const VELOCITY_COUPLING_KEY: &str = "Physics/SpalartAllmaras/jacobian_velocity_coupling";

/// Transport of the Spalart-Allmaras working variable $\nu$.
///
/// For a test function $\varphi_i$ of $\nu$, the module adds
/// <div>$$
/// \int_K \Big[ -\rho (\vec U \cdot \nabla \nu) \varphi_i + (P - D) \varphi_i
///     - \frac{\mu + \rho \nu}{\sigma} \nabla \nu \cdot \nabla \varphi_i
///     + \frac{c_{b2}}{\sigma} \rho |\nabla \nu|^2 \varphi_i \Big] \, \mathrm{d} x
/// $$</div>
/// to the time derivative, with production $P = \rho c_{b1} \tilde S \nu$ and destruction
/// $D = \rho c_{w1} f_w (\nu / d)^2$.
///
/// The Jacobian with respect to $\nu$ is exact. The dependence on the velocity through
/// advection and vorticity is only linearized if `jacobian_velocity_coupling` is set.
pub struct SpalartAllmaras<T: Real> {
    velocity: VelocityVariables,
    turbulence: TurbulenceVariables,
    density: T,
    viscosity: MolecularViscosity<T>,
    parameters: SpalartAllmarasParameters<T>,
    wall_distance: Box<dyn FieldFunction<T>>,
    velocity_coupling: bool,
}

impl<T: Real> fmt::Debug for SpalartAllmaras<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpalartAllmaras")
            .field("density", &self.density)
            .field("viscosity", &self.viscosity)
            .field("parameters", &self.parameters)
            .field("wall_distance", &self.wall_distance)
            .field("velocity_coupling", &self.velocity_coupling)
            .finish_non_exhaustive()
    }
}

/// Everything the weak and strong forms need at a single quadrature point.
#[derive(Debug, Clone)]
struct PointData<T: Real> {
    nu: T,
    grad_nu: Vector3<T>,
    velocity: Vector3<T>,
    // Row a holds the gradient of velocity component a
    velocity_gradient: Matrix3<T>,
    mu: T,
    /// Production minus destruction
    source: T,
    dsource_dnu: T,
    dsource_dvorticity: T,
}

impl<T: Real> SpalartAllmaras<T> {
    pub fn from_input(input: &Input) -> eyre::Result<Self> {
        input.ensure_recognized(
            SECTION,
            &[
                "wall_distance",
                "jacobian_velocity_coupling",
                "cb1",
                "cb2",
                "sigma",
                "kappa",
                "cv1",
                "cv2",
                "cv3",
                "r_lin",
                "c_w2",
                "c_w3",
            ],
        )?;
        let wall_distance = field_function_from_input(
            input,
            SPALART_ALLMARAS,
            WALL_DISTANCE_KEY,
            "",
            MissingFunctionPolicy::Fatal,
            1,
        )?;
        Ok(Self {
            velocity: VelocityVariables::from_input(input)?,
            turbulence: TurbulenceVariables::from_input(input)?,
            density: density_from_input(input, SPALART_ALLMARAS)?,
            viscosity: MolecularViscosity::from_input(input, SPALART_ALLMARAS)?,
            parameters: SpalartAllmarasParameters::from_input(input)?,
            wall_distance,
            velocity_coupling: input.boolean_or(SPALART_ALLMARAS, VELOCITY_COUPLING_KEY, false)?,
        })
    }

    pub fn parameters(&self) -> &SpalartAllmarasParameters<T> {
        &self.parameters
    }

    pub fn velocity_variables(&self) -> &VelocityVariables {
        &self.velocity
    }

    pub fn turbulence_variables(&self) -> &TurbulenceVariables {
        &self.turbulence
    }

    pub fn has_velocity_coupling(&self) -> bool {
        self.velocity_coupling
    }

    fn velocity_at(&self, state: &ElementState<T>, qp: usize) -> (Vector3<T>, Matrix3<T>) {
        let mut velocity = Vector3::zeros();
        let mut gradient = Matrix3::zeros();
        for (a, &u) in self.velocity.components().iter().enumerate() {
            velocity[a] = state.interior_value(u, qp);
            gradient.set_row(a, &state.interior_gradient(u, qp).transpose());
        }
        (velocity, gradient)
    }

    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn point_data(&self, state: &ElementState<T>, qp: usize) -> eyre::Result<PointData<T>> {
        let nu_var = self.turbulence.nu();
        let x: &Point3<T> = state.fe(nu_var).xyz(qp);
        let time = state.time();
        let rho = self.density;
        let params = &self.parameters;

        let nu = state.interior_value(nu_var, qp);
        let grad_nu = state.interior_gradient(nu_var, qp);
        let (velocity, velocity_gradient) = self.velocity_at(state, qp);
        let mu = self.viscosity.evaluate(x, time)?;
        let d = self.wall_distance.evaluate_scalar(x, time)?;

        let vorticity = vorticity_magnitude(&velocity_gradient);
        let s = source_function(params, nu, mu / rho, d, vorticity);
        let w = destruction_function(params, nu, d, s.s_tilde);

        let cb1 = params.cb1;
        let cw1 = params.cw1();
        let nu_d2 = (nu / d).powi(2);
        let production = rho * cb1 * s.s_tilde * nu;
        let destruction = rho * cw1 * w.fw * nu_d2;

        // Total derivatives of P - D, accounting for the dependence of f_w on S~
        let dfw_dnu = w.dfw_dnu + w.dfw_ds_tilde * s.ds_dnu;
        let dproduction_dnu = rho * cb1 * (s.ds_dnu * nu + s.s_tilde);
        let ddestruction_dnu = rho * cw1 * (dfw_dnu * nu_d2 + w.fw * 2.0 * nu / (d * d));
        let dproduction_dvorticity = rho * cb1 * nu * s.ds_dvorticity;
        let ddestruction_dvorticity = rho * cw1 * nu_d2 * w.dfw_ds_tilde * s.ds_dvorticity;

        Ok(PointData {
            nu,
            grad_nu,
            velocity,
            velocity_gradient,
            mu,
            source: production - destruction,
            dsource_dnu: dproduction_dnu - ddestruction_dnu,
            dsource_dvorticity: dproduction_dvorticity - ddestruction_dvorticity,
        })
    }
}

impl<T: Real> Physics<T> for SpalartAllmaras<T> {
    fn name(&self) -> &str {
        SPALART_ALLMARAS
    }

    fn init_variables(&mut self, system: &mut System) -> eyre::Result<()> {
        self.velocity.init(system);
        self.turbulence.init(system);
        Ok(())
    }

    fn set_time_evolving_vars(&self, system: &mut System) {
        system.set_time_evolving(self.turbulence.nu());
    }

    #[allow(non_snake_case)]
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn element_time_derivative(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        let (state, buffers) = context.split_mut();
        let nu_var = self.turbulence.nu();
        let fe = state.fe(nu_var);
        let n = fe.n_dofs();
        let rho = self.density;
        let sigma = self.parameters.sigma;
        let cb2 = self.parameters.cb2;

        for qp in 0..state.n_qpoints() {
            let p = self.point_data(state, qp)?;
            let jxw = fe.jxw(qp);
            let kappa_eff = (p.mu + rho * p.nu) / sigma;
            let advection = rho * p.velocity.dot(&p.grad_nu);
            let cross_diffusion = cb2 / sigma * rho * p.grad_nu.norm_squared();

            for i in 0..n {
                let phi_i = fe.phi(i, qp);
                let dphi_i = fe.dphi(i, qp);
                let F_i = (-advection + p.source + cross_diffusion) * phi_i - kappa_eff * p.grad_nu.dot(dphi_i);
                buffers.add_residual(nu_var, i, F_i * jxw);
            }

            if compute_jacobian {
                let factor = jxw * state.solution_derivative();
                for j in 0..n {
                    let phi_j = fe.phi(j, qp);
                    let dphi_j = fe.dphi(j, qp);
                    // Derivatives of the integrand terms multiplying phi_i and grad(phi_i)
                    let value_term = -rho * p.velocity.dot(dphi_j)
                        + p.dsource_dnu * phi_j
                        + 2.0 * cb2 / sigma * rho * p.grad_nu.dot(dphi_j);
                    let flux_term = p.grad_nu * (rho * phi_j / sigma) + dphi_j * kappa_eff;
                    for i in 0..n {
                        let K_ij = value_term * fe.phi(i, qp) - flux_term.dot(fe.dphi(i, qp));
                        buffers.add_jacobian(nu_var, nu_var, i, j, K_ij * factor);
                    }
                }

                if self.velocity_coupling {
                    for (a, &u_var) in self.velocity.components().iter().enumerate() {
                        let fe_u = state.fe(u_var);
                        for j in 0..fe_u.n_dofs() {
                            let domega = vorticity_magnitude_derivative(&p.velocity_gradient, a, fe_u.dphi(j, qp));
                            let value_term = -rho * fe_u.phi(j, qp) * p.grad_nu[a] + p.dsource_dvorticity * domega;
                            for i in 0..n {
                                buffers.add_jacobian(nu_var, u_var, i, j, value_term * fe.phi(i, qp) * factor);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn mass_residual(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        let (state, buffers) = context.split_mut();
        let nu_var = self.turbulence.nu();
        let fe = state.fe(nu_var);
        let n = fe.n_dofs();
        let rho = self.density;

        for qp in 0..state.n_qpoints() {
            let jxw = fe.jxw(qp);
            let nu_dot = state.interior_rate(nu_var, qp);
            for i in 0..n {
                buffers.add_residual(nu_var, i, -rho * nu_dot * fe.phi(i, qp) * jxw);
            }
            if compute_jacobian {
                let factor = jxw * state.solution_rate_derivative();
                for i in 0..n {
                    for j in 0..n {
                        let value = -rho * fe.phi(i, qp) * fe.phi(j, qp) * factor;
                        buffers.add_jacobian(nu_var, nu_var, i, j, value);
                    }
                }
            }
        }
        Ok(())
    }

    fn jacobian_model(&self) -> JacobianModel {
        if self.velocity_coupling {
            JacobianModel::Exact
        } else {
            JacobianModel::Approximate("velocity coupling through advection and vorticity is neglected")
        }
    }
}

impl<T: Real> StrongFormResidual<T> for SpalartAllmaras<T> {
    fn stabilized_variable(&self) -> VariableIndex {
        self.turbulence.nu()
    }

    fn density(&self) -> T {
        self.density
    }

    fn advective_velocity(&self, state: &ElementState<T>, qp: usize) -> Vector3<T> {
        self.velocity_at(state, qp).0
    }

    fn diffusivity(&self, state: &ElementState<T>, qp: usize) -> eyre::Result<T> {
        let nu_var = self.turbulence.nu();
        let x = state.fe(nu_var).xyz(qp);
        let mu = self.viscosity.evaluate(x, state.time())?;
        let nu = state.interior_value(nu_var, qp);
        Ok((mu + self.density * nu) / self.parameters.sigma)
    }

    /// The strong residual
    /// <div>$$
    /// R_s = \rho \vec U \cdot \nabla \nu - (P - D)
    ///     - \frac{1}{\sigma} \left[ (\mu + \rho \nu) \Delta \nu + \rho |\nabla \nu|^2 \right]
    ///     - \frac{c_{b2}}{\sigma} \rho |\nabla \nu|^2.
    /// $$</div>
    /// Spatial variation of the molecular viscosity is not included.
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn steady_residual(
        &self,
        state: &ElementState<T>,
        qp: usize,
        derivative: Option<&mut [T]>,
    ) -> eyre::Result<T> {
        let nu_var = self.turbulence.nu();
        let fe = state.fe(nu_var);
        let rho = self.density;
        let sigma = self.parameters.sigma;
        let cb2 = self.parameters.cb2;

        let p = self.point_data(state, qp)?;
        let laplacian = state.interior_hessian(nu_var, qp).trace();
        let grad_sq = p.grad_nu.norm_squared();
        let residual = rho * p.velocity.dot(&p.grad_nu)
            - p.source
            - ((p.mu + rho * p.nu) * laplacian + rho * grad_sq) / sigma
            - cb2 / sigma * rho * grad_sq;

        if let Some(derivative) = derivative {
            for (j, dr_j) in derivative.iter_mut().enumerate().take(fe.n_dofs()) {
                let phi_j = fe.phi(j, qp);
                let dphi_j = fe.dphi(j, qp);
                let laplacian_j = fe.d2phi(j, qp).trace();
                let grad_dot = p.grad_nu.dot(dphi_j);
                *dr_j = rho * p.velocity.dot(dphi_j)
                    - p.dsource_dnu * phi_j
                    - (rho * phi_j * laplacian + (p.mu + rho * p.nu) * laplacian_j + 2.0 * rho * grad_dot) / sigma
                    - 2.0 * cb2 / sigma * rho * grad_dot;
            }
        }

        Ok(residual)
    }
}
