use crate::assembly::AssemblyContext;
use crate::input::Input;
use crate::nalgebra::{Matrix3, Vector3};
use crate::physics::{density_from_input, JacobianModel, Physics};
use crate::variables::{PressureVariable, System, VelocityVariables};
use crate::viscosity::Viscosity;
use crate::Real;

pub const INCOMPRESSIBLE_NAVIER_STOKES: &str = "IncompressibleNavierStokes";

const SECTION: &str = "Physics/IncompressibleNavierStokes";

/// Galerkin discretization of the incompressible Navier-Stokes equations.
///
/// For velocity test functions $\vec \varphi$ and pressure test functions $q$, the time derivative
/// is
/// <div>$$
/// \int_K -\rho (\vec U \cdot \nabla \vec U) \cdot \vec \varphi - \mu \nabla \vec U : \nabla \vec \varphi
///     + p \nabla \cdot \vec \varphi \, \mathrm{d} x,
/// $$</div>
/// the constraint is $\int_K (\nabla \cdot \vec U) q \, \mathrm{d} x$ and the mass residual is
/// $-\int_K \rho \dot{\vec U} \cdot \vec \varphi \, \mathrm{d} x$.
///
/// With the Spalart-Allmaras viscosity, the Jacobian holds the turbulent viscosity fixed.
#[derive(Debug)]
pub struct IncompressibleNavierStokes<T: Real> {
    velocity: VelocityVariables,
    pressure: PressureVariable,
    density: T,
    viscosity: Viscosity<T>,
}

impl<T: Real> IncompressibleNavierStokes<T> {
    pub fn from_input(input: &Input) -> eyre::Result<Self> {
        input.ensure_recognized(SECTION, &["viscosity_model"])?;
        let density = density_from_input(input, INCOMPRESSIBLE_NAVIER_STOKES)?;
        Ok(Self {
            velocity: VelocityVariables::from_input(input)?,
            pressure: PressureVariable::from_input(input)?,
            density,
            viscosity: Viscosity::from_input(input, INCOMPRESSIBLE_NAVIER_STOKES, density)?,
        })
    }

    pub fn density(&self) -> T {
        self.density
    }

    pub fn viscosity(&self) -> &Viscosity<T> {
        &self.viscosity
    }

    pub fn velocity_variables(&self) -> &VelocityVariables {
        &self.velocity
    }

    pub fn pressure_variable(&self) -> &PressureVariable {
        &self.pressure
    }
}

impl<T: Real> Physics<T> for IncompressibleNavierStokes<T> {
    fn name(&self) -> &str {
        INCOMPRESSIBLE_NAVIER_STOKES
    }

    fn init_variables(&mut self, system: &mut System) -> eyre::Result<()> {
        self.velocity.init(system);
        self.pressure.init(system);
        self.viscosity.init_variables(system);
        Ok(())
    }

    fn set_time_evolving_vars(&self, system: &mut System) {
        for &u in self.velocity.components() {
            system.set_time_evolving(u);
        }
    }

    fn element_time_derivative(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        let (state, buffers) = context.split_mut();
        let components = self.velocity.components();
        let p_var = self.pressure.p();
        let fe = state.fe(self.velocity.u());
        let fe_p = state.fe(p_var);
        let n = fe.n_dofs();
        let rho = self.density;

        for qp in 0..state.n_qpoints() {
            let jxw = fe.jxw(qp);
            let mu = self.viscosity.evaluate(state, qp, fe.xyz(qp))?;
            let p = state.interior_value(p_var, qp);

            let mut velocity = Vector3::zeros();
            let mut grad_u = Matrix3::zeros();
            for (a, &u) in components.iter().enumerate() {
                velocity[a] = state.interior_value(u, qp);
                grad_u.set_row(a, &state.interior_gradient(u, qp).transpose());
            }
            // (U . grad) U
            let convection = grad_u * velocity;

            for (a, &u_a) in components.iter().enumerate() {
                let grad_u_a = grad_u.row(a).transpose();
                for i in 0..n {
                    let phi_i = fe.phi(i, qp);
                    let dphi_i = fe.dphi(i, qp);
                    let value = -rho * convection[a] * phi_i - mu * grad_u_a.dot(dphi_i) + p * dphi_i[a];
                    buffers.add_residual(u_a, i, value * jxw);
                }
            }

            if compute_jacobian {
                let factor = jxw * state.solution_derivative();
                for j in 0..n {
                    let phi_j = fe.phi(j, qp);
                    let dphi_j = fe.dphi(j, qp);
                    let advection_j = velocity.dot(dphi_j);
                    for i in 0..n {
                        let phi_i = fe.phi(i, qp);
                        let dphi_i = fe.dphi(i, qp);
                        let diagonal = -rho * advection_j * phi_i - mu * dphi_j.dot(dphi_i);
                        for (a, &u_a) in components.iter().enumerate() {
                            for (b, &u_b) in components.iter().enumerate() {
                                let mut value = -rho * phi_j * grad_u[(a, b)] * phi_i;
                                if a == b {
                                    value += diagonal;
                                }
                                buffers.add_jacobian(u_a, u_b, i, j, value * factor);
                            }
                        }
                    }
                }

                for j in 0..fe_p.n_dofs() {
                    let psi_j = fe_p.phi(j, qp);
                    for (a, &u_a) in components.iter().enumerate() {
                        for i in 0..n {
                            buffers.add_jacobian(u_a, p_var, i, j, psi_j * fe.dphi(i, qp)[a] * factor);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn element_constraint(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        let (state, buffers) = context.split_mut();
        let components = self.velocity.components();
        let p_var = self.pressure.p();
        let fe = state.fe(self.velocity.u());
        let fe_p = state.fe(p_var);

        for qp in 0..state.n_qpoints() {
            let jxw = fe_p.jxw(qp);
            let divergence = components
                .iter()
                .enumerate()
                .fold(T::zero(), |div, (a, &u)| div + state.interior_gradient(u, qp)[a]);

            for i in 0..fe_p.n_dofs() {
                buffers.add_residual(p_var, i, divergence * fe_p.phi(i, qp) * jxw);
            }

            if compute_jacobian {
                let factor = jxw * state.solution_derivative();
                for i in 0..fe_p.n_dofs() {
                    let psi_i = fe_p.phi(i, qp);
                    for j in 0..fe.n_dofs() {
                        for (b, &u_b) in components.iter().enumerate() {
                            buffers.add_jacobian(p_var, u_b, i, j, fe.dphi(j, qp)[b] * psi_i * factor);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn mass_residual(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        let (state, buffers) = context.split_mut();
        let components = self.velocity.components();
        let fe = state.fe(self.velocity.u());
        let n = fe.n_dofs();
        let rho = self.density;

        for qp in 0..state.n_qpoints() {
            let jxw = fe.jxw(qp);
            for &u in components {
                let u_dot = state.interior_rate(u, qp);
                for i in 0..n {
                    buffers.add_residual(u, i, -rho * u_dot * fe.phi(i, qp) * jxw);
                }
                if compute_jacobian {
                    let factor = jxw * state.solution_rate_derivative();
                    for i in 0..n {
                        for j in 0..n {
                            buffers.add_jacobian(u, u, i, j, -rho * fe.phi(i, qp) * fe.phi(j, qp) * factor);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn jacobian_model(&self) -> JacobianModel {
        if self.viscosity.is_turbulent() {
            JacobianModel::Approximate("turbulent viscosity is held fixed")
        } else {
            JacobianModel::Exact
        }
    }
}
