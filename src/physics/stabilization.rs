use crate::assembly::{AssemblyContext, ElementState, FeRequests};
use crate::input::Input;
use crate::nalgebra::{convert, Matrix3, Vector3};
use crate::physics::{JacobianModel, Physics};
use crate::variables::{System, VariableIndex};
use crate::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SPALART_ALLMARAS_SPGSM_STABILIZATION: &str = "SpalartAllmarasSPGSMStabilization";

/// Pointwise strong form of a scalar advection-diffusion-reaction equation.
///
/// Implemented by physics modules that can be stabilized by [`SpgsmStabilization`]. The
/// strong residual must be evaluated from the same element state and quadrature points as
/// the weak form of the module.
pub trait StrongFormResidual<T: Real>: Physics<T> {
    /// The variable whose equation is stabilized.
    fn stabilized_variable(&self) -> VariableIndex;

    fn density(&self) -> T;

    fn advective_velocity(&self, state: &ElementState<T>, qp: usize) -> Vector3<T>;

    /// The effective diffusivity entering the stabilization parameter.
    fn diffusivity(&self, state: &ElementState<T>, qp: usize) -> eyre::Result<T>;

    /// Evaluates the steady strong residual at a quadrature point.
    ///
    /// If `derivative` is given, its entry `j` receives the derivative of the residual with
    /// respect to degree of freedom `j` of the stabilized variable, with the advective
    /// velocity held fixed.
    fn steady_residual(&self, state: &ElementState<T>, qp: usize, derivative: Option<&mut [T]>)
        -> eyre::Result<T>;

    /// The transient strong residual $\rho \dot{\nu}$.
    fn transient_residual(&self, state: &ElementState<T>, qp: usize) -> T {
        self.density() * state.interior_rate(self.stabilized_variable(), qp)
    }
}

/// Constants of the stabilization parameter $\tau$.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TauParameters<T> {
    /// Scales the diffusive contribution.
    pub tau_constant: T,
    /// Scales $\tau$ itself.
    pub tau_factor: T,
}

impl<T: Real> Default for TauParameters<T> {
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn default() -> Self {
        Self {
            tau_constant: 1.0,
            tau_factor: 0.5,
        }
    }
}

impl<T: Real> TauParameters<T> {
    /// Reads `Stabilization/tau_constant` and `Stabilization/tau_factor`.
    pub fn from_input(input: &Input, module: &str) -> eyre::Result<Self> {
        input.ensure_recognized("Stabilization", &["tau_constant", "tau_factor"])?;
        let defaults = Self::default();
        let read = |key: &str, default: T| -> eyre::Result<T> {
            Ok(input
                .number(module, key)?
                .map(convert)
                .unwrap_or(default))
        };
        Ok(Self {
            tau_constant: read("Stabilization/tau_constant", defaults.tau_constant)?,
            tau_factor: read("Stabilization/tau_factor", defaults.tau_factor)?,
        })
    }
}

/// Computes the stabilization parameter
/// <div>$$
/// \tau = \frac{\tau_\text{factor}}{\sqrt{(2 \rho / \Delta t)^2 + \rho^2 \vec U^T G \vec U
///     + C \kappa^2 G : G}},
/// $$</div>
/// where $G = J^{-T} J^{-1}$ is the metric tensor of the inverse element mapping and the
/// transient term is omitted for steady problems.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub fn stabilization_tau<T: Real>(
    parameters: &TauParameters<T>,
    density: T,
    velocity: &Vector3<T>,
    inverse_jacobian: &Matrix3<T>,
    diffusivity: T,
    timestep: Option<T>,
) -> T {
    let g = inverse_jacobian.transpose() * inverse_jacobian;
    let transient = timestep
        .map(|dt| (2.0 * density / dt).powi(2))
        .unwrap_or(0.0);
    let advective = density * density * velocity.dot(&(g * velocity));
    let diffusive = parameters.tau_constant * diffusivity * diffusivity * g.norm_squared();
    parameters.tau_factor / (transient + advective + diffusive).sqrt()
}

/// Streamline-upwind stabilization of a scalar equation.
///
/// For the test functions $\varphi_i$ of the stabilized variable, adds
/// $-\tau R (\rho \vec U \cdot \nabla \varphi_i)$ to the time derivative with the steady
/// strong residual $R$, and the same term with the transient residual to the mass residual.
/// The constraint has no stabilization contribution. Linearization holds $\tau$ and
/// $\vec U$ fixed.
pub struct SpgsmStabilization<T: Real, B> {
    name: String,
    base: Arc<B>,
    tau: TauParameters<T>,
}

impl<T: Real, B> SpgsmStabilization<T, B>
where
    B: StrongFormResidual<T>,
{
    pub fn new(name: impl Into<String>, base: Arc<B>, tau: TauParameters<T>) -> Self {
        Self {
            name: name.into(),
            base,
            tau,
        }
    }

    pub fn from_input(name: &str, base: Arc<B>, input: &Input) -> eyre::Result<Self> {
        let tau = TauParameters::from_input(input, name)?;
        Ok(Self::new(name, base, tau))
    }

    pub fn base(&self) -> &Arc<B> {
        &self.base
    }

    pub fn tau_parameters(&self) -> &TauParameters<T> {
        &self.tau
    }

    /// Evaluates $\tau$ and the advective velocity at a quadrature point.
    pub fn tau(&self, state: &ElementState<T>, qp: usize) -> eyre::Result<(T, Vector3<T>)> {
        let var = self.base.stabilized_variable();
        let velocity = self.base.advective_velocity(state, qp);
        let diffusivity = self.base.diffusivity(state, qp)?;
        let tau = stabilization_tau(
            &self.tau,
            self.base.density(),
            &velocity,
            state.fe(var).inverse_jacobian(qp),
            diffusivity,
            state.timestep(),
        );
        Ok((tau, velocity))
    }
}

impl<T: Real, B> Physics<T> for SpgsmStabilization<T, B>
where
    B: StrongFormResidual<T>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn init_variables(&mut self, _system: &mut System) -> eyre::Result<()> {
        Ok(())
    }

    fn init_context(&self, requests: &mut FeRequests) {
        requests.request_hessians(self.base.stabilized_variable());
    }

    fn element_time_derivative(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        let (state, buffers) = context.split_mut();
        let var = self.base.stabilized_variable();
        let fe = state.fe(var);
        let n = fe.n_dofs();
        let rho = self.base.density();
        let mut derivative = vec![T::zero(); n];

        for qp in 0..state.n_qpoints() {
            let jxw = fe.jxw(qp);
            let (tau, velocity) = self.tau(state, qp)?;
            let residual = self
                .base
                .steady_residual(state, qp, compute_jacobian.then_some(derivative.as_mut_slice()))?;

            for i in 0..n {
                let test = rho * velocity.dot(fe.dphi(i, qp));
                buffers.add_residual(var, i, -tau * residual * test * jxw);
                if compute_jacobian {
                    let factor = -tau * test * jxw * state.solution_derivative();
                    for (j, dr_j) in derivative.iter().enumerate() {
                        buffers.add_jacobian(var, var, i, j, *dr_j * factor);
                    }
                }
            }
        }
        Ok(())
    }

    fn element_constraint(&self, _compute_jacobian: bool, _context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        Ok(())
    }

    fn mass_residual(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        let (state, buffers) = context.split_mut();
        let var = self.base.stabilized_variable();
        let fe = state.fe(var);
        let n = fe.n_dofs();
        let rho = self.base.density();

        for qp in 0..state.n_qpoints() {
            let jxw = fe.jxw(qp);
            let (tau, velocity) = self.tau(state, qp)?;
            let residual = self.base.transient_residual(state, qp);

            for i in 0..n {
                let test = rho * velocity.dot(fe.dphi(i, qp));
                buffers.add_residual(var, i, -tau * residual * test * jxw);
                if compute_jacobian {
                    let factor = -tau * test * jxw * state.solution_rate_derivative();
                    for j in 0..n {
                        buffers.add_jacobian(var, var, i, j, rho * fe.phi(j, qp) * factor);
                    }
                }
            }
        }
        Ok(())
    }

    fn jacobian_model(&self) -> JacobianModel {
        JacobianModel::Approximate("stabilization parameter and advective velocity are held fixed")
    }
}
