use crate::{flow_input, nodal_values, turbulent_flow_context};
use fenris_physics::assembly::{AssemblyContext, ElementState};
use fenris_physics::error::AssemblyError;
use fenris_physics::input::Input;
use fenris_physics::physics::{
    stabilization_tau, JacobianModel, Physics, PhysicsFactory, PhysicsRegistry, SpalartAllmaras, SpgsmStabilization,
    StrongFormResidual, TauParameters, SPALART_ALLMARAS, SPALART_ALLMARAS_SPGSM_STABILIZATION,
};
use fenris_physics::variables::{System, VariableIndex};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DVector, Matrix3, Point3, Vector3};
use std::sync::Arc;
use util::{first_order_hex8_fe_values, hex8_fe_values, rate_jacobians, shared_element_context, solution_jacobians};

/// Steady advection-diffusion with constant coefficients,
/// $R = \rho \vec U \cdot \nabla c - k \Delta c - f(\vec x)$.
struct AdvectionDiffusion {
    var: Option<VariableIndex>,
    density: f64,
    velocity: Vector3<f64>,
    diffusivity: f64,
    source: fn(&Point3<f64>) -> f64,
}

impl AdvectionDiffusion {
    fn new(density: f64, velocity: Vector3<f64>, diffusivity: f64, source: fn(&Point3<f64>) -> f64) -> Self {
        let mut physics = Self {
            var: None,
            density,
            velocity,
            diffusivity,
            source,
        };
        physics.init_variables(&mut System::new(3)).unwrap();
        physics
    }
}

impl Physics<f64> for AdvectionDiffusion {
    fn name(&self) -> &str {
        "AdvectionDiffusion"
    }

    fn init_variables(&mut self, system: &mut System) -> eyre::Result<()> {
        self.var = Some(system.add_variable("c"));
        Ok(())
    }
}

impl StrongFormResidual<f64> for AdvectionDiffusion {
    fn stabilized_variable(&self) -> VariableIndex {
        self.var.unwrap()
    }

    fn density(&self) -> f64 {
        self.density
    }

    fn advective_velocity(&self, _state: &ElementState<f64>, _qp: usize) -> Vector3<f64> {
        self.velocity
    }

    fn diffusivity(&self, _state: &ElementState<f64>, _qp: usize) -> eyre::Result<f64> {
        Ok(self.diffusivity)
    }

    fn steady_residual(&self, state: &ElementState<f64>, qp: usize, derivative: Option<&mut [f64]>) -> eyre::Result<f64> {
        let var = self.stabilized_variable();
        let fe = state.fe(var);
        if let Some(derivative) = derivative {
            for (j, d) in derivative.iter_mut().enumerate() {
                *d = self.density * self.velocity.dot(fe.dphi(j, qp)) - self.diffusivity * fe.d2phi(j, qp).trace();
            }
        }
        let gradient = state.interior_gradient(var, qp);
        let laplacian = state.interior_hessian(var, qp).trace();
        Ok(self.density * self.velocity.dot(&gradient) - self.diffusivity * laplacian - (self.source)(fe.xyz(qp)))
    }
}

fn stabilized(base: AdvectionDiffusion) -> SpgsmStabilization<f64, AdvectionDiffusion> {
    SpgsmStabilization::new("AdvectionDiffusionStabilization", Arc::new(base), TauParameters::default())
}

fn unit_cube_context(values: Vec<f64>) -> AssemblyContext<f64> {
    shared_element_context(hex8_fe_values([0.0; 3], [1.0; 3]), 1, DVector::from_vec(values))
}

fn stabilized_spalart_allmaras() -> SpgsmStabilization<f64, SpalartAllmaras<f64>> {
    let mut sa = SpalartAllmaras::from_input(&flow_input()).unwrap();
    sa.init_variables(&mut System::new(3)).unwrap();
    SpgsmStabilization::new(SPALART_ALLMARAS_SPGSM_STABILIZATION, Arc::new(sa), TauParameters::default())
}

#[test]
fn tau_parameters_default_and_input() {
    let defaults = TauParameters::<f64>::default();
    assert_eq!(defaults.tau_constant, 1.0);
    assert_eq!(defaults.tau_factor, 0.5);

    let input = Input::new().with("Stabilization/tau_factor", 0.25);
    let params = TauParameters::<f64>::from_input(&input, SPALART_ALLMARAS_SPGSM_STABILIZATION).unwrap();
    assert_eq!(params.tau_constant, 1.0);
    assert_eq!(params.tau_factor, 0.25);

    let typo = Input::new().with("Stabilization/tau_fator", 0.25);
    assert!(TauParameters::<f64>::from_input(&typo, SPALART_ALLMARAS_SPGSM_STABILIZATION).is_err());
}

#[test]
fn tau_for_known_element_metric() {
    let params = TauParameters::default();
    let velocity = Vector3::new(1.0, 0.0, 0.0);
    // An element of size 0.5, for which G = 4 I
    let inverse_jacobian = Matrix3::identity() * 2.0;

    let steady = stabilization_tau(&params, 1.0, &velocity, &inverse_jacobian, 0.1, None);
    // U^T G U = 4 and G:G = 48
    assert_scalar_eq!(steady, 0.5 / (4.0f64 + 0.01 * 48.0).sqrt(), comp = abs, tol = 1e-14);

    let unsteady = stabilization_tau(&params, 1.0, &velocity, &inverse_jacobian, 0.1, Some(0.1));
    assert_scalar_eq!(unsteady, 0.5 / (400.0f64 + 4.0 + 0.01 * 48.0).sqrt(), comp = abs, tol = 1e-14);
    assert!(unsteady < steady);
}

#[test]
fn stabilization_requests_hessians_of_turbulence() {
    let stabilization = stabilized_spalart_allmaras();
    let mut requests = fenris_physics::assembly::FeRequests::new();
    stabilization.init_context(&mut requests);
    assert_eq!(requests.hessians(), &[stabilization.base().turbulence_variables().nu()]);
    assert!(matches!(stabilization.jacobian_model(), JacobianModel::Approximate(_)));
}

#[test]
fn stabilization_vanishes_for_zero_strong_residual() {
    let stabilization = stabilized_spalart_allmaras();
    let mut context = turbulent_flow_context().with_timestep(0.1);
    let mut solution = context.state().solution().clone();
    solution.rows_mut(24, 8).fill(0.0);
    context.set_solution(solution).unwrap();

    stabilization.element_time_derivative(true, &mut context).unwrap();
    stabilization.mass_residual(true, &mut context).unwrap();
    stabilization.element_constraint(true, &mut context).unwrap();
    assert_matrix_eq!(context.buffers().residual().clone(), DVector::<f64>::zeros(32), comp = abs, tol = 1e-14);
}

#[test]
fn constant_residual_is_weighted_by_streamline_derivative() {
    // c = 0 and f = -2 give R = 2 everywhere
    let stabilization = stabilized(AdvectionDiffusion::new(1.0, Vector3::x(), 0.1, |_| -2.0));
    let mut context = unit_cube_context(vec![0.0; 8]);
    stabilization
        .element_time_derivative(false, &mut context)
        .unwrap();

    // On the unit cube G = 4 I, so U^T G U = 4 and G:G = 48
    let tau = 0.5 / (4.0f64 + 0.01 * 48.0).sqrt();
    // The integral of d(phi_i)/dx over the cube is 1/4 for nodes on x = 1 and -1/4 on x = 0
    let expected = DVector::from_vec(nodal_values(|x| if x.x > 0.5 { -0.5 * tau } else { 0.5 * tau }));
    assert_matrix_eq!(context.buffers().residual().clone(), expected, comp = abs, tol = 1e-14);

    let (analytic, fd) = solution_jacobians(&context, 1e-6, |jac, ctx| stabilization.element_time_derivative(jac, ctx));
    assert_matrix_eq!(analytic, fd, comp = abs, tol = 1e-9);
}

#[test]
fn manufactured_solution_is_not_stabilized() {
    // c = 1 + xy + z/2 with U = (1, 2, 0) has U . grad c = y + 2x and vanishing Laplacian
    let stabilization = stabilized(AdvectionDiffusion::new(1.2, Vector3::new(1.0, 2.0, 0.0), 0.05, |x| {
        1.2 * (x.y + 2.0 * x.x)
    }));
    let values = nodal_values(|x| 1.0 + x.x * x.y + 0.5 * x.z);
    assert!(values.iter().all(|c| *c >= 1.0));
    let mut context = unit_cube_context(values).with_timestep(0.1);

    stabilization
        .element_time_derivative(true, &mut context)
        .unwrap();
    assert_matrix_eq!(context.buffers().residual().clone(), DVector::<f64>::zeros(8), comp = abs, tol = 1e-13);
    // The residual vanishes but its linearization does not
    assert!(context.buffers().jacobian().amax() > 0.0);
}

#[test]
fn spalart_allmaras_time_derivative_uses_streamline_test_function() {
    let stabilization = stabilized_spalart_allmaras();
    let context = turbulent_flow_context();
    let state = context.state();
    let base = stabilization.base();
    let nu = base.turbulence_variables().nu();
    let fe = state.fe(nu);

    let mut expected = DVector::<f64>::zeros(8);
    for qp in 0..state.n_qpoints() {
        let (tau, velocity) = stabilization.tau(state, qp).unwrap();
        let residual = base.steady_residual(state, qp, None).unwrap();
        for i in 0..8 {
            let test = base.density() * velocity.dot(fe.dphi(i, qp));
            expected[i] -= tau * residual * test * fe.jxw(qp);
        }
    }

    let mut context = context.clone();
    stabilization
        .element_time_derivative(false, &mut context)
        .unwrap();
    assert_matrix_eq!(
        context.buffers().residual_block(nu).clone_owned(),
        expected,
        comp = abs,
        tol = 1e-14
    );
}

#[test]
fn mass_residual_jacobian_matches_finite_differences() {
    let stabilization = stabilized_spalart_allmaras();
    let rate = DVector::from_fn(32, |i, _| 0.2 * (0.7 * i as f64).cos());
    let context = turbulent_flow_context()
        .with_timestep(0.05)
        .with_solution_rate(rate)
        .unwrap();

    let (analytic, fd) = rate_jacobians(&context, 1e-6, |jac, ctx| stabilization.mass_residual(jac, ctx));
    assert_matrix_eq!(analytic, fd, comp = abs, tol = 1e-9);
}

#[test]
fn time_derivative_jacobian_holds_tau_fixed() {
    let stabilization = stabilized_spalart_allmaras();
    let mut context = turbulent_flow_context();
    stabilization
        .element_time_derivative(true, &mut context)
        .unwrap();

    let state = context.state();
    let base = stabilization.base();
    let fe = state.fe(base.turbulence_variables().nu());
    let mut expected = nalgebra::DMatrix::<f64>::zeros(8, 8);
    let mut derivative = vec![0.0; 8];
    for qp in 0..state.n_qpoints() {
        let (tau, velocity) = stabilization.tau(state, qp).unwrap();
        base.steady_residual(state, qp, Some(derivative.as_mut_slice()))
            .unwrap();
        for i in 0..8 {
            let test = base.density() * velocity.dot(fe.dphi(i, qp));
            for j in 0..8 {
                expected[(i, j)] -= tau * derivative[j] * test * fe.jxw(qp);
            }
        }
    }
    let nu = base.turbulence_variables().nu();
    assert_matrix_eq!(
        context.buffers().jacobian_block(nu, nu).clone_owned(),
        expected,
        comp = abs,
        tol = 1e-14
    );
}

#[test]
fn registry_rejects_elements_without_second_derivatives() {
    let input = flow_input().with(
        "Physics/enabled_physics",
        [SPALART_ALLMARAS, SPALART_ALLMARAS_SPGSM_STABILIZATION],
    );
    let mut system = System::new(3);
    let registry: PhysicsRegistry<f64> = PhysicsFactory::with_flow_physics()
        .build(&input, &mut system)
        .unwrap();
    let nu = system.variable("nu").unwrap();
    assert_eq!(registry.fe_requests().hessians(), &[nu]);

    let fe = first_order_hex8_fe_values([0.0; 3], [1.0; 3]);
    let solution = turbulent_flow_context().state().solution().clone();
    let mut context = AssemblyContext::new(vec![fe], &[0, 0, 0, 0], solution).unwrap();

    let err = registry
        .element_time_derivative(false, &mut context)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AssemblyError>(),
        Some(AssemblyError::MissingElementData { .. })
    ));
}
