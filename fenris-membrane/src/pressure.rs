use fenris_physics::assembly::AssemblyContext;
use fenris_physics::error::{AssemblyError, ConfigurationError};
use fenris_physics::input::Input;
use fenris_physics::nalgebra::{convert, Vector3};
use fenris_physics::physics::{JacobianModel, Physics};
use fenris_physics::variables::{DisplacementVariables, System};
use fenris_physics::Real;
use log::debug;
use parking_lot::RwLock;

pub const ELASTIC_MEMBRANE_CONSTANT_PRESSURE: &str = "ElasticMembraneConstantPressure";

const PRESSURE_KEY: &str = "Physics/ElasticMembraneConstantPressure/pressure";

/// A constant pressure that follows the deformed membrane.
///
/// With deformed covariant basis vectors $\vec A_\alpha = \partial \vec X / \partial \xi_\alpha
/// + \partial \vec u / \partial \xi_\alpha$, the traction is
/// <div>$$
/// \vec t = \frac{p}{\sqrt{a}} \vec A_1 \times \vec A_2,
/// $$</div>
/// where $a$ is the determinant of the reference metric. The normal is not normalized, since
/// $|\vec A_1 \times \vec A_2| = \sqrt{A}$ accounts for the change of area.
///
/// The linearization of the traction is not implemented, and requesting a Jacobian is an
/// error.
#[derive(Debug)]
pub struct ElasticMembraneConstantPressure<T> {
    displacement: DisplacementVariables,
    pressure: RwLock<T>,
}

impl<T: Real> ElasticMembraneConstantPressure<T> {
    pub fn new(pressure: T, displacement: DisplacementVariables) -> Self {
        Self {
            displacement,
            pressure: RwLock::new(pressure),
        }
    }

    /// Reads the required `Physics/ElasticMembraneConstantPressure/pressure`.
    pub fn from_input(input: &Input) -> Result<Self, ConfigurationError> {
        input.ensure_recognized("Physics/ElasticMembraneConstantPressure", &["pressure"])?;
        let pressure = input.require_number(ELASTIC_MEMBRANE_CONSTANT_PRESSURE, PRESSURE_KEY)?;
        Ok(Self::new(convert(pressure), DisplacementVariables::from_input(input)?))
    }

    pub fn pressure(&self) -> T {
        *self.pressure.read()
    }

    /// Changes the pressure for subsequent assembly.
    pub fn reset_pressure(&self, pressure: T) {
        debug!("Resetting membrane pressure to {pressure}");
        *self.pressure.write() = pressure;
    }

    pub fn displacement_variables(&self) -> &DisplacementVariables {
        &self.displacement
    }
}

impl<T: Real> Physics<T> for ElasticMembraneConstantPressure<T> {
    fn name(&self) -> &str {
        ELASTIC_MEMBRANE_CONSTANT_PRESSURE
    }

    fn init_variables(&mut self, system: &mut System) -> eyre::Result<()> {
        self.displacement.init(system);
        Ok(())
    }

    #[allow(non_snake_case)]
    fn element_time_derivative(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        if compute_jacobian {
            return Err(AssemblyError::JacobianNotImplemented {
                module: ELASTIC_MEMBRANE_CONSTANT_PRESSURE.to_string(),
            }
            .into());
        }

        let pressure = self.pressure();
        let (state, buffers) = context.split_mut();
        let components = self.displacement.components();
        let fe = state.fe(components[0]);

        for qp in 0..state.n_qpoints() {
            // Reference tangents dX/dxi and dX/deta
            let J = fe.reference_jacobian(qp);
            let dx_dxi: Vector3<T> = J.column(0).into_owned();
            let dx_deta: Vector3<T> = J.column(1).into_owned();
            let sqrt_a = (dx_dxi.norm_squared() * dx_deta.norm_squared() - dx_dxi.dot(&dx_deta).powi(2)).sqrt();

            // Displacement derivatives with respect to reference coordinates
            let mut du_dxi = Vector3::zeros();
            let mut du_deta = Vector3::zeros();
            for (k, &u_k) in components.iter().enumerate() {
                let grad = state.interior_reference_gradient(u_k, qp);
                du_dxi[k] = grad[0];
                du_deta[k] = grad[1];
            }

            let A_1 = dx_dxi + du_dxi;
            let A_2 = dx_deta + du_deta;
            let A_3 = A_1.cross(&A_2);
            let traction = A_3 * (pressure / sqrt_a);

            let jxw = fe.jxw(qp);
            for (k, &u_k) in components.iter().enumerate() {
                for i in 0..fe.n_dofs() {
                    buffers.add_residual(u_k, i, traction[k] * fe.phi(i, qp) * jxw);
                }
            }
        }
        Ok(())
    }

    fn jacobian_model(&self) -> JacobianModel {
        JacobianModel::NotImplemented
    }
}
