//! Hyperelastic membrane functionality for `fenris-physics`.
//!
//! Membranes are two-dimensional surfaces embedded in three dimensions, discretized with
//! three displacement components on surface elements.
use fenris_physics::nalgebra::Matrix3;
use fenris_physics::physics::PhysicsFactory;
use fenris_physics::Real;
use numeric_literals::replace_float_literals;

pub mod materials;
pub mod pressure;

pub use materials::MooneyRivlin;
pub use pressure::{ElasticMembraneConstantPressure, ELASTIC_MEMBRANE_CONSTANT_PRESSURE};

/// The principal invariants $(I_1, I_2, I_3)$ of a right Cauchy-Green tensor $\vec C$.
#[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
pub fn invariants<T: Real>(c: &Matrix3<T>) -> (T, T, T) {
    let i1 = c.trace();
    let i2 = 0.5 * (i1 * i1 - (c * c).trace());
    let i3 = c.determinant();
    (i1, i2, i3)
}

/// A hyperelastic strain energy expressed in terms of the invariants of $\vec C = \vec F^T \vec F$.
pub trait HyperelasticStrainEnergy<T: Real> {
    /// The strain energy density $W(I_1, I_2, I_3)$.
    fn energy_density(&self, i1: T, i2: T, i3: T) -> T;

    fn dw_di1(&self, i1: T, i2: T, i3: T) -> T;

    fn dw_di2(&self, i1: T, i2: T, i3: T) -> T;

    fn dw_di3(&self, _i1: T, _i2: T, _i3: T) -> T {
        T::zero()
    }

    /// Compute the second Piola-Kirchhoff stress
    /// <div>$$
    /// \vec S = 2 \left[ (W_1 + I_1 W_2) \vec I - W_2 \vec C + I_3 W_3 \vec C^{-1} \right],
    /// $$</div>
    /// where $W_k = \partial W / \partial I_k$.
    ///
    /// Returns `None` if the $I_3$ term is needed but $\vec C$ is singular.
    #[allow(non_snake_case)]
    #[replace_float_literals(T::from_f64(literal).expect("literal must fit in T"))]
    fn second_piola_kirchhoff_stress(&self, deformation_gradient: &Matrix3<T>) -> Option<Matrix3<T>> {
        let F = deformation_gradient;
        let C = F.transpose() * F;
        let (i1, i2, i3) = invariants(&C);
        let w1 = self.dw_di1(i1, i2, i3);
        let w2 = self.dw_di2(i1, i2, i3);
        let w3 = self.dw_di3(i1, i2, i3);

        let mut S = Matrix3::identity() * (w1 + i1 * w2) - C * w2;
        if w3 != 0.0 {
            S += C.try_inverse()? * (i3 * w3);
        }
        Some(S * 2.0)
    }

    /// The strain energy density as a function of the deformation gradient.
    fn energy_density_from_deformation(&self, deformation_gradient: &Matrix3<T>) -> T {
        let c = deformation_gradient.transpose() * deformation_gradient;
        let (i1, i2, i3) = invariants(&c);
        self.energy_density(i1, i2, i3)
    }
}

/// Registers the membrane physics of this crate with a factory.
pub fn register_membrane_physics<T: Real>(factory: &mut PhysicsFactory<T>) {
    factory.register(ELASTIC_MEMBRANE_CONSTANT_PRESSURE, &[], |input, system, registry| {
        registry.add(ElasticMembraneConstantPressure::from_input(input)?, system)?;
        Ok(())
    });
}
