use fenris_membrane::{invariants, HyperelasticStrainEnergy, MooneyRivlin};
use fenris_physics::error::ConfigurationError;
use fenris_physics::input::Input;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DVector, Matrix3};
use proptest::prelude::*;
use util::approximate_jacobian_fd;

fn mooney_rivlin_input() -> Input {
    Input::new()
        .with("Physics/MooneyRivlin/C1", 0.3)
        .with("Physics/MooneyRivlin/C2", 0.1)
}

#[test]
fn mooney_rivlin_reads_both_constants() {
    let material = MooneyRivlin::<f64>::from_input(&mooney_rivlin_input()).unwrap();
    assert_eq!(material, MooneyRivlin::new(0.3, 0.1));
}

#[test]
fn mooney_rivlin_requires_c2() {
    let input = Input::new().with("Physics/MooneyRivlin/C1", 0.3);
    let err = MooneyRivlin::<f64>::from_input(&input).unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::MissingKey {
            module: "MooneyRivlin".to_string(),
            key: "Physics/MooneyRivlin/C2".to_string()
        }
    );
}

#[test]
fn mooney_rivlin_reads_exact_values() {
    let input = Input::new()
        .with("Physics/MooneyRivlin/C1", 1.0)
        .with("Physics/MooneyRivlin/C2", 0.5);
    let material = MooneyRivlin::<f64>::from_input(&input).unwrap();
    assert_eq!(material, MooneyRivlin::new(1.0, 0.5));
    // W = C1 (I1 - 3) + C2 (I2 - 3)
    assert_eq!(material.energy_density(4.0, 5.0, 1.0), 2.0);
}

#[test]
fn mooney_rivlin_reports_c1_first() {
    let err = MooneyRivlin::<f64>::from_input(&Input::new()).unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::MissingKey {
            module: "MooneyRivlin".to_string(),
            key: "Physics/MooneyRivlin/C1".to_string()
        }
    );
}

#[test]
fn mooney_rivlin_rejects_unknown_constants() {
    let input = mooney_rivlin_input().with("Physics/MooneyRivlin/C3", 1.0);
    let err = MooneyRivlin::<f64>::from_input(&input).unwrap_err();
    assert!(matches!(err, ConfigurationError::UnrecognizedKeys { .. }));
}

#[test]
fn invariants_of_diagonal_tensor() {
    let c = Matrix3::from_diagonal(&nalgebra::Vector3::new(1.0, 2.0, 3.0));
    let (i1, i2, i3) = invariants(&c);
    assert_scalar_eq!(i1, 6.0, comp = float);
    assert_scalar_eq!(i2, 11.0, comp = float);
    assert_scalar_eq!(i3, 6.0, comp = float);
}

#[test]
fn mooney_rivlin_stress_in_reference_configuration() {
    let material = MooneyRivlin::new(0.3, 0.1);
    let s = material
        .second_piola_kirchhoff_stress(&Matrix3::identity())
        .unwrap();
    // S = 2 (C1 + 2 C2) I at F = I
    assert_matrix_eq!(s, Matrix3::identity() * 1.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(
        material.energy_density_from_deformation(&Matrix3::identity()),
        0.0,
        comp = abs,
        tol = 1e-14
    );
}

proptest! {
    #[test]
    fn first_piola_kirchhoff_stress_is_energy_gradient(
        entries in proptest::collection::vec(-0.3..0.3f64, 9)
    ) {
        let material = MooneyRivlin::new(0.3, 0.1);
        let f = Matrix3::identity() + Matrix3::from_column_slice(&entries);
        let p = f * material.second_piola_kirchhoff_stress(&f).unwrap();

        let x = DVector::from_column_slice(f.as_slice());
        let dw_df = approximate_jacobian_fd(&x, 1e-6, |x| {
            let f = Matrix3::from_column_slice(x.as_slice());
            DVector::from_element(1, material.energy_density_from_deformation(&f))
        });
        let dw_df = Matrix3::from_column_slice(dw_df.as_slice());
        assert_matrix_eq!(p, dw_df, comp = abs, tol = 1e-6);
    }
}
