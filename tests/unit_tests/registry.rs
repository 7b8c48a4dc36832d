use crate::{flow_input, nodal_values, swirl_velocity, turbulence_field};
use fenris_physics::assembly::AssemblyContext;
use fenris_physics::error::ConfigurationError;
use fenris_physics::input::Input;
use fenris_physics::physics::{
    JacobianModel, Physics, PhysicsFactory, PhysicsRegistry, SpalartAllmaras, AVERAGED_FAN, INCOMPRESSIBLE_NAVIER_STOKES,
    SPALART_ALLMARAS, SPALART_ALLMARAS_SPGSM_STABILIZATION,
};
use fenris_physics::variables::System;
use matrixcompare::assert_matrix_eq;
use nalgebra::DVector;
use util::{hex8_fe_values, shared_element_context};

fn turbulent_flow_input() -> Input {
    flow_input()
        .with("Physics/IncompressibleNavierStokes/viscosity_model", "spalart_allmaras")
        .with("Physics/AveragedFan/base_velocity", "-y{}x{}0")
        .with("Physics/AveragedFan/local_vertical", "0{}0{}1")
        .with("Physics/AveragedFan/lift", "0.3 + t")
        .with("Physics/AveragedFan/drag", "0.05")
        .with("Physics/AveragedFan/chord_length", "0.1")
        .with("Physics/AveragedFan/area_swept", "3.0")
        .with("Physics/AveragedFan/angle_of_attack", "0.05")
        .with(
            "Physics/enabled_physics",
            [
                INCOMPRESSIBLE_NAVIER_STOKES,
                SPALART_ALLMARAS_SPGSM_STABILIZATION,
                SPALART_ALLMARAS,
                AVERAGED_FAN,
            ],
        )
}

fn build(input: &Input) -> eyre::Result<(PhysicsRegistry<f64>, System)> {
    let mut system = System::new(3);
    let registry = PhysicsFactory::with_flow_physics().build(input, &mut system)?;
    Ok((registry, system))
}

/// Velocity, pressure and turbulence on the unit cube, in the variable order of the system.
fn full_context() -> AssemblyContext<f64> {
    let mut solution = swirl_velocity();
    solution.extend(nodal_values(|x| x.x - x.z));
    solution.extend(turbulence_field());
    shared_element_context(hex8_fe_values([0.0; 3], [1.0; 3]), 5, DVector::from_vec(solution))
}

#[test]
fn dependencies_are_built_first() {
    let (registry, system) = build(&turbulent_flow_input()).unwrap();
    let names: Vec<_> = registry.names().collect();
    assert_eq!(
        names,
        vec![
            INCOMPRESSIBLE_NAVIER_STOKES,
            SPALART_ALLMARAS,
            SPALART_ALLMARAS_SPGSM_STABILIZATION,
            AVERAGED_FAN
        ]
    );
    assert_eq!(registry.len(), 4);
    assert_eq!(system.n_variables(), 5);
    for (index, name) in ["u", "v", "w", "p", "nu"].iter().enumerate() {
        assert_eq!(system.variable(name).map(|var| var.index()), Some(index));
    }
}

#[test]
fn modules_are_accessible_by_name_and_type() {
    let (registry, _) = build(&turbulent_flow_input()).unwrap();
    assert!(registry.contains(AVERAGED_FAN));
    assert!(registry.physics("Unknown").is_none());
    assert_eq!(
        registry.physics(SPALART_ALLMARAS).unwrap().jacobian_model(),
        JacobianModel::Approximate("velocity coupling through advection and vorticity is neglected")
    );

    let sa = registry
        .get::<SpalartAllmaras<f64>>(SPALART_ALLMARAS)
        .unwrap();
    assert!(!sa.has_velocity_coupling());
    assert!(registry
        .get::<SpalartAllmaras<f64>>(AVERAGED_FAN)
        .is_none());
}

#[test]
fn registry_assembly_is_sum_of_modules() {
    let (registry, _) = build(&turbulent_flow_input()).unwrap();
    let context = full_context().with_timestep(0.1);

    let mut combined = context.clone();
    registry
        .element_time_derivative(true, &mut combined)
        .unwrap();
    registry.element_constraint(true, &mut combined).unwrap();
    registry.mass_residual(true, &mut combined).unwrap();

    let mut expected_residual = DVector::<f64>::zeros(40);
    let mut expected_jacobian = nalgebra::DMatrix::<f64>::zeros(40, 40);
    for name in registry.names() {
        let physics = registry.physics(name).unwrap();
        let mut separate = context.clone();
        physics
            .element_time_derivative(true, &mut separate)
            .unwrap();
        physics.element_constraint(true, &mut separate).unwrap();
        physics.mass_residual(true, &mut separate).unwrap();
        expected_residual += separate.buffers().residual();
        expected_jacobian += separate.buffers().jacobian();
    }

    assert_matrix_eq!(combined.buffers().residual().clone(), expected_residual, comp = abs, tol = 1e-12);
    assert_matrix_eq!(combined.buffers().jacobian().clone(), expected_jacobian, comp = abs, tol = 1e-12);
}

#[test]
fn stabilization_requires_spalart_allmaras() {
    let input = flow_input().with("Physics/enabled_physics", [SPALART_ALLMARAS_SPGSM_STABILIZATION]);
    let err = build(&input).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ConfigurationError>(),
        Some(&ConfigurationError::MissingDependency {
            module: SPALART_ALLMARAS_SPGSM_STABILIZATION.to_string(),
            dependency: SPALART_ALLMARAS.to_string()
        })
    );
}

#[test]
fn unknown_physics_is_rejected() {
    let input = flow_input().with("Physics/enabled_physics", "SpalartAllmaras KOmegaSST");
    let err = build(&input).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ConfigurationError>(),
        Some(&ConfigurationError::UnknownPhysics {
            name: "KOmegaSST".to_string()
        })
    );
}

#[test]
fn enabled_physics_must_be_given() {
    let err = build(&flow_input()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigurationError>(),
        Some(ConfigurationError::MissingKey { key, .. }) if key == "Physics/enabled_physics"
    ));

    let typo = flow_input()
        .with("Physics/enabled_physics", [SPALART_ALLMARAS])
        .with("Physics/enabled_phyiscs", [AVERAGED_FAN]);
    assert!(matches!(
        build(&typo).unwrap_err().downcast_ref::<ConfigurationError>(),
        Some(ConfigurationError::UnrecognizedKeys { .. })
    ));
}

#[test]
fn construction_errors_name_the_failing_module() {
    let input = flow_input().with("Physics/enabled_physics", [SPALART_ALLMARAS, AVERAGED_FAN]);
    let err = build(&input).unwrap_err();
    assert!(format!("{err:#}").contains(AVERAGED_FAN));
    assert!(matches!(
        err.downcast_ref::<ConfigurationError>(),
        Some(ConfigurationError::MissingKey { module, .. }) if module == AVERAGED_FAN
    ));
}

#[test]
fn custom_physics_can_be_registered() {
    let mut factory = PhysicsFactory::<f64>::new();
    assert!(!factory.knows(SPALART_ALLMARAS));
    factory.register("Turbulence", &[], |input, system, registry| {
        registry.add(SpalartAllmaras::from_input(input)?, system)?;
        Ok(())
    });
    assert!(factory.knows("Turbulence"));

    let input = flow_input().with("Physics/enabled_physics", ["Turbulence"]);
    let mut system = System::new(3);
    let registry = factory.build(&input, &mut system).unwrap();
    assert!(registry.contains(SPALART_ALLMARAS));
}
