use crate::{flow_input, unit_cube_nodes};
use fenris_physics::assembly::AssemblyContext;
use fenris_physics::physics::{PhysicsFactory, PhysicsRegistry, SPALART_ALLMARAS, SPALART_ALLMARAS_SPGSM_STABILIZATION};
use fenris_physics::variables::System;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector, Point3, Vector3};
use rayon::prelude::*;
use util::{hex8_fe_values, shared_element_context};

const N_ELEMENTS: usize = 12;
const N_VARIABLES: usize = 4;
// Nodes of a row of unit cubes along x
const N_NODES: usize = 4 * (N_ELEMENTS + 1);

fn turbulence_registry() -> PhysicsRegistry<f64> {
    let input = flow_input().with(
        "Physics/enabled_physics",
        [SPALART_ALLMARAS, SPALART_ALLMARAS_SPGSM_STABILIZATION],
    );
    PhysicsFactory::with_flow_physics()
        .build(&input, &mut System::new(3))
        .unwrap()
}

fn element_nodes(element: usize) -> Vec<Point3<f64>> {
    unit_cube_nodes()
        .iter()
        .map(|x| x + Vector3::new(element as f64, 0.0, 0.0))
        .collect()
}

fn global_node(x: &Point3<f64>) -> usize {
    4 * (x.x.round() as usize) + 2 * (x.y.round() as usize) + x.z.round() as usize
}

/// The element-local to global degree of freedom map, variable by variable.
fn dof_map(element: usize) -> Vec<usize> {
    let nodes = element_nodes(element);
    (0..N_VARIABLES)
        .flat_map(|var| nodes.iter().map(move |x| var * N_NODES + global_node(x)))
        .collect()
}

fn element_context(element: usize) -> AssemblyContext<f64> {
    let nodes = element_nodes(element);
    let fields: [fn(&Point3<f64>) -> f64; N_VARIABLES] = [
        |x| -(x.y - 0.5) + 0.02 * x.x,
        |x| 0.3 * (x.x * 0.5).sin(),
        |x| 0.1 * x.z - 0.05 * x.y,
        |x| 0.1 + 0.02 * x.x + 0.03 * x.y * x.z,
    ];
    let solution = DVector::from_iterator(
        N_VARIABLES * 8,
        fields.iter().flat_map(|f| nodes.iter().map(f)),
    );
    let min = [element as f64, 0.0, 0.0];
    let max = [element as f64 + 1.0, 1.0, 1.0];
    shared_element_context(hex8_fe_values(min, max), N_VARIABLES, solution)
        .with_timestep(0.05)
        .with_time(0.2)
}

fn assemble(registry: &PhysicsRegistry<f64>, element: usize) -> (DVector<f64>, DMatrix<f64>) {
    let mut context = element_context(element);
    registry
        .element_time_derivative(true, &mut context)
        .unwrap();
    registry.mass_residual(true, &mut context).unwrap();
    (context.buffers().residual().clone(), context.buffers().jacobian().clone())
}

fn scatter(element_residuals: &[DVector<f64>]) -> DVector<f64> {
    let mut global = DVector::zeros(N_VARIABLES * N_NODES);
    for (element, residual) in element_residuals.iter().enumerate() {
        for (local, global_dof) in dof_map(element).into_iter().enumerate() {
            global[global_dof] += residual[local];
        }
    }
    global
}

#[test]
fn parallel_element_assembly_matches_serial() {
    let registry = turbulence_registry();

    let serial: Vec<_> = (0..N_ELEMENTS)
        .map(|element| assemble(&registry, element))
        .collect();
    let parallel: Vec<_> = (0..N_ELEMENTS)
        .into_par_iter()
        .map(|element| assemble(&registry, element))
        .collect();

    for ((r_serial, j_serial), (r_parallel, j_parallel)) in serial.iter().zip(&parallel) {
        assert_eq!(r_serial, r_parallel);
        assert_eq!(j_serial, j_parallel);
    }

    let serial_residuals: Vec<_> = serial.into_iter().map(|(r, _)| r).collect();
    let parallel_residuals: Vec<_> = parallel.into_iter().map(|(r, _)| r).collect();
    let global = scatter(&serial_residuals);
    assert_matrix_eq!(global, scatter(&parallel_residuals), comp = abs, tol = 0.0);
    assert!(global.iter().all(|r| r.is_finite()));
    assert!(global.amax() > 0.0);
}

#[test]
fn shared_modules_assemble_concurrently() {
    let registry = turbulence_registry();
    let reference = assemble(&registry, 3);

    // Every thread assembles the same element through the same registry
    let results: Vec<_> = (0..64)
        .into_par_iter()
        .map(|_| assemble(&registry, 3))
        .collect();
    for result in results {
        assert_eq!(result, reference);
    }
}

#[test]
fn dof_map_shares_nodes_between_neighbours() {
    let first = dof_map(0);
    let second = dof_map(1);
    // Nodes 1, 2, 5 and 6 of an element are nodes 0, 3, 4 and 7 of its right neighbour
    for (left, right) in [(1, 0), (2, 3), (5, 4), (6, 7)] {
        for var in 0..N_VARIABLES {
            assert_eq!(first[8 * var + left], second[8 * var + right]);
        }
    }
    let max_dof = (0..N_ELEMENTS)
        .flat_map(dof_map)
        .max()
        .unwrap();
    assert_eq!(max_dof, N_VARIABLES * N_NODES - 1);
}
