//! Element-level residual and Jacobian kernels for turbulent incompressible flow and
//! hyperelastic membrane loads.
//!
//! The crate does not own meshes, solvers or shape function evaluation. A host framework
//! builds an [`AssemblyContext`](assembly::AssemblyContext) for each element and hands it
//! to the [`Physics`](physics::Physics) modules in a [`PhysicsRegistry`](physics::PhysicsRegistry),
//! which accumulate their contributions into the element residual and Jacobian buffers.
use nalgebra::RealField;

pub mod assembly;
pub mod error;
pub mod function;
pub mod input;
pub mod physics;
pub mod turbulence;
pub mod variables;
pub mod viscosity;

#[cfg(feature = "proptest")]
pub mod proptest;

pub extern crate nalgebra;

/// A real scalar type that is also `Copy`.
///
/// Used as a trait alias for the scalar bound of all kernels in this crate.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
