//! The element-level interface between a host framework and the physics kernels.
//!
//! A host framework evaluates shape functions and quadrature (see [`ElementFeValues`]),
//! gathers the element-local solution and builds an [`AssemblyContext`]. Physics modules
//! read the [`ElementState`] and accumulate into the [`ElementBuffers`]; scattering the
//! buffers into global structures is left to the host.
mod context;
mod fe_values;

pub use context::*;
pub use fe_values::*;
