//! Physics modules and the registry that owns them.
//!
//! Every governing equation or load is a type implementing [`Physics`]. The host framework
//! builds a [`PhysicsRegistry`] once at problem setup through a [`PhysicsFactory`], and then
//! hands every element's [`AssemblyContext`] to the registry, which calls each enabled module
//! in turn.
use crate::assembly::{AssemblyContext, FeRequests};
use crate::error::ConfigurationError;
use crate::input::Input;
use crate::nalgebra::convert;
use crate::variables::System;
use crate::Real;
use eyre::WrapErr;
use log::info;
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

mod averaged_fan;
mod incompressible_navier_stokes;
mod spalart_allmaras;
mod stabilization;

pub use averaged_fan::*;
pub use incompressible_navier_stokes::*;
pub use spalart_allmaras::*;
pub use stabilization::*;

/// How faithfully a module's Jacobian linearizes its residual.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JacobianModel {
    /// The exact derivative of the residual.
    Exact,
    /// A deliberate approximation, with a description of what is neglected.
    Approximate(&'static str),
    /// Requesting a Jacobian is an error.
    NotImplemented,
}

impl Display for JacobianModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Approximate(description) => write!(f, "approximate ({description})"),
            Self::NotImplemented => write!(f, "not implemented"),
        }
    }
}

/// A governing equation or load that contributes to element residuals and Jacobians.
///
/// The three assembly entry points add into the buffers of the context. When
/// `compute_jacobian` is true, each contribution to the residual is linearized with respect
/// to the element solution, scaled by the solution derivative factors of the context. An
/// error returned from an entry point leaves the buffers in an unspecified state, and the
/// host must not scatter them.
pub trait Physics<T: Real>: Send + Sync {
    fn name(&self) -> &str;

    /// Registers the variables of the module with the system.
    fn init_variables(&mut self, system: &mut System) -> eyre::Result<()>;

    /// Marks the variables whose time derivatives appear in the mass residual.
    fn set_time_evolving_vars(&self, _system: &mut System) {}

    /// Requests element data beyond shape function values and gradients.
    fn init_context(&self, _requests: &mut FeRequests) {}

    fn element_time_derivative(&self, _compute_jacobian: bool, _context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        Ok(())
    }

    fn element_constraint(&self, _compute_jacobian: bool, _context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        Ok(())
    }

    fn mass_residual(&self, _compute_jacobian: bool, _context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        Ok(())
    }

    fn jacobian_model(&self) -> JacobianModel {
        JacobianModel::Exact
    }
}

struct RegisteredPhysics<T: Real> {
    physics: Arc<dyn Physics<T>>,
    any: Arc<dyn Any + Send + Sync>,
    requests: FeRequests,
}

/// The enabled physics modules of a problem, in the order they were added.
pub struct PhysicsRegistry<T: Real> {
    modules: Vec<RegisteredPhysics<T>>,
}

impl<T: Real> Default for PhysicsRegistry<T> {
    fn default() -> Self {
        Self { modules: Vec::new() }
    }
}

impl<T: Real> fmt::Debug for PhysicsRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsRegistry")
            .field("modules", &self.modules.iter().map(|m| m.physics.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl<T: Real> PhysicsRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes the module's variables and takes ownership of it.
    ///
    /// Returns a shared handle to the module, which decorators may hold on to.
    pub fn add<P>(&mut self, mut physics: P, system: &mut System) -> eyre::Result<Arc<P>>
    where
        P: Physics<T> + 'static,
    {
        physics
            .init_variables(system)
            .wrap_err_with(|| format!("failed to initialize variables of {}", physics.name()))?;
        physics.set_time_evolving_vars(system);
        let mut requests = FeRequests::new();
        physics.init_context(&mut requests);

        info!(
            "Enabled physics {} (Jacobian: {})",
            physics.name(),
            physics.jacobian_model()
        );
        let physics = Arc::new(physics);
        self.modules.push(RegisteredPhysics {
            physics: physics.clone(),
            any: physics.clone(),
            requests,
        });
        Ok(physics)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.physics.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.physics.name())
    }

    pub fn physics(&self, name: &str) -> Option<&Arc<dyn Physics<T>>> {
        self.modules
            .iter()
            .find(|m| m.physics.name() == name)
            .map(|m| &m.physics)
    }

    /// Looks up a module by name and concrete type.
    pub fn get<P>(&self, name: &str) -> Option<Arc<P>>
    where
        P: Send + Sync + 'static,
    {
        self.modules
            .iter()
            .find(|m| m.physics.name() == name)
            .and_then(|m| m.any.clone().downcast::<P>().ok())
    }

    /// The union of the element data requested by all modules.
    pub fn fe_requests(&self) -> FeRequests {
        let mut requests = FeRequests::new();
        for module in &self.modules {
            requests.extend(&module.requests);
        }
        requests
    }

    pub fn element_time_derivative(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        for module in &self.modules {
            context.validate_requests(&module.requests, module.physics.name())?;
            module
                .physics
                .element_time_derivative(compute_jacobian, context)?;
        }
        Ok(())
    }

    pub fn element_constraint(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        for module in &self.modules {
            context.validate_requests(&module.requests, module.physics.name())?;
            module.physics.element_constraint(compute_jacobian, context)?;
        }
        Ok(())
    }

    pub fn mass_residual(&self, compute_jacobian: bool, context: &mut AssemblyContext<T>) -> eyre::Result<()> {
        for module in &self.modules {
            context.validate_requests(&module.requests, module.physics.name())?;
            module.physics.mass_residual(compute_jacobian, context)?;
        }
        Ok(())
    }
}

type PhysicsBuilder<T> = Box<dyn Fn(&Input, &mut System, &mut PhysicsRegistry<T>) -> eyre::Result<()> + Send + Sync>;

struct FactoryEntry<T: Real> {
    depends_on: Vec<String>,
    builder: PhysicsBuilder<T>,
}

/// Builds physics modules by name from a configuration source.
///
/// The modules to build are listed in `Physics/enabled_physics`. A module is built after the
/// modules it depends on, regardless of the order in the list.
pub struct PhysicsFactory<T: Real> {
    entries: FxHashMap<String, FactoryEntry<T>>,
}

impl<T: Real> Default for PhysicsFactory<T> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<T: Real> PhysicsFactory<T> {
    /// A factory without any registered builders.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory that knows the flow physics of this crate.
    pub fn with_flow_physics() -> Self {
        let mut factory = Self::new();
        factory.register(INCOMPRESSIBLE_NAVIER_STOKES, &[], |input, system, registry| {
            registry.add(IncompressibleNavierStokes::from_input(input)?, system)?;
            Ok(())
        });
        factory.register(SPALART_ALLMARAS, &[], |input, system, registry| {
            registry.add(SpalartAllmaras::from_input(input)?, system)?;
            Ok(())
        });
        factory.register(
            SPALART_ALLMARAS_SPGSM_STABILIZATION,
            &[SPALART_ALLMARAS],
            |input, system, registry| {
                let base = registry
                    .get::<SpalartAllmaras<T>>(SPALART_ALLMARAS)
                    .ok_or_else(|| ConfigurationError::MissingDependency {
                        module: SPALART_ALLMARAS_SPGSM_STABILIZATION.to_string(),
                        dependency: SPALART_ALLMARAS.to_string(),
                    })?;
                let stabilization = SpgsmStabilization::from_input(SPALART_ALLMARAS_SPGSM_STABILIZATION, base, input)?;
                registry.add(stabilization, system)?;
                Ok(())
            },
        );
        factory.register(AVERAGED_FAN, &[], |input, system, registry| {
            registry.add(AveragedFan::from_input(input)?, system)?;
            Ok(())
        });
        factory
    }

    /// Registers a builder under the given name, replacing any previous builder.
    pub fn register<F>(&mut self, name: &str, depends_on: &[&str], builder: F)
    where
        F: Fn(&Input, &mut System, &mut PhysicsRegistry<T>) -> eyre::Result<()> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.to_string(),
            FactoryEntry {
                depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
                builder: Box::new(builder),
            },
        );
    }

    pub fn knows(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Builds every module listed in `Physics/enabled_physics`.
    pub fn build(&self, input: &Input, system: &mut System) -> eyre::Result<PhysicsRegistry<T>> {
        input.ensure_recognized("Physics", &["enabled_physics"])?;
        let enabled = input
            .list("Physics", "Physics/enabled_physics")?
            .ok_or_else(|| ConfigurationError::MissingKey {
                module: "Physics".to_string(),
                key: "Physics/enabled_physics".to_string(),
            })?;

        for name in &enabled {
            let entry = self
                .entries
                .get(name)
                .ok_or_else(|| ConfigurationError::UnknownPhysics { name: name.clone() })?;
            for dependency in &entry.depends_on {
                if !enabled.contains(dependency) {
                    return Err(ConfigurationError::MissingDependency {
                        module: name.clone(),
                        dependency: dependency.clone(),
                    }
                    .into());
                }
            }
        }

        let mut registry = PhysicsRegistry::new();
        for name in &enabled {
            self.build_with_dependencies(name, input, system, &mut registry, &mut Vec::new())?;
        }
        Ok(registry)
    }

    fn build_with_dependencies(
        &self,
        name: &str,
        input: &Input,
        system: &mut System,
        registry: &mut PhysicsRegistry<T>,
        in_progress: &mut Vec<String>,
    ) -> eyre::Result<()> {
        if registry.contains(name) {
            return Ok(());
        }
        if in_progress.iter().any(|n| n == name) {
            return Err(eyre::eyre!("cyclic physics dependency involving {name}"));
        }
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownPhysics { name: name.to_string() })?;

        in_progress.push(name.to_string());
        for dependency in &entry.depends_on {
            self.build_with_dependencies(dependency, input, system, registry, in_progress)?;
        }
        in_progress.pop();

        (entry.builder)(input, system, registry).wrap_err_with(|| format!("failed to build physics {name}"))
    }
}

/// Reads the required density `Materials/Density/rho`.
pub fn density_from_input<T: Real>(input: &Input, module: &str) -> Result<T, ConfigurationError> {
    input.ensure_recognized("Materials/Density", &["rho"])?;
    let rho = input.require_number(module, "Materials/Density/rho")?;
    if rho > 0.0 {
        Ok(convert(rho))
    } else {
        Err(ConfigurationError::InvalidValue {
            module: module.to_string(),
            key: "Materials/Density/rho".to_string(),
            reason: format!("density must be positive, got {rho}"),
        })
    }
}
