//! System variables and the groupings physics modules use to address them.
//!
//! The host framework owns the [`System`], which hands out a [`VariableIndex`] per named
//! variable. The index doubles as the handle for the variable's degrees of freedom in every
//! [`AssemblyContext`](crate::assembly::AssemblyContext) the host builds.
use crate::error::ConfigurationError;
use crate::input::Input;
use log::debug;
use serde::{Deserialize, Serialize};

/// Handle of a variable in a [`System`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableIndex(usize);

impl VariableIndex {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SystemVariable {
    name: String,
    time_evolving: bool,
}

/// The registry of variables of a discrete system.
///
/// Adding a variable whose name already exists returns the existing handle, so that two
/// physics modules that share a field (for example velocity) also share its degrees of
/// freedom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct System {
    dimension: usize,
    variables: Vec<SystemVariable>,
}

impl System {
    /// Creates an empty system for the given spatial dimension.
    ///
    /// # Panics
    ///
    /// Panics if the dimension is not 2 or 3.
    pub fn new(dimension: usize) -> Self {
        assert!(
            dimension == 2 || dimension == 3,
            "Spatial dimension must be 2 or 3, got {dimension}."
        );
        Self {
            dimension,
            variables: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn add_variable(&mut self, name: &str) -> VariableIndex {
        if let Some(existing) = self.variable(name) {
            return existing;
        }
        self.variables.push(SystemVariable {
            name: name.to_string(),
            time_evolving: false,
        });
        let index = VariableIndex(self.variables.len() - 1);
        debug!("Registered variable `{name}` as {index:?}");
        index
    }

    pub fn variable(&self, name: &str) -> Option<VariableIndex> {
        self.variables
            .iter()
            .position(|var| var.name == name)
            .map(VariableIndex)
    }

    /// # Panics
    ///
    /// Panics if the index does not belong to this system.
    pub fn variable_name(&self, var: VariableIndex) -> &str {
        &self.variables[var.0].name
    }

    pub fn set_time_evolving(&mut self, var: VariableIndex) {
        self.variables[var.0].time_evolving = true;
    }

    pub fn is_time_evolving(&self, var: VariableIndex) -> bool {
        self.variables[var.0].time_evolving
    }
}

/// An ordered collection of logical field names and their handles.
///
/// The names are known at construction. The handles become available once
/// [`init`](Self::init) has registered the names with a [`System`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableGrouping {
    names: Vec<String>,
    indices: Vec<VariableIndex>,
}

impl VariableGrouping {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            indices: Vec::new(),
        }
    }

    /// Registers the first `count` names with the system.
    pub fn init(&mut self, system: &mut System, count: usize) {
        self.indices = self
            .names
            .iter()
            .take(count)
            .map(|name| system.add_variable(name))
            .collect();
    }

    pub fn is_initialized(&self) -> bool {
        !self.indices.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The registered handles, in the order of the names.
    ///
    /// Empty until [`init`](Self::init) has been called.
    pub fn indices(&self) -> &[VariableIndex] {
        &self.indices
    }

    pub fn index_of(&self, name: &str) -> Option<VariableIndex> {
        self.names
            .iter()
            .zip(&self.indices)
            .find(|(n, _)| *n == name)
            .map(|(_, idx)| *idx)
    }

    fn handle(&self, i: usize) -> VariableIndex {
        *self
            .indices
            .get(i)
            .unwrap_or_else(|| panic!("Variable `{}` used before init_variables.", self.names[i]))
    }
}

const VARIABLE_NAME_KEYS: [&str; 8] = [
    "u_velocity",
    "v_velocity",
    "w_velocity",
    "pressure",
    "turbulent_viscosity",
    "u_displacement",
    "v_displacement",
    "w_displacement",
];

/// Reads the name of a variable from `Physics/VariableNames`, rejecting unknown keys in that section.
fn variable_name(input: &Input, key: &str, default: &str) -> Result<String, ConfigurationError> {
    input.ensure_recognized("Physics/VariableNames", &VARIABLE_NAME_KEYS)?;
    Ok(input
        .text_or("VariableNames", &format!("Physics/VariableNames/{key}"), default)?
        .to_string())
}

/// Velocity components `u`, `v` and (in 3D) `w`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VelocityVariables(VariableGrouping);

impl VelocityVariables {
    pub fn from_input(input: &Input) -> Result<Self, ConfigurationError> {
        Ok(Self(VariableGrouping::new(vec![
            variable_name(input, "u_velocity", "u")?,
            variable_name(input, "v_velocity", "v")?,
            variable_name(input, "w_velocity", "w")?,
        ])))
    }

    pub fn init(&mut self, system: &mut System) {
        let dim = system.dimension();
        self.0.init(system, dim);
    }

    pub fn u(&self) -> VariableIndex {
        self.0.handle(0)
    }

    pub fn v(&self) -> VariableIndex {
        self.0.handle(1)
    }

    pub fn w(&self) -> Option<VariableIndex> {
        self.0.indices().get(2).copied()
    }

    /// Handles of the velocity components, one per spatial dimension.
    pub fn components(&self) -> &[VariableIndex] {
        self.0.indices()
    }

    pub fn grouping(&self) -> &VariableGrouping {
        &self.0
    }
}

/// The pressure variable `p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressureVariable(VariableGrouping);

impl PressureVariable {
    pub fn from_input(input: &Input) -> Result<Self, ConfigurationError> {
        Ok(Self(VariableGrouping::new(vec![variable_name(input, "pressure", "p")?])))
    }

    pub fn init(&mut self, system: &mut System) {
        self.0.init(system, 1);
    }

    pub fn p(&self) -> VariableIndex {
        self.0.handle(0)
    }
}

/// The Spalart-Allmaras working variable `nu`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurbulenceVariables(VariableGrouping);

impl TurbulenceVariables {
    pub fn from_input(input: &Input) -> Result<Self, ConfigurationError> {
        Ok(Self(VariableGrouping::new(vec![variable_name(
            input,
            "turbulent_viscosity",
            "nu",
        )?])))
    }

    pub fn init(&mut self, system: &mut System) {
        self.0.init(system, 1);
    }

    pub fn nu(&self) -> VariableIndex {
        self.0.handle(0)
    }
}

/// Displacement components of a membrane embedded in three dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplacementVariables(VariableGrouping);

impl DisplacementVariables {
    pub fn from_input(input: &Input) -> Result<Self, ConfigurationError> {
        Ok(Self(VariableGrouping::new(vec![
            variable_name(input, "u_displacement", "u")?,
            variable_name(input, "v_displacement", "v")?,
            variable_name(input, "w_displacement", "w")?,
        ])))
    }

    /// Registers all three components, regardless of the dimension of the system.
    pub fn init(&mut self, system: &mut System) {
        self.0.init(system, 3);
    }

    pub fn components(&self) -> [VariableIndex; 3] {
        [self.0.handle(0), self.0.handle(1), self.0.handle(2)]
    }
}
