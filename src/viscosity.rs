//! Viscosity closures for incompressible flow.
//!
//! A problem picks one closure from a closed set at configuration time. The molecular part is
//! either constant or a parsed function of space and time. The Spalart-Allmaras closure adds
//! the eddy viscosity $\rho \nu^+ f_{v1}(\chi)$ on top of the molecular viscosity.
use crate::assembly::ElementState;
use crate::error::ConfigurationError;
use crate::function::{FieldFunction, ParsedFunction};
use crate::input::{Input, InputValue};
use crate::nalgebra::{convert, Point3};
use crate::turbulence::{fv1, SpalartAllmarasParameters};
use crate::variables::{System, TurbulenceVariables, VariableIndex};
use crate::Real;

const VISCOSITY_KEY: &str = "Materials/Viscosity/mu";
const VISCOSITY_MODEL_KEY: &str = "Physics/IncompressibleNavierStokes/viscosity_model";

/// The molecular (dynamic) viscosity $\mu$.
#[derive(Debug, Clone, PartialEq)]
pub enum MolecularViscosity<T> {
    Constant(T),
    Parsed(ParsedFunction),
}

impl<T: Real> MolecularViscosity<T> {
    /// Reads `Materials/Viscosity/mu`. A number gives a constant viscosity, text is parsed
    /// as an expression in `x`, `y`, `z` and `t`.
    pub fn from_input(input: &Input, module: &str) -> Result<Self, ConfigurationError> {
        input.ensure_recognized("Materials/Viscosity", &["mu"])?;
        match input.get(VISCOSITY_KEY) {
            None => Err(ConfigurationError::MissingKey {
                module: module.to_string(),
                key: VISCOSITY_KEY.to_string(),
            }),
            Some(InputValue::Number(mu)) => Ok(Self::Constant(convert(*mu))),
            Some(InputValue::Text(expression)) => {
                let function = ParsedFunction::parse(expression).map_err(|err| ConfigurationError::InvalidValue {
                    module: module.to_string(),
                    key: VISCOSITY_KEY.to_string(),
                    reason: err.to_string(),
                })?;
                Ok(Self::Parsed(function))
            }
            Some(_) => Err(ConfigurationError::InvalidValue {
                module: module.to_string(),
                key: VISCOSITY_KEY.to_string(),
                reason: "expected a number or an expression".to_string(),
            }),
        }
    }

    pub fn evaluate(&self, point: &Point3<T>, time: T) -> eyre::Result<T> {
        match self {
            Self::Constant(mu) => Ok(*mu),
            Self::Parsed(function) => function.evaluate_scalar(point, time),
        }
    }
}

/// The closed set of viscosity closures.
#[derive(Debug, Clone, PartialEq)]
pub enum Viscosity<T> {
    Constant(T),
    /// A spatially varying viscosity.
    Parsed(ParsedFunction),
    SpalartAllmaras(SpalartAllmarasViscosity<T>),
}

/// The turbulent viscosity $\mu_t = \mu + \rho \max(\nu, 0) f_{v1}(\chi)$ with $\chi = \rho \nu / \mu$.
#[derive(Debug, Clone, PartialEq)]
pub struct SpalartAllmarasViscosity<T> {
    molecular: MolecularViscosity<T>,
    density: T,
    parameters: SpalartAllmarasParameters<T>,
    turbulence: TurbulenceVariables,
}

impl<T: Real> SpalartAllmarasViscosity<T> {
    pub fn new(
        molecular: MolecularViscosity<T>,
        density: T,
        parameters: SpalartAllmarasParameters<T>,
        turbulence: TurbulenceVariables,
    ) -> Self {
        Self {
            molecular,
            density,
            parameters,
            turbulence,
        }
    }

    pub fn turbulent_viscosity_variable(&self) -> VariableIndex {
        self.turbulence.nu()
    }

    /// Evaluates the turbulent viscosity for a given value of the working variable.
    pub fn evaluate_with_nu(&self, point: &Point3<T>, time: T, nu: T) -> eyre::Result<T> {
        let mu = self.molecular.evaluate(point, time)?;
        let chi = self.density * nu / mu;
        let (fv1, _) = fv1(&self.parameters, chi);
        Ok(mu + self.density * nu.max(T::zero()) * fv1)
    }
}

impl<T: Real> Viscosity<T> {
    /// Builds the closure selected by `Physics/IncompressibleNavierStokes/viscosity_model`.
    ///
    /// Without an explicit model, the type of `Materials/Viscosity/mu` decides between a
    /// constant and a parsed viscosity. The turbulent closure needs the density and reads its
    /// model constants from `Physics/SpalartAllmaras`.
    pub fn from_input(input: &Input, module: &str, density: T) -> Result<Self, ConfigurationError> {
        let molecular = MolecularViscosity::from_input(input, module)?;
        let model = input.text(module, VISCOSITY_MODEL_KEY)?;
        match (model, molecular) {
            (None, MolecularViscosity::Constant(mu)) | (Some("constant"), MolecularViscosity::Constant(mu)) => {
                Ok(Self::Constant(mu))
            }
            (None, MolecularViscosity::Parsed(f)) | (Some("parsed"), MolecularViscosity::Parsed(f)) => {
                Ok(Self::Parsed(f))
            }
            // A constant is a valid spatially varying viscosity
            (Some("parsed"), MolecularViscosity::Constant(mu)) => Ok(Self::Constant(mu)),
            (Some("constant"), MolecularViscosity::Parsed(_)) => Err(ConfigurationError::InvalidValue {
                module: module.to_string(),
                key: VISCOSITY_KEY.to_string(),
                reason: "constant viscosity model requires a number".to_string(),
            }),
            (Some("spalart_allmaras"), molecular) => Ok(Self::SpalartAllmaras(SpalartAllmarasViscosity::new(
                molecular,
                density,
                SpalartAllmarasParameters::from_input(input)?,
                TurbulenceVariables::from_input(input)?,
            ))),
            (Some(other), _) => Err(ConfigurationError::InvalidValue {
                module: module.to_string(),
                key: VISCOSITY_MODEL_KEY.to_string(),
                reason: format!("unknown viscosity model `{other}`"),
            }),
        }
    }

    /// Registers the variables the closure depends on.
    pub fn init_variables(&mut self, system: &mut System) {
        if let Self::SpalartAllmaras(closure) = self {
            closure.turbulence.init(system);
        }
    }

    pub fn is_turbulent(&self) -> bool {
        matches!(self, Self::SpalartAllmaras(_))
    }

    /// The molecular viscosity at a point, ignoring any turbulent contribution.
    pub fn molecular(&self, point: &Point3<T>, time: T) -> eyre::Result<T> {
        match self {
            Self::Constant(mu) => Ok(*mu),
            Self::Parsed(function) => function.evaluate_scalar(point, time),
            Self::SpalartAllmaras(closure) => closure.molecular.evaluate(point, time),
        }
    }

    /// The effective viscosity at a quadrature point of an element.
    pub fn evaluate(&self, state: &ElementState<T>, qp: usize, point: &Point3<T>) -> eyre::Result<T> {
        let time = state.time();
        match self {
            Self::SpalartAllmaras(closure) => {
                let nu = state.interior_value(closure.turbulence.nu(), qp);
                closure.evaluate_with_nu(point, time, nu)
            }
            _ => self.molecular(point, time),
        }
    }
}
