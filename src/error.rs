//! Error types reported by physics construction and element assembly.
//!
//! Fallible operations in this crate return [`eyre::Result`]. The errors defined here are
//! wrapped in an [`eyre::Report`] and can be recovered with
//! [`downcast_ref`](eyre::Report::downcast_ref) when the caller needs to tell the two
//! fatal classes apart.
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// A configuration source does not contain what a physics module needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A required key is absent.
    MissingKey { module: String, key: String },
    /// A required key is present, but still holds its sentinel default.
    SentinelValue { module: String, key: String, sentinel: String },
    /// A key is present with a value of the wrong type or an unusable value.
    InvalidValue { module: String, key: String, reason: String },
    /// A section contains keys that no module recognizes.
    UnrecognizedKeys { section: String, keys: Vec<String> },
    /// A physics module was requested that the factory does not know about.
    UnknownPhysics { name: String },
    /// A physics module depends on another module that was not enabled.
    MissingDependency { module: String, dependency: String },
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey { module, key } => {
                write!(f, "{module}: missing required input `{key}`")
            }
            Self::SentinelValue { module, key, sentinel } => {
                write!(
                    f,
                    "{module}: input `{key}` must be given a non-trivial definition (found `{sentinel}`)"
                )
            }
            Self::InvalidValue { module, key, reason } => {
                write!(f, "{module}: invalid value for `{key}`: {reason}")
            }
            Self::UnrecognizedKeys { section, keys } => {
                write!(f, "unrecognized input in section `{section}`: {}", keys.join(", "))
            }
            Self::UnknownPhysics { name } => {
                write!(f, "unknown physics `{name}`")
            }
            Self::MissingDependency { module, dependency } => {
                write!(f, "{module} requires the physics `{dependency}` to be enabled")
            }
        }
    }
}

impl Error for ConfigurationError {}

/// Failures raised while assembling a single element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// A Jacobian was requested from a module whose exact linearization does not exist.
    JacobianNotImplemented { module: String },
    /// The context lacks finite element data that the module requested in `init_context`.
    MissingElementData { module: String, data: String },
}

impl Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JacobianNotImplemented { module } => {
                write!(f, "{module}: Jacobian is not implemented")
            }
            Self::MissingElementData { module, data } => {
                write!(f, "{module}: assembly context does not provide {data}")
            }
        }
    }
}

impl Error for AssemblyError {}
