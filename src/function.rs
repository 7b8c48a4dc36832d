//! Field functions evaluated at a point in space and time.
//!
//! Physics modules own their field functions exclusively (as `Box<dyn FieldFunction<T>>`)
//! and only ever access them through [`FieldFunction::evaluate_into`] and its helpers.
use crate::error::ConfigurationError;
use crate::input::Input;
use crate::nalgebra::{convert, try_convert, Point3, Vector3};
use crate::Real;
use evalexpr::{build_operator_tree, ContextWithMutableVariables, HashMapContext, Node, Value};
use eyre::eyre;
use log::warn;
use std::fmt;
use std::fmt::Debug;

/// A scalar- or vector-valued function of position and time.
pub trait FieldFunction<T: Real>: Send + Sync + Debug {
    /// The number of components the function defines.
    fn n_components(&self) -> usize;

    /// Evaluates the function at the given point and time.
    ///
    /// The first `output.len()` components are written. Entries beyond
    /// [`n_components`](Self::n_components) are set to zero, so that a function with two
    /// components can be used where a three-dimensional vector is expected.
    fn evaluate_into(&self, output: &mut [T], point: &Point3<T>, time: T) -> eyre::Result<()>;

    /// Evaluates the first component.
    fn evaluate_scalar(&self, point: &Point3<T>, time: T) -> eyre::Result<T> {
        let mut value = [T::zero()];
        self.evaluate_into(&mut value, point, time)?;
        Ok(value[0])
    }

    /// Evaluates the first three components as a vector.
    fn evaluate_vector3(&self, point: &Point3<T>, time: T) -> eyre::Result<Vector3<T>> {
        let mut value = Vector3::zeros();
        self.evaluate_into(value.as_mut_slice(), point, time)?;
        Ok(value)
    }
}

/// A function with constant components.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantFunction<T> {
    values: Vec<T>,
}

impl<T: Real> ConstantFunction<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self { values }
    }

    pub fn scalar(value: T) -> Self {
        Self::new(vec![value])
    }

    pub fn zero(n_components: usize) -> Self {
        Self::new(vec![T::zero(); n_components])
    }
}

impl<T: Real> FieldFunction<T> for ConstantFunction<T> {
    fn n_components(&self) -> usize {
        self.values.len()
    }

    fn evaluate_into(&self, output: &mut [T], _point: &Point3<T>, _time: T) -> eyre::Result<()> {
        for (i, out) in output.iter_mut().enumerate() {
            *out = self.values.get(i).copied().unwrap_or_else(T::zero);
        }
        Ok(())
    }
}

/// A field function backed by a closure.
pub struct FnFieldFunction<F> {
    n_components: usize,
    function: F,
}

impl<F> FnFieldFunction<F> {
    /// Wraps a closure `f(point, time, output)` that fills `output` with `n_components` values.
    pub fn new(n_components: usize, function: F) -> Self {
        Self { n_components, function }
    }
}

impl<F> Debug for FnFieldFunction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFieldFunction")
            .field("n_components", &self.n_components)
            .finish_non_exhaustive()
    }
}

impl<T, F> FieldFunction<T> for FnFieldFunction<F>
where
    T: Real,
    F: Fn(&Point3<T>, T, &mut [T]) + Send + Sync,
{
    fn n_components(&self) -> usize {
        self.n_components
    }

    fn evaluate_into(&self, output: &mut [T], point: &Point3<T>, time: T) -> eyre::Result<()> {
        let mut values = vec![T::zero(); self.n_components];
        (self.function)(point, time, &mut values);
        for (i, out) in output.iter_mut().enumerate() {
            *out = values.get(i).copied().unwrap_or_else(T::zero);
        }
        Ok(())
    }
}

/// A function parsed from a textual expression.
///
/// Expressions may refer to the coordinates `x`, `y`, `z`, the time `t` and the constant
/// `pi`. Components of a vector-valued function are separated by `{}`, so that
/// `"-y{}x{}0"` describes a rotation about the z-axis. Functions such as `math::sin` and
/// `math::atan2` are available with the syntax of the `evalexpr` crate.
///
/// Integer literals follow integer arithmetic, so `1/2` evaluates to zero. Write `1.0/2`
/// where a fraction is intended.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFunction {
    expression: String,
    components: Vec<Node>,
}

impl ParsedFunction {
    pub fn parse(expression: &str) -> eyre::Result<Self> {
        let components = expression
            .split("{}")
            .map(|component| {
                build_operator_tree(component)
                    .map_err(|err| eyre!("failed to parse expression `{component}`: {err}"))
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        Ok(Self {
            expression: expression.to_string(),
            components,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    fn evaluate_components_f64(&self, output: &mut [f64], point: [f64; 3], time: f64) -> eyre::Result<()> {
        let mut context = HashMapContext::new();
        let variables = [
            ("x", point[0]),
            ("y", point[1]),
            ("z", point[2]),
            ("t", time),
            ("pi", std::f64::consts::PI),
        ];
        for (name, value) in variables {
            context
                .set_value(name.to_string(), Value::Float(value))
                .map_err(|err| eyre!("failed to bind `{name}`: {err}"))?;
        }

        for (i, out) in output.iter_mut().enumerate() {
            *out = match self.components.get(i) {
                Some(node) => node
                    .eval_number_with_context(&context)
                    .map_err(|err| eyre!("failed to evaluate `{}`: {err}", self.expression))?,
                None => 0.0,
            };
        }
        Ok(())
    }
}

impl<T: Real> FieldFunction<T> for ParsedFunction {
    fn n_components(&self) -> usize {
        self.components.len()
    }

    fn evaluate_into(&self, output: &mut [T], point: &Point3<T>, time: T) -> eyre::Result<()> {
        let to_f64 = |value: T| try_convert::<T, f64>(value).ok_or_else(|| eyre!("scalar is not representable as f64"));
        let point = [to_f64(point.x)?, to_f64(point.y)?, to_f64(point.z)?];
        let time = to_f64(time)?;

        let mut values = vec![0.0; output.len()];
        self.evaluate_components_f64(&mut values, point, time)?;
        for (out, value) in output.iter_mut().zip(values) {
            *out = convert(value);
        }
        Ok(())
    }
}

/// What to do when a function input is absent or holds its sentinel value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MissingFunctionPolicy {
    /// Construction fails with a configuration error naming the key.
    Fatal,
    /// The function defaults to zero and a warning is logged.
    ZeroWithWarning,
}

/// Reads a function expression from the input and parses it.
///
/// An absent key and a key holding `sentinel` are treated the same way, according to
/// `policy`. Parsed functions are evaluated once at the origin so that malformed
/// expressions (for example unknown variables) surface at construction time.
pub fn field_function_from_input<T: Real>(
    input: &Input,
    module: &str,
    key: &str,
    sentinel: &str,
    policy: MissingFunctionPolicy,
    n_components: usize,
) -> eyre::Result<Box<dyn FieldFunction<T>>> {
    let expression = input.expression(module, key)?;
    match expression {
        Some(expression) if expression.trim() != sentinel => {
            let function = ParsedFunction::parse(&expression).map_err(|err| ConfigurationError::InvalidValue {
                module: module.to_string(),
                key: key.to_string(),
                reason: err.to_string(),
            })?;
            let mut at_origin = vec![T::zero(); n_components];
            FieldFunction::<T>::evaluate_into(&function, &mut at_origin, &Point3::origin(), T::zero()).map_err(|err| {
                ConfigurationError::InvalidValue {
                    module: module.to_string(),
                    key: key.to_string(),
                    reason: err.to_string(),
                }
            })?;
            Ok(Box::new(function))
        }
        found => match policy {
            MissingFunctionPolicy::Fatal => Err(match found {
                None => ConfigurationError::MissingKey {
                    module: module.to_string(),
                    key: key.to_string(),
                },
                Some(_) => ConfigurationError::SentinelValue {
                    module: module.to_string(),
                    key: key.to_string(),
                    sentinel: sentinel.to_string(),
                },
            }
            .into()),
            MissingFunctionPolicy::ZeroWithWarning => {
                warn!("{module}: zero function specified for `{key}`");
                Ok(Box::new(ConstantFunction::<T>::zero(n_components)))
            }
        },
    }
}
