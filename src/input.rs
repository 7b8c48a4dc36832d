//! Key/value configuration consumed by physics constructors.
//!
//! Keys are slash-separated paths such as `Physics/AveragedFan/chord_length`, mirroring the
//! sectioned input files that simulation drivers typically read. Parsing the file itself is
//! the driver's business: an [`Input`] is either built programmatically or converted from
//! an already parsed JSON document, in which nested objects become path segments.
use crate::error::ConfigurationError;
use eyre::eyre;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl InputValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<'a> From<&'a [&'a str]> for InputValue {
    fn from(values: &'a [&'a str]) -> Self {
        Self::List(values.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for InputValue {
    fn from(values: [&str; N]) -> Self {
        Self::List(values.iter().map(|s| s.to_string()).collect())
    }
}

/// A flat map from input paths to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    values: FxHashMap<String, InputValue>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<InputValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Parses a JSON document and flattens it into an input map.
    pub fn from_json_str(json: &str) -> eyre::Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_json_value(&value)
    }

    /// Flattens a JSON document into an input map.
    ///
    /// The document root must be an object. Nested objects contribute a path segment each,
    /// so that `{"Physics": {"AveragedFan": {"chord_length": "0.2"}}}` yields the key
    /// `Physics/AveragedFan/chord_length`. Arrays must contain only strings.
    pub fn from_json_value(value: &JsonValue) -> eyre::Result<Self> {
        let mut input = Self::new();
        match value {
            JsonValue::Object(map) => {
                for (key, value) in map {
                    flatten_json_into(&mut input, key.clone(), value)?;
                }
                Ok(input)
            }
            _ => Err(eyre!("input document root must be an object")),
        }
    }

    pub fn have_variable(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&InputValue> {
        self.values.get(key)
    }

    pub fn number(&self, module: &str, key: &str) -> Result<Option<f64>, ConfigurationError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(InputValue::Number(value)) => Ok(Some(*value)),
            Some(other) => Err(wrong_type(module, key, "number", other)),
        }
    }

    pub fn number_or(&self, module: &str, key: &str, default: f64) -> Result<f64, ConfigurationError> {
        Ok(self.number(module, key)?.unwrap_or(default))
    }

    pub fn require_number(&self, module: &str, key: &str) -> Result<f64, ConfigurationError> {
        self.number(module, key)?
            .ok_or_else(|| missing(module, key))
    }

    pub fn boolean_or(&self, module: &str, key: &str, default: bool) -> Result<bool, ConfigurationError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(InputValue::Bool(value)) => Ok(*value),
            Some(other) => Err(wrong_type(module, key, "boolean", other)),
        }
    }

    pub fn text(&self, module: &str, key: &str) -> Result<Option<&str>, ConfigurationError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(InputValue::Text(value)) => Ok(Some(value.as_str())),
            Some(other) => Err(wrong_type(module, key, "text", other)),
        }
    }

    pub fn text_or<'a>(&'a self, module: &str, key: &str, default: &'a str) -> Result<&'a str, ConfigurationError> {
        Ok(self.text(module, key)?.unwrap_or(default))
    }

    /// Reads a function expression.
    ///
    /// Numbers are accepted as constant expressions and are formatted back to text, so that
    /// a literal `0` and the string `"0"` are indistinguishable to the caller.
    pub fn expression(&self, module: &str, key: &str) -> Result<Option<String>, ConfigurationError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(InputValue::Text(value)) => Ok(Some(value.clone())),
            Some(InputValue::Number(value)) => Ok(Some(format!("{value}"))),
            Some(other) => Err(wrong_type(module, key, "expression", other)),
        }
    }

    /// Reads a list of names.
    ///
    /// A text value is split on whitespace, so `"SpalartAllmaras AveragedFan"` and
    /// `["SpalartAllmaras", "AveragedFan"]` are equivalent.
    pub fn list(&self, module: &str, key: &str) -> Result<Option<Vec<String>>, ConfigurationError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(InputValue::List(values)) => Ok(Some(values.clone())),
            Some(InputValue::Text(value)) => Ok(Some(value.split_whitespace().map(str::to_string).collect())),
            Some(other) => Err(wrong_type(module, key, "list", other)),
        }
    }

    /// Returns the names of the keys directly contained in the given section.
    ///
    /// For the section `Physics/AveragedFan`, the key `Physics/AveragedFan/lift` yields `lift`,
    /// while keys in nested sections are not reported.
    pub fn keys_in_section<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values.keys().filter_map(move |key| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('/'))
                .filter(|name| !name.contains('/'))
        })
    }

    /// Fails if the section contains keys other than the recognized ones.
    pub fn ensure_recognized(&self, section: &str, recognized: &[&str]) -> Result<(), ConfigurationError> {
        let mut unrecognized: Vec<String> = self
            .keys_in_section(section)
            .filter(|name| !recognized.contains(name))
            .map(str::to_string)
            .collect();
        if unrecognized.is_empty() {
            Ok(())
        } else {
            unrecognized.sort();
            Err(ConfigurationError::UnrecognizedKeys {
                section: section.to_string(),
                keys: unrecognized,
            })
        }
    }
}

fn flatten_json_into(input: &mut Input, path: String, value: &JsonValue) -> eyre::Result<()> {
    match value {
        JsonValue::Object(map) => {
            for (key, value) in map {
                flatten_json_into(input, format!("{path}/{key}"), value)?;
            }
        }
        JsonValue::Bool(b) => input.set(path, *b),
        JsonValue::Number(number) => {
            let number = number
                .as_f64()
                .ok_or_else(|| eyre!("input `{path}` is not representable as a floating point number"))?;
            input.set(path, number)
        }
        JsonValue::String(s) => input.set(path, s.as_str()),
        JsonValue::Array(items) => {
            let names = items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| eyre!("input `{path}` must be an array of strings"))
                })
                .collect::<eyre::Result<Vec<_>>>()?;
            input.set(path, InputValue::List(names))
        }
        JsonValue::Null => return Err(eyre!("input `{path}` is null")),
    }
    Ok(())
}

fn missing(module: &str, key: &str) -> ConfigurationError {
    ConfigurationError::MissingKey {
        module: module.to_string(),
        key: key.to_string(),
    }
}

fn wrong_type(module: &str, key: &str, expected: &str, found: &InputValue) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        module: module.to_string(),
        key: key.to_string(),
        reason: format!("expected {expected}, found {}", found.type_name()),
    }
}
