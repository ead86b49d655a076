//! Decode the `sui_getNormalizedMoveModulesByPackage` result.

use crate::types::{ModuleMap, NormalizedModule};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub context: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ctx) = &self.context {
            write!(f, "{}: {}", ctx, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ParseError {}

/// Turn the RPC `result` into a module map.
///
/// The result must be a JSON object. A module whose layout cannot be decoded
/// is logged and left out; the rest of the package is still usable.
pub fn parse_module_map(result: &Value) -> Result<ModuleMap, ParseError> {
    let object = result.as_object().ok_or_else(|| {
        ParseError::new(format!("expected a mapping of modules, got {}", kind_of(result)))
    })?;

    let mut modules = ModuleMap::new();
    for (name, raw) in object {
        match serde_json::from_value::<NormalizedModule>(raw.clone()) {
            Ok(module) => {
                modules.insert(name.clone(), module);
            }
            Err(e) => {
                warn!(module = %name, error = %e, "Skipping module with malformed layout");
            }
        }
    }

    Ok(modules)
}

pub fn parse_json_modules(json: &str) -> Result<ModuleMap, ParseError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ParseError::new(format!("Failed to parse JSON: {}", e)))?;
    parse_module_map(&value)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
