use serde_json::Value;

use super::redact::{SensitiveFields, MASK};

/// A bound GraphQL variable as seen by the diagnostic hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableValue {
    pub name: String,
    pub value: Value,
    pub type_name: String,
}

impl VariableValue {
    pub fn new(name: impl Into<String>, value: Value, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            type_name: type_name.into(),
        }
    }

    /// For variables that arrive without their declared type.
    pub fn inferred(name: impl Into<String>, value: Value) -> Self {
        let type_name = match &value {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
            Value::Number(_) => "Float",
            Value::String(_) => "String",
            Value::Array(_) => "List",
            Value::Object(_) => "InputObject",
        };
        Self::new(name, value, type_name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("input object values are not rendered")]
    InputObject,
    #[error("{0}")]
    Serialize(#[from] serde_json::Error),
}

/// Renders one row per variable: `name : value : type`, in columns of
/// `width` characters. A variable that cannot be rendered becomes a
/// placeholder row; the others are still rendered.
pub fn format_variables(variables: &[VariableValue], sensitive: &SensitiveFields, width: usize) -> String {
    let mut out = String::new();

    for variable in variables {
        let row = if sensitive.contains(&variable.name) {
            Ok(format!("\"{MASK}\""))
        } else {
            render_value(&variable.value)
        };

        match row {
            Ok(value) => out.push_str(&format!(
                "  {:<width$} : {:<width$} : {}\n",
                variable.name,
                truncate(&value, width),
                variable.type_name,
            )),
            Err(err) => out.push_str(&format!(
                "  {:<width$} : [variable could not be formatted: {err}]\n",
                variable.name,
            )),
        }
    }

    out
}

fn render_value(value: &Value) -> Result<String, FormatError> {
    match value {
        Value::Object(_) => Err(FormatError::InputObject),
        Value::Array(items) if items.iter().any(Value::is_object) => Err(FormatError::InputObject),
        other => Ok(serde_json::to_string(other)?),
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let keep = width.saturating_sub(3);
    let mut truncated: String = value.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}
