//! Literal codec: value classification and bind-parameter coercion.
//!
//! Column types are split into two classes. The class decides how
//! predicate values are compared (`like` degrades to equality on numeric
//! columns) and how raw input is converted into a typed [`SqlValue`].

use crate::{Result, error::TableWardenError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Coarse classification of a declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueClass {
    Numeric,
    Textual,
}

/// A typed value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// Whether this is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Class implied by the value itself; NULL counts as textual.
    pub fn class(&self) -> ValueClass {
        match self {
            Self::Integer(_) | Self::Float(_) => ValueClass::Numeric,
            Self::Null | Self::Text(_) => ValueClass::Textual,
        }
    }

    /// Text form used for `LIKE` patterns and CSV output.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }
}

/// Classifies a declared type by case-insensitive substring match.
///
/// Unrecognized types are textual.
pub fn classify(declared_type: &str) -> ValueClass {
    let lowered = declared_type.to_lowercase();
    let is_integer = lowered.contains("int") && !lowered.contains("point");
    if is_integer
        || lowered.contains("double")
        || lowered.contains("numeric")
        || lowered.contains("float")
    {
        ValueClass::Numeric
    } else {
        ValueClass::Textual
    }
}

/// Coerces raw input into a bind parameter for a column of the given class.
///
/// Empty strings and JSON null become [`SqlValue::Null`] for numeric
/// columns; textual columns keep empty strings as they are.
///
/// # Errors
/// Returns `InvalidArgument` when a numeric column receives input that
/// does not parse as a number, or when a structured value is supplied.
pub fn coerce(value: &JsonValue, class: ValueClass) -> Result<SqlValue> {
    match (class, value) {
        (_, JsonValue::Null) => Ok(SqlValue::Null),
        (ValueClass::Numeric, JsonValue::Number(n)) => Ok(number_to_sql(n)),
        (ValueClass::Numeric, JsonValue::String(s)) => parse_numeric(s),
        (ValueClass::Numeric, JsonValue::Bool(b)) => Ok(SqlValue::Integer(i64::from(*b))),
        (ValueClass::Textual, JsonValue::String(s)) => Ok(SqlValue::Text(s.clone())),
        (ValueClass::Textual, JsonValue::Number(n)) => Ok(SqlValue::Text(n.to_string())),
        (ValueClass::Textual, JsonValue::Bool(b)) => Ok(SqlValue::Text(b.to_string())),
        (_, JsonValue::Array(_) | JsonValue::Object(_)) => Err(
            TableWardenError::invalid_argument("structured values cannot be bound to a column"),
        ),
    }
}

fn number_to_sql(n: &serde_json::Number) -> SqlValue {
    if let Some(i) = n.as_i64() {
        SqlValue::Integer(i)
    } else {
        // u64 beyond i64 range and fractional values travel as floats
        SqlValue::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn parse_numeric(raw: &str) -> Result<SqlValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(SqlValue::Null);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Ok(SqlValue::Integer(i));
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(SqlValue::Float(f)),
        _ => Err(TableWardenError::invalid_argument(format!(
            "'{}' is not a valid number",
            raw
        ))),
    }
}

/// Renders a value as SQL literal text for diagnostics.
///
/// Output is for log lines only; statements always bind parameters.
pub fn render(value: &SqlValue, class: ValueClass) -> String {
    match (value, class) {
        (SqlValue::Null, _) => "NULL".to_string(),
        (SqlValue::Integer(i), ValueClass::Numeric) => i.to_string(),
        (SqlValue::Float(f), ValueClass::Numeric) => f.to_string(),
        (other, _) => {
            let text = other.as_text().unwrap_or_default();
            format!("'{}'", text.replace('\'', "''"))
        }
    }
}
