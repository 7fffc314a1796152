//! Typed cell values and destination rows.
//!
//! A [`Value`] is what the row pipeline writes into a destination column. Source
//! fields start life as text; token normalization turns `NULL`/`TRUE`/`FALSE` into
//! [`Value::Null`] and [`Value::Boolean`], and custom transforms may hand back any
//! other variant, which is passed through to the destination untouched.

use std::{collections::BTreeMap, fmt};

use evalexpr::Value as EvalValue;
use serde::{Deserialize, Deserializer, de};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    String(String),
    Integer(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.0}")
                } else {
                    f.to_string()
                }
            }
            Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// Null, the empty string and an empty byte value count as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Bytes(bytes) => bytes.is_empty(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.as_display()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_yaml::Value::deserialize(deserializer)?;
        value_from_yaml(raw).map_err(de::Error::custom)
    }
}

fn value_from_yaml(raw: serde_yaml::Value) -> Result<Value, String> {
    match raw {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Boolean(b)),
        serde_yaml::Value::String(s) => Ok(Value::String(s)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float(f))
            } else {
                Err(format!("Unsupported numeric value {n}"))
            }
        }
        other => Err(format!(
            "Default values must be scalars, found {other:?}"
        )),
    }
}

/// Parses a command-line literal the same way YAML scalars are read, so
/// `--default active=true` and `defaults: {active: true}` agree.
pub fn parse_literal(raw: &str) -> Value {
    match serde_yaml::from_str::<serde_yaml::Value>(raw) {
        Ok(parsed) => value_from_yaml(parsed).unwrap_or_else(|_| Value::String(raw.to_string())),
        Err(_) => Value::String(raw.to_string()),
    }
}

pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

pub fn value_to_evalexpr(value: &Value) -> EvalValue {
    match value {
        Value::Null => EvalValue::Empty,
        Value::Boolean(b) => EvalValue::Boolean(*b),
        Value::String(s) => EvalValue::String(s.clone()),
        Value::Integer(i) => EvalValue::Int(*i),
        Value::Float(f) => EvalValue::Float(*f),
        Value::Bytes(bytes) => EvalValue::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

pub fn value_from_evalexpr(value: EvalValue) -> Value {
    match value {
        EvalValue::Empty => Value::Null,
        EvalValue::Boolean(b) => Value::Boolean(b),
        EvalValue::String(s) => Value::String(s),
        EvalValue::Int(i) => Value::Integer(i),
        EvalValue::Float(f) => Value::Float(f),
        EvalValue::Tuple(values) => Value::String(
            values
                .into_iter()
                .map(|v| value_from_evalexpr(v).as_display())
                .collect::<Vec<_>>()
                .join("|"),
        ),
    }
}

/// One transformed record, keyed by destination column.
///
/// Writing a column twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestinationRow {
    values: BTreeMap<String, Value>,
}

impl DestinationRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for DestinationRow {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut row = DestinationRow::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_column_name_replaces_non_alphanumeric() {
        assert_eq!(normalize_column_name("Order ID"), "order_id");
        assert_eq!(normalize_column_name("$Percent%"), "_percent_");
    }

    #[test]
    fn empty_values_cover_null_and_blank_text() {
        assert!(Value::Null.is_empty());
        assert!(Value::String(String::new()).is_empty());
        assert!(Value::Bytes(Vec::new()).is_empty());
        assert!(!Value::Boolean(false).is_empty());
        assert!(!Value::Integer(0).is_empty());
    }

    #[test]
    fn integral_floats_display_without_fraction_or_saturation() {
        assert_eq!(Value::Float(3.0).as_display(), "3");
        assert_eq!(Value::Float(-2.0).as_display(), "-2");
        assert_eq!(Value::Float(2.5).as_display(), "2.5");
        assert_eq!(Value::Float(1e20).as_display(), "100000000000000000000");
    }

    #[test]
    fn parse_literal_follows_yaml_scalars() {
        assert_eq!(parse_literal("true"), Value::Boolean(true));
        assert_eq!(parse_literal("42"), Value::Integer(42));
        assert_eq!(parse_literal("~"), Value::Null);
        assert_eq!(parse_literal("guest"), Value::String("guest".into()));
        assert_eq!(parse_literal("[a"), Value::String("[a".into()));
    }

    #[test]
    fn destination_row_keeps_last_write() {
        let mut row = DestinationRow::new();
        row.insert("name", Value::from("first"));
        row.insert("name", Value::from("second"));
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("name"), Some(&Value::from("second")));
    }

    #[test]
    fn evalexpr_conversion_maps_empty_to_null() {
        assert_eq!(value_from_evalexpr(EvalValue::Empty), Value::Null);
        assert_eq!(value_to_evalexpr(&Value::Integer(3)), EvalValue::Int(3));
        assert_eq!(
            value_from_evalexpr(value_to_evalexpr(&Value::from("x"))),
            Value::from("x")
        );
    }
}
