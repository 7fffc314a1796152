//! Row transformation: one raw record in, one destination row (or a rejection) out.
//!
//! Each mapped field goes through the same fixed sequence:
//!
//! 1. token normalization (`NULL`/`TRUE`/`FALSE`, empty strings),
//! 2. the column's custom transform, if one is registered,
//! 3. encoding normalization of byte values,
//! 4. hashing for hashable columns.
//!
//! After the fields, the raw row is validated, defaults fill absent or empty
//! columns, and the audit timestamps are stamped.

pub mod custom;
pub mod expression;
pub mod hash;
pub mod string_ops;
pub mod validate;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use chrono::Local;

use crate::{
    data::{DestinationRow, Value},
    header::HeaderMapping,
    io_utils::{self, EncodingPolicy},
};

pub use custom::ColumnTransforms;
pub use validate::{ValidationFailure, ValidationRule, ValidationRules};

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyStringPolicy {
    #[default]
    Null,
    Preserve,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimestampPolicy {
    Off,
    #[default]
    CurrentTime,
    Fixed(String),
}

impl TimestampPolicy {
    /// The value stamped on every row of a run, fixed when the run starts.
    pub fn stamp(&self) -> Option<Value> {
        match self {
            TimestampPolicy::Off => None,
            TimestampPolicy::CurrentTime => Some(Value::String(
                Local::now().format(TIMESTAMP_FORMAT).to_string(),
            )),
            TimestampPolicy::Fixed(value) => Some(Value::String(value.clone())),
        }
    }
}

/// Everything that decides how a record becomes a destination row.
#[derive(Debug)]
pub struct TransformRules {
    pub defaults: BTreeMap<String, Value>,
    pub hashable: BTreeSet<String>,
    /// bcrypt work factor for hashable columns.
    pub hash_cost: u32,
    pub transforms: ColumnTransforms,
    pub validation: ValidationRules,
    pub empty_strings: EmptyStringPolicy,
    pub encoding: EncodingPolicy,
    pub timestamps: TimestampPolicy,
}

impl Default for TransformRules {
    fn default() -> Self {
        Self {
            defaults: BTreeMap::new(),
            hashable: BTreeSet::from(["password".to_string()]),
            hash_cost: hash::DEFAULT_COST,
            transforms: ColumnTransforms::new(),
            validation: ValidationRules::new(),
            empty_strings: EmptyStringPolicy::default(),
            encoding: EncodingPolicy::default(),
            timestamps: TimestampPolicy::default(),
        }
    }
}

impl TransformRules {
    /// Rules that leave every value as read: no hashing, no timestamps.
    pub fn passthrough() -> Self {
        Self {
            hashable: BTreeSet::new(),
            timestamps: TimestampPolicy::Off,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NoColumns,
    EmptyRecord,
    Invalid(ValidationFailure),
    Hash { column: String, reason: String },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoColumns => f.write_str("no mapped columns"),
            Rejection::EmptyRecord => f.write_str("record has no values"),
            Rejection::Invalid(failure) => write!(f, "validation failed: {failure}"),
            Rejection::Hash { column, reason } => {
                write!(f, "hashing column \"{column}\" failed: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Accepted(DestinationRow),
    Rejected(Rejection),
}

impl RowOutcome {
    pub fn accepted(self) -> Option<DestinationRow> {
        match self {
            RowOutcome::Accepted(row) => Some(row),
            RowOutcome::Rejected(_) => None,
        }
    }
}

/// Turns raw field text into a value: case-insensitive `NULL`, `TRUE` and
/// `FALSE` become null and booleans, the empty string follows `empty`.
pub fn normalize_token(field: &str, empty: EmptyStringPolicy) -> Value {
    if field.is_empty() {
        return match empty {
            EmptyStringPolicy::Null => Value::Null,
            EmptyStringPolicy::Preserve => Value::String(String::new()),
        };
    }
    if field.eq_ignore_ascii_case("null") {
        Value::Null
    } else if field.eq_ignore_ascii_case("true") {
        Value::Boolean(true)
    } else if field.eq_ignore_ascii_case("false") {
        Value::Boolean(false)
    } else {
        Value::String(field.to_string())
    }
}

/// Byte values become UTF-8 text when encoding is forced; everything else is
/// already text or not text at all.
pub fn normalize_encoding(value: Value, policy: EncodingPolicy) -> Value {
    match (value, policy) {
        (Value::Bytes(bytes), EncodingPolicy::ForceUtf8 { .. }) => {
            Value::String(io_utils::decode_field(&bytes, policy))
        }
        (other, _) => other,
    }
}

pub struct RowTransformer<'a> {
    mapping: &'a HeaderMapping,
    rules: &'a TransformRules,
    stamp: Option<Value>,
}

impl<'a> RowTransformer<'a> {
    pub fn new(mapping: &'a HeaderMapping, rules: &'a TransformRules) -> Self {
        Self {
            mapping,
            rules,
            stamp: rules.timestamps.stamp(),
        }
    }

    pub fn transform<S: AsRef<str>>(&self, raw: &[S]) -> RowOutcome {
        if self.mapping.is_empty() {
            return RowOutcome::Rejected(Rejection::NoColumns);
        }
        if raw.iter().all(|field| field.as_ref().is_empty()) {
            return RowOutcome::Rejected(Rejection::EmptyRecord);
        }

        let mut row = DestinationRow::new();
        let mut raw_row: BTreeMap<&str, &str> = BTreeMap::new();
        for (idx, column) in self.mapping.destinations() {
            let Some(field) = raw.get(idx).map(AsRef::as_ref) else {
                continue;
            };
            raw_row.insert(column, field);
            match self.transform_field(column, field) {
                Ok(value) => row.insert(column, value),
                Err(rejection) => return RowOutcome::Rejected(rejection),
            }
        }

        if let Err(failure) = self.rules.validation.validate(&raw_row) {
            return RowOutcome::Rejected(Rejection::Invalid(failure));
        }

        for (column, default) in &self.rules.defaults {
            if row.get(column).is_none_or(Value::is_empty) {
                row.insert(column.clone(), default.clone());
            }
        }

        if let Some(stamp) = &self.stamp {
            row.insert(CREATED_AT, stamp.clone());
            row.insert(UPDATED_AT, stamp.clone());
        }

        RowOutcome::Accepted(row)
    }

    fn transform_field(&self, column: &str, field: &str) -> Result<Value, Rejection> {
        let value = normalize_token(field, self.rules.empty_strings);
        let value = self.rules.transforms.apply(column, value);
        let value = normalize_encoding(value, self.rules.encoding);
        if !self.rules.hashable.contains(column) {
            return Ok(value);
        }
        hash::hash_value(&value, self.rules.hash_cost).map_err(|err| Rejection::Hash {
            column: column.to_string(),
            reason: err.to_string(),
        })
    }
}
