//! Row validation rules.
//!
//! Rules are written as short tokens, one rule per entry: `required`, `numeric`,
//! `integer`, `boolean`, `email`, `min:N`, `max:N`, `in:a,b,c`, `regex:PATTERN`,
//! and `expr:EXPRESSION`. They run against the raw source text keyed by
//! destination column. Apart from `required`, a rule passes when its column is
//! absent or empty.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::OnceLock};

use regex::Regex;

use crate::{
    error::{SeedError, SeedResult},
    transform::expression::CompiledExpression,
};

#[derive(Debug, Clone)]
pub enum ValidationRule {
    Required,
    Numeric,
    Integer,
    Boolean,
    Email,
    Min(usize),
    Max(usize),
    In(Vec<String>),
    Regex(Regex),
    Expression(CompiledExpression),
}

impl ValidationRule {
    fn passes(&self, raw_row: &BTreeMap<&str, &str>, value: Option<&str>) -> bool {
        let present = value.filter(|v| !v.trim().is_empty());
        let Some(text) = present else {
            return match self {
                ValidationRule::Required => false,
                ValidationRule::Expression(expression) => expression
                    .eval_row_truthy(raw_row, value)
                    .unwrap_or(false),
                _ => true,
            };
        };
        match self {
            ValidationRule::Required => true,
            ValidationRule::Numeric => text.trim().parse::<f64>().is_ok(),
            ValidationRule::Integer => text.trim().parse::<i64>().is_ok(),
            ValidationRule::Boolean => matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "true" | "false" | "1" | "0"
            ),
            ValidationRule::Email => email_pattern().is_match(text.trim()),
            ValidationRule::Min(min) => text.chars().count() >= *min,
            ValidationRule::Max(max) => text.chars().count() <= *max,
            ValidationRule::In(options) => options.iter().any(|option| option == text),
            ValidationRule::Regex(regex) => regex.is_match(text),
            ValidationRule::Expression(expression) => expression
                .eval_row_truthy(raw_row, Some(text))
                .unwrap_or(false),
        }
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
    })
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::Required => f.write_str("required"),
            ValidationRule::Numeric => f.write_str("numeric"),
            ValidationRule::Integer => f.write_str("integer"),
            ValidationRule::Boolean => f.write_str("boolean"),
            ValidationRule::Email => f.write_str("email"),
            ValidationRule::Min(min) => write!(f, "min:{min}"),
            ValidationRule::Max(max) => write!(f, "max:{max}"),
            ValidationRule::In(options) => write!(f, "in:{}", options.join(",")),
            ValidationRule::Regex(regex) => write!(f, "regex:{}", regex.as_str()),
            ValidationRule::Expression(expression) => write!(f, "expr:{}", expression.source()),
        }
    }
}

impl FromStr for ValidationRule {
    type Err = SeedError;

    fn from_str(spec: &str) -> SeedResult<Self> {
        let trimmed = spec.trim();
        let (name, argument) = match trimmed.split_once(':') {
            Some((name, argument)) => (name.trim(), Some(argument)),
            None => (trimmed, None),
        };
        let lowered = name.to_ascii_lowercase();
        let rule = match (lowered.as_str(), argument) {
            ("required", None) => ValidationRule::Required,
            ("numeric", None) => ValidationRule::Numeric,
            ("integer", None) => ValidationRule::Integer,
            ("boolean", None) => ValidationRule::Boolean,
            ("email", None) => ValidationRule::Email,
            ("min", Some(arg)) => ValidationRule::Min(parse_length(trimmed, arg)?),
            ("max", Some(arg)) => ValidationRule::Max(parse_length(trimmed, arg)?),
            ("in", Some(arg)) => ValidationRule::In(
                arg.split(',')
                    .map(|option| option.trim().to_string())
                    .collect(),
            ),
            ("regex", Some(pattern)) => ValidationRule::Regex(Regex::new(pattern).map_err(
                |err| SeedError::config(format!("Invalid pattern in rule '{trimmed}': {err}")),
            )?),
            ("expr", Some(expression)) => {
                ValidationRule::Expression(CompiledExpression::compile(expression)?)
            }
            _ => {
                return Err(SeedError::config(format!(
                    "Unknown validation rule '{trimmed}'"
                )));
            }
        };
        Ok(rule)
    }
}

fn parse_length(spec: &str, raw: &str) -> SeedResult<usize> {
    raw.trim()
        .parse()
        .map_err(|_| SeedError::config(format!("Rule '{spec}' expects a non-negative length")))
}

/// The first rule a row broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub column: String,
    pub rule: String,
    pub value: Option<String>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(
                f,
                "column '{}' value '{}' fails rule '{}'",
                self.column, value, self.rule
            ),
            None => write!(f, "column '{}' is missing for rule '{}'", self.column, self.rule),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationRules {
    rules: BTreeMap<String, Vec<ValidationRule>>,
}

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, column: impl Into<String>, rule: ValidationRule) {
        self.rules.entry(column.into()).or_default().push(rule);
    }

    pub fn parse<S: AsRef<str>>(specs: &BTreeMap<String, Vec<S>>) -> SeedResult<Self> {
        let mut rules = Self::new();
        for (column, column_specs) in specs {
            for spec in column_specs {
                rules.add(column.clone(), spec.as_ref().parse()?);
            }
        }
        Ok(rules)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.values().all(Vec::is_empty)
    }

    pub fn validate(&self, raw_row: &BTreeMap<&str, &str>) -> Result<(), ValidationFailure> {
        for (column, rules) in &self.rules {
            let value = raw_row.get(column.as_str()).copied();
            if let Some(rule) = rules.iter().find(|rule| !rule.passes(raw_row, value)) {
                return Err(ValidationFailure {
                    column: column.clone(),
                    rule: rule.to_string(),
                    value: value.map(str::to_string),
                });
            }
        }
        Ok(())
    }
}
