//! Per-column value transforms.
//!
//! A transform takes the current cell value and returns its replacement. It is
//! either a Rust closure registered by library code or an expression compiled from
//! configuration. Columns without a transform keep their value.

use std::{collections::BTreeMap, fmt};

use log::debug;

use crate::{data::Value, error::SeedResult, transform::expression::CompiledExpression};

pub type TransformFn = dyn Fn(Value) -> Value + Send + Sync;

pub enum ColumnTransform {
    Function(Box<TransformFn>),
    Expression(CompiledExpression),
}

impl ColumnTransform {
    fn apply(&self, column: &str, value: Value) -> Value {
        match self {
            ColumnTransform::Function(function) => function(value),
            ColumnTransform::Expression(expression) => match expression.eval_value(&value) {
                Ok(replaced) => replaced,
                Err(err) => {
                    debug!(
                        "Transform '{}' for column '{column}' left value unchanged: {err}",
                        expression.source()
                    );
                    value
                }
            },
        }
    }
}

impl fmt::Debug for ColumnTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnTransform::Function(_) => f.write_str("Function(..)"),
            ColumnTransform::Expression(expression) => {
                write!(f, "Expression({:?})", expression.source())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ColumnTransforms {
    entries: BTreeMap<String, ColumnTransform>,
}

impl ColumnTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closure for `column`, replacing any earlier transform.
    pub fn register<F>(&mut self, column: impl Into<String>, function: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.entries
            .insert(column.into(), ColumnTransform::Function(Box::new(function)));
    }

    pub fn register_expression(
        &mut self,
        column: impl Into<String>,
        expression: &str,
    ) -> SeedResult<()> {
        let compiled = CompiledExpression::compile(expression)?;
        self.entries
            .insert(column.into(), ColumnTransform::Expression(compiled));
        Ok(())
    }

    pub fn apply(&self, column: &str, value: Value) -> Value {
        match self.entries.get(column) {
            Some(transform) => transform.apply(column, value),
            None => value,
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.entries.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
