use std::{
    collections::BTreeMap,
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};

use evalexpr::{
    ContextWithMutableFunctions, ContextWithMutableVariables, Function, HashMapContext, Node,
    Value as EvalValue, build_operator_tree,
};
use regex::Regex;

use crate::{
    data::{Value, normalize_column_name, value_from_evalexpr, value_to_evalexpr},
    error::{SeedError, SeedResult},
    transform::string_ops::{self, UnaryStringOp},
};

/// Name the current cell value is bound to inside an expression.
pub const VALUE_IDENTIFIER: &str = "value";

/// A pre-parsed expression together with the context its functions live in.
///
/// The context is built once and reused for every evaluation; only its
/// variables are rebound per call.
pub struct CompiledExpression {
    source: String,
    node: Node,
    context: Mutex<HashMapContext>,
}

impl Clone for CompiledExpression {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            node: self.node.clone(),
            context: Mutex::new(self.context().clone()),
        }
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("source", &self.source)
            .finish()
    }
}

impl CompiledExpression {
    pub fn compile(source: &str) -> SeedResult<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(SeedError::config("Expression cannot be empty"));
        }
        let node = build_operator_tree(trimmed).map_err(|err| {
            SeedError::config(format!("Invalid expression '{trimmed}': {err}"))
        })?;
        Ok(Self {
            source: trimmed.to_string(),
            node,
            context: Mutex::new(base_context()?),
        })
    }

    /// The shared context with every variable of an earlier evaluation removed.
    fn fresh_context(&self) -> MutexGuard<'_, HashMapContext> {
        let mut context = self.context();
        context.clear_variables();
        context
    }

    fn context(&self) -> MutexGuard<'_, HashMapContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates with `value` bound to `current`.
    pub fn eval_value(&self, current: &Value) -> Result<Value, evalexpr::EvalexprError> {
        let mut context = self.fresh_context();
        context.set_value(VALUE_IDENTIFIER.into(), value_to_evalexpr(current))?;
        self.node
            .eval_with_context(&*context)
            .map(value_from_evalexpr)
    }

    /// Evaluates against a raw row, each field bound under its normalized column
    /// name, with `value` bound to `current`.
    pub fn eval_row_truthy(
        &self,
        row: &BTreeMap<&str, &str>,
        current: Option<&str>,
    ) -> Result<bool, evalexpr::EvalexprError> {
        let mut context = self.fresh_context();
        for (column, raw) in row {
            context.set_value(
                normalize_column_name(column),
                EvalValue::String(raw.to_string()),
            )?;
        }
        let bound = match current {
            Some(raw) => EvalValue::String(raw.to_string()),
            None => EvalValue::Empty,
        };
        context.set_value(VALUE_IDENTIFIER.into(), bound)?;
        self.node
            .eval_with_context(&*context)
            .map(eval_value_truthy)
    }
}

fn base_context() -> SeedResult<HashMapContext> {
    let mut context = HashMapContext::new();
    register_string_functions(&mut context).map_err(|err| {
        SeedError::config(format!("Registering expression functions failed: {err}"))
    })?;
    Ok(context)
}

fn register_string_functions(
    context: &mut HashMapContext,
) -> Result<(), evalexpr::EvalexprError> {
    for op in UnaryStringOp::ALL {
        context.set_function(
            op.name().into(),
            Function::new(move |arguments| {
                let args = expect_args(arguments, 1, op.name())?;
                let value = expect_string(&args[0], "value")?;
                Ok(EvalValue::String(op.apply(value).into_owned()))
            }),
        )?;
    }

    context.set_function(
        "substring".into(),
        Function::new(|arguments| {
            let args = expect_args(arguments, 3, "substring")?;
            let value = expect_string(&args[0], "value")?;
            let start = parse_i64_arg(&args[1], "start")?.max(0) as usize;
            let length = parse_i64_arg(&args[2], "length")?.max(0) as usize;
            Ok(EvalValue::String(
                string_ops::substring(value, start, length).to_string(),
            ))
        }),
    )?;

    context.set_function(
        "regex_replace".into(),
        Function::new(|arguments| {
            let args = expect_args(arguments, 3, "regex_replace")?;
            let value = expect_string(&args[0], "value")?;
            let pattern = expect_string(&args[1], "pattern")?;
            let replacement = expect_string(&args[2], "replacement")?;
            let regex =
                Regex::new(pattern).map_err(|err| eval_error(&format!("Invalid regex: {err}")))?;
            Ok(EvalValue::String(
                string_ops::regex_replace(value, &regex, replacement).into_owned(),
            ))
        }),
    )?;

    context.set_function(
        "coalesce".into(),
        Function::new(|arguments| {
            let args = expect_args(arguments, 2, "coalesce")?;
            let primary = &args[0];
            let blank = matches!(primary, EvalValue::Empty)
                || matches!(primary, EvalValue::String(s) if s.is_empty());
            Ok(if blank { args[1].clone() } else { primary.clone() })
        }),
    )?;

    Ok(())
}

fn expect_args(
    arguments: &EvalValue,
    expected: usize,
    name: &str,
) -> Result<Vec<EvalValue>, evalexpr::EvalexprError> {
    match arguments {
        EvalValue::Empty if expected == 0 => Ok(Vec::new()),
        value if expected == 1 && !matches!(value, EvalValue::Tuple(_)) => Ok(vec![value.clone()]),
        EvalValue::Tuple(values) => {
            if values.len() != expected {
                return Err(evalexpr::EvalexprError::wrong_function_argument_amount(
                    values.len(),
                    expected,
                ));
            }
            Ok(values.clone())
        }
        _ => Err(eval_error(&format!(
            "{name} expects {expected} arguments provided as a tuple"
        ))),
    }
}

fn eval_error(message: &str) -> evalexpr::EvalexprError {
    evalexpr::EvalexprError::CustomMessage(message.to_string())
}

fn parse_i64_arg(value: &EvalValue, name: &str) -> Result<i64, evalexpr::EvalexprError> {
    match value {
        EvalValue::Int(i) => Ok(*i),
        EvalValue::Float(f) => Ok(*f as i64),
        other => Err(eval_error(&format!(
            "Expected integer for {name}, got {other:?}",
        ))),
    }
}

fn expect_string<'a>(value: &'a EvalValue, name: &str) -> Result<&'a str, evalexpr::EvalexprError> {
    if let EvalValue::String(s) = value {
        Ok(s)
    } else {
        Err(eval_error(&format!("Expected string for {name}")))
    }
}

pub fn eval_value_truthy(value: EvalValue) -> bool {
    match value {
        EvalValue::Boolean(b) => b,
        EvalValue::Int(i) => i != 0,
        EvalValue::Float(f) => f != 0.0,
        EvalValue::String(s) => !s.is_empty(),
        EvalValue::Tuple(values) => values.into_iter().any(eval_value_truthy),
        EvalValue::Empty => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_expression_transforms_value() {
        let expr = CompiledExpression::compile("uppercase(trim(value))").unwrap();
        assert_eq!(
            expr.eval_value(&Value::from("  ada ")).unwrap(),
            Value::from("ADA")
        );
    }

    #[test]
    fn string_helpers_are_registered() {
        let expr = CompiledExpression::compile("substring(snake_case(value), 0, 3)").unwrap();
        assert_eq!(
            expr.eval_value(&Value::from("Hello World")).unwrap(),
            Value::from("hel")
        );
        let expr = CompiledExpression::compile(r#"regex_replace(value, "[0-9]", "")"#).unwrap();
        assert_eq!(
            expr.eval_value(&Value::from("a1b2")).unwrap(),
            Value::from("ab")
        );
    }

    #[test]
    fn coalesce_fills_null_values() {
        let expr = CompiledExpression::compile(r#"coalesce(value, "n/a")"#).unwrap();
        assert_eq!(expr.eval_value(&Value::Null).unwrap(), Value::from("n/a"));
        assert_eq!(expr.eval_value(&Value::from("x")).unwrap(), Value::from("x"));
    }

    #[test]
    fn row_expressions_see_normalized_columns() {
        let expr = CompiledExpression::compile(r#"first_name != "" && value == "x""#).unwrap();
        let row = BTreeMap::from([("First Name", "Ada")]);
        assert!(expr.eval_row_truthy(&row, Some("x")).unwrap());
        assert!(!expr.eval_row_truthy(&row, Some("y")).unwrap());
    }

    #[test]
    fn row_variables_do_not_carry_over_between_evaluations() {
        let expr = CompiledExpression::compile(r#"first_name == "Ada""#).unwrap();
        let row = BTreeMap::from([("First Name", "Ada")]);
        assert!(expr.eval_row_truthy(&row, None).unwrap());
        assert!(expr.eval_row_truthy(&BTreeMap::new(), None).is_err());

        let copy = expr.clone();
        assert!(copy.eval_row_truthy(&row, None).unwrap());
        assert_eq!(
            expr.eval_value(&Value::from("x")).is_err(),
            copy.eval_value(&Value::from("x")).is_err()
        );
    }

    #[test]
    fn compile_rejects_malformed_expressions() {
        assert!(CompiledExpression::compile("uppercase(").is_err());
        assert!(CompiledExpression::compile("   ").is_err());
    }
}
