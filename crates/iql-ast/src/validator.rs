//! Type validation of resolved argument values

use iql_ir::{ParamType, Value};
use iql_registry::Parameter;
use thiserror::Error;

use crate::error::{IqlError, Snippet};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason}")]
pub struct TypeMismatch {
    pub reason: String,
}

impl TypeMismatch {
    fn new(declared: &ParamType, value: &Value) -> Self {
        Self {
            reason: format!("expected {}, got {}", declared, value.kind()),
        }
    }
}

/// Check `value` against `declared`, casting where the type allows it.
///
/// An `int` is widened when the declared type is `float`. A union takes the
/// first branch that accepts the value and, when none does, reports why the
/// first-declared branch rejected it.
pub fn validate(value: Value, declared: &ParamType) -> Result<Value, TypeMismatch> {
    match (declared, value) {
        (ParamType::Int, Value::Int(v)) => Ok(Value::Int(v)),
        (ParamType::Float, Value::Float(v)) => Ok(Value::Float(v)),
        (ParamType::Float, Value::Int(v)) => Ok(Value::Float(v as f64)),
        (ParamType::Str, Value::Str(v)) => Ok(Value::Str(v)),
        (ParamType::Bool, Value::Bool(v)) => Ok(Value::Bool(v)),
        (ParamType::List(inner), Value::List(items)) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                validate(item, inner).map_err(|e| TypeMismatch {
                    reason: format!("element {}: {}", idx, e.reason),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        (ParamType::Optional(_), Value::None) => Ok(Value::None),
        (ParamType::Optional(inner), value) => validate(value, inner),
        (ParamType::Context(name), Value::Context(ctx)) if ctx.type_name == *name => {
            Ok(Value::Context(ctx))
        }
        (ParamType::Union(members), value) => {
            let mut first_failure = None;
            for member in members {
                match validate(value.clone(), member) {
                    Ok(cast) => return Ok(cast),
                    Err(e) => {
                        first_failure.get_or_insert(e);
                    }
                }
            }
            Err(first_failure.unwrap_or_else(|| TypeMismatch::new(declared, &value)))
        }
        (declared, value) => Err(TypeMismatch::new(declared, &value)),
    }
}

pub(crate) fn validate_argument(value: Value, param: &Parameter, snippet: &Snippet) -> Result<Value, IqlError> {
    validate(value, &param.param_type).map_err(|e| IqlError::ArgumentValidation {
        parameter: param.name.clone(),
        expected: param.param_type.to_string(),
        reason: e.reason,
        snippet: snippet.clone(),
    })
}
