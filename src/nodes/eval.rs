use std::collections::HashMap;
use anyhow::{Result, anyhow};
use evalexpr::{
    build_operator_tree, eval_with_context, ContextWithMutableVariables, DefaultNumericTypes,
    HashMapContext, Node as EvalNode,
};
use serde_json::{Value, json};
use tracing::warn;

use crate::error::EngineError;

/// Compile an expression once at worker spawn; failures surface as
/// definition errors instead of silent false at runtime.
pub fn compile(expr: &str) -> Result<EvalNode<DefaultNumericTypes>, EngineError> {
    build_operator_tree(expr).map_err(|e| EngineError::InvalidExpression {
        expr: expr.to_string(),
        message: e.to_string(),
    })
}

/// Build an evalexpr context from a token's data map.
/// Only scalars cross the boundary; arrays and nested maps are skipped.
pub fn eval_context(data: &HashMap<String, Value>) -> HashMapContext<DefaultNumericTypes> {
    let mut eval_ctx = HashMapContext::<DefaultNumericTypes>::new();
    for (k, v) in data {
        let eval_val = match v {
            Value::String(s) => Some(evalexpr::Value::String(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() { Some(evalexpr::Value::Int(i)) }
                else if let Some(f) = n.as_f64() { Some(evalexpr::Value::Float(f)) }
                else { None }
            },
            Value::Bool(b) => Some(evalexpr::Value::Boolean(*b)),
            _ => None,
        };
        if let Some(ev) = eval_val {
            let _ = eval_ctx.set_value(k.clone(), ev);
        }
    }
    eval_ctx
}

/// Evaluate a pre-compiled boolean condition against token data.
/// Evaluation errors count as no-match.
pub fn eval_condition(
    condition: &EvalNode<DefaultNumericTypes>,
    raw: &str,
    data: &HashMap<String, Value>,
) -> bool {
    let eval_ctx = eval_context(data);
    condition.eval_boolean_with_context(&eval_ctx).unwrap_or_else(|e| {
        warn!(condition = %raw, error = %e, "Condition evaluation failed, treating as false");
        false
    })
}

/// Evaluate a script expression against token data and return the merge patch.
/// "var = expr" binds the result to `var`; a bare expression binds to "result".
pub fn apply_script(script: &str, data: &HashMap<String, Value>) -> Result<HashMap<String, Value>> {
    let (target_var, rhs) = if let Some((left, right)) = script.split_once('=') {
        (left.trim(), right.trim())
    } else {
        ("result", script.trim())
    };

    let eval_ctx = eval_context(data);
    let result = eval_with_context(rhs, &eval_ctx)
        .map_err(|e| anyhow!("Script evaluation failed: {} -> {}", rhs, e))?;

    let json_val = match result {
        evalexpr::Value::String(s) => Value::String(s),
        evalexpr::Value::Int(i) => json!(i),
        evalexpr::Value::Float(f) => json!(f),
        evalexpr::Value::Boolean(b) => Value::Bool(b),
        other => return Err(anyhow!("Unsupported script result: {:?}", other)),
    };

    let mut patch = HashMap::new();
    patch.insert(target_var.to_string(), json_val);
    Ok(patch)
}
