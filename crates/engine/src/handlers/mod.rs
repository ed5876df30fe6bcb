//! Operation handlers.
//!
//! One module per family; each handler is a plain function with the
//! uniform `(config, data model) -> Result<Value>` shape the engine's
//! dispatch table expects. Handlers compute and return — writing the
//! result to the operation's output path is the engine's job.

pub mod codec;
pub mod data;
pub mod datetime;
pub mod math;
pub mod text;

use serde_json::Value;

use a2e_workflow::CompareOp;

/// Evaluate `left <op> right` with the filter semantics: an absent left
/// operand is `false`, numeric comparison coerces string operands when
/// both sides parse cleanly, and `contains` matches substrings of the
/// stringified left side.
pub fn compare(left: Option<&Value>, op: CompareOp, right: &Value) -> bool {
    let Some(left) = left else {
        return false;
    };

    match op {
        CompareOp::Eq => loose_eq(left, right),
        CompareOp::Ne => !loose_eq(left, right),
        CompareOp::Gt | CompareOp::Lt | CompareOp::Ge | CompareOp::Le => {
            match (as_number(left), as_number(right)) {
                (Some(l), Some(r)) => match op {
                    CompareOp::Gt => l > r,
                    CompareOp::Lt => l < r,
                    CompareOp::Ge => l >= r,
                    CompareOp::Le => l <= r,
                    _ => unreachable!(),
                },
                // Fall back to string ordering when both are strings.
                _ => match (left.as_str(), right.as_str()) {
                    (Some(l), Some(r)) => match op {
                        CompareOp::Gt => l > r,
                        CompareOp::Lt => l < r,
                        CompareOp::Ge => l >= r,
                        CompareOp::Le => l <= r,
                        _ => unreachable!(),
                    },
                    _ => false,
                },
            }
        }
        CompareOp::Contains => {
            let needle = match right {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            stringify(left).contains(&needle)
        }
    }
}

/// Equality with numeric coercion: `"100" == 100`.
fn loose_eq(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    matches!((as_number(left), as_number(right)), (Some(l), Some(r)) if l == r)
}

/// Numeric view of a value; strings coerce when they parse cleanly.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text view of a value: bare strings stay bare, everything else is JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
