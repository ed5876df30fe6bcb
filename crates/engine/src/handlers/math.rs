//! Arithmetic handler.

use serde_json::Value;

use a2e_error::{A2eError, Result};
use a2e_workflow::{CalcOp, CalculateConfig, DataModel};

use super::as_number;

/// Arithmetic on a number, or a reducer over an array of numbers.
pub fn calculate(config: &CalculateConfig, model: &DataModel) -> Result<Value> {
    let input = model
        .get(&config.input_path)
        .ok_or_else(|| A2eError::missing_input(&config.input_path))?;

    let result = match config.operation {
        CalcOp::Add | CalcOp::Subtract | CalcOp::Multiply | CalcOp::Divide => {
            let left = number(input, &config.input_path)?;
            let right = config.operand.ok_or_else(|| {
                A2eError::validation(format!(
                    "Calculate {:?} requires an 'operand'",
                    config.operation
                ))
            })?;
            match config.operation {
                CalcOp::Add => left + right,
                CalcOp::Subtract => left - right,
                CalcOp::Multiply => left * right,
                CalcOp::Divide => {
                    if right == 0.0 {
                        return Err(A2eError::data("Division by zero"));
                    }
                    left / right
                }
                _ => unreachable!(),
            }
        }
        CalcOp::Round => {
            let value = number(input, &config.input_path)?;
            let precision = config.precision.unwrap_or(0);
            let factor = 10f64.powi(precision as i32);
            (value * factor).round() / factor
        }
        CalcOp::Sum | CalcOp::Average => {
            let numbers = number_array(input)?;
            let sum: f64 = numbers.iter().sum();
            match config.operation {
                CalcOp::Sum => sum,
                CalcOp::Average => {
                    if numbers.is_empty() {
                        return Err(A2eError::data("Cannot average an empty array"));
                    }
                    sum / numbers.len() as f64
                }
                _ => unreachable!(),
            }
        }
    };

    // Integral results serialize as integers, matching agent expectations.
    if result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
        Ok(Value::from(result as i64))
    } else {
        Ok(Value::from(result))
    }
}

fn number(value: &Value, path: &str) -> Result<f64> {
    as_number(value)
        .ok_or_else(|| A2eError::data(format!("value at {path} is not a number")))
}

fn number_array(value: &Value) -> Result<Vec<f64>> {
    let Value::Array(items) = value else {
        return Err(A2eError::data("Calculate sum/average requires an array"));
    };
    items
        .iter()
        .map(|item| {
            as_number(item).ok_or_else(|| {
                A2eError::data(format!("array element {item} is not a number"))
            })
        })
        .collect()
}
