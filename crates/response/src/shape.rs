//! Success and partial-success shaping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use a2e_core::{ExecutionId, OperationId};
use a2e_error::A2eError;
use a2e_journal::redact_value;

use crate::error_shape::shape_error_payload;

const MAX_DEPTH: usize = 3;
const MAX_LIST_ITEMS: usize = 50;

/// Keys considered useful when summarizing an operation result.
const USEFUL_KEYS: &[&str] = &[
    "id", "name", "title", "value", "result", "output", "data", "items", "results", "count",
    "total", "status", "message", "url", "path",
];

/// Scalar keys the minimal mode falls back to when a result has neither
/// `data` nor `items`.
const MINIMAL_KEYS: &[&str] = &["id", "name", "value", "result", "output"];

/// Output mode for execution responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Minimal,
    #[default]
    Summary,
    Full,
}

/// Shape an all-success response.
pub fn shape_success(
    execution_id: ExecutionId,
    results: &BTreeMap<OperationId, Value>,
    format: ResponseFormat,
) -> Value {
    let shaped = match format {
        ResponseFormat::Minimal => shape_minimal(results),
        ResponseFormat::Summary => shape_summary(execution_id, results),
        ResponseFormat::Full => json!({
            "status": "success",
            "execution_id": execution_id,
            "results": results,
        }),
    };
    redact_value(&shaped)
}

/// Classify and shape an execution outcome.
///
/// Some successes and some failures give `partial_success`; no successes
/// (including the degenerate empty execution) give `error`; otherwise
/// `success`.
pub fn shape_outcome(
    execution_id: ExecutionId,
    successful: &BTreeMap<OperationId, Value>,
    failed: &BTreeMap<OperationId, A2eError>,
    format: ResponseFormat,
) -> Value {
    if !failed.is_empty() && !successful.is_empty() {
        return shape_partial(execution_id, successful, failed);
    }
    if successful.is_empty() {
        let errors: Map<String, Value> = failed
            .iter()
            .map(|(id, error)| (id.to_string(), shape_error_payload(error)))
            .collect();
        let first = failed.values().next().map(shape_error_payload);
        return redact_value(&json!({
            "status": "error",
            "execution_id": execution_id,
            "error": first.unwrap_or_else(|| json!({
                "type": "EXECUTION_ERROR",
                "category": "execution",
                "message": "execution produced no results",
                "recoverable": false,
            })),
            "errors": errors,
        }));
    }
    shape_success(execution_id, successful, format)
}

fn shape_partial(
    execution_id: ExecutionId,
    successful: &BTreeMap<OperationId, Value>,
    failed: &BTreeMap<OperationId, A2eError>,
) -> Value {
    let succeeded: Map<String, Value> = successful
        .iter()
        .map(|(id, result)| (id.to_string(), extract_useful_fields(result, 0)))
        .collect();
    let errors: Map<String, Value> = failed
        .iter()
        .map(|(id, error)| (id.to_string(), shape_error_payload(error)))
        .collect();

    redact_value(&json!({
        "status": "partial_success",
        "execution_id": execution_id,
        "successful": {
            "count": successful.len(),
            "operations": succeeded,
        },
        "failed": {
            "count": failed.len(),
            "operations": errors,
        },
    }))
}

fn shape_minimal(results: &BTreeMap<OperationId, Value>) -> Value {
    let mut data = Map::new();
    for (id, result) in results {
        let extracted = match result {
            Value::Object(map) => {
                if let Some(inner) = map.get("data").or_else(|| map.get("items")) {
                    Some(inner.clone())
                } else {
                    let scalars: Map<String, Value> = map
                        .iter()
                        .filter(|(key, value)| {
                            MINIMAL_KEYS.contains(&key.as_str()) && !value.is_null()
                        })
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    (!scalars.is_empty()).then(|| Value::Object(scalars))
                }
            }
            other => Some(other.clone()),
        };
        if let Some(extracted) = extracted {
            data.insert(id.to_string(), extracted);
        }
    }
    json!({"status": "success", "data": data})
}

fn shape_summary(execution_id: ExecutionId, results: &BTreeMap<OperationId, Value>) -> Value {
    let mut operations = Map::new();
    let mut data = Map::new();

    for (id, result) in results {
        operations.insert(id.to_string(), json!({"status": "success"}));
        let useful = extract_useful_fields(result, 0);
        if !useful.is_null() {
            data.insert(id.to_string(), useful);
        }
    }

    json!({
        "status": "success",
        "execution_id": execution_id,
        "counts": {"operations": results.len(), "succeeded": results.len()},
        "operations": operations,
        "data": data,
    })
}

/// Keep useful fields, capped in depth and list length.
fn extract_useful_fields(value: &Value, depth: usize) -> Value {
    if depth >= MAX_DEPTH {
        return Value::Null;
    }

    match value {
        Value::Object(map) => {
            let mut filtered = Map::new();
            for (key, inner) in map {
                if USEFUL_KEYS.contains(&key.to_lowercase().as_str()) {
                    filtered.insert(key.clone(), extract_useful_fields(inner, depth + 1));
                } else if is_small_scalar(inner) {
                    filtered.insert(key.clone(), inner.clone());
                } else if let Value::Array(items) = inner {
                    if items.len() <= 10 {
                        filtered.insert(
                            key.clone(),
                            Value::Array(
                                items
                                    .iter()
                                    .map(|item| extract_useful_fields(item, depth + 1))
                                    .collect(),
                            ),
                        );
                    }
                }
            }
            if filtered.is_empty() {
                Value::Null
            } else {
                Value::Object(filtered)
            }
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(MAX_LIST_ITEMS)
                .map(|item| extract_useful_fields(item, depth + 1))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_small_scalar(value: &Value) -> bool {
    match value {
        Value::String(s) => s.chars().count() < 100,
        Value::Number(_) | Value::Bool(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn op(id: &str) -> OperationId {
        OperationId::new(id).unwrap()
    }

    fn results_with(entries: &[(&str, Value)]) -> BTreeMap<OperationId, Value> {
        entries
            .iter()
            .map(|(id, value)| (op(id), value.clone()))
            .collect()
    }

    #[test]
    fn outcome_classification_covers_all_three_cases() {
        let execution_id = ExecutionId::new();
        let successes = results_with(&[("fetch", json!({"data": [1]}))]);
        let mut failures = BTreeMap::new();
        failures.insert(op("filter"), A2eError::missing_input("/workflow/users"));
        let empty_success: BTreeMap<OperationId, Value> = BTreeMap::new();
        let empty_failure: BTreeMap<OperationId, A2eError> = BTreeMap::new();

        let partial =
            shape_outcome(execution_id, &successes, &failures, ResponseFormat::Summary);
        assert_eq!(partial["status"], json!("partial_success"));

        let error =
            shape_outcome(execution_id, &empty_success, &failures, ResponseFormat::Summary);
        assert_eq!(error["status"], json!("error"));

        let degenerate =
            shape_outcome(execution_id, &empty_success, &empty_failure, ResponseFormat::Summary);
        assert_eq!(degenerate["status"], json!("error"));

        let success =
            shape_outcome(execution_id, &successes, &empty_failure, ResponseFormat::Summary);
        assert_eq!(success["status"], json!("success"));
    }

    #[test]
    fn minimal_extracts_data_then_items_then_scalars() {
        let results = results_with(&[
            ("a", json!({"data": [1, 2], "noise": "ignored"})),
            ("b", json!({"items": ["x"], "noise": "ignored"})),
            ("c", json!({"name": "ada", "huge_blob": {"deep": true}})),
            ("d", json!([7, 8, 9])),
        ]);
        let shaped = shape_success(ExecutionId::new(), &results, ResponseFormat::Minimal);

        assert_eq!(shaped["data"]["a"], json!([1, 2]));
        assert_eq!(shaped["data"]["b"], json!(["x"]));
        assert_eq!(shaped["data"]["c"], json!({"name": "ada"}));
        assert_eq!(shaped["data"]["d"], json!([7, 8, 9]));
    }

    #[test]
    fn summary_caps_depth_and_counts_operations() {
        let deep = json!({"data": {"items": {"results": {"value": {"too": "deep"}}}}});
        let results = results_with(&[("a", deep)]);
        let shaped = shape_success(ExecutionId::new(), &results, ResponseFormat::Summary);

        assert_eq!(shaped["counts"]["operations"], json!(1));
        assert_eq!(shaped["operations"]["a"]["status"], json!("success"));
        // Depth beyond the cap is cut off.
        assert_eq!(shaped["data"]["a"]["data"]["items"]["results"], json!(null));
    }

    #[test]
    fn summary_caps_list_length() {
        let big: Vec<Value> = (0..200).map(Value::from).collect();
        let results = results_with(&[("a", Value::Array(big))]);
        let shaped = shape_success(ExecutionId::new(), &results, ResponseFormat::Summary);
        assert_eq!(shaped["data"]["a"].as_array().unwrap().len(), MAX_LIST_ITEMS);
    }

    #[test]
    fn every_mode_passes_the_redactor() {
        let results = results_with(&[("a", json!({"data": {"api_token": "secret-XYZ"}}))]);
        for format in [ResponseFormat::Minimal, ResponseFormat::Summary, ResponseFormat::Full] {
            let shaped = shape_success(ExecutionId::new(), &results, format);
            assert!(!shaped.to_string().contains("secret-XYZ"), "{format:?}");
        }
    }

    #[test]
    fn partial_carries_both_maps_with_counts() {
        let successes = results_with(&[("fetch", json!({"data": [1]}))]);
        let mut failures = BTreeMap::new();
        failures.insert(
            op("filter"),
            A2eError::missing_input("/workflow/users").with_operation(op("filter")),
        );

        let shaped = shape_outcome(
            ExecutionId::new(),
            &successes,
            &failures,
            ResponseFormat::Summary,
        );
        assert_eq!(shaped["successful"]["count"], json!(1));
        assert_eq!(shaped["failed"]["count"], json!(1));
        assert_eq!(
            shaped["failed"]["operations"]["filter"]["category"],
            json!("data_error")
        );
    }
}
