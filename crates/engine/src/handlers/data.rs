//! Array and object handlers: filter, transform, merge.

use serde_json::{Map, Value};

use a2e_error::{A2eError, Result};
use a2e_workflow::{
    DataModel, FilterDataConfig, MergeDataConfig, MergeMode, ReduceKind, TransformDataConfig,
    TransformKind,
};

use super::compare;

/// Keep the elements matching every condition (a conjunction).
pub fn filter_data(config: &FilterDataConfig, model: &DataModel) -> Result<Value> {
    let input = model
        .get(&config.input_path)
        .ok_or_else(|| A2eError::missing_input(&config.input_path))?;
    let Value::Array(items) = input else {
        return Err(A2eError::data(format!(
            "FilterData requires array input, got {}",
            type_name(input)
        )));
    };

    let mut kept: Vec<Value> = items.clone();
    for condition in &config.conditions {
        let right = model.resolve_value(&condition.value);
        kept.retain(|item| compare(item.get(&condition.field), condition.operator, &right));
    }

    Ok(Value::Array(kept))
}

/// Map, sort, or reduce an array.
pub fn transform_data(config: &TransformDataConfig, model: &DataModel) -> Result<Value> {
    let input = model
        .get(&config.input_path)
        .ok_or_else(|| A2eError::missing_input(&config.input_path))?;
    let Value::Array(items) = input else {
        return Err(A2eError::data(format!(
            "TransformData requires array input, got {}",
            type_name(input)
        )));
    };

    match config.transform {
        TransformKind::Map => {
            let field = config.field.as_deref().ok_or_else(|| {
                A2eError::validation("TransformData map requires a 'field' to extract")
            })?;
            Ok(Value::Array(
                items
                    .iter()
                    .map(|item| item.get(field).cloned().unwrap_or(Value::Null))
                    .collect(),
            ))
        }
        TransformKind::Sort => {
            let mut sorted = items.clone();
            sorted.sort_by(|a, b| {
                let (a, b) = match config.field.as_deref() {
                    Some(field) => (a.get(field), b.get(field)),
                    None => (Some(a), Some(b)),
                };
                compare_for_sort(a, b)
            });
            if config.descending {
                sorted.reverse();
            }
            Ok(Value::Array(sorted))
        }
        TransformKind::Reduce => {
            let reducer = config.reducer.unwrap_or(ReduceKind::Count);
            Ok(match reducer {
                ReduceKind::Count => Value::from(items.len()),
                ReduceKind::First => items.first().cloned().unwrap_or(Value::Null),
                ReduceKind::Last => items.last().cloned().unwrap_or(Value::Null),
            })
        }
    }
}

fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (super::as_number(a), super::as_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => super::stringify(a).cmp(&super::stringify(b)),
        },
    }
}

/// Combine several data-model paths into one object or array.
pub fn merge_data(config: &MergeDataConfig, model: &DataModel) -> Result<Value> {
    match config.mode {
        MergeMode::Object => {
            let mut out = Map::new();
            for (index, path) in config.input_paths.iter().enumerate() {
                let key = config
                    .keys
                    .as_ref()
                    .and_then(|keys| keys.get(index).cloned())
                    .unwrap_or_else(|| last_segment(path));
                let value = model.get(path).cloned().unwrap_or(Value::Null);
                out.insert(key, value);
            }
            Ok(Value::Object(out))
        }
        MergeMode::Array => {
            let mut out = Vec::new();
            for path in &config.input_paths {
                match model.get(path) {
                    Some(Value::Array(items)) => out.extend(items.iter().cloned()),
                    Some(other) => out.push(other.clone()),
                    None => {}
                }
            }
            Ok(Value::Array(out))
        }
    }
}

fn last_segment(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
        .to_string()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2e_workflow::{CompareOp, FilterCondition};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn model_with(path: &str, value: Value) -> DataModel {
        let mut model = DataModel::new();
        model.set(path, value);
        model
    }

    fn filter_config(conditions: Vec<FilterCondition>) -> FilterDataConfig {
        FilterDataConfig {
            input_path: "/workflow/users".into(),
            conditions,
            output_path: "/workflow/filtered".into(),
        }
    }

    #[test]
    fn filter_keeps_matching_elements() {
        let model = model_with(
            "/workflow/users",
            json!([
                {"id": "1", "points": 150},
                {"id": "2", "points": 50},
                {"id": "3", "points": 200}
            ]),
        );
        let config = filter_config(vec![FilterCondition {
            field: "points".into(),
            operator: CompareOp::Gt,
            value: json!(100),
        }]);

        let result = filter_data(&config, &model).unwrap();
        assert_eq!(
            result,
            json!([{"id": "1", "points": 150}, {"id": "3", "points": 200}])
        );
    }

    #[test]
    fn filter_conditions_are_a_conjunction() {
        let model = model_with(
            "/workflow/users",
            json!([
                {"points": 150, "active": true},
                {"points": 200, "active": false}
            ]),
        );
        let config = filter_config(vec![
            FilterCondition {
                field: "points".into(),
                operator: CompareOp::Gt,
                value: json!(100),
            },
            FilterCondition {
                field: "active".into(),
                operator: CompareOp::Eq,
                value: json!(true),
            },
        ]);

        let result = filter_data(&config, &model).unwrap();
        assert_eq!(result.as_array().unwrap().len(), 1);
    }

    #[test]
    fn filter_absent_field_drops_the_element() {
        let model = model_with("/workflow/users", json!([{"points": 150}, {"name": "x"}]));
        let config = filter_config(vec![FilterCondition {
            field: "points".into(),
            operator: CompareOp::Ge,
            value: json!(0),
        }]);
        assert_eq!(filter_data(&config, &model).unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn filter_value_may_reference_the_data_model() {
        let mut model = model_with("/workflow/users", json!([{"points": 150}, {"points": 50}]));
        model.set("/workflow/threshold", json!(100));
        let config = filter_config(vec![FilterCondition {
            field: "points".into(),
            operator: CompareOp::Gt,
            value: json!({"path": "/workflow/threshold"}),
        }]);
        assert_eq!(filter_data(&config, &model).unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn filter_non_array_input_is_a_data_error() {
        let model = model_with("/workflow/users", json!({"not": "array"}));
        let err = filter_data(&filter_config(vec![]), &model).unwrap_err();
        assert_eq!(err.category(), a2e_error::ErrorCategory::DataError);
        assert!(err.message.contains("requires array input"));
    }

    #[test]
    fn filter_missing_input_is_missing_input() {
        let err = filter_data(&filter_config(vec![]), &DataModel::new()).unwrap_err();
        assert_eq!(err.code, "MISSING_INPUT");
    }

    #[test]
    fn transform_map_extracts_fields() {
        let model = model_with("/in", json!([{"name": "a"}, {"name": "b"}, {"other": 1}]));
        let config = TransformDataConfig {
            input_path: "/in".into(),
            transform: TransformKind::Map,
            field: Some("name".into()),
            descending: false,
            reducer: None,
            output_path: "/out".into(),
        };
        assert_eq!(transform_data(&config, &model).unwrap(), json!(["a", "b", null]));
    }

    #[test]
    fn transform_sort_by_field_and_descending() {
        let model = model_with("/in", json!([{"n": 2}, {"n": 10}, {"n": 1}]));
        let mut config = TransformDataConfig {
            input_path: "/in".into(),
            transform: TransformKind::Sort,
            field: Some("n".into()),
            descending: false,
            reducer: None,
            output_path: "/out".into(),
        };
        assert_eq!(
            transform_data(&config, &model).unwrap(),
            json!([{"n": 1}, {"n": 2}, {"n": 10}])
        );

        config.descending = true;
        assert_eq!(
            transform_data(&config, &model).unwrap(),
            json!([{"n": 10}, {"n": 2}, {"n": 1}])
        );
    }

    #[test]
    fn transform_reduce_count_first_last() {
        let model = model_with("/in", json!(["a", "b", "c"]));
        let mut config = TransformDataConfig {
            input_path: "/in".into(),
            transform: TransformKind::Reduce,
            field: None,
            descending: false,
            reducer: Some(ReduceKind::Count),
            output_path: "/out".into(),
        };
        assert_eq!(transform_data(&config, &model).unwrap(), json!(3));
        config.reducer = Some(ReduceKind::First);
        assert_eq!(transform_data(&config, &model).unwrap(), json!("a"));
        config.reducer = Some(ReduceKind::Last);
        assert_eq!(transform_data(&config, &model).unwrap(), json!("c"));
    }

    #[test]
    fn merge_object_uses_keys_or_last_segments() {
        let mut model = DataModel::new();
        model.set("/workflow/users", json!([1]));
        model.set("/workflow/count", json!(1));

        let config = MergeDataConfig {
            input_paths: vec!["/workflow/users".into(), "/workflow/count".into()],
            mode: MergeMode::Object,
            keys: None,
            output_path: "/out".into(),
        };
        assert_eq!(
            merge_data(&config, &model).unwrap(),
            json!({"users": [1], "count": 1})
        );

        let with_keys = MergeDataConfig {
            keys: Some(vec!["u".into(), "c".into()]),
            ..config
        };
        assert_eq!(
            merge_data(&with_keys, &model).unwrap(),
            json!({"u": [1], "c": 1})
        );
    }

    #[test]
    fn merge_array_concatenates_and_skips_missing() {
        let mut model = DataModel::new();
        model.set("/a", json!([1, 2]));
        model.set("/b", json!(3));

        let config = MergeDataConfig {
            input_paths: vec!["/a".into(), "/b".into(), "/missing".into()],
            mode: MergeMode::Array,
            keys: None,
            output_path: "/out".into(),
        };
        assert_eq!(merge_data(&config, &model).unwrap(), json!([1, 2, 3]));
    }
}
