//! The per-execution data model.
//!
//! A hierarchical mapping from JSON-Pointer-style paths (`/workflow/users`)
//! to values, shared by every operation of one execution and alive only for
//! its duration. Paths use `/`-separated tokens; numeric tokens index into
//! arrays.

use serde_json::{Map, Value};

/// Path-addressable value store for one execution.
#[derive(Debug, Clone, Default)]
pub struct DataModel {
    root: Value,
}

impl DataModel {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Read the value at a path. Missing segments yield `None`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.root;

        for token in tokens(path) {
            current = match current {
                Value::Object(map) => map.get(token)?,
                Value::Array(items) => {
                    let index: usize = token.parse().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }

        Some(current)
    }

    /// Write a value at a path, creating intermediate objects as needed.
    /// Within existing arrays, a numeric token addresses an element; an
    /// index equal to the length appends.
    pub fn set(&mut self, path: &str, value: Value) {
        let parts: Vec<&str> = tokens(path).collect();
        if parts.is_empty() {
            self.root = value;
            return;
        }

        let mut current = &mut self.root;
        for token in &parts[..parts.len() - 1] {
            // A scalar in the middle of the path is replaced by an object,
            // matching write-through semantics.
            if !current.is_object() && !current.is_array() {
                *current = Value::Object(Map::new());
            }
            current = match current {
                Value::Array(items) => {
                    let Some(index) = token.parse::<usize>().ok().filter(|i| *i < items.len())
                    else {
                        return;
                    };
                    &mut items[index]
                }
                Value::Object(map) => map
                    .entry(token.to_string())
                    .or_insert_with(|| Value::Object(Map::new())),
                _ => unreachable!("normalized above"),
            };
        }

        let last = parts[parts.len() - 1];
        if !current.is_object() && !current.is_array() {
            *current = Value::Object(Map::new());
        }
        match current {
            Value::Array(items) => {
                if let Ok(index) = last.parse::<usize>() {
                    if index < items.len() {
                        items[index] = value;
                    } else if index == items.len() {
                        items.push(value);
                    }
                }
            }
            Value::Object(map) => {
                map.insert(last.to_string(), value);
            }
            _ => unreachable!("normalized above"),
        }
    }

    /// Expand `{a/b/c}` placeholders in a string against the data model.
    /// A placeholder whose path is missing is preserved literally.
    pub fn render_template(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let inner = &after[..close];
                    match self.get(&format!("/{}", inner.trim_start_matches('/'))) {
                        Some(value) => out.push_str(&stringify(value)),
                        None => {
                            out.push('{');
                            out.push_str(inner);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Resolve a config value that may be a literal, a `{"path": "/..."}`
    /// reference, or a `/`-prefixed path string.
    pub fn resolve_value(&self, value: &Value) -> Value {
        if let Value::Object(map) = value {
            if map.len() == 1 {
                if let Some(Value::String(path)) = map.get("path") {
                    return self.get(path).cloned().unwrap_or(Value::Null);
                }
            }
        }
        if let Value::String(s) = value {
            if s.starts_with('/') {
                if let Some(found) = self.get(s) {
                    return found.clone();
                }
            }
        }
        value.clone()
    }

    /// The whole tree, for response shaping.
    pub fn root(&self) -> &Value {
        &self.root
    }
}

fn tokens(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/')
        .split('/')
        .filter(|token| !token.is_empty())
}

/// Template rendering of a value: bare text for strings, JSON otherwise.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn set_creates_intermediate_objects() {
        let mut model = DataModel::new();
        model.set("/workflow/users", json!([{"id": "1"}]));
        model.set("/config/apiToken", json!("t"));

        assert_eq!(model.get("/workflow/users"), Some(&json!([{"id": "1"}])));
        assert_eq!(model.get("/config/apiToken"), Some(&json!("t")));
    }

    #[test]
    fn numeric_tokens_index_arrays() {
        let mut model = DataModel::new();
        model.set("/workflow/users", json!([{"points": 150}, {"points": 50}]));

        assert_eq!(model.get("/workflow/users/0/points"), Some(&json!(150)));
        assert_eq!(model.get("/workflow/users/1/points"), Some(&json!(50)));
        assert_eq!(model.get("/workflow/users/2/points"), None);
        assert_eq!(model.get("/workflow/users/x"), None);
    }

    #[test]
    fn get_missing_segments_is_none() {
        let model = DataModel::new();
        assert_eq!(model.get("/nothing/here"), None);
    }

    #[test]
    fn set_into_existing_array_element_and_append() {
        let mut model = DataModel::new();
        model.set("/items", json!(["a", "b"]));
        model.set("/items/1", json!("B"));
        model.set("/items/2", json!("c"));

        assert_eq!(model.get("/items"), Some(&json!(["a", "B", "c"])));
    }

    #[test]
    fn leading_slash_is_optional_on_get() {
        let mut model = DataModel::new();
        model.set("/a/b", json!(1));
        assert_eq!(model.get("a/b"), Some(&json!(1)));
    }

    #[test]
    fn template_expansion_and_literal_misses() {
        let mut model = DataModel::new();
        model.set("/workflow/user/name", json!("Ada"));
        model.set("/workflow/user/points", json!(150));

        let rendered = model.render_template(
            "Hello {workflow/user/name}, you have {workflow/user/points} points ({missing/path})",
        );
        assert_eq!(rendered, "Hello Ada, you have 150 points ({missing/path})");
    }

    #[test]
    fn unterminated_placeholder_is_preserved() {
        let model = DataModel::new();
        assert_eq!(model.render_template("brace {unclosed"), "brace {unclosed");
    }

    #[test]
    fn resolve_value_handles_all_three_forms() {
        let mut model = DataModel::new();
        model.set("/workflow/count", json!(3));

        assert_eq!(model.resolve_value(&json!({"path": "/workflow/count"})), json!(3));
        assert_eq!(model.resolve_value(&json!("/workflow/count")), json!(3));
        assert_eq!(model.resolve_value(&json!(100)), json!(100));
        assert_eq!(model.resolve_value(&json!("literal")), json!("literal"));
        // A path reference to nothing resolves to null; a path-shaped
        // string with no data stays literal.
        assert_eq!(model.resolve_value(&json!({"path": "/missing"})), json!(null));
        assert_eq!(model.resolve_value(&json!("/missing")), json!("/missing"));
    }
}
