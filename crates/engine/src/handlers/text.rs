//! Text handlers: formatting, extraction, typed validation.

use regex::Regex;
use serde_json::{json, Value};
use url::Url;

use a2e_error::{A2eError, Result};
use a2e_workflow::{
    DataModel, ExtractTextConfig, FormatTextConfig, TextFormat, ValidateDataConfig, ValidationType,
};

use super::stringify;

/// Case, trim, template, and replace transformations.
pub fn format_text(config: &FormatTextConfig, model: &DataModel) -> Result<Value> {
    let input = model
        .get(&config.input_path)
        .ok_or_else(|| A2eError::missing_input(&config.input_path))?;

    let out = match config.format {
        TextFormat::Upper => stringify(input).to_uppercase(),
        TextFormat::Lower => stringify(input).to_lowercase(),
        TextFormat::Title => title_case(&stringify(input)),
        TextFormat::Trim => stringify(input).trim().to_string(),
        TextFormat::Template => {
            let template = config.template.as_deref().ok_or_else(|| {
                A2eError::validation("FormatText template mode requires a 'template'")
            })?;
            render_against(template, input, model)
        }
        TextFormat::Replace => {
            let mut text = stringify(input);
            if let Some(replacements) = &config.replacements {
                for (from, to) in replacements {
                    text = text.replace(from.as_str(), to);
                }
            }
            text
        }
    };

    Ok(Value::String(out))
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Expand `{name}` placeholders against the operation's input object
/// first, falling back to the execution data model; misses stay literal.
fn render_against(template: &str, input: &Value, model: &DataModel) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push('{');
            rest = after;
            continue;
        };
        let token = &after[..close];

        let local = lookup_in(input, token);
        let resolved = match local {
            Some(value) => Some(stringify(value)),
            None => model
                .get(&format!("/{}", token.trim_start_matches('/')))
                .map(stringify),
        };
        match resolved {
            Some(text) => out.push_str(&text),
            None => {
                out.push('{');
                out.push_str(token);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

fn lookup_in<'a>(value: &'a Value, token: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in token.trim_matches('/').split('/') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Regex extraction: first match or all matches. A pattern with capture
/// groups yields the first group, a plain pattern the whole match.
pub fn extract_text(config: &ExtractTextConfig, model: &DataModel) -> Result<Value> {
    let input = model
        .get(&config.input_path)
        .ok_or_else(|| A2eError::missing_input(&config.input_path))?;
    let text = stringify(input);

    let regex = Regex::new(&config.pattern)
        .map_err(|e| A2eError::validation(format!("Invalid regex pattern: {e}")))?;

    let pick = |captures: regex::Captures<'_>| -> String {
        captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };

    if config.extract_all {
        let matches: Vec<Value> = regex
            .captures_iter(&text)
            .map(|captures| Value::String(pick(captures)))
            .collect();
        Ok(Value::Array(matches))
    } else {
        Ok(regex
            .captures(&text)
            .map(|captures| Value::String(pick(captures)))
            .unwrap_or(Value::Null))
    }
}

/// Typed validation; always returns `{valid, value, error?}` rather than
/// failing the operation.
pub fn validate_data(config: &ValidateDataConfig, model: &DataModel) -> Result<Value> {
    let input = model
        .get(&config.input_path)
        .ok_or_else(|| A2eError::missing_input(&config.input_path))?;
    let text = stringify(input);

    let failure = |message: &str| -> Value {
        json!({"valid": false, "value": input, "error": message})
    };

    let result = match config.validation_type {
        ValidationType::Email => {
            static_pattern(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
                .is_match(&text)
                .then(|| json!({"valid": true, "value": input}))
                .unwrap_or_else(|| failure("not a valid email address"))
        }
        ValidationType::Url => match Url::parse(&text) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                json!({"valid": true, "value": input})
            }
            _ => failure("not a valid http(s) URL"),
        },
        ValidationType::Number => match super::as_number(input) {
            Some(number) => json!({"valid": true, "value": number}),
            None => failure("not a number"),
        },
        ValidationType::Integer => match text.trim().parse::<i64>() {
            Ok(number) => json!({"valid": true, "value": number}),
            Err(_) => failure("not an integer"),
        },
        ValidationType::Phone => {
            static_pattern(r"^\+?[0-9][0-9 ().-]{5,}$")
                .is_match(text.trim())
                .then(|| json!({"valid": true, "value": input}))
                .unwrap_or_else(|| failure("not a valid phone number"))
        }
        ValidationType::Date => {
            let ok = chrono::DateTime::parse_from_rfc3339(&text).is_ok()
                || chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d").is_ok();
            if ok {
                json!({"valid": true, "value": input})
            } else {
                failure("not a valid date")
            }
        }
        ValidationType::Custom => {
            let pattern = config.pattern.as_deref().ok_or_else(|| {
                A2eError::validation("custom validation requires a 'pattern'")
            })?;
            let regex = Regex::new(pattern)
                .map_err(|e| A2eError::validation(format!("Invalid regex pattern: {e}")))?;
            if regex.is_match(&text) {
                json!({"valid": true, "value": input})
            } else {
                failure("value does not match pattern")
            }
        }
    };

    Ok(result)
}

fn static_pattern(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex")
}
