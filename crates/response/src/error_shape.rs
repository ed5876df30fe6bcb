//! Error payloads for agents.

use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

use a2e_core::ExecutionId;
use a2e_error::{A2eError, ErrorCategory};
use a2e_journal::redact_value;

const MAX_MESSAGE_LEN: usize = 500;
const MAX_MESSAGE_LINES: usize = 3;

/// Sanitize an error message: filesystem-path-shaped fragments stripped,
/// stack traces collapsed to the first lines, length capped.
pub fn sanitize_message(message: &str) -> String {
    static PATH_RE: OnceLock<Regex> = OnceLock::new();
    let path_re = PATH_RE.get_or_init(|| Regex::new(r"/[^\s]+").expect("static regex"));

    let mut message = path_re.replace_all(message, "[path]").into_owned();

    if message.contains('\n') {
        message = message
            .lines()
            .take(MAX_MESSAGE_LINES)
            .collect::<Vec<_>>()
            .join("\n");
    }

    if message.chars().count() > MAX_MESSAGE_LEN {
        message = message.chars().take(MAX_MESSAGE_LEN).collect::<String>() + "...";
    }

    message
}

/// Human suggestions for a failure, keyed by category and (for API errors)
/// by status bucket.
pub fn suggestions_for(error: &A2eError) -> Vec<&'static str> {
    match error.category() {
        ErrorCategory::Authentication => vec![
            "Check API key or token is valid",
            "Verify credentials are correctly configured",
        ],
        ErrorCategory::Authorization => vec![
            "Verify the agent has permission to access this resource",
            "Check the agent's allow-list configuration",
        ],
        ErrorCategory::Validation => vec![
            "Check input parameters are valid",
            "Verify data format matches the expected schema",
        ],
        ErrorCategory::Network => vec![
            "Check network connectivity",
            "Verify the API endpoint is accessible",
            "Consider retrying after a short delay",
        ],
        ErrorCategory::ApiError => match error.api_status() {
            Some(401) | Some(403) => vec!["Authentication failed - check credentials"],
            Some(404) => vec!["Resource not found - verify the endpoint URL"],
            Some(429) => vec!["Rate limit exceeded - wait before retrying"],
            Some(status) if status >= 500 => vec!["Server error - try again later"],
            _ => vec!["API returned an error - check API status"],
        },
        ErrorCategory::DataError => vec![
            "Check data format and structure",
            "Verify required fields are present",
        ],
        ErrorCategory::RateLimited => vec![
            "Wait for the indicated retry delay before resubmitting",
            "Reduce the request rate or ask for a higher limit",
        ],
        ErrorCategory::Execution | ErrorCategory::Unknown => vec![],
    }
}

/// The `error` object of a failure payload.
pub fn shape_error_payload(error: &A2eError) -> Value {
    let context = redact_value(&json!(error.context));
    json!({
        "type": error.code,
        "category": error.category(),
        "message": sanitize_message(&error.message),
        "operation_id": error.operation_id,
        "recoverable": error.is_recoverable(),
        "context": context,
        "suggestions": suggestions_for(error),
    })
}

/// A full error response.
pub fn shape_error(execution_id: Option<ExecutionId>, error: &A2eError) -> Value {
    let mut response = json!({
        "status": "error",
        "error": shape_error_payload(error),
    });
    if let Some(execution_id) = execution_id {
        response["execution_id"] = json!(execution_id);
    }
    if let Some(retry_after) = error.retry_after {
        response["retry_after"] = json!(retry_after.as_secs());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn paths_are_stripped_and_length_capped() {
        let sanitized = sanitize_message("failed to read /etc/a2e/secrets.json while connecting");
        assert_eq!(sanitized, "failed to read [path] while connecting");

        let long = "x".repeat(800);
        assert!(sanitize_message(&long).len() <= MAX_MESSAGE_LEN + 3);
    }

    #[test]
    fn multiline_messages_collapse_to_first_lines() {
        let trace = "boom\nat frame one\nat frame two\nat frame three\nat frame four";
        assert_eq!(sanitize_message(trace).lines().count(), 3);
    }

    #[test]
    fn api_suggestions_follow_status_buckets() {
        assert!(suggestions_for(&A2eError::api_error(429, "slow down"))[0].contains("Rate limit"));
        assert!(suggestions_for(&A2eError::api_error(503, "oops"))[0].contains("Server error"));
        assert!(suggestions_for(&A2eError::api_error(404, "gone"))[0].contains("not found"));
    }

    #[test]
    fn payload_carries_category_recoverability_and_context() {
        let error = A2eError::api_error(401, "denied")
            .with_operation(a2e_core::OperationId::new("fetch").unwrap())
            .with_context_entry("api_token", "secret-XYZ")
            .with_context_entry("domain", "api.example.com");

        let payload = shape_error_payload(&error);
        assert_eq!(payload["category"], json!("api_error"));
        assert_eq!(payload["operation_id"], json!("fetch"));
        assert_eq!(payload["recoverable"], json!(true));
        // Sensitive context keys are redacted.
        assert_eq!(payload["context"]["api_token"], json!("[REDACTED]"));
        assert_eq!(payload["context"]["domain"], json!("api.example.com"));
    }

    #[test]
    fn rate_limited_response_carries_retry_after() {
        let error = A2eError::rate_limited("minute", 2, Duration::from_secs(42));
        let response = shape_error(None, &error);
        assert_eq!(response["status"], json!("error"));
        assert_eq!(response["retry_after"], json!(42));
    }
}
