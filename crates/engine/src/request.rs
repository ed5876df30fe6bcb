//! HTTP dispatch for `ApiCall`.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use a2e_error::{A2eError, Result};

/// Send one HTTP request and decode the response body.
///
/// Status mapping: 5xx, 408 and 429 become retryable API errors, other
/// 4xx non-retryable ones; connection failures and timeouts are network
/// errors. A JSON body is decoded; anything else is returned as text.
pub async fn send_api_call(
    client: &reqwest::Client,
    method: &str,
    url: &str,
    headers: &[(String, String)],
    body: Option<&Value>,
    timeout: Duration,
) -> Result<Value> {
    let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| A2eError::validation(format!("invalid HTTP method: {method}")))?;

    let mut request = client.request(method, url).timeout(timeout);
    for (key, value) in headers {
        request = request.header(key, value);
    }
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request.send().await.map_err(classify_transport_error)?;
    let status = response.status().as_u16();
    let text = response.text().await.map_err(classify_transport_error)?;

    if status >= 400 {
        let preview: String = text.chars().take(200).collect();
        return Err(A2eError::api_error(status, preview).with_context_entry("url", url));
    }

    debug!(status, url, "api call completed");
    Ok(decode_body(&text))
}

fn classify_transport_error(err: reqwest::Error) -> A2eError {
    if err.is_timeout() {
        A2eError::network(format!("request timeout: {err}"))
    } else if err.is_connect() {
        A2eError::network(format!("connection error: {err}"))
    } else {
        A2eError::network(format!("transport error: {err}"))
    }
}

fn decode_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
