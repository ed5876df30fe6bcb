//! Encoding and decoding handler.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::Value;

use a2e_error::{A2eError, Result};
use a2e_workflow::{CodecDirection, DataModel, EncodeDecodeConfig, Encoding};

use super::stringify;

/// Base64, URL, and HTML encoding/decoding.
pub fn encode_decode(config: &EncodeDecodeConfig, model: &DataModel) -> Result<Value> {
    let input = model
        .get(&config.input_path)
        .ok_or_else(|| A2eError::missing_input(&config.input_path))?;
    let text = stringify(input);

    let out = match (config.operation, config.encoding) {
        (CodecDirection::Encode, Encoding::Base64) => B64.encode(text.as_bytes()),
        (CodecDirection::Decode, Encoding::Base64) => {
            let bytes = B64
                .decode(text.trim())
                .map_err(|e| A2eError::data(format!("invalid base64 input: {e}")))?;
            String::from_utf8(bytes)
                .map_err(|_| A2eError::data("decoded base64 is not valid UTF-8"))?
        }
        (CodecDirection::Encode, Encoding::Url) => {
            utf8_percent_encode(&text, NON_ALPHANUMERIC).to_string()
        }
        (CodecDirection::Decode, Encoding::Url) => percent_decode_str(&text)
            .decode_utf8()
            .map_err(|_| A2eError::data("decoded URL input is not valid UTF-8"))?
            .into_owned(),
        (CodecDirection::Encode, Encoding::Html) => html_escape(&text),
        (CodecDirection::Decode, Encoding::Html) => html_unescape(&text),
    };

    Ok(Value::String(out))
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

fn html_unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
