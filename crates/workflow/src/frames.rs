//! The line-delimited JSON wire format.
//!
//! A workflow arrives as one request body where every non-empty line is a
//! frame: `operationUpdate` carries operations, `beginExecution` names the
//! root. Unknown top-level keys are rejected.

use serde::{Deserialize, Serialize};

use a2e_core::{OperationId, WorkflowId};
use a2e_error::{A2eError, Result};

use crate::operation::Operation;

/// `{"operationUpdate": {"workflowId": ..., "operations": [...]}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationUpdate {
    pub workflow_id: WorkflowId,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

/// `{"beginExecution": {"workflowId": ..., "root": ...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginExecution {
    pub workflow_id: WorkflowId,
    pub root: OperationId,
}

/// One frame of the wire stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkflowFrame {
    #[serde(rename = "operationUpdate")]
    OperationUpdate(OperationUpdate),
    #[serde(rename = "beginExecution")]
    BeginExecution(BeginExecution),
}

/// Parse a line-delimited workflow body into frames, in arrival order.
pub fn parse_frames(body: &str) -> Result<Vec<WorkflowFrame>> {
    let mut frames = Vec::new();

    for (index, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let frame: WorkflowFrame = serde_json::from_str(line).map_err(|e| {
            A2eError::validation(format!("invalid workflow frame on line {}: {e}", index + 1))
        })?;
        frames.push(frame);
    }

    if frames.is_empty() {
        return Err(A2eError::validation("workflow contains no frames"));
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BODY: &str = r#"
{"operationUpdate": {"workflowId": "example", "operations": [{"id": "fetch", "operation": {"ApiCall": {"method": "GET", "url": "https://api.example.com/users", "outputPath": "/workflow/users"}}}]}}

{"beginExecution": {"workflowId": "example", "root": "fetch"}}
"#;

    #[test]
    fn parses_frames_skipping_blank_lines() {
        let frames = parse_frames(BODY).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], WorkflowFrame::OperationUpdate(_)));
        assert!(matches!(frames[1], WorkflowFrame::BeginExecution(_)));
    }

    #[test]
    fn bad_json_line_reports_its_line_number() {
        let err = parse_frames("{\"operationUpdate\": {\"workflowId\": \"w\"}}\nnot json").unwrap_err();
        assert_eq!(err.code, "VALIDATION_ERROR");
        assert!(err.message.contains("line 2"));
    }

    #[test]
    fn unknown_frame_key_is_rejected() {
        let err = parse_frames("{\"renderUi\": {}}").unwrap_err();
        assert_eq!(err.code, "VALIDATION_ERROR");
    }

    #[test]
    fn empty_body_is_rejected() {
        assert!(parse_frames("\n\n").is_err());
    }
}
