//! Audit events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use a2e_core::{AgentId, CredentialId, ExecutionId, ExecutionStatus, OperationId, WorkflowId};

/// One entry of the append-only audit stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// An execution was accepted and is about to run.
    ExecutionStart {
        timestamp: DateTime<Utc>,
        execution_id: ExecutionId,
        agent_id: AgentId,
        workflow_id: WorkflowId,
        /// Operation count and ids — not the raw workflow body.
        workflow_summary: Value,
    },

    /// An operation is being dispatched.
    OperationStart {
        timestamp: DateTime<Utc>,
        execution_id: ExecutionId,
        operation_id: OperationId,
        kind: String,
        /// Pre-injection config; redacted again at write time.
        config: Value,
    },

    /// A credential was resolved for an operation.
    CredentialUse {
        timestamp: DateTime<Utc>,
        execution_id: ExecutionId,
        operation_id: OperationId,
        credential_id: CredentialId,
        credential_kind: String,
        usage_context: String,
    },

    /// An operation finished.
    OperationResult {
        timestamp: DateTime<Utc>,
        execution_id: ExecutionId,
        operation_id: OperationId,
        status: ExecutionStatus,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The execution sealed its record.
    ExecutionComplete {
        timestamp: DateTime<Utc>,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        duration_ms: u64,
        summary: Value,
    },
}

impl AuditEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ExecutionStart { timestamp, .. }
            | Self::OperationStart { timestamp, .. }
            | Self::CredentialUse { timestamp, .. }
            | Self::OperationResult { timestamp, .. }
            | Self::ExecutionComplete { timestamp, .. } => *timestamp,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        match self {
            Self::ExecutionStart { execution_id, .. }
            | Self::OperationStart { execution_id, .. }
            | Self::CredentialUse { execution_id, .. }
            | Self::OperationResult { execution_id, .. }
            | Self::ExecutionComplete { execution_id, .. } => *execution_id,
        }
    }

    pub fn operation_id(&self) -> Option<&OperationId> {
        match self {
            Self::OperationStart { operation_id, .. }
            | Self::CredentialUse { operation_id, .. }
            | Self::OperationResult { operation_id, .. } => Some(operation_id),
            Self::ExecutionStart { .. } | Self::ExecutionComplete { .. } => None,
        }
    }

    pub fn is_credential_use(&self) -> bool {
        matches!(self, Self::CredentialUse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn events_tag_by_snake_case_name() {
        let event = AuditEvent::ExecutionStart {
            timestamp: Utc::now(),
            execution_id: ExecutionId::new(),
            agent_id: AgentId::new("reporter").unwrap(),
            workflow_id: WorkflowId::new("daily").unwrap(),
            workflow_summary: json!({"operations": 2}),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], json!("execution_start"));
    }

    #[test]
    fn accessors_cover_every_variant() {
        let execution_id = ExecutionId::new();
        let op = OperationId::new("fetch").unwrap();
        let event = AuditEvent::OperationResult {
            timestamp: Utc::now(),
            execution_id,
            operation_id: op.clone(),
            status: ExecutionStatus::Success,
            duration_ms: 12,
            result: Some(json!([1])),
            error: None,
        };
        assert_eq!(event.execution_id(), execution_id);
        assert_eq!(event.operation_id(), Some(&op));
        assert!(!event.is_credential_use());

        let credential = AuditEvent::CredentialUse {
            timestamp: Utc::now(),
            execution_id,
            operation_id: op,
            credential_id: CredentialId::new("api-token").unwrap(),
            credential_kind: "bearer-token".into(),
            usage_context: "Authorization header".into(),
        };
        assert!(credential.is_credential_use());
    }

    #[test]
    fn serde_roundtrip() {
        let event = AuditEvent::ExecutionComplete {
            timestamp: Utc::now(),
            execution_id: ExecutionId::new(),
            status: ExecutionStatus::Failed,
            duration_ms: 100,
            summary: json!({"failed": 1}),
        };
        let line = serde_json::to_string(&event).unwrap();
        let back: AuditEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back.execution_id(), event.execution_id());
        assert_eq!(back.timestamp(), event.timestamp());
    }
}
