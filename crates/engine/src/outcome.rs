//! Execution outcomes.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use a2e_core::{ExecutionId, ExecutionStatus, OperationId};
use a2e_error::A2eError;
use a2e_response::{shape_outcome, ResponseFormat};

/// The sealed result of one execution.
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    /// Results of completed operations, keyed by operation id.
    pub successful: BTreeMap<OperationId, Value>,
    /// Structured errors of failed operations.
    pub failed: BTreeMap<OperationId, A2eError>,
    /// Operations never dispatched: not-taken conditional branches and
    /// operations cancelled by the execution deadline.
    pub skipped: Vec<OperationId>,
    pub duration: Duration,
}

impl ExecutionOutcome {
    pub fn is_partial(&self) -> bool {
        !self.successful.is_empty() && !self.failed.is_empty()
    }

    /// The agent-facing response for this outcome.
    pub fn response(&self, format: ResponseFormat) -> Value {
        shape_outcome(self.execution_id, &self.successful, &self.failed, format)
    }

    /// The first rate-limit refusal, if one terminated the execution.
    pub fn rate_limit_error(&self) -> Option<&A2eError> {
        self.failed
            .values()
            .find(|error| error.category() == a2e_error::ErrorCategory::RateLimited)
    }
}
