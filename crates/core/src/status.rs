//! Execution lifecycle status.

use serde::{Deserialize, Serialize};

/// Status of a workflow execution, from creation to sealing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created but not yet dispatched.
    Pending,
    /// Operations are being dispatched.
    Running,
    /// Every operation completed successfully.
    Success,
    /// At least one operation failed, or the execution was aborted.
    Failed,
    /// The execution was stopped before completion (deadline or shutdown).
    Cancelled,
}

impl ExecutionStatus {
    /// Returns `true` once the execution record is sealed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Stable wire name (`snake_case`), matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
