//! The append-only journal and its query surface.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use a2e_core::{AgentId, ExecutionId, ExecutionStatus, WorkflowId};
use a2e_error::Result;

use crate::event::AuditEvent;
use crate::redact::redact_value;

/// Filters for [`AuditJournal::query`]. Every provided filter must match.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub agent_id: Option<AgentId>,
    pub workflow_id: Option<WorkflowId>,
    pub status: Option<ExecutionStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Reconstructed view of one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionDetails {
    pub execution_id: ExecutionId,
    /// Every event of the execution, in emission order.
    pub timeline: Vec<Value>,
    /// Operation-level events only.
    pub operations: Vec<Value>,
    /// Credential-use events only.
    pub credentials_used: Vec<Value>,
}

/// Append-only audit journal over daily-rotated JSON-Lines files.
///
/// The journal owns an execution's record exclusively once the
/// `execution_complete` event seals it; nothing is ever rewritten.
pub struct AuditJournal {
    dir: PathBuf,
    /// Writes are serialized; rotation is by date, so one lock suffices.
    write_lock: Mutex<()>,
}

impl AuditJournal {
    /// Open (and create) the journal directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn file_for(&self, date: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("executions_{}.jsonl", date.format("%Y%m%d")))
    }

    /// Append one event. The serialized event passes the redactor before
    /// it reaches the file.
    pub fn append(&self, event: &AuditEvent) -> Result<()> {
        let raw = serde_json::to_value(event)?;
        let redacted = redact_value(&raw);
        let line = serde_json::to_string(&redacted)?;

        let path = self.file_for(event.timestamp());
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{line}")?;
        debug!(event = %redacted["event"], execution = %event.execution_id(), "journal append");
        Ok(())
    }

    fn log_files_newest_first(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(std::result::Result::ok)
                    .map(|entry| entry.path())
                    .filter(|path| {
                        path.file_name()
                            .and_then(|name| name.to_str())
                            .is_some_and(|name| {
                                name.starts_with("executions_") && name.ends_with(".jsonl")
                            })
                    })
                    .collect()
            })
            .unwrap_or_default();
        files.sort();
        files.reverse();
        files
    }

    fn each_event(&self, mut visit: impl FnMut(Value) -> bool) {
        for path in self.log_files_newest_first() {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            for line in content.lines() {
                let Ok(value) = serde_json::from_str::<Value>(line) else {
                    continue;
                };
                if !visit(value) {
                    return;
                }
            }
        }
    }

    /// Query events, newest files first, bounded by `limit` (default 100).
    pub fn query(&self, filter: &QueryFilter) -> Vec<Value> {
        let limit = filter.limit.unwrap_or(100);
        let mut results = Vec::new();

        self.each_event(|event| {
            if results.len() >= limit {
                return false;
            }
            if matches_filter(&event, filter) {
                results.push(event);
            }
            results.len() < limit
        });

        results
    }

    /// Reconstruct the complete timeline of one execution, or `None` if it
    /// never appears in the journal.
    pub fn execution_details(&self, execution_id: &ExecutionId) -> Option<ExecutionDetails> {
        let wanted = execution_id.to_string();
        let mut timeline = Vec::new();

        self.each_event(|event| {
            if event.get("execution_id").and_then(Value::as_str) == Some(wanted.as_str()) {
                timeline.push(event);
            }
            true
        });

        if timeline.is_empty() {
            return None;
        }

        timeline.sort_by(|a, b| {
            let ts_a = a.get("timestamp").and_then(Value::as_str).unwrap_or("");
            let ts_b = b.get("timestamp").and_then(Value::as_str).unwrap_or("");
            ts_a.cmp(ts_b)
        });

        let operations = timeline
            .iter()
            .filter(|event| event.get("operation_id").is_some())
            .cloned()
            .collect();
        let credentials_used = timeline
            .iter()
            .filter(|event| event.get("event").and_then(Value::as_str) == Some("credential_use"))
            .cloned()
            .collect();

        Some(ExecutionDetails {
            execution_id: *execution_id,
            timeline,
            operations,
            credentials_used,
        })
    }
}

impl std::fmt::Debug for AuditJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditJournal").field("dir", &self.dir).finish()
    }
}

fn matches_filter(event: &Value, filter: &QueryFilter) -> bool {
    if let Some(agent) = &filter.agent_id {
        if event.get("agent_id").and_then(Value::as_str) != Some(agent.as_str()) {
            return false;
        }
    }
    if let Some(workflow) = &filter.workflow_id {
        if event.get("workflow_id").and_then(Value::as_str) != Some(workflow.as_str()) {
            return false;
        }
    }
    if let Some(status) = &filter.status {
        if event.get("status").and_then(Value::as_str) != Some(status.as_str()) {
            return false;
        }
    }
    if filter.from.is_some() || filter.to.is_some() {
        let Some(timestamp) = event
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        else {
            return false;
        };
        let timestamp = timestamp.with_timezone(&Utc);
        if filter.from.is_some_and(|from| timestamp < from) {
            return false;
        }
        if filter.to.is_some_and(|to| timestamp > to) {
            return false;
        }
    }
    true
}
