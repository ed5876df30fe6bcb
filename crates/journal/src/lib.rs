//! # A2E Journal
//!
//! Append-only audit trail of executions: every execution start, operation
//! dispatch, credential use, and outcome is written as one JSON line to a
//! daily-rotated file. Everything passes the redactor on the way in, so
//! secret-shaped values never reach disk.

pub mod event;
pub mod journal;
pub mod redact;

pub use event::AuditEvent;
pub use journal::{AuditJournal, ExecutionDetails, QueryFilter};
pub use redact::redact_value;
