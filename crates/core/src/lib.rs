//! # A2E Core
//!
//! Core types shared by every A2E crate: validated string identifiers for
//! the entities an agent names on the wire (agents, workflows, operations,
//! APIs, credentials, SQL queries), the opaque [`ExecutionId`], and the
//! [`ExecutionStatus`] lifecycle enum.

pub mod id;
pub mod status;

pub use id::{
    AgentId, ApiId, CredentialId, ExecutionId, IdParseError, OperationId, QueryId, WorkflowId,
};
pub use status::ExecutionStatus;
