//! # A2E Validator
//!
//! Static checks on a submitted workflow before execution: structure,
//! dependencies, type compatibility, API compatibility against the
//! registry, credential references against the vault and the agent's
//! allow-lists, and known-problematic patterns. Produces a report of
//! diagnostics; execution proceeds only when no blocking error remains.

pub mod diagnostics;
pub mod validator;

pub use diagnostics::{Diagnostic, Severity, ValidationLevel, ValidationReport};
pub use validator::WorkflowValidator;
