//! # A2E Error
//!
//! Structured error type shared across the service. Every failure is
//! normalized into an [`A2eError`] carrying a category, a machine-readable
//! code, a human message, optional per-error context, and the retry
//! semantics the execution controls consult.

mod error;

pub use error::{A2eError, ErrorCategory, ErrorKind, Result};
