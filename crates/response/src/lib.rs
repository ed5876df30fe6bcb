//! # A2E Response
//!
//! Shapes execution results for agent consumption: three output modes
//! (minimal, summary, full), outcome classification (success, partial
//! success, error), and structured error payloads with sanitized messages
//! and actionable suggestions. Everything passes the journal redactor on
//! the way out.

pub mod error_shape;
pub mod shape;

pub use error_shape::{shape_error, shape_error_payload, suggestions_for};
pub use shape::{shape_outcome, shape_success, ResponseFormat};
