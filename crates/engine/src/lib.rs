//! # A2E Engine
//!
//! Executes validated workflows: derives the execution order, dispatches
//! each operation through the rate limiter, cache, and credential
//! injection, runs the kind's handler (with retry for remote calls),
//! threads results through the per-execution data model, and records every
//! step in the audit journal. A failing operation never aborts the
//! execution — downstream operations fail with a missing-input diagnostic
//! and the response distinguishes success, partial success, and failure.

pub mod context;
pub mod engine;
pub mod handlers;
pub mod outcome;
pub mod request;
pub mod storage;

pub use context::{EngineServices, ExecutionOptions};
pub use engine::Engine;
pub use outcome::ExecutionOutcome;
pub use storage::{InMemoryStorage, StorageBackend};
