//! # A2E API
//!
//! The HTTP surface: authentication extraction, per-request rate limiting,
//! and the versioned route table over the core services. Everything here
//! is a thin adapter — validation, execution, and shaping happen in the
//! library crates.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use routes::router;
pub use state::AppState;
