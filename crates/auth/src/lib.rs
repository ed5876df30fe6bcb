//! # A2E Auth
//!
//! Agent identity and authorization. Operators register agents and receive
//! an API key exactly once; the directory stores only the key's hash.
//! Inbound requests authenticate with the raw key (constant-time hash
//! comparison) or with a short-lived signed token. Authorization is a
//! capability projection: three allow-lists per agent, where an empty list
//! means "all".

pub mod directory;
pub mod projection;
pub mod record;

pub use directory::AgentDirectory;
pub use projection::{CapabilityView, CredentialCapability};
pub use record::{AgentRecord, AgentSummary};
