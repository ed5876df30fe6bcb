//! Identifiers for A2E entities.
//!
//! Agents, workflows, operations, APIs, credentials, and catalog queries are
//! all named by short operator- or agent-chosen strings on the wire. Each
//! gets its own newtype so the types cannot be mixed up, with a shared
//! normalization rule: trimmed, lowercased, ASCII alphanumerics plus `-`,
//! `_` and `.`, at most 64 characters.
//!
//! Executions are the exception: their ids are minted by the service and are
//! opaque UUIDs.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error produced when a string does not form a valid identifier.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum IdParseError {
    #[error("identifier cannot be empty or whitespace")]
    Empty,

    #[error("identifier contains invalid characters (allowed: a-z, 0-9, '-', '_', '.')")]
    InvalidCharacters,

    #[error("identifier is too long (max 64 characters)")]
    TooLong,
}

fn normalize(s: &str) -> Result<String, IdParseError> {
    let s = s.trim();

    if s.is_empty() {
        return Err(IdParseError::Empty);
    }

    let lowered = s.to_ascii_lowercase();

    if !lowered
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
    {
        return Err(IdParseError::InvalidCharacters);
    }

    if lowered.len() > 64 {
        return Err(IdParseError::TooLong);
    }

    Ok(lowered)
}

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident, $expecting:literal) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Parse and normalize an identifier.
            pub fn new<S: AsRef<str>>(s: S) -> Result<Self, IdParseError> {
                normalize(s.as_ref()).map(Self)
            }

            /// Returns a string slice of the inner value.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the inner string value.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Validates whether a string would form a valid identifier.
            pub fn is_valid<S: AsRef<str>>(s: S) -> bool {
                Self::new(s).is_ok()
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = IdParseError;

            fn try_from(s: &str) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdParseError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(&s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                &self.0 == other
            }
        }

        impl PartialEq<$name> for str {
            fn eq(&self, other: &$name) -> bool {
                self == other.as_str()
            }
        }

        impl PartialEq<$name> for &str {
            fn eq(&self, other: &$name) -> bool {
                *self == other.as_str()
            }
        }

        impl PartialEq<$name> for String {
            fn eq(&self, other: &$name) -> bool {
                self.as_str() == other.as_str()
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct IdVisitor;

                impl Visitor<'_> for IdVisitor {
                    type Value = $name;

                    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                        formatter.write_str($expecting)
                    }

                    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                        $name::new(value).map_err(|e| E::custom(e.to_string()))
                    }
                }

                deserializer.deserialize_str(IdVisitor)
            }
        }
    };
}

string_id!(
    /// Identifier of a registered agent.
    AgentId,
    "a valid agent identifier"
);
string_id!(
    /// Identifier of a workflow, chosen by the submitting agent.
    WorkflowId,
    "a valid workflow identifier"
);
string_id!(
    /// Identifier of an operation, unique within its workflow.
    OperationId,
    "a valid operation identifier"
);
string_id!(
    /// Identifier of a registered API definition.
    ApiId,
    "a valid API identifier"
);
string_id!(
    /// Identifier of a credential stored in the vault.
    CredentialId,
    "a valid credential identifier"
);
string_id!(
    /// Identifier of a SQL catalog entry.
    QueryId,
    "a valid SQL query identifier"
);

/// Opaque identifier of one workflow execution, minted by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(uuid::Uuid);

impl ExecutionId {
    /// Mint a fresh random execution id.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// The zero-valued id, useful as a placeholder in tests.
    pub fn nil() -> Self {
        Self(uuid::Uuid::nil())
    }

    /// Parse an execution id from its string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(s).map(Self)
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
