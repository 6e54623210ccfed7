//! GitLab API response types.
//!
//! Resources are kept as raw JSON objects; the core only ever needs their
//! attribute map.

use labkit_core::{Attributes, RawObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Resource
// =============================================================================

/// Any GitLab resource (project, issue, user, ...) as returned by REST v4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GitLabObject(Attributes);

impl GitLabObject {
    pub fn new(attributes: Attributes) -> Self {
        Self(attributes)
    }

    pub fn into_attributes(self) -> Attributes {
        self.0
    }
}

impl RawObject for GitLabObject {
    fn attributes(&self) -> Attributes {
        self.0.clone()
    }

    fn id(&self) -> Option<u64> {
        self.0.get("id").and_then(Value::as_u64)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Error body shapes GitLab uses.
///
/// Most endpoints send `{"message": ...}` where the message is a string or,
/// for validation failures, an object of field errors. OAuth failures send
/// `{"error": ..., "error_description": ...}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitLabErrorBody {
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl GitLabErrorBody {
    /// Human-readable message, if the body carried one.
    pub fn message(&self) -> Option<String> {
        if let Some(message) = &self.message {
            return Some(match message {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }

        match (&self.error, &self.error_description) {
            (Some(error), Some(description)) => Some(format!("{}: {}", error, description)),
            (Some(error), None) => Some(error.clone()),
            (None, Some(description)) => Some(description.clone()),
            (None, None) => None,
        }
    }
}
