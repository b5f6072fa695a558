//! User record as seen by extension code.

use serde::{Deserialize, Serialize};

/// A user account resolved through the accounts collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Numeric user identifier.
    pub id: i64,
    /// Unique login name.
    pub username: String,
    /// Optional display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Free-form profile metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl UserRecord {
    /// Creates a record with only the identifying fields set.
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            display_name: None,
            metadata: serde_json::Value::Null,
        }
    }
}
