//! Envelopes for the HTTP API.

use serde::{Deserialize, Serialize};

/// A `{message}` response for side-effect endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human readable outcome.
    pub message: String,
}

impl MessageResponse {
    /// Wrap a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The 400 body: a summary plus the machine-readable error list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrors {
    /// Summary of the failure.
    pub message: String,

    /// One entry per problem found.
    pub errors: Vec<String>,
}

impl ValidationErrors {
    /// Wrap a list of validation problems.
    #[must_use]
    pub fn new(errors: Vec<String>) -> Self {
        Self {
            message: "Validation failed".to_string(),
            errors,
        }
    }
}
