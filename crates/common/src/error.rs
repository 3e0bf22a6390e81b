// Validation errors raised by validator capabilities.

use thiserror::Error;

/// A document, workspace address, or timestamp was rejected by a validator.
///
/// Carries the rejecting validator's message verbatim; the store surfaces
/// it to the caller without retrying.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}
