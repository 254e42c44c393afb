//! Common error types for InferQ
//!
//! This module defines all error types used across the InferQ system.
//! Per-message failures (decode, pipeline, reply publish) are contained by
//! the worker's delivery handler and become nacks; everything else
//! propagates with `?`.

use thiserror::Error;

/// Main error type for InferQ
#[derive(Error, Debug)]
pub enum InferQError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broker communication errors
    #[error("Broker error: {0}")]
    Broker(#[from] lapin::Error),

    /// Envelope or artifact decode errors
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Preprocessing failures
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Model loading or prediction failures
    #[error("Model error: {0}")]
    Model(String),

    /// Delivery carried no reply destination
    #[error("Delivery has no reply-to property")]
    MissingReplyTo,

    /// Delivery carried no correlation id
    #[error("Delivery has no correlation id")]
    MissingCorrelationId,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl InferQError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        InferQError::Config(msg.into())
    }

    /// Create a pipeline error
    pub fn pipeline(msg: impl Into<String>) -> Self {
        InferQError::Pipeline(msg.into())
    }

    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        InferQError::Model(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        InferQError::InvalidInput(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        InferQError::Timeout(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        InferQError::Internal(msg.into())
    }

    /// Whether this failure resolves the delivery with a nack rather than
    /// terminating the worker. Connection-level failures are not
    /// per-message and fall through.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            InferQError::Decode(_)
                | InferQError::Pipeline(_)
                | InferQError::Model(_)
                | InferQError::MissingReplyTo
                | InferQError::MissingCorrelationId
                | InferQError::InvalidInput(_)
        )
    }
}

/// Result type alias for InferQ operations
pub type Result<T> = std::result::Result<T, InferQError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_message_classification() {
        assert!(InferQError::pipeline("bad shape").is_per_message());
        assert!(InferQError::MissingReplyTo.is_per_message());
        assert!(!InferQError::config("no queue").is_per_message());
        assert!(!InferQError::timeout("wait").is_per_message());
    }

    #[test]
    fn test_decode_error_conversion() {
        let parse_failure = serde_json::from_str::<serde_json::Value>("{not json")
            .expect_err("must fail");
        let err: InferQError = parse_failure.into();

        assert!(err.is_per_message());
        assert!(err.to_string().starts_with("Decode error"));
    }
}
