//! Error types for cfn-events

use thiserror::Error;

/// Errors that can occur while reading stack events
#[derive(Error, Debug)]
pub enum EventSourceError {
    /// The stack does not exist (or is not visible to the credentials in use)
    #[error("Stack not found: {0}")]
    StackNotFound(String),

    /// The control plane rejected or failed the request
    #[error("DescribeStackEvents failed for {stack}: {message}")]
    Request { stack: String, message: String },

    /// AWS configuration could not be resolved
    #[error("AWS configuration error: {0}")]
    Config(String),
}

impl EventSourceError {
    /// Build a `Request` error for `stack`.
    pub fn request(stack: &str, message: impl Into<String>) -> Self {
        EventSourceError::Request {
            stack: stack.to_string(),
            message: message.into(),
        }
    }
}
