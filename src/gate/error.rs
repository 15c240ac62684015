//! Error types for the gate
//!
//! Platform failures and quiz failures both abort the event being handled;
//! the event loop logs them and moves on.

use crate::quiz::QuizError;
use thiserror::Error;

/// Errors raised by calls to the chat platform
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Discord API error
    #[error("Discord API error: {0}")]
    Discord(#[from] Box<poise::serenity_prelude::Error>),

    /// The platform refused the call
    #[error("Platform call failed: {0}")]
    Other(String),
}

impl From<poise::serenity_prelude::Error> for PlatformError {
    fn from(error: poise::serenity_prelude::Error) -> Self {
        Self::Discord(Box::new(error))
    }
}

/// Result type for platform calls
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors that can occur while handling a gate event
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Quiz(#[from] QuizError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The event loop is gone
    #[error("Gate event channel closed")]
    ChannelClosed,
}

/// Result type for gate operations
pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GateError::from(PlatformError::Other("Missing Permissions".to_string()));
        assert_eq!(error.to_string(), "Platform call failed: Missing Permissions");

        let error = GateError::from(QuizError::EmptyQuiz);
        assert_eq!(error.to_string(), "Cannot create a quiz pass without questions");

        assert_eq!(GateError::ChannelClosed.to_string(), "Gate event channel closed");
    }
}
