//! Error types for troupe
//!
//! Explicit error types with context, using thiserror.
//!
//! Errors are `Clone` because a delivery failure is observed twice: once by
//! the caller's completion and once by the owning cell's supervisor.
//! Arbitrary handler failures ride the `Other` variant behind an `Arc`.

use std::sync::Arc;

use thiserror::Error;

/// Result type alias for troupe operations
pub type Result<T> = std::result::Result<T, Error>;

/// troupe error types
#[derive(Error, Debug, Clone)]
pub enum Error {
    // =========================================================================
    // Admission Errors
    // =========================================================================
    #[error("actor stopped: {address}")]
    ActorStopped { address: String },

    #[error("mailbox full: {address}, depth: {depth}, capacity: {capacity}")]
    MailboxFull {
        address: String,
        depth: usize,
        capacity: usize,
    },

    #[error("message dropped: {address}, policy: {policy}")]
    MessageDropped {
        address: String,
        policy: &'static str,
    },

    // =========================================================================
    // Registration Errors
    // =========================================================================
    #[error("address already registered: {address}")]
    AlreadyRegistered { address: String },

    #[error("invalid address: {value}, reason: {reason}")]
    InvalidAddress { value: String, reason: String },

    #[error("unknown supervisor key: {key}")]
    UnknownSupervisor { key: String },

    #[error("instantiation failed: {type_name}, reason: {reason}")]
    InstantiationFailed { type_name: String, reason: String },

    // =========================================================================
    // Stage Errors
    // =========================================================================
    #[error("stage closed")]
    StageClosed,

    #[error("invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    // =========================================================================
    // Completion Errors
    // =========================================================================
    #[error("completion abandoned: {context}")]
    CompletionAbandoned { context: String },

    // =========================================================================
    // Handler Errors
    // =========================================================================
    #[error("{0}")]
    Other(Arc<anyhow::Error>),
}

impl Error {
    /// Create an actor stopped error
    pub fn stopped(address: impl Into<String>) -> Self {
        Self::ActorStopped {
            address: address.into(),
        }
    }

    /// Create a handler failure from any error value
    pub fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Other(Arc::new(error.into()))
    }

    /// Create a handler failure from a message
    pub fn failure_msg(message: impl Into<String>) -> Self {
        Self::Other(Arc::new(anyhow::Error::msg(message.into())))
    }

    /// Create an instantiation failed error
    pub fn instantiation_failed(
        type_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InstantiationFailed {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Check if this is a synthetic admission error (as opposed to a
    /// failure raised inside a handler)
    pub fn is_admission(&self) -> bool {
        matches!(
            self,
            Self::ActorStopped { .. } | Self::MailboxFull { .. } | Self::MessageDropped { .. }
        )
    }

    /// Downcast a handler failure to a concrete error type
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match self {
            Self::Other(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Self::Other(Arc::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Error, Debug)]
    #[error("value error: {0}")]
    struct ValueError(String);

    #[test]
    fn test_error_display() {
        let err = Error::stopped("counter-1");
        assert!(err.to_string().contains("counter-1"));

        let err = Error::MailboxFull {
            address: "a".into(),
            depth: 4,
            capacity: 4,
        };
        assert!(err.to_string().contains("mailbox full"));
    }

    #[test]
    fn test_error_is_admission() {
        assert!(Error::stopped("a").is_admission());
        assert!(!Error::failure_msg("boom").is_admission());
        assert!(!Error::StageClosed.is_admission());
    }

    #[test]
    fn test_error_downcast() {
        let err = Error::failure(ValueError("bad".into()));
        assert!(err.downcast_ref::<ValueError>().is_some());
        assert!(Error::StageClosed.downcast_ref::<ValueError>().is_none());
    }

    #[test]
    fn test_error_clone_shares_cause() {
        let err = Error::failure_msg("boom");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
