//! Per-actor logging scope
//!
//! The runtime logs through `tracing`; a [`Logger`] is the narrow handle an
//! actor sees, pinning every event to the owning stage and address so log
//! sinks can be swapped without touching actor code.

use std::sync::Arc;

/// Scoped logging handle
///
/// Cheap to clone; all events carry the scope as a structured field.
#[derive(Debug, Clone)]
pub struct Logger {
    scope: Arc<str>,
}

impl Logger {
    /// Create a logger with the given scope (stage name or actor address)
    pub fn new(scope: impl AsRef<str>) -> Self {
        Self {
            scope: Arc::from(scope.as_ref()),
        }
    }

    /// Derive a child logger with a nested scope
    pub fn child(&self, name: impl AsRef<str>) -> Self {
        Self::new(format!("{}/{}", self.scope, name.as_ref()))
    }

    /// The scope string
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Log at debug level
    pub fn debug(&self, message: &str) {
        tracing::debug!(scope = %self.scope, "{}", message);
    }

    /// Log at info level
    pub fn info(&self, message: &str) {
        tracing::info!(scope = %self.scope, "{}", message);
    }

    /// Log at warn level
    pub fn warn(&self, message: &str) {
        tracing::warn!(scope = %self.scope, "{}", message);
    }

    /// Log at error level
    pub fn error(&self, message: &str) {
        tracing::error!(scope = %self.scope, "{}", message);
    }
}
