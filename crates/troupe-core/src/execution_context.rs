//! Per-actor execution context
//!
//! A small untyped key/value bag carried in the actor's environment. It
//! exists so that request metadata set at the top of a handler is visible
//! to the supervisor when that handler fails. Cleared by convention at each
//! top-level request.

use std::collections::HashMap;

use serde_json::Value;

/// Untyped per-actor scratch carrying request metadata
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    entries: HashMap<String, Value>,
}

impl ExecutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under a key, replacing any previous value
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Read a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Remove and return a value by key
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
