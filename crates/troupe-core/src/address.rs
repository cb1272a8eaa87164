//! Actor addresses
//!
//! An address is the opaque identity of one actor. Equality, ordering, and
//! hashing all go through the canonical string form, so any two addresses
//! with the same text are the same actor.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::ADDRESS_LENGTH_BYTES_MAX;
use crate::error::{Error, Result};

/// Opaque actor identity with a canonical string form
///
/// Addresses are unique within a stage. They are produced by an
/// [`AddressSource`] or constructed from a caller-supplied name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address {
    value: String,
}

impl Address {
    /// Create an address from a caller-supplied name, with validation
    ///
    /// # Errors
    /// Returns an error if the name is empty, exceeds the length limit, or
    /// contains characters outside `[A-Za-z0-9._-]`.
    pub fn named(value: impl Into<String>) -> Result<Self> {
        let value = value.into();

        if value.is_empty() {
            return Err(Error::InvalidAddress {
                value,
                reason: "address must not be empty".into(),
            });
        }

        if value.len() > ADDRESS_LENGTH_BYTES_MAX {
            return Err(Error::InvalidAddress {
                reason: format!(
                    "length {} exceeds limit {}",
                    value.len(),
                    ADDRESS_LENGTH_BYTES_MAX
                ),
                value,
            });
        }

        let valid = value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
        if !valid {
            return Err(Error::InvalidAddress {
                value,
                reason: "address contains invalid characters".into(),
            });
        }

        Ok(Self { value })
    }

    /// Create an address without validation (for sources whose output is
    /// valid by construction)
    pub(crate) fn unchecked(value: String) -> Self {
        debug_assert!(!value.is_empty());
        debug_assert!(value.len() <= ADDRESS_LENGTH_BYTES_MAX);
        Self { value }
    }

    /// The canonical string form
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Source of fresh, stage-unique addresses
///
/// The runtime never generates identity on its own; it asks the configured
/// source. Two sources are provided: time-sortable UUIDs and a monotonic
/// sequence.
pub trait AddressSource: Send + Sync + fmt::Debug {
    /// Produce the next address
    fn next(&self) -> Address;
}

/// Time-sortable 128-bit addresses (UUID version 7)
///
/// The canonical form is the hyphenated UUID text, which sorts by creation
/// time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uuid7AddressSource;

impl Uuid7AddressSource {
    /// Create a new UUIDv7 source
    pub fn new() -> Self {
        Self
    }
}

impl AddressSource for Uuid7AddressSource {
    fn next(&self) -> Address {
        Address::unchecked(Uuid::now_v7().to_string())
    }
}

/// Monotonically-increasing integer addresses
///
/// The canonical form is zero-padded so the string form sorts in issue
/// order.
#[derive(Debug, Default)]
pub struct SequenceAddressSource {
    next: AtomicU64,
}

impl SequenceAddressSource {
    /// Create a sequence source starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sequence source starting at the given value
    pub fn starting_at(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }
}

impl AddressSource for SequenceAddressSource {
    fn next(&self) -> Address {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Address::unchecked(format!("{:020}", n))
    }
}
