//! Limits for the troupe runtime
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Address Limits
// =============================================================================

/// Maximum length of an actor address in bytes
pub const ADDRESS_LENGTH_BYTES_MAX: usize = 128;

// =============================================================================
// Mailbox Limits
// =============================================================================

/// Maximum capacity of a bounded mailbox
pub const MAILBOX_DEPTH_COUNT_MAX: usize = 100_000;

// =============================================================================
// Directory Limits
// =============================================================================

/// Default number of directory buckets
pub const DIRECTORY_BUCKETS_COUNT_DEFAULT: usize = 64;

/// Bucket count for small stages
pub const DIRECTORY_BUCKETS_COUNT_SMALL: usize = 16;

/// Bucket count for high-capacity stages
pub const DIRECTORY_BUCKETS_COUNT_LARGE: usize = 256;

/// Maximum number of directory buckets
pub const DIRECTORY_BUCKETS_COUNT_MAX: usize = 4096;

// =============================================================================
// Supervision Limits
// =============================================================================

/// Default maximum restarts within the restart window
pub const SUPERVISION_RESTARTS_COUNT_DEFAULT: u32 = 5;

/// Default restart window in milliseconds (1 min)
pub const SUPERVISION_WINDOW_MS_DEFAULT: u64 = 60 * 1000;

// =============================================================================
// Dead Letter Limits
// =============================================================================

/// Number of recent dead letters retained for diagnostics
pub const DEAD_LETTERS_RECENT_COUNT_MAX: usize = 256;

// Compile-time assertions for constant validity
const _: () = {
    assert!(ADDRESS_LENGTH_BYTES_MAX >= 36); // must hold a canonical UUID
    assert!(MAILBOX_DEPTH_COUNT_MAX >= 1);
    assert!(DIRECTORY_BUCKETS_COUNT_SMALL <= DIRECTORY_BUCKETS_COUNT_DEFAULT);
    assert!(DIRECTORY_BUCKETS_COUNT_DEFAULT <= DIRECTORY_BUCKETS_COUNT_LARGE);
    assert!(DIRECTORY_BUCKETS_COUNT_LARGE <= DIRECTORY_BUCKETS_COUNT_MAX);
    assert!(SUPERVISION_RESTARTS_COUNT_DEFAULT >= 1);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_reasonable() {
        // A hyphenated UUID is 36 bytes and must always fit.
        assert!(ADDRESS_LENGTH_BYTES_MAX >= 36);
        assert!(DEAD_LETTERS_RECENT_COUNT_MAX >= 16);
    }
}
