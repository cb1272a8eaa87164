//! Dead-letter sink
//!
//! Every send that does not end in a successful delivery produces exactly
//! one record here: sends to stopped actors, overflow discards, rejected
//! sends to full mailboxes, and messages still queued when a mailbox
//! closes. Records fan out synchronously to subscribers, are logged at warn
//! level, and a bounded ring of recent records is kept for diagnostics.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::warn;

use troupe_core::address::Address;
use troupe_core::logger::Logger;

/// Why a message could not be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// The target actor was stopped or stopping
    Stopped,

    /// A bounded mailbox with the reject policy was full
    MailboxFull,

    /// An overflow policy discarded the message
    Dropped,

    /// The message was still queued when the mailbox closed
    Closed,
}

impl fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadLetterReason::Stopped => write!(f, "stopped"),
            DeadLetterReason::MailboxFull => write!(f, "mailbox-full"),
            DeadLetterReason::Dropped => write!(f, "dropped"),
            DeadLetterReason::Closed => write!(f, "closed-while-queued"),
        }
    }
}

/// One undeliverable-message record
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// Address of the intended receiver
    pub address: Address,

    /// Message descriptor (the proxy call's label)
    pub descriptor: String,

    /// Why delivery did not happen
    pub reason: DeadLetterReason,
}

impl DeadLetter {
    /// Create a record
    pub fn new(
        address: Address,
        descriptor: impl Into<String>,
        reason: DeadLetterReason,
    ) -> Self {
        Self {
            address,
            descriptor: descriptor.into(),
            reason,
        }
    }
}

/// Receives every dead-letter record
///
/// Listeners run synchronously on the producing task; a slow listener
/// delays the producer.
pub trait DeadLetterListener: Send + Sync {
    /// Observe one record
    fn on_dead_letter(&self, dead_letter: &DeadLetter);
}

/// Fan-out sink for undeliverable messages
pub struct DeadLetters {
    listeners: RwLock<Vec<Arc<dyn DeadLetterListener>>>,
    recent: Mutex<VecDeque<DeadLetter>>,
    recent_limit: usize,
    total: AtomicU64,
    logger: Logger,
}

impl DeadLetters {
    pub(crate) fn new(recent_limit: usize, logger: Logger) -> Self {
        debug_assert!(recent_limit >= 1);
        Self {
            listeners: RwLock::new(Vec::new()),
            recent: Mutex::new(VecDeque::with_capacity(recent_limit.min(64))),
            recent_limit,
            total: AtomicU64::new(0),
            logger,
        }
    }

    /// Push a record: log it, retain it, fan it out
    pub fn record(&self, dead_letter: DeadLetter) {
        warn!(
            scope = %self.logger.scope(),
            address = %dead_letter.address,
            descriptor = %dead_letter.descriptor,
            reason = %dead_letter.reason,
            "dead letter"
        );

        self.total.fetch_add(1, Ordering::Relaxed);

        {
            let mut recent = match self.recent.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if recent.len() == self.recent_limit {
                recent.pop_front();
            }
            recent.push_back(dead_letter.clone());
        }

        let listeners = match self.listeners.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for listener in &listeners {
            listener.on_dead_letter(&dead_letter);
        }
    }

    /// Register a listener; it receives every subsequent record
    pub fn subscribe(&self, listener: Arc<dyn DeadLetterListener>) {
        let mut listeners = match self.listeners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.push(listener);
    }

    /// Remove a previously-registered listener (by identity)
    pub fn unsubscribe(&self, listener: &Arc<dyn DeadLetterListener>) {
        let mut listeners = match self.listeners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    /// Snapshot of the most recent records, oldest first
    pub fn recent(&self) -> Vec<DeadLetter> {
        let recent = match self.recent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        recent.iter().cloned().collect()
    }

    /// Total records since the stage started
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
