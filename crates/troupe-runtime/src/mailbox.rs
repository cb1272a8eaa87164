//! Actor mailboxes
//!
//! A mailbox is a FIFO of envelopes plus three state bits: `suspended`,
//! `closed`, and `dispatching`. The `dispatching` bit is the single-consumer
//! lock — the sender that flips it on owns the drain until the queue runs
//! dry, so there is no task per actor and the owning actor is never
//! re-entered concurrently.
//!
//! `closed` is monotonic: once set, every envelope (queued or arriving) is
//! rejected as stopped. `suspended` is a plain boolean, not a count — two
//! suspends and one resume leave the mailbox running.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use troupe_core::address::Address;
use troupe_core::constants::MAILBOX_DEPTH_COUNT_MAX;
use troupe_core::error::{Error, Result};

use crate::actor::Actor;
use crate::dead_letters::DeadLetterReason;
use crate::message::Envelope;

/// Overflow handling for a bounded mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Discard the queue head to make room; the head is dead-lettered
    #[default]
    DropOldest,

    /// Discard the incoming message; it is dead-lettered
    DropNewest,

    /// Refuse the incoming message and fail the caller's completion
    Reject,
}

impl OverflowPolicy {
    fn label(&self) -> &'static str {
        match self {
            OverflowPolicy::DropOldest => "drop-oldest",
            OverflowPolicy::DropNewest => "drop-newest",
            OverflowPolicy::Reject => "reject",
        }
    }
}

/// Mailbox kind and limits, chosen per definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MailboxOptions {
    /// FIFO with no capacity limit
    Unbounded,

    /// FIFO with a capacity limit and an overflow policy
    Bounded {
        /// Maximum number of queued envelopes
        capacity: usize,
        /// What to do with an envelope that does not fit
        policy: OverflowPolicy,
    },
}

impl Default for MailboxOptions {
    fn default() -> Self {
        Self::Unbounded
    }
}

impl MailboxOptions {
    /// Bounded mailbox with the given capacity and policy
    pub fn bounded(capacity: usize, policy: OverflowPolicy) -> Self {
        debug_assert!(capacity >= 1, "bounded mailbox needs capacity");
        Self::Bounded { capacity, policy }
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if let Self::Bounded { capacity, .. } = self {
            if *capacity == 0 {
                return Err(Error::InvalidConfiguration {
                    field: "mailbox.capacity".into(),
                    reason: "must be at least 1".into(),
                });
            }
            if *capacity > MAILBOX_DEPTH_COUNT_MAX {
                return Err(Error::InvalidConfiguration {
                    field: "mailbox.capacity".into(),
                    reason: format!("exceeds limit {}", MAILBOX_DEPTH_COUNT_MAX),
                });
            }
        }
        Ok(())
    }
}

/// An envelope the mailbox refused, with how to report it
pub(crate) struct Rejection<A: Actor> {
    pub envelope: Box<dyn Envelope<A>>,
    pub error: Error,
    pub reason: DeadLetterReason,
}

/// Outcome of offering an envelope to the mailbox
pub(crate) struct Admission<A: Actor> {
    /// The caller won the dispatcher slot and must start the drain
    pub start_dispatch: bool,
    /// An envelope (incoming or displaced head) that must be rejected and
    /// dead-lettered by the caller
    pub rejection: Option<Rejection<A>>,
}

struct Inner<A: Actor> {
    queue: VecDeque<Box<dyn Envelope<A>>>,
    suspended: bool,
    closed: bool,
    dispatching: bool,
    dropped: u64,
}

/// Per-actor FIFO with suspension, closure, and the dispatcher slot
pub(crate) struct Mailbox<A: Actor> {
    options: MailboxOptions,
    inner: Mutex<Inner<A>>,
}

impl<A: Actor> Mailbox<A> {
    pub(crate) fn new(options: MailboxOptions) -> Self {
        Self {
            options,
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                suspended: false,
                closed: false,
                dispatching: false,
                dropped: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<A>> {
        // Mailbox state operations never hold the lock across user code, so
        // a poisoned lock can only come from a panic in this module.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Offer an envelope, applying closure and overflow rules
    ///
    /// Sends succeed while suspended; the overflow policy applies regardless
    /// of suspension.
    pub(crate) fn admit(
        &self,
        envelope: Box<dyn Envelope<A>>,
        address: &Address,
    ) -> Admission<A> {
        let mut inner = self.lock();

        if inner.closed {
            return Admission {
                start_dispatch: false,
                rejection: Some(Rejection {
                    envelope,
                    error: Error::stopped(address.as_str()),
                    reason: DeadLetterReason::Stopped,
                }),
            };
        }

        if let MailboxOptions::Bounded { capacity, policy } = self.options {
            if inner.queue.len() >= capacity {
                inner.dropped = inner.dropped.wrapping_add(1);
                match policy {
                    OverflowPolicy::Reject => {
                        let depth = inner.queue.len();
                        return Admission {
                            start_dispatch: false,
                            rejection: Some(Rejection {
                                envelope,
                                error: Error::MailboxFull {
                                    address: address.as_str().into(),
                                    depth,
                                    capacity,
                                },
                                reason: DeadLetterReason::MailboxFull,
                            }),
                        };
                    }
                    OverflowPolicy::DropNewest => {
                        return Admission {
                            start_dispatch: false,
                            rejection: Some(Rejection {
                                envelope,
                                error: Error::MessageDropped {
                                    address: address.as_str().into(),
                                    policy: policy.label(),
                                },
                                reason: DeadLetterReason::Dropped,
                            }),
                        };
                    }
                    OverflowPolicy::DropOldest => {
                        if let Some(victim) = inner.queue.pop_front() {
                            inner.queue.push_back(envelope);
                            let start = !inner.suspended && !inner.dispatching;
                            if start {
                                inner.dispatching = true;
                            }
                            return Admission {
                                start_dispatch: start,
                                rejection: Some(Rejection {
                                    envelope: victim,
                                    error: Error::MessageDropped {
                                        address: address.as_str().into(),
                                        policy: policy.label(),
                                    },
                                    reason: DeadLetterReason::Dropped,
                                }),
                            };
                        }
                    }
                }
            }
        }

        inner.queue.push_back(envelope);
        let start = !inner.suspended && !inner.dispatching;
        if start {
            inner.dispatching = true;
        }
        Admission {
            start_dispatch: start,
            rejection: None,
        }
    }

    /// Offer a lifecycle envelope: honors closure, bypasses capacity
    ///
    /// An overflow policy must never displace or refuse `before_start`.
    pub(crate) fn admit_system(
        &self,
        envelope: Box<dyn Envelope<A>>,
        address: &Address,
    ) -> Admission<A> {
        let mut inner = self.lock();

        if inner.closed {
            return Admission {
                start_dispatch: false,
                rejection: Some(Rejection {
                    envelope,
                    error: Error::stopped(address.as_str()),
                    reason: DeadLetterReason::Stopped,
                }),
            };
        }

        inner.queue.push_back(envelope);
        let start = !inner.suspended && !inner.dispatching;
        if start {
            inner.dispatching = true;
        }
        Admission {
            start_dispatch: start,
            rejection: None,
        }
    }

    /// Pop the next envelope, or None at a pause boundary
    ///
    /// Only the task holding the dispatcher slot may call this.
    pub(crate) fn next(&self) -> Option<Box<dyn Envelope<A>>> {
        let mut inner = self.lock();
        debug_assert!(inner.dispatching, "next() without the dispatcher slot");
        if inner.suspended || inner.closed {
            return None;
        }
        inner.queue.pop_front()
    }

    /// Release the dispatcher slot, re-arming if work arrived meanwhile
    ///
    /// Returns true when the caller keeps the slot and must continue
    /// draining. The check and the release happen under one lock, so a
    /// message admitted between `next()` and this call is never stranded.
    pub(crate) fn release_dispatcher(&self) -> bool {
        let mut inner = self.lock();
        if !inner.suspended && !inner.closed && !inner.queue.is_empty() {
            true
        } else {
            inner.dispatching = false;
            false
        }
    }

    /// Pause dispatch at the next message boundary (idempotent)
    pub(crate) fn suspend(&self) {
        self.lock().suspended = true;
    }

    /// Clear suspension; returns true when the caller must start a drain
    pub(crate) fn resume(&self) -> bool {
        let mut inner = self.lock();
        inner.suspended = false;
        if !inner.closed && !inner.dispatching && !inner.queue.is_empty() {
            inner.dispatching = true;
            true
        } else {
            false
        }
    }

    /// Close the mailbox and hand back everything still queued (idempotent)
    pub(crate) fn close(&self) -> Vec<Box<dyn Envelope<A>>> {
        let mut inner = self.lock();
        inner.closed = true;
        inner.queue.drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.lock().suspended
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Messages discarded by overflow handling so far
    pub(crate) fn dropped_count(&self) -> u64 {
        self.lock().dropped
    }
}

impl<A: Actor> std::fmt::Debug for Mailbox<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("len", &self.len())
            .field("empty", &self.is_empty())
            .field("suspended", &self.is_suspended())
            .field("closed", &self.is_closed())
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::message::AskEnvelope;
    use crate::test_support::TestActor;
    use troupe_core::completion::Completion;

    fn address() -> Address {
        Address::named("mailbox-under-test").unwrap()
    }

    fn envelope(tag: &'static str) -> (Box<dyn Envelope<TestActor>>, Completion<&'static str>) {
        let (envelope, completion) = AskEnvelope::new(
            tag,
            Box::new(move |_actor: &mut TestActor, _env: &mut Environment| {
                Box::pin(async move { Ok(tag) })
            }),
        );
        (Box::new(envelope), completion)
    }

    fn mailbox(options: MailboxOptions) -> Mailbox<TestActor> {
        Mailbox::new(options)
    }

    #[tokio::test]
    async fn test_first_sender_wins_the_dispatcher_slot() {
        let mb = mailbox(MailboxOptions::Unbounded);
        let addr = address();

        let (e1, _c1) = envelope("m1");
        let (e2, _c2) = envelope("m2");

        assert!(mb.admit(e1, &addr).start_dispatch);
        // Slot already taken; the second sender queues and walks away.
        assert!(!mb.admit(e2, &addr).start_dispatch);
        assert_eq!(mb.len(), 2);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let mb = mailbox(MailboxOptions::Unbounded);
        let addr = address();

        for tag in ["a", "b", "c"] {
            let (e, _c) = envelope(tag);
            mb.admit(e, &addr);
        }

        assert_eq!(mb.next().map(|e| e.descriptor()), Some("a"));
        assert_eq!(mb.next().map(|e| e.descriptor()), Some("b"));
        assert_eq!(mb.next().map(|e| e.descriptor()), Some("c"));
        assert!(mb.next().is_none());
    }

    #[tokio::test]
    async fn test_suspension_is_boolean_not_counted() {
        let mb = mailbox(MailboxOptions::Unbounded);
        let addr = address();

        mb.suspend();
        mb.suspend();
        assert!(mb.is_suspended());
        mb.resume();
        assert!(!mb.is_suspended());

        // Sends while suspended succeed and accumulate.
        mb.suspend();
        let (e, _c) = envelope("queued");
        let admission = mb.admit(e, &addr);
        assert!(!admission.start_dispatch);
        assert!(admission.rejection.is_none());
        assert_eq!(mb.len(), 1);

        // Resume hands the slot to the caller.
        assert!(mb.resume());
    }

    #[tokio::test]
    async fn test_suspended_mailbox_yields_nothing() {
        let mb = mailbox(MailboxOptions::Unbounded);
        let addr = address();

        let (e, _c) = envelope("m");
        assert!(mb.admit(e, &addr).start_dispatch);
        mb.suspend();
        assert!(mb.next().is_none());
        // Releasing under suspension gives up the slot without re-arming.
        assert!(!mb.release_dispatcher());
    }

    #[tokio::test]
    async fn test_close_is_monotonic_and_rejects_later_sends() {
        let mb = mailbox(MailboxOptions::Unbounded);
        let addr = address();

        let (e, _c) = envelope("queued");
        mb.admit(e, &addr);
        let drained = mb.close();
        assert_eq!(drained.len(), 1);
        assert!(mb.is_closed());
        assert!(mb.close().is_empty());

        let (late, _c) = envelope("late");
        let admission = mb.admit(late, &addr);
        let rejection = admission.rejection.expect("closed mailbox rejects");
        assert!(matches!(rejection.error, Error::ActorStopped { .. }));
        assert_eq!(rejection.reason, DeadLetterReason::Stopped);
    }

    #[tokio::test]
    async fn test_drop_oldest_displaces_the_head() {
        let mb = mailbox(MailboxOptions::bounded(2, OverflowPolicy::DropOldest));
        let addr = address();
        mb.suspend();

        for tag in ["m1", "m2"] {
            let (e, _c) = envelope(tag);
            assert!(mb.admit(e, &addr).rejection.is_none());
        }

        let (e3, _c3) = envelope("m3");
        let admission = mb.admit(e3, &addr);
        let rejection = admission.rejection.expect("head displaced");
        assert_eq!(rejection.envelope.descriptor(), "m1");
        assert!(matches!(rejection.error, Error::MessageDropped { .. }));
        assert_eq!(mb.len(), 2);
        assert_eq!(mb.dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_drop_newest_discards_the_incoming() {
        let mb = mailbox(MailboxOptions::bounded(1, OverflowPolicy::DropNewest));
        let addr = address();

        let (e1, _c1) = envelope("kept");
        mb.admit(e1, &addr);
        let (e2, _c2) = envelope("dropped");
        let admission = mb.admit(e2, &addr);
        let rejection = admission.rejection.expect("incoming dropped");
        assert_eq!(rejection.envelope.descriptor(), "dropped");
        assert_eq!(mb.len(), 1);
    }

    #[tokio::test]
    async fn test_reject_fails_the_caller() {
        let mb = mailbox(MailboxOptions::bounded(1, OverflowPolicy::Reject));
        let addr = address();

        let (e1, _c1) = envelope("kept");
        mb.admit(e1, &addr);
        let (e2, c2) = envelope("refused");
        let admission = mb.admit(e2, &addr);
        let rejection = admission.rejection.expect("incoming refused");
        assert!(matches!(rejection.error, Error::MailboxFull { .. }));
        assert_eq!(rejection.reason, DeadLetterReason::MailboxFull);

        rejection.envelope.reject(rejection.error);
        assert!(matches!(c2.await, Err(Error::MailboxFull { .. })));
    }

    #[test]
    fn test_options_validation() {
        assert!(MailboxOptions::Unbounded.validate().is_ok());
        assert!(MailboxOptions::Bounded {
            capacity: 0,
            policy: OverflowPolicy::Reject
        }
        .validate()
        .is_err());
        assert!(MailboxOptions::Bounded {
            capacity: MAILBOX_DEPTH_COUNT_MAX + 1,
            policy: OverflowPolicy::Reject
        }
        .validate()
        .is_err());
    }
}
