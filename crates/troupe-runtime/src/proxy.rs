//! Typed actor proxies
//!
//! A proxy looks like the actor but never touches its state directly: every
//! call builds a closure, wraps it in an envelope with a pending
//! completion, and sends it through the mailbox. Protocol sugar lives in
//! per-actor extension traits whose methods call [`Proxy::ask`] or
//! [`Proxy::tell`].
//!
//! A small set of passthroughs (`address`, `stage`, `is_stopped`, `logger`,
//! `scheduler`, `dead_letters`, equality and hashing) resolves locally on
//! the cell, without enqueuing.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures::future::BoxFuture;

use troupe_core::address::Address;
use troupe_core::completion::Completion;
use troupe_core::error::Result;
use troupe_core::logger::Logger;

use crate::actor::Actor;
use crate::cell::ActorCell;
use crate::dead_letters::DeadLetters;
use crate::environment::Environment;
use crate::message::AskEnvelope;
use crate::scheduler::Scheduler;
use crate::stage::Stage;

/// Typed handle to one actor
///
/// Cheap to clone; two proxies are equal iff they address the same actor.
/// A proxy stays valid after its actor stops — further calls resolve as
/// stopped and the payloads go to dead letters.
pub struct Proxy<A: Actor> {
    cell: Arc<ActorCell<A>>,
}

impl<A: Actor> Proxy<A> {
    pub(crate) fn new(cell: Arc<ActorCell<A>>) -> Self {
        Self { cell }
    }

    /// The target actor's address
    pub fn address(&self) -> &Address {
        self.cell.cell_address()
    }

    /// The owning stage
    pub fn stage(&self) -> Stage {
        self.cell.stage_handle().clone()
    }

    /// True once a stop was requested for the target
    pub fn is_stopped(&self) -> bool {
        self.cell.is_stopped()
    }

    /// Logger scoped to the target actor
    pub fn logger(&self) -> Logger {
        self.stage().logger().child(self.address().as_str())
    }

    /// The stage scheduler
    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.stage().scheduler()
    }

    /// The stage dead-letter sink
    pub fn dead_letters(&self) -> Arc<DeadLetters> {
        self.stage().dead_letters()
    }

    /// Send a call expecting a typed reply
    ///
    /// The handler runs on the actor's own dispatch loop with exclusive
    /// access to the instance. The returned completion resolves with the
    /// handler's value, its error, or a synthetic admission error.
    ///
    /// A handler must not await an `ask` to its own actor — the reply can
    /// only be produced after the handler returns. Self-sends are fine;
    /// they run strictly after the current message.
    pub fn ask<R, F>(&self, descriptor: &'static str, handler: F) -> Completion<R>
    where
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut A, &'a mut Environment) -> BoxFuture<'a, Result<R>>
            + Send
            + 'static,
    {
        let (envelope, completion) = AskEnvelope::new(descriptor, Box::new(handler));
        self.cell.send_envelope(Box::new(envelope));
        completion
    }

    /// Send a call without waiting for a reply
    pub fn tell<F>(&self, descriptor: &'static str, handler: F)
    where
        F: for<'a> FnOnce(&'a mut A, &'a mut Environment) -> BoxFuture<'a, Result<()>>
            + Send
            + 'static,
    {
        let _ = self.ask(descriptor, handler);
    }

    /// Request the target's stop sequence
    ///
    /// Resolves once the sequence completed; repeated stops resolve
    /// immediately.
    pub fn stop(&self) -> Completion<()> {
        let cell = self.cell.clone();
        let (resolver, completion) = Completion::pending();
        tokio::spawn(async move {
            cell.stop_cell().await;
            resolver.fulfill(());
        });
        completion
    }
}

impl<A: Actor> Clone for Proxy<A> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<A: Actor> PartialEq for Proxy<A> {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl<A: Actor> Eq for Proxy<A> {}

impl<A: Actor> Hash for Proxy<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl<A: Actor> fmt::Display for Proxy<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}

impl<A: Actor> fmt::Debug for Proxy<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("address", &self.address().as_str())
            .finish()
    }
}
