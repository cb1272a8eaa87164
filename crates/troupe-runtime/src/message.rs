//! Message envelopes
//!
//! A message binds a closure over the actor instance to an optional
//! completion resolver. Envelopes are consumed exactly once: delivered by
//! the dispatch loop, or rejected into dead letters.

use std::marker::PhantomData;

use futures::future::BoxFuture;
use tracing::warn;

use troupe_core::completion::{Completion, Resolver};
use troupe_core::error::{Error, Result};

use crate::actor::Actor;
use crate::cell::LifecycleState;
use crate::environment::Environment;

/// Boxed handler closure carried by an envelope
pub type Handler<A, R> =
    Box<dyn for<'a> FnOnce(&'a mut A, &'a mut Environment) -> BoxFuture<'a, Result<R>> + Send>;

/// One deliverable unit in a mailbox
///
/// `deliver` resolves the envelope's completion itself and reports the
/// handler outcome to the dispatch loop; `reject` resolves the completion
/// with an admission error without running anything.
pub(crate) trait Envelope<A: Actor>: Send {
    /// Static label used by dead letters and logs
    fn descriptor(&self) -> &'static str;

    /// Run the handler on the actor and resolve the completion
    fn deliver<'a>(
        self: Box<Self>,
        actor: &'a mut A,
        env: &'a mut Environment,
    ) -> BoxFuture<'a, Result<()>>;

    /// Resolve the completion with an admission error without delivering
    fn reject(self: Box<Self>, error: Error);
}

/// Envelope for a proxy call expecting a typed reply
pub(crate) struct AskEnvelope<A: Actor, R: Send + 'static> {
    descriptor: &'static str,
    handler: Handler<A, R>,
    resolver: Resolver<R>,
}

impl<A: Actor, R: Send + 'static> AskEnvelope<A, R> {
    /// Create the envelope and the completion its caller awaits
    pub(crate) fn new(descriptor: &'static str, handler: Handler<A, R>) -> (Self, Completion<R>) {
        let (resolver, completion) = Completion::pending();
        (
            Self {
                descriptor,
                handler,
                resolver,
            },
            completion,
        )
    }
}

impl<A: Actor, R: Send + 'static> Envelope<A> for AskEnvelope<A, R> {
    fn descriptor(&self) -> &'static str {
        self.descriptor
    }

    fn deliver<'a>(
        self: Box<Self>,
        actor: &'a mut A,
        env: &'a mut Environment,
    ) -> BoxFuture<'a, Result<()>> {
        let AskEnvelope {
            handler, resolver, ..
        } = *self;
        Box::pin(async move {
            match (handler)(actor, env).await {
                Ok(value) => {
                    resolver.fulfill(value);
                    Ok(())
                }
                Err(error) => {
                    resolver.reject(error.clone());
                    Err(error)
                }
            }
        })
    }

    fn reject(self: Box<Self>, error: Error) {
        self.resolver.reject(error);
    }
}

/// First envelope of every cell: runs `before_start`
///
/// Errors here are caught and logged; they never prevent the cell from
/// running.
pub(crate) struct StartEnvelope<A: Actor> {
    _actor: PhantomData<fn(A)>,
}

impl<A: Actor> StartEnvelope<A> {
    pub(crate) fn new() -> Self {
        Self {
            _actor: PhantomData,
        }
    }
}

impl<A: Actor> Envelope<A> for StartEnvelope<A> {
    fn descriptor(&self) -> &'static str {
        "before_start"
    }

    fn deliver<'a>(
        self: Box<Self>,
        actor: &'a mut A,
        env: &'a mut Environment,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let lifecycle = env.lifecycle_handle();
            lifecycle.transition(LifecycleState::Constructed, LifecycleState::Starting);
            if let Err(error) = actor.before_start(env).await {
                warn!(address = %env.address(), error = %error, "before_start failed");
            }
            // A stop requested mid-start wins the transition race.
            lifecycle.transition(LifecycleState::Starting, LifecycleState::Running);
            Ok(())
        })
    }

    fn reject(self: Box<Self>, _error: Error) {}
}
