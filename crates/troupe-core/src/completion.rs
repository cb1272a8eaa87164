//! One-shot completions
//!
//! A [`Completion`] is the value a proxy call returns: pending until the
//! target actor processes the message, then fulfilled with the handler's
//! value or rejected with its error. Resolution is at-most-once by
//! construction — the [`Resolver`] is consumed by either outcome.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Pending one-shot value returned by a proxy call
///
/// Await it to observe the terminal state. Dropping a completion is fine;
/// the message is still delivered and the reply discarded.
#[must_use = "a completion does nothing until awaited"]
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T>>,
}

/// Write side of a [`Completion`]
///
/// Consumed by [`Resolver::fulfill`] or [`Resolver::reject`], so a resolver
/// can be used at most once. Dropping it unresolved rejects the completion
/// as abandoned.
#[derive(Debug)]
pub struct Resolver<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> Completion<T> {
    /// Create a pending completion and its resolver
    pub fn pending() -> (Resolver<T>, Completion<T>) {
        let (tx, rx) = oneshot::channel();
        (Resolver { tx }, Completion { rx })
    }

    /// Create an already-fulfilled completion
    pub fn fulfilled(value: T) -> Completion<T> {
        let (resolver, completion) = Self::pending();
        resolver.fulfill(value);
        completion
    }

    /// Create an already-rejected completion
    pub fn rejected(error: Error) -> Completion<T> {
        let (resolver, completion) = Self::pending();
        resolver.reject(error);
        completion
    }
}

impl<T> Resolver<T> {
    /// Fulfill the completion with a value
    ///
    /// Returns false if the completion was dropped by the awaiter.
    pub fn fulfill(self, value: T) -> bool {
        self.tx.send(Ok(value)).is_ok()
    }

    /// Reject the completion with an error
    ///
    /// Returns false if the completion was dropped by the awaiter.
    pub fn reject(self, error: Error) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::CompletionAbandoned {
                context: "resolver dropped before resolution".into(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}
