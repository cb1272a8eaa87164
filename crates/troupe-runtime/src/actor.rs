//! Actor behavior
//!
//! An actor is plain state plus handlers. Handlers are not declared here —
//! they arrive as closures built by a [`Proxy`](crate::proxy::Proxy) — so
//! the trait only carries the lifecycle hooks the runtime invokes around
//! dispatch, restart, and stop.
//!
//! Every hook has a no-op default; implement only what the actor needs.
//! Hook errors are caught and logged by the runtime and never prevent the
//! lifecycle from completing.

use async_trait::async_trait;
use serde_json::Value;

use troupe_core::error::{Error, Result};

use crate::environment::Environment;

/// Base actor behavior: lifecycle hooks
///
/// Execution is single-consumer: the runtime never runs two handlers or
/// hooks of the same actor concurrently.
#[async_trait]
pub trait Actor: Send + 'static {
    /// Invoked as the first message after the cell is registered
    ///
    /// The proxy is already usable; messages sent before this hook ran are
    /// simply queued behind it.
    async fn before_start(&mut self, env: &mut Environment) -> Result<()> {
        let _ = env;
        Ok(())
    }

    /// Invoked during the stop sequence, after children have stopped and
    /// before the mailbox closes
    async fn before_stop(&mut self, env: &mut Environment) -> Result<()> {
        let _ = env;
        Ok(())
    }

    /// Invoked at the end of the stop sequence, after the mailbox closed
    async fn after_stop(&mut self, env: &mut Environment) -> Result<()> {
        let _ = env;
        Ok(())
    }

    /// Invoked on the failing instance before a restart discards it
    async fn before_restart(&mut self, env: &mut Environment, error: &Error) -> Result<()> {
        let _ = (env, error);
        Ok(())
    }

    /// Invoked on the fresh instance after a restart
    async fn after_restart(&mut self, env: &mut Environment, error: &Error) -> Result<()> {
        let _ = (env, error);
        Ok(())
    }

    /// Invoked before processing resumes with state intact
    async fn before_resume(&mut self, env: &mut Environment, error: &Error) -> Result<()> {
        let _ = (env, error);
        Ok(())
    }

    /// Exchange the actor's state snapshot
    ///
    /// `state_snapshot(Some(new))` stores a snapshot and returns the
    /// previous one; `state_snapshot(None)` returns the current one. The
    /// default keeps no snapshot. Restart does not invoke this
    /// automatically; `before_restart` can opt in.
    fn state_snapshot(&mut self, new: Option<Value>) -> Option<Value> {
        let _ = new;
        None
    }
}
