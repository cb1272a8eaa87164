//! Per-actor environment
//!
//! The environment is the actor's view of the world: its address, its
//! parent, the owning stage, a scoped logger, and the execution-context
//! scratch. It is owned by the cell and handed to handlers as `&mut`, so
//! only the dispatch loop ever touches it.

use std::sync::Arc;

use troupe_core::address::Address;
use troupe_core::completion::Completion;
use troupe_core::error::{Error, Result};
use troupe_core::execution_context::ExecutionContext;
use troupe_core::logger::Logger;

use crate::actor::Actor;
use crate::cell::{LifecycleFlag, LifecycleState};
use crate::dead_letters::DeadLetters;
use crate::definition::Definition;
use crate::proxy::Proxy;
use crate::scheduler::Scheduler;
use crate::stage::Stage;

/// Actor-side context available from within a handler
pub struct Environment {
    address: Address,
    parent: Option<Address>,
    stage: Stage,
    logger: Logger,
    execution_context: ExecutionContext,
    lifecycle: Arc<LifecycleFlag>,
}

impl Environment {
    pub(crate) fn new(
        address: Address,
        parent: Option<Address>,
        stage: Stage,
        lifecycle: Arc<LifecycleFlag>,
    ) -> Self {
        let logger = stage.logger().child(address.as_str());
        Self {
            address,
            parent,
            stage,
            logger,
            execution_context: ExecutionContext::new(),
            lifecycle,
        }
    }

    /// This actor's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The parent's address, if any
    pub fn parent_address(&self) -> Option<&Address> {
        self.parent.as_ref()
    }

    /// Typed proxy to the parent, when it is alive and of type `P`
    pub fn parent_as<P: Actor>(&self) -> Option<Proxy<P>> {
        self.parent
            .as_ref()
            .and_then(|address| self.stage.actor_of(address))
    }

    /// The owning stage
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Logger scoped to this actor
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// The stage scheduler
    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.stage.scheduler()
    }

    /// The stage dead-letter sink
    pub fn dead_letters(&self) -> Arc<DeadLetters> {
        self.stage.dead_letters()
    }

    /// Mutable access to the execution-context scratch
    pub fn execution_context(&mut self) -> &mut ExecutionContext {
        &mut self.execution_context
    }

    /// Typed proxy to this actor itself
    ///
    /// Messages sent through it land at the tail of the own mailbox and run
    /// strictly after the current handler completes.
    ///
    /// # Errors
    /// Fails when the cell is no longer registered (stopping) or `A` is not
    /// this actor's type.
    pub fn self_as<A: Actor>(&self) -> Result<Proxy<A>> {
        self.stage
            .actor_of(&self.address)
            .ok_or_else(|| Error::stopped(self.address.as_str()))
    }

    /// Create a child actor supervised under this one
    pub fn child_actor_for<C: Actor>(
        &self,
        definition: Definition<C>,
        supervisor_key: Option<&str>,
    ) -> Result<Proxy<C>> {
        self.stage
            .spawn(definition, supervisor_key, Some(self.address.clone()))
    }

    /// Request this actor's stop sequence
    ///
    /// Resolves once the sequence completed. Safe to call from inside a
    /// handler; the sequence waits for the handler to return.
    pub fn stop(&self) -> Completion<()> {
        self.stage.stop_cell(&self.address)
    }

    /// True once a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.lifecycle.is_stopping_or_stopped()
    }

    /// Current lifecycle state of this actor's cell
    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle.load()
    }

    pub(crate) fn lifecycle_handle(&self) -> Arc<LifecycleFlag> {
        self.lifecycle.clone()
    }
}
