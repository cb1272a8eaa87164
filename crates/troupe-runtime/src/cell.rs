//! Actor cells
//!
//! A cell is the runtime record of one live actor: the instance, its
//! environment, its mailbox, its supervision wiring, and its place in the
//! tree. The cell owns the drain loop (single-consumer dispatch), applies
//! supervision directives, and runs the stop sequence.

use std::any::Any;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use troupe_core::address::Address;
use troupe_core::error::Error;
use troupe_core::supervision::{
    Directive, RestartHistory, SupervisedRef, SupervisionScope, SupervisionStrategy, Supervisor,
};

use crate::actor::Actor;
use crate::dead_letters::{DeadLetter, DeadLetterReason};
use crate::definition::Definition;
use crate::environment::Environment;
use crate::mailbox::Mailbox;
use crate::message::{Envelope, StartEnvelope};
use crate::stage::Stage;

/// Lifecycle of a cell
///
/// ```text
/// constructed -> starting -> running -> stopping -> stopped
/// ```
///
/// A stop request wins every race: once `stopping` is reached the state
/// only moves forward to `stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Cell created and registered; `before_start` not yet dispatched
    Constructed = 0,
    /// `before_start` is running
    Starting = 1,
    /// Accepting and dispatching messages
    Running = 2,
    /// Stop sequence in progress; new sends go to dead letters
    Stopping = 3,
    /// Terminal; the cell is unregistered
    Stopped = 4,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Constructed,
            1 => LifecycleState::Starting,
            2 => LifecycleState::Running,
            3 => LifecycleState::Stopping,
            _ => LifecycleState::Stopped,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Constructed => write!(f, "constructed"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopping => write!(f, "stopping"),
            LifecycleState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Atomic lifecycle holder shared between cell and environment
#[derive(Debug)]
pub(crate) struct LifecycleFlag(AtomicU8);

impl LifecycleFlag {
    fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Constructed as u8))
    }

    pub(crate) fn load(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move from `from` to `to`; false when another transition won
    pub(crate) fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Claim the stop sequence; false when already stopping or stopped
    fn begin_stopping(&self) -> bool {
        loop {
            let current = self.0.load(Ordering::SeqCst);
            if current >= LifecycleState::Stopping as u8 {
                return false;
            }
            if self
                .0
                .compare_exchange(
                    current,
                    LifecycleState::Stopping as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return true;
            }
        }
    }

    fn mark_stopped(&self) {
        self.0.store(LifecycleState::Stopped as u8, Ordering::SeqCst);
    }

    pub(crate) fn is_stopping_or_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst) >= LifecycleState::Stopping as u8
    }
}

/// The actor instance and its environment, guarded as one unit
///
/// The lock is the message boundary: dispatch, hooks, and the stop
/// sequence all serialize on it.
struct CellState<A: Actor> {
    actor: A,
    env: Environment,
}

/// Type-erased view of a cell for the directory and the supervision tree
#[async_trait]
pub(crate) trait AnyCell: Send + Sync + 'static {
    fn address(&self) -> &Address;
    fn type_name(&self) -> &'static str;
    fn children(&self) -> Vec<Address>;
    fn add_child(&self, address: Address);
    fn remove_child(&self, address: &Address);

    /// Run or await the stop sequence (idempotent)
    async fn stop(&self);

    /// Apply a supervision directive to this cell
    async fn apply_directive(&self, directive: Directive, error: &Error);

    /// Parent-side handling of a child's escalated failure
    async fn handle_escalation(&self, failing: Arc<dyn AnyCell>, error: Error);

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Runtime record of one live actor
pub(crate) struct ActorCell<A: Actor> {
    address: Address,
    definition: Definition<A>,
    parent: Option<Address>,
    guardian: bool,
    stage: Stage,
    mailbox: Mailbox<A>,
    state: tokio::sync::Mutex<CellState<A>>,
    lifecycle: Arc<LifecycleFlag>,
    children: Mutex<Vec<Address>>,
    supervisor: Arc<dyn Supervisor>,
    strategy: SupervisionStrategy,
    history: Mutex<RestartHistory>,
    stop_state: watch::Sender<bool>,
    me: Weak<Self>,
}

impl<A: Actor> ActorCell<A> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        address: Address,
        definition: Definition<A>,
        actor: A,
        parent: Option<Address>,
        supervisor: Arc<dyn Supervisor>,
        strategy: SupervisionStrategy,
        guardian: bool,
        stage: Stage,
    ) -> Arc<Self> {
        let lifecycle = Arc::new(LifecycleFlag::new());
        let env = Environment::new(
            address.clone(),
            parent.clone(),
            stage.clone(),
            lifecycle.clone(),
        );
        let mailbox = Mailbox::new(definition.mailbox_options());
        let (stop_state, _) = watch::channel(false);

        Arc::new_cyclic(|me| Self {
            address,
            definition,
            parent,
            guardian,
            stage,
            mailbox,
            state: tokio::sync::Mutex::new(CellState { actor, env }),
            lifecycle,
            children: Mutex::new(Vec::new()),
            supervisor,
            strategy,
            history: Mutex::new(RestartHistory::new()),
            stop_state,
            me: me.clone(),
        })
    }

    pub(crate) fn cell_address(&self) -> &Address {
        &self.address
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.lifecycle.is_stopping_or_stopped()
    }

    pub(crate) fn stage_handle(&self) -> &Stage {
        &self.stage
    }

    /// Enqueue the `before_start` hook as the cell's first message
    pub(crate) fn enqueue_start(&self) {
        if self.lifecycle.is_stopping_or_stopped() {
            return;
        }
        let admission = self
            .mailbox
            .admit_system(Box::new(StartEnvelope::new()), &self.address);
        self.finish_admission(admission);
    }

    /// Admit an envelope: dead-letter it, queue it, or queue-and-drain
    pub(crate) fn send_envelope(&self, envelope: Box<dyn Envelope<A>>) {
        if self.lifecycle.is_stopping_or_stopped() {
            let descriptor = envelope.descriptor();
            envelope.reject(Error::stopped(self.address.as_str()));
            self.stage.dead_letters().record(DeadLetter::new(
                self.address.clone(),
                descriptor,
                DeadLetterReason::Stopped,
            ));
            return;
        }

        let admission = self.mailbox.admit(envelope, &self.address);
        self.finish_admission(admission);
    }

    fn finish_admission(&self, admission: crate::mailbox::Admission<A>) {
        if let Some(rejection) = admission.rejection {
            let descriptor = rejection.envelope.descriptor();
            rejection.envelope.reject(rejection.error);
            self.stage.dead_letters().record(DeadLetter::new(
                self.address.clone(),
                descriptor,
                rejection.reason,
            ));
        }
        if admission.start_dispatch {
            self.spawn_drain();
        }
    }

    fn spawn_drain(&self) {
        if let Some(me) = self.me.upgrade() {
            tokio::spawn(async move {
                me.drain_loop().await;
            });
        }
    }

    /// Self-draining dispatch: run until the queue is empty, suspended, or
    /// closed, then give the slot back
    async fn drain_loop(&self) {
        loop {
            match self.mailbox.next() {
                Some(envelope) => self.deliver(envelope).await,
                None => {
                    if !self.mailbox.release_dispatcher() {
                        return;
                    }
                }
            }
        }
    }

    /// Deliver one envelope and, on failure, run supervision
    async fn deliver(&self, envelope: Box<dyn Envelope<A>>) {
        if self.lifecycle.is_stopping_or_stopped() {
            let descriptor = envelope.descriptor();
            envelope.reject(Error::stopped(self.address.as_str()));
            self.stage.dead_letters().record(DeadLetter::new(
                self.address.clone(),
                descriptor,
                DeadLetterReason::Stopped,
            ));
            return;
        }

        let descriptor = envelope.descriptor();
        let result = {
            let mut state = self.state.lock().await;
            let CellState { actor, env } = &mut *state;
            envelope.deliver(actor, env).await
        };

        if let Err(failure) = result {
            warn!(
                address = %self.address,
                type_name = self.definition.type_name(),
                descriptor,
                error = %failure,
                "delivery failed"
            );
            // Dispatch pauses until the directive has been applied.
            self.mailbox.suspend();
            self.handle_failure(failure).await;
        }
    }

    /// Decide and apply a directive for a failure of this cell
    async fn handle_failure(&self, failure: Error) {
        let supervised = SupervisedRef {
            address: self.address.clone(),
            type_name: self.definition.type_name(),
        };
        let mut directive = self
            .supervisor
            .decide(&failure, &supervised, &self.strategy);

        if self.record_failure() {
            warn!(
                address = %self.address,
                max_restarts = ?self.strategy.max_restarts,
                "restart intensity exceeded, escalating"
            );
            directive = Directive::Escalate;
        }

        debug!(
            address = %self.address,
            directive = %directive,
            mailbox = ?self.mailbox,
            "supervision directive"
        );

        if directive != Directive::Escalate && self.strategy.scope == SupervisionScope::OneForAll {
            self.apply_to_siblings(directive, &failure).await;
        }

        match directive {
            Directive::Escalate => self.escalate(failure).await,
            other => self.apply_directive(other, &failure).await,
        }
    }

    /// Record a failure timestamp; true when intensity is exceeded
    fn record_failure(&self) -> bool {
        let now_ms = self.stage.clock().now_ms();
        let mut history = match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        history.record_and_check(now_ms, &self.strategy)
    }

    /// one-for-all: the directive also applies to every sibling
    async fn apply_to_siblings(&self, directive: Directive, failure: &Error) {
        let Some(parent) = self.parent_cell() else {
            return;
        };
        for sibling_address in parent.children() {
            if sibling_address == self.address {
                continue;
            }
            if let Some(sibling) = self.stage.directory().get(&sibling_address) {
                sibling.apply_directive(directive, failure).await;
            }
        }
    }

    fn parent_cell(&self) -> Option<Arc<dyn AnyCell>> {
        self.parent
            .as_ref()
            .and_then(|address| self.stage.directory().get(address))
    }

    /// Forward the failure up the tree; a tree top restarts unlimited
    async fn escalate(&self, failure: Error) {
        match (self.parent_cell(), self.me.upgrade()) {
            (Some(parent), Some(me)) => {
                let failing: Arc<dyn AnyCell> = me;
                parent.handle_escalation(failing, failure).await;
            }
            _ => {
                self.apply_directive(Directive::Restart, &failure).await;
            }
        }
    }

    /// Rebuild the actor instance from its definition
    async fn restart(&self, failure: &Error) {
        debug!(
            address = %self.address,
            type_name = self.definition.type_name(),
            "restarting"
        );

        {
            let mut state = self.state.lock().await;
            let CellState { actor, env } = &mut *state;
            if let Err(e) = actor.before_restart(env, failure).await {
                warn!(address = %self.address, error = %e, "before_restart failed");
            }
        }

        // Children go down with the old instance, same rules as stop.
        for child_address in self.take_children() {
            if let Some(child) = self.stage.directory().get(&child_address) {
                child.stop().await;
            }
        }

        match self.definition.instantiate() {
            Ok(fresh) => {
                let mut state = self.state.lock().await;
                state.actor = fresh;
                let CellState { actor, env } = &mut *state;
                if let Err(e) = actor.after_restart(env, failure).await {
                    warn!(address = %self.address, error = %e, "after_restart failed");
                }
                drop(state);
                self.resume_mailbox();
            }
            Err(e) => {
                error!(
                    address = %self.address,
                    type_name = self.definition.type_name(),
                    error = %e,
                    "re-instantiation failed, stopping cell"
                );
                self.stop_cell().await;
            }
        }
    }

    fn resume_mailbox(&self) {
        if self.mailbox.resume() {
            self.spawn_drain();
        }
    }

    fn take_children(&self) -> Vec<Address> {
        let mut children = match self.children.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *children)
    }

    /// Run or await the stop sequence
    pub(crate) async fn stop_cell(&self) {
        if self.lifecycle.begin_stopping() {
            self.run_stop().await;
        } else {
            // Another task owns the sequence; wait for it to finish.
            let mut rx = self.stop_state.subscribe();
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        }
    }

    /// The stop sequence: children, hooks, mailbox, registry
    async fn run_stop(&self) {
        debug!(
            address = %self.address,
            type_name = self.definition.type_name(),
            "stop sequence starting"
        );

        for child_address in self.take_children() {
            if let Some(child) = self.stage.directory().get(&child_address) {
                child.stop().await;
            }
        }

        {
            let mut state = self.state.lock().await;
            let CellState { actor, env } = &mut *state;

            if let Err(e) = actor.before_stop(env).await {
                warn!(address = %self.address, error = %e, "before_stop failed");
            }

            for envelope in self.mailbox.close() {
                let descriptor = envelope.descriptor();
                envelope.reject(Error::stopped(self.address.as_str()));
                self.stage.dead_letters().record(DeadLetter::new(
                    self.address.clone(),
                    descriptor,
                    DeadLetterReason::Closed,
                ));
            }

            if let Err(e) = actor.after_stop(env).await {
                warn!(address = %self.address, error = %e, "after_stop failed");
            }
        }

        self.stage.directory().unregister(&self.address);
        if let Some(parent) = self.parent_cell() {
            parent.remove_child(&self.address);
        }
        self.lifecycle.mark_stopped();
        let _ = self.stop_state.send(true);

        debug!(address = %self.address, "stopped");
    }
}

#[async_trait]
impl<A: Actor> AnyCell for ActorCell<A> {
    fn address(&self) -> &Address {
        &self.address
    }

    fn type_name(&self) -> &'static str {
        self.definition.type_name()
    }

    fn children(&self) -> Vec<Address> {
        match self.children.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn add_child(&self, address: Address) {
        let mut children = match self.children.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !children.contains(&address) {
            children.push(address);
        }
    }

    fn remove_child(&self, address: &Address) {
        let mut children = match self.children.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        children.retain(|existing| existing != address);
    }

    async fn stop(&self) {
        self.stop_cell().await;
    }

    async fn apply_directive(&self, directive: Directive, error: &Error) {
        match directive {
            Directive::Resume => {
                {
                    let mut state = self.state.lock().await;
                    let CellState { actor, env } = &mut *state;
                    if let Err(e) = actor.before_resume(env, error).await {
                        warn!(address = %self.address, error = %e, "before_resume failed");
                    }
                }
                self.resume_mailbox();
            }
            Directive::Restart => self.restart(error).await,
            Directive::Stop => self.stop_cell().await,
            Directive::Escalate => self.escalate(error.clone()).await,
        }
    }

    async fn handle_escalation(&self, failing: Arc<dyn AnyCell>, error: Error) {
        if self.guardian {
            warn!(
                guardian = %self.address,
                address = %failing.address(),
                error = %error,
                "guardian restarting escalated child"
            );
            failing.apply_directive(Directive::Restart, &error).await;
            return;
        }

        let supervised = SupervisedRef {
            address: failing.address().clone(),
            type_name: failing.type_name(),
        };
        let mut directive = self.supervisor.decide(&error, &supervised, &self.strategy);
        if self.record_failure() {
            directive = Directive::Escalate;
        }

        debug!(
            address = %self.address,
            child = %failing.address(),
            directive = %directive,
            "escalation directive"
        );

        match directive {
            Directive::Escalate => match self.parent_cell() {
                Some(parent) => parent.handle_escalation(failing, error).await,
                None => failing.apply_directive(Directive::Restart, &error).await,
            },
            other => failing.apply_directive(other, &error).await,
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
