//! Timed task scheduling
//!
//! One-shot and repeating callbacks with cancellation. Actions are fallible
//! async closures; their errors are caught and logged, never terminating
//! the scheduler. Firings are never earlier than scheduled; lateness is
//! bounded by dispatch load.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use troupe_core::clock::Clock;
use troupe_core::error::Result;
use troupe_core::logger::Logger;

/// Fallible async callback run by the scheduler
pub type ScheduledAction = Box<dyn FnMut() -> BoxFuture<'static, Result<()>> + Send>;

/// Handle to a scheduled task
///
/// Cloning shares the same task; cancelling any clone cancels all.
#[derive(Debug, Clone)]
pub struct Cancellable {
    cancelled: Arc<AtomicBool>,
    fired: Arc<AtomicBool>,
    repeating: bool,
}

impl Cancellable {
    fn new(repeating: bool) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            fired: Arc::new(AtomicBool::new(false)),
            repeating,
        }
    }

    /// A handle that was cancelled before it ever ran
    fn inert() -> Self {
        let handle = Self::new(false);
        handle.cancelled.store(true, Ordering::SeqCst);
        handle
    }

    /// Cancel the task
    ///
    /// Returns true iff the one-shot action had not yet been dispatched, or
    /// iff further repeat firings were prevented. A second cancel is a
    /// no-op returning false. A running action is never interrupted.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        if self.repeating {
            true
        } else {
            !self.fired.load(Ordering::SeqCst)
        }
    }

    /// True once cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True once the action was dispatched at least once
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// One-shot and repeating timers for a stage
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    logger: Logger,
    closed: AtomicBool,
    tasks: Mutex<Vec<Cancellable>>,
}

impl Scheduler {
    pub(crate) fn new(clock: Arc<dyn Clock>, logger: Logger) -> Self {
        Self {
            clock,
            logger,
            closed: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Run `action` once after `delay`
    pub fn schedule_once(&self, delay: Duration, mut action: ScheduledAction) -> Cancellable {
        if self.is_closed() {
            warn!(scope = %self.logger.scope(), "schedule_once on closed scheduler");
            return Cancellable::inert();
        }

        let handle = Cancellable::new(false);
        let task = handle.clone();
        let clock = self.clock.clone();
        let logger = self.logger.clone();

        tokio::spawn(async move {
            clock.sleep(delay).await;
            if task.cancelled.load(Ordering::SeqCst) {
                return;
            }
            task.fired.store(true, Ordering::SeqCst);
            if let Err(e) = (action)().await {
                error!(scope = %logger.scope(), error = %e, "scheduled action failed");
            }
        });

        self.track(handle.clone());
        handle
    }

    /// Run `action` after `initial_delay`, then every `interval`
    pub fn schedule_repeat(
        &self,
        initial_delay: Duration,
        interval: Duration,
        mut action: ScheduledAction,
    ) -> Cancellable {
        debug_assert!(!interval.is_zero(), "repeat interval must be positive");

        if self.is_closed() {
            warn!(scope = %self.logger.scope(), "schedule_repeat on closed scheduler");
            return Cancellable::inert();
        }

        let handle = Cancellable::new(true);
        let task = handle.clone();
        let clock = self.clock.clone();
        let logger = self.logger.clone();

        tokio::spawn(async move {
            clock.sleep(initial_delay).await;
            loop {
                if task.cancelled.load(Ordering::SeqCst) {
                    return;
                }
                task.fired.store(true, Ordering::SeqCst);
                if let Err(e) = (action)().await {
                    error!(scope = %logger.scope(), error = %e, "scheduled action failed");
                }
                clock.sleep(interval).await;
            }
        });

        self.track(handle.clone());
        handle
    }

    /// Cancel every outstanding task (idempotent)
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(scope = %self.logger.scope(), "scheduler closing");
        let tasks = {
            let mut tasks = self.lock_tasks();
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            task.cancel();
        }
    }

    /// True once closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn track(&self, handle: Cancellable) {
        let mut tasks = self.lock_tasks();
        // Drop entries that can never fire again.
        tasks.retain(|task| {
            !task.is_cancelled() && !(task.has_fired() && !task.repeating)
        });
        tasks.push(handle);
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<Cancellable>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
