//! The stage
//!
//! Root object of the runtime: creates actors, owns the directory, the
//! scheduler, the dead-letter sink, and the two root guardians, and shuts
//! everything down in order. A `Stage` is a cheap cloneable handle; the
//! actual state is shared.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::{debug, info};

use troupe_core::address::{Address, AddressSource, Uuid7AddressSource};
use troupe_core::clock::{Clock, WallClock};
use troupe_core::completion::Completion;
use troupe_core::config::StageConfig;
use troupe_core::error::{Error, Result};
use troupe_core::logger::Logger;
use troupe_core::supervision::{DefaultSupervisor, SupervisionStrategy, Supervisor};

use crate::actor::Actor;
use crate::cell::ActorCell;
use crate::dead_letters::DeadLetters;
use crate::definition::Definition;
use crate::directory::{Directory, DirectoryStats};
use crate::guardian::{
    GuardianSupervisor, PrivateRoot, PublicRoot, PRIVATE_ROOT_ADDRESS, PUBLIC_ROOT_ADDRESS,
};
use crate::proxy::Proxy;
use crate::scheduler::Scheduler;

type SupervisorEntry = (Arc<dyn Supervisor>, SupervisionStrategy);

pub(crate) struct StageInner {
    name: String,
    config: StageConfig,
    directory: Directory,
    scheduler: Arc<Scheduler>,
    dead_letters: Arc<DeadLetters>,
    address_source: Arc<dyn AddressSource>,
    clock: Arc<dyn Clock>,
    logger: Logger,
    supervisors: RwLock<HashMap<String, SupervisorEntry>>,
    public_root: Address,
    private_root: Address,
    closed: AtomicBool,
    close_state: watch::Sender<bool>,
}

/// Handle to one actor system
///
/// Cloning shares the same stage. Actors, the scheduler, and dead-letter
/// subscriptions are scope-bound to the stage and released by
/// [`Stage::close`].
#[derive(Clone)]
pub struct Stage {
    inner: Arc<StageInner>,
}

/// Builder for a stage
pub struct StageBuilder {
    config: StageConfig,
    clock: Option<Arc<dyn Clock>>,
    address_source: Option<Arc<dyn AddressSource>>,
}

impl StageBuilder {
    /// Create a builder with defaults
    pub fn new() -> Self {
        Self {
            config: StageConfig::default(),
            clock: None,
            address_source: None,
        }
    }

    /// Set the configuration
    pub fn with_config(mut self, config: StageConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the clock backend
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the address source
    pub fn with_address_source(mut self, source: Arc<dyn AddressSource>) -> Self {
        self.address_source = Some(source);
        self
    }

    /// Build the stage and start its root guardians
    pub fn build(self) -> Result<Stage> {
        self.config.validate()?;

        let name = self
            .config
            .name
            .clone()
            .unwrap_or_else(|| "troupe".to_string());
        let logger = Logger::new(&name);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(WallClock::new()) as Arc<dyn Clock>);
        let address_source = self
            .address_source
            .unwrap_or_else(|| Arc::new(Uuid7AddressSource::new()) as Arc<dyn AddressSource>);

        let scheduler = Arc::new(Scheduler::new(clock.clone(), logger.child("scheduler")));
        let dead_letters = Arc::new(DeadLetters::new(
            self.config.dead_letters.recent_limit,
            logger.child("dead-letters"),
        ));
        let directory = Directory::new(self.config.directory.buckets);
        let (close_state, _) = watch::channel(false);

        let stage = Stage {
            inner: Arc::new(StageInner {
                name: name.clone(),
                config: self.config,
                directory,
                scheduler,
                dead_letters,
                address_source,
                clock,
                logger,
                supervisors: RwLock::new(HashMap::new()),
                public_root: Address::named(PUBLIC_ROOT_ADDRESS)?,
                private_root: Address::named(PRIVATE_ROOT_ADDRESS)?,
                closed: AtomicBool::new(false),
                close_state,
            }),
        };

        stage.spawn_guardians()?;
        info!(stage = %name, "stage ready");
        Ok(stage)
    }
}

impl Default for StageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage {
    /// Create a stage with default configuration
    pub fn new() -> Result<Self> {
        StageBuilder::new().build()
    }

    /// Create a builder
    pub fn builder() -> StageBuilder {
        StageBuilder::new()
    }

    /// Create an actor parented under the public root
    ///
    /// The returned proxy is usable immediately; messages sent before the
    /// actor started are queued behind its `before_start`.
    pub fn actor_for<A: Actor>(
        &self,
        definition: Definition<A>,
        supervisor_key: Option<&str>,
    ) -> Result<Proxy<A>> {
        self.spawn(definition, supervisor_key, Some(self.inner.public_root.clone()))
    }

    /// Look up a live actor by address
    ///
    /// Returns None when no actor lives at the address or its type is not
    /// `A`. Repeated lookups yield equal proxies.
    pub fn actor_of<A: Actor>(&self, address: &Address) -> Option<Proxy<A>> {
        let cell = self.inner.directory.get(address)?;
        let typed = cell.as_any().downcast::<ActorCell<A>>().ok()?;
        Some(Proxy::new(typed))
    }

    /// Register a named supervisor for use via `supervisor_key`
    pub fn register_supervisor(
        &self,
        key: impl Into<String>,
        supervisor: Arc<dyn Supervisor>,
        strategy: SupervisionStrategy,
    ) {
        let mut supervisors = match self.inner.supervisors.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        supervisors.insert(key.into(), (supervisor, strategy));
    }

    /// Shut the stage down (idempotent)
    ///
    /// Stops the public root first — transitively stopping every user
    /// actor — then the private root, then the scheduler, then clears the
    /// directory. Errors along the way are logged, never rethrown.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            // First closer runs the sequence; wait for it.
            let mut rx = self.inner.close_state.subscribe();
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        }

        info!(stage = %self.inner.name, "stage closing");

        if let Some(cell) = self.inner.directory.get(&self.inner.public_root) {
            cell.stop().await;
        }
        if let Some(cell) = self.inner.directory.get(&self.inner.private_root) {
            cell.stop().await;
        }
        self.inner.scheduler.close();
        // Every cell unregisters during its own stop; anything left behind
        // is cleared with the registry.
        debug!(
            stage = %self.inner.name,
            leftover = self.inner.directory.len(),
            "clearing directory"
        );
        self.inner.directory.clear();
        debug_assert!(self.inner.directory.is_empty());
        let _ = self.inner.close_state.send(true);

        info!(stage = %self.inner.name, "stage closed");
    }

    /// True once close was requested
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// The stage name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The stage's root logger
    pub fn logger(&self) -> &Logger {
        &self.inner.logger
    }

    /// The stage scheduler
    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.inner.scheduler.clone()
    }

    /// The dead-letter sink
    pub fn dead_letters(&self) -> Arc<DeadLetters> {
        self.inner.dead_letters.clone()
    }

    /// Per-bucket directory occupancy
    pub fn directory_stats(&self) -> DirectoryStats {
        self.inner.directory.stats()
    }

    /// The clock backend
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock.clone()
    }

    /// Address of the public root guardian
    pub fn public_root(&self) -> &Address {
        &self.inner.public_root
    }

    pub(crate) fn directory(&self) -> &Directory {
        &self.inner.directory
    }

    /// Create an actor under an explicit parent
    pub(crate) fn spawn<A: Actor>(
        &self,
        definition: Definition<A>,
        supervisor_key: Option<&str>,
        parent: Option<Address>,
    ) -> Result<Proxy<A>> {
        if self.is_closed() {
            return Err(Error::StageClosed);
        }

        let (supervisor, strategy) = match supervisor_key {
            Some(key) => {
                let supervisors = match self.inner.supervisors.read() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                supervisors
                    .get(key)
                    .cloned()
                    .ok_or_else(|| Error::UnknownSupervisor { key: key.into() })?
            }
            None => (
                Arc::new(DefaultSupervisor) as Arc<dyn Supervisor>,
                self.inner.config.default_strategy.clone(),
            ),
        };

        self.spawn_cell(definition, supervisor, strategy, parent, false)
    }

    fn spawn_guardians(&self) -> Result<()> {
        let public = Definition::of("PublicRoot", || PublicRoot)
            .with_address(self.inner.public_root.clone());
        self.spawn_cell(
            public,
            Arc::new(GuardianSupervisor),
            SupervisionStrategy::unlimited(),
            None,
            true,
        )?;

        let private = Definition::of("PrivateRoot", || PrivateRoot)
            .with_address(self.inner.private_root.clone());
        self.spawn_cell(
            private,
            Arc::new(GuardianSupervisor),
            SupervisionStrategy::unlimited(),
            None,
            true,
        )?;

        Ok(())
    }

    fn spawn_cell<A: Actor>(
        &self,
        definition: Definition<A>,
        supervisor: Arc<dyn Supervisor>,
        strategy: SupervisionStrategy,
        parent: Option<Address>,
        guardian: bool,
    ) -> Result<Proxy<A>> {
        definition.mailbox_options().validate()?;

        let address = match definition.address() {
            Some(address) => address.clone(),
            None => self.inner.address_source.next(),
        };
        let type_name = definition.type_name();
        let actor = definition
            .instantiate()
            .map_err(|e| Error::instantiation_failed(type_name, e.to_string()))?;

        let cell = ActorCell::new(
            address.clone(),
            definition,
            actor,
            parent.clone(),
            supervisor,
            strategy,
            guardian,
            self.clone(),
        );

        self.inner.directory.register(cell.clone())?;
        if let Some(parent_address) = &parent {
            if let Some(parent_cell) = self.inner.directory.get(parent_address) {
                parent_cell.add_child(address.clone());
            }
        }
        cell.enqueue_start();

        debug!(stage = %self.inner.name, address = %address, type_name, "actor created");
        Ok(Proxy::new(cell))
    }

    /// Stop the cell at `address`; resolves when its sequence completed
    pub(crate) fn stop_cell(&self, address: &Address) -> Completion<()> {
        match self.inner.directory.get(address) {
            Some(cell) => {
                let (resolver, completion) = Completion::pending();
                tokio::spawn(async move {
                    cell.stop().await;
                    resolver.fulfill(());
                });
                completion
            }
            None => Completion::fulfilled(()),
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.inner.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
