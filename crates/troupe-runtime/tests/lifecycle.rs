//! Lifecycle scenarios: hierarchical shutdown, stop idempotence, and
//! lifecycle error handling

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use troupe_core::address::Address;
use troupe_core::completion::Completion;
use troupe_core::error::{Error, Result};
use troupe_runtime::{Actor, Definition, Environment, Proxy, Stage};

type EventLog = Arc<Mutex<Vec<String>>>;

fn log_event(log: &EventLog, event: impl Into<String>) {
    log.lock().unwrap().push(event.into());
}

fn position(events: &[String], needle: &str) -> usize {
    events
        .iter()
        .position(|e| e == needle)
        .unwrap_or_else(|| panic!("event {} missing from {:?}", needle, events))
}

/// Actor that records its lifecycle transitions into a shared log
struct Tracker {
    name: &'static str,
    log: EventLog,
}

#[async_trait]
impl Actor for Tracker {
    async fn before_start(&mut self, _env: &mut Environment) -> Result<()> {
        log_event(&self.log, format!("{}:before_start", self.name));
        Ok(())
    }

    async fn before_stop(&mut self, _env: &mut Environment) -> Result<()> {
        log_event(&self.log, format!("{}:before_stop", self.name));
        Ok(())
    }

    async fn after_stop(&mut self, _env: &mut Environment) -> Result<()> {
        log_event(&self.log, format!("{}:after_stop", self.name));
        Ok(())
    }
}

trait TrackerProtocol {
    fn add_child(&self, name: &'static str, log: EventLog) -> Completion<Address>;
    fn ping(&self) -> Completion<&'static str>;
}

impl TrackerProtocol for Proxy<Tracker> {
    fn add_child(&self, name: &'static str, log: EventLog) -> Completion<Address> {
        self.ask(
            "Tracker::add_child",
            move |_actor: &mut Tracker, env: &mut Environment| {
                Box::pin(async move {
                    let child = env.child_actor_for(
                        Definition::of("Tracker", move || Tracker {
                            name,
                            log: log.clone(),
                        }),
                        None,
                    )?;
                    Ok(child.address().clone())
                })
            },
        )
    }

    fn ping(&self) -> Completion<&'static str> {
        self.ask(
            "Tracker::ping",
            |actor: &mut Tracker, _env: &mut Environment| Box::pin(async move { Ok(actor.name) }),
        )
    }
}

fn tracker(name: &'static str, log: EventLog) -> Definition<Tracker> {
    Definition::of("Tracker", move || Tracker {
        name,
        log: log.clone(),
    })
}

#[tokio::test]
async fn test_children_stop_before_the_parent() {
    let stage = Stage::new().unwrap();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));

    let parent = stage.actor_for(tracker("p", log.clone()), None).unwrap();
    parent.add_child("c1", log.clone()).await.unwrap();
    parent.add_child("c2", log.clone()).await.unwrap();

    stage.close().await;

    let events = log.lock().unwrap().clone();
    let p_before = position(&events, "p:before_stop");
    for child in ["c1", "c2"] {
        let before = position(&events, &format!("{}:before_stop", child));
        let after = position(&events, &format!("{}:after_stop", child));
        assert!(before < after, "{}: before_stop must precede after_stop", child);
        assert!(
            after < p_before,
            "{} must finish stopping before the parent's before_stop",
            child
        );
    }
    assert!(p_before < position(&events, "p:after_stop"));
}

#[tokio::test]
async fn test_multi_level_hierarchy_stops_leaf_first() {
    let stage = Stage::new().unwrap();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));

    let root = stage.actor_for(tracker("root", log.clone()), None).unwrap();
    let mid_address = root.add_child("mid", log.clone()).await.unwrap();
    let mid = stage
        .actor_of::<Tracker>(&mid_address)
        .expect("mid registered");
    mid.add_child("leaf", log.clone()).await.unwrap();

    stage.close().await;

    let events = log.lock().unwrap().clone();
    assert!(position(&events, "leaf:after_stop") < position(&events, "mid:before_stop"));
    assert!(position(&events, "mid:after_stop") < position(&events, "root:before_stop"));
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let stage = Stage::new().unwrap();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let actor = stage.actor_for(tracker("a", log.clone()), None).unwrap();

    actor.stop().await.unwrap();
    actor.stop().await.unwrap();
    actor.stop().await.unwrap();

    let events = log.lock().unwrap().clone();
    let stops = events.iter().filter(|e| e.ends_with(":before_stop")).count();
    assert_eq!(stops, 1);
}

#[tokio::test]
async fn test_sends_after_stop_are_dead_lettered() {
    let stage = Stage::new().unwrap();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let actor = stage.actor_for(tracker("a", log), None).unwrap();

    actor.stop().await.unwrap();
    assert!(actor.is_stopped());

    let before = stage.dead_letters().total();
    assert!(matches!(actor.ping().await, Err(Error::ActorStopped { .. })));
    assert_eq!(stage.dead_letters().total(), before + 1);

    stage.close().await;
}

#[tokio::test]
async fn test_stage_close_is_idempotent() {
    let stage = Stage::new().unwrap();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    stage.actor_for(tracker("a", log.clone()), None).unwrap();

    stage.close().await;
    stage.close().await;

    let events = log.lock().unwrap().clone();
    assert_eq!(
        events
            .iter()
            .filter(|e| e.ends_with(":before_stop"))
            .count(),
        1
    );
    assert!(stage.is_closed());
}

#[tokio::test]
async fn test_closed_stage_rejects_new_actors() {
    let stage = Stage::new().unwrap();
    stage.close().await;

    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    assert!(matches!(
        stage.actor_for(tracker("late", log), None),
        Err(Error::StageClosed)
    ));
}

/// Actor whose hooks fail on request
struct Brittle {
    fail_before_start: bool,
    fail_after_stop: bool,
}

#[async_trait]
impl Actor for Brittle {
    async fn before_start(&mut self, _env: &mut Environment) -> Result<()> {
        if self.fail_before_start {
            return Err(Error::failure_msg("before_start exploded"));
        }
        Ok(())
    }

    async fn after_stop(&mut self, _env: &mut Environment) -> Result<()> {
        if self.fail_after_stop {
            return Err(Error::failure_msg("after_stop exploded"));
        }
        Ok(())
    }
}

trait BrittleProtocol {
    fn echo(&self, value: u32) -> Completion<u32>;
}

impl BrittleProtocol for Proxy<Brittle> {
    fn echo(&self, value: u32) -> Completion<u32> {
        self.ask(
            "Brittle::echo",
            move |_actor: &mut Brittle, _env: &mut Environment| {
                Box::pin(async move { Ok(value) })
            },
        )
    }
}

#[tokio::test]
async fn test_before_start_failure_does_not_prevent_the_actor() {
    let stage = Stage::new().unwrap();
    let actor = stage
        .actor_for(
            Definition::of("Brittle", || Brittle {
                fail_before_start: true,
                fail_after_stop: false,
            }),
            None,
        )
        .unwrap();

    // The failure was caught and logged; messages flow normally.
    assert_eq!(actor.echo(7).await.unwrap(), 7);
    stage.close().await;
}

#[tokio::test]
async fn test_after_stop_failure_still_completes_the_stop() {
    let stage = Stage::new().unwrap();
    let actor = stage
        .actor_for(
            Definition::of("Brittle", || Brittle {
                fail_before_start: false,
                fail_after_stop: true,
            }),
            None,
        )
        .unwrap();
    let address = actor.address().clone();

    actor.stop().await.unwrap();
    assert!(actor.is_stopped());
    assert!(stage.actor_of::<Brittle>(&address).is_none());

    stage.close().await;
}

#[tokio::test]
async fn test_sends_after_close_are_rejected_as_stopped() {
    let stage = Stage::new().unwrap();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let actor = stage.actor_for(tracker("a", log), None).unwrap();
    actor.ping().await.unwrap();

    stage.close().await;

    assert!(matches!(actor.ping().await, Err(Error::ActorStopped { .. })));
}

#[tokio::test]
async fn test_duplicate_address_is_rejected() {
    let stage = Stage::new().unwrap();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let address = Address::named("pinned").unwrap();

    stage
        .actor_for(
            tracker("first", log.clone()).with_address(address.clone()),
            None,
        )
        .unwrap();
    let result = stage.actor_for(tracker("second", log).with_address(address), None);
    assert!(matches!(result, Err(Error::AlreadyRegistered { .. })));

    stage.close().await;
}

#[tokio::test]
async fn test_directory_stats_cover_all_actors() {
    let stage = Stage::new().unwrap();
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));

    for _ in 0..50 {
        stage.actor_for(tracker("n", log.clone()), None).unwrap();
    }

    let stats = stage.directory_stats();
    // 50 actors plus the two root guardians.
    assert_eq!(stats.total, 52);
    assert_eq!(stats.per_bucket.iter().sum::<usize>(), stats.total);
    // Uuid addresses spread over more than one bucket.
    assert!(stats.per_bucket.iter().filter(|&&n| n > 0).count() > 1);

    stage.close().await;
    assert_eq!(stage.directory_stats().total, 0);
}

#[tokio::test]
async fn test_instantiator_failure_surfaces_at_creation() {
    let stage = Stage::new().unwrap();
    let definition: Definition<Tracker> =
        Definition::try_of("Tracker", || Err(Error::failure_msg("no resources")));

    assert!(matches!(
        stage.actor_for(definition, None),
        Err(Error::InstantiationFailed { .. })
    ));
    stage.close().await;
}
