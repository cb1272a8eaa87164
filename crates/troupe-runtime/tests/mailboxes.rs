//! Bounded mailbox scenarios: overflow policies and dead-letter accounting

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use troupe_core::completion::Completion;
use troupe_core::error::Error;
use troupe_runtime::{
    Actor, DeadLetter, DeadLetterListener, DeadLetterReason, Definition, Environment,
    MailboxOptions, OverflowPolicy, Proxy, Stage,
};

/// Actor whose first message can hold the dispatcher open, so later sends
/// pile up in the queue
struct Gated {
    gate: Arc<Notify>,
    started: Arc<AtomicBool>,
    observed: Vec<&'static str>,
}

#[async_trait]
impl Actor for Gated {
    async fn before_start(
        &mut self,
        _env: &mut Environment,
    ) -> troupe_core::error::Result<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }
}

trait GatedProtocol {
    fn block(&self, entered: Arc<AtomicBool>) -> Completion<()>;
    fn tag(&self, tag: &'static str) -> Completion<()>;
    fn observed(&self) -> Completion<Vec<&'static str>>;
}

impl GatedProtocol for Proxy<Gated> {
    fn block(&self, entered: Arc<AtomicBool>) -> Completion<()> {
        self.ask(
            "Gated::block",
            move |actor: &mut Gated, _env: &mut Environment| {
                let gate = actor.gate.clone();
                Box::pin(async move {
                    entered.store(true, Ordering::SeqCst);
                    gate.notified().await;
                    Ok(())
                })
            },
        )
    }

    fn tag(&self, tag: &'static str) -> Completion<()> {
        self.ask(
            "Gated::tag",
            move |actor: &mut Gated, _env: &mut Environment| {
                Box::pin(async move {
                    actor.observed.push(tag);
                    Ok(())
                })
            },
        )
    }

    fn observed(&self) -> Completion<Vec<&'static str>> {
        self.ask(
            "Gated::observed",
            |actor: &mut Gated, _env: &mut Environment| {
                Box::pin(async move { Ok(actor.observed.clone()) })
            },
        )
    }
}

struct Fixture {
    stage: Stage,
    proxy: Proxy<Gated>,
    gate: Arc<Notify>,
}

async fn wait_for_flag(flag: &AtomicBool, what: &str) {
    for _ in 0..400 {
        if flag.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("{} never happened", what);
}

/// Spawn a gated actor and park its dispatcher inside the first message
async fn occupied_actor(options: MailboxOptions) -> Fixture {
    let stage = Stage::new().unwrap();
    let gate = Arc::new(Notify::new());
    let started = Arc::new(AtomicBool::new(false));
    let actor_gate = gate.clone();
    let actor_started = started.clone();
    let proxy = stage
        .actor_for(
            Definition::of("Gated", move || Gated {
                gate: actor_gate.clone(),
                started: actor_started.clone(),
                observed: Vec::new(),
            })
            .with_mailbox(options),
            None,
        )
        .unwrap();

    // Let before_start clear the queue so the block message cannot trip
    // the capacity limit.
    wait_for_flag(&started, "actor start").await;

    let entered = Arc::new(AtomicBool::new(false));
    let _ = proxy.block(entered.clone());
    wait_for_flag(&entered, "block entry").await;

    Fixture { stage, proxy, gate }
}

#[tokio::test]
async fn test_drop_oldest_keeps_the_newest_two() {
    let fixture = occupied_actor(MailboxOptions::bounded(2, OverflowPolicy::DropOldest)).await;

    let c1 = fixture.proxy.tag("m1");
    let c2 = fixture.proxy.tag("m2");
    let c3 = fixture.proxy.tag("m3");
    let c4 = fixture.proxy.tag("m4");

    // m3 displaced m1, m4 displaced m2; all four completions terminate.
    assert!(matches!(c1.await, Err(Error::MessageDropped { .. })));
    assert!(matches!(c2.await, Err(Error::MessageDropped { .. })));

    fixture.gate.notify_one();
    c3.await.unwrap();
    c4.await.unwrap();

    assert_eq!(fixture.proxy.observed().await.unwrap(), vec!["m3", "m4"]);

    let dropped: Vec<_> = fixture
        .stage
        .dead_letters()
        .recent()
        .into_iter()
        .filter(|dl| dl.reason == DeadLetterReason::Dropped)
        .collect();
    assert_eq!(dropped.len(), 2);

    fixture.stage.close().await;
}

#[tokio::test]
async fn test_drop_oldest_capacity_one_delivers_only_the_latest() {
    let fixture = occupied_actor(MailboxOptions::bounded(1, OverflowPolicy::DropOldest)).await;

    let c1 = fixture.proxy.tag("a");
    let c2 = fixture.proxy.tag("b");
    let c3 = fixture.proxy.tag("c");

    assert!(matches!(c1.await, Err(Error::MessageDropped { .. })));
    assert!(matches!(c2.await, Err(Error::MessageDropped { .. })));

    fixture.gate.notify_one();
    c3.await.unwrap();

    assert_eq!(fixture.proxy.observed().await.unwrap(), vec!["c"]);
    fixture.stage.close().await;
}

#[tokio::test]
async fn test_drop_newest_discards_the_incoming_message() {
    let fixture = occupied_actor(MailboxOptions::bounded(1, OverflowPolicy::DropNewest)).await;

    let c1 = fixture.proxy.tag("kept");
    let c2 = fixture.proxy.tag("discarded");

    assert!(matches!(c2.await, Err(Error::MessageDropped { .. })));

    fixture.gate.notify_one();
    c1.await.unwrap();

    assert_eq!(fixture.proxy.observed().await.unwrap(), vec!["kept"]);
    fixture.stage.close().await;
}

#[tokio::test]
async fn test_reject_fails_the_overflowing_caller() {
    let fixture = occupied_actor(MailboxOptions::bounded(1, OverflowPolicy::Reject)).await;

    let c1 = fixture.proxy.tag("fits");
    let c2 = fixture.proxy.tag("overflow");

    match c2.await {
        Err(Error::MailboxFull { capacity, .. }) => assert_eq!(capacity, 1),
        other => panic!("expected mailbox full, got {:?}", other.map(|_| ())),
    }

    fixture.gate.notify_one();
    c1.await.unwrap();

    assert_eq!(fixture.proxy.observed().await.unwrap(), vec!["fits"]);
    fixture.stage.close().await;
}

#[derive(Default)]
struct CollectingListener {
    records: Mutex<Vec<DeadLetter>>,
}

impl DeadLetterListener for CollectingListener {
    fn on_dead_letter(&self, dead_letter: &DeadLetter) {
        self.records.lock().unwrap().push(dead_letter.clone());
    }
}

#[tokio::test]
async fn test_every_undelivered_send_produces_exactly_one_record() {
    let fixture = occupied_actor(MailboxOptions::bounded(1, OverflowPolicy::Reject)).await;

    let listener = Arc::new(CollectingListener::default());
    fixture.stage.dead_letters().subscribe(listener.clone());

    let c1 = fixture.proxy.tag("fits");
    let c2 = fixture.proxy.tag("refused-1");
    let c3 = fixture.proxy.tag("refused-2");
    c2.await.unwrap_err();
    c3.await.unwrap_err();

    fixture.gate.notify_one();
    c1.await.unwrap();

    let records = listener.records.lock().unwrap().clone();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|dl| dl.reason == DeadLetterReason::MailboxFull));
    assert_eq!(records[0].descriptor, "Gated::tag");

    fixture.stage.close().await;
}
