//! troupe Runtime
//!
//! In-process actor runtime: mailbox-driven dispatch, hierarchical
//! supervision, timed scheduling, a sharded address directory, and a
//! dead-letter sink.
//!
//! # Overview
//!
//! A [`Stage`] hosts many actors. Each actor owns private state mutated
//! only by messages drawn from its mailbox; callers hold typed
//! [`Proxy`] handles whose calls enqueue closures and return
//! completions. Failures are routed to the owning cell's supervisor,
//! which resumes, restarts, stops, or escalates — never tearing down
//! unrelated actors.
//!
//! ```no_run
//! use troupe_core::completion::Completion;
//! use troupe_runtime::{Actor, Definition, Environment, Proxy, Stage};
//!
//! struct Counter { count: u64 }
//!
//! #[async_trait::async_trait]
//! impl Actor for Counter {}
//!
//! trait CounterProtocol {
//!     fn increment(&self) -> Completion<()>;
//!     fn value(&self) -> Completion<u64>;
//! }
//!
//! impl CounterProtocol for Proxy<Counter> {
//!     fn increment(&self) -> Completion<()> {
//!         self.ask("Counter::increment", |actor: &mut Counter, _env: &mut Environment| {
//!             Box::pin(async move {
//!                 actor.count += 1;
//!                 Ok(())
//!             })
//!         })
//!     }
//!
//!     fn value(&self) -> Completion<u64> {
//!         self.ask("Counter::value", |actor: &mut Counter, _env: &mut Environment| {
//!             Box::pin(async move { Ok(actor.count) })
//!         })
//!     }
//! }
//!
//! # async fn demo() -> troupe_core::error::Result<()> {
//! let stage = Stage::new()?;
//! let counter = stage.actor_for(Definition::of("Counter", || Counter { count: 0 }), None)?;
//! counter.increment().await?;
//! assert_eq!(counter.value().await?, 1);
//! stage.close().await;
//! # Ok(())
//! # }
//! ```

mod actor;
mod cell;
mod dead_letters;
mod definition;
mod directory;
mod environment;
mod guardian;
mod mailbox;
mod message;
mod proxy;
mod scheduler;
mod stage;

#[cfg(test)]
mod test_support;

pub use actor::Actor;
pub use cell::LifecycleState;
pub use dead_letters::{DeadLetter, DeadLetterListener, DeadLetterReason, DeadLetters};
pub use definition::Definition;
pub use directory::DirectoryStats;
pub use environment::Environment;
pub use guardian::{PRIVATE_ROOT_ADDRESS, PUBLIC_ROOT_ADDRESS};
pub use mailbox::{MailboxOptions, OverflowPolicy};
pub use proxy::Proxy;
pub use scheduler::{Cancellable, ScheduledAction, Scheduler};
pub use stage::{Stage, StageBuilder};
