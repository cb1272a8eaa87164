//! troupe Core
//!
//! Core types, errors, and supervision policy for the troupe in-process
//! actor runtime.
//!
//! # Overview
//!
//! This crate holds the primitives the runtime is built from:
//! - Stage-unique actor [`Address`]es with pluggable sources
//! - One-shot [`Completion`]s resolved when an actor processes a message
//! - The [`Supervisor`] decision interface with restart-intensity
//!   accounting
//! - The [`Clock`] abstraction keeping timed behavior testable
//! - Explicit limits, configuration, and error types

pub mod address;
pub mod clock;
pub mod completion;
pub mod config;
pub mod constants;
pub mod error;
pub mod execution_context;
pub mod logger;
pub mod supervision;

pub use address::{Address, AddressSource, SequenceAddressSource, Uuid7AddressSource};
pub use clock::{Clock, ManualClock, WallClock};
pub use completion::{Completion, Resolver};
pub use config::{DeadLettersConfig, DirectoryConfig, StageConfig};
pub use constants::*;
pub use error::{Error, Result};
pub use execution_context::ExecutionContext;
pub use logger::Logger;
pub use supervision::{
    DefaultSupervisor, Directive, RestartHistory, SupervisedRef, SupervisionScope,
    SupervisionStrategy, Supervisor,
};
