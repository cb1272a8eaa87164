//! Shared fixtures for unit tests

use async_trait::async_trait;

use crate::actor::Actor;

/// Minimal actor with default hooks, for mailbox and directory tests
pub(crate) struct TestActor;

#[async_trait]
impl Actor for TestActor {}
