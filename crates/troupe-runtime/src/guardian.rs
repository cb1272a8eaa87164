//! Root guardians
//!
//! Two system cells sit at the top of every stage: the public root is the
//! default parent of user actors; the private root parents system
//! services. Both carry an unlimited restart strategy and answer every
//! escalation with a restart, so no user failure can climb out of the
//! tree.

use async_trait::async_trait;
use tracing::debug;

use troupe_core::error::Result;
use troupe_core::supervision::{
    Directive, SupervisedRef, SupervisionStrategy, Supervisor,
};

use crate::actor::Actor;
use crate::environment::Environment;

/// Address of the public root guardian
pub const PUBLIC_ROOT_ADDRESS: &str = "public-root";

/// Address of the private root guardian
pub const PRIVATE_ROOT_ADDRESS: &str = "private-root";

/// Default parent of user actors
pub(crate) struct PublicRoot;

#[async_trait]
impl Actor for PublicRoot {
    async fn before_start(&mut self, env: &mut Environment) -> Result<()> {
        debug!(address = %env.address(), "public root guardian started");
        Ok(())
    }
}

/// Parent of system services
pub(crate) struct PrivateRoot;

#[async_trait]
impl Actor for PrivateRoot {
    async fn before_start(&mut self, env: &mut Environment) -> Result<()> {
        debug!(address = %env.address(), "private root guardian started");
        Ok(())
    }
}

/// Guardian policy: restart, whatever happened
pub(crate) struct GuardianSupervisor;

impl Supervisor for GuardianSupervisor {
    fn decide(
        &self,
        _error: &troupe_core::error::Error,
        _supervised: &SupervisedRef,
        _strategy: &SupervisionStrategy,
    ) -> Directive {
        Directive::Restart
    }
}
