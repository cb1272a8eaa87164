//! Actor definitions
//!
//! A definition bundles everything needed to construct one actor: a type
//! label for diagnostics, an instantiator closure capturing the
//! construction parameters, the mailbox configuration, and optionally a
//! fixed address. The instantiator is kept by the cell so a restart can
//! rebuild the instance from scratch.

use std::sync::Arc;

use troupe_core::address::Address;
use troupe_core::error::Result;

use crate::actor::Actor;
use crate::mailbox::MailboxOptions;

/// Recipe for constructing one actor
pub struct Definition<A: Actor> {
    type_name: &'static str,
    instantiator: Arc<dyn Fn() -> Result<A> + Send + Sync>,
    mailbox: MailboxOptions,
    address: Option<Address>,
}

impl<A: Actor> Clone for Definition<A> {
    fn clone(&self) -> Self {
        Self {
            type_name: self.type_name,
            instantiator: self.instantiator.clone(),
            mailbox: self.mailbox,
            address: self.address.clone(),
        }
    }
}

impl<A: Actor> Definition<A> {
    /// Define an actor built by an infallible constructor
    pub fn of(
        type_name: &'static str,
        instantiator: impl Fn() -> A + Send + Sync + 'static,
    ) -> Self {
        Self {
            type_name,
            instantiator: Arc::new(move || Ok(instantiator())),
            mailbox: MailboxOptions::default(),
            address: None,
        }
    }

    /// Define an actor built by a fallible constructor
    pub fn try_of(
        type_name: &'static str,
        instantiator: impl Fn() -> Result<A> + Send + Sync + 'static,
    ) -> Self {
        Self {
            type_name,
            instantiator: Arc::new(instantiator),
            mailbox: MailboxOptions::default(),
            address: None,
        }
    }

    /// Choose the mailbox kind and limits
    pub fn with_mailbox(mut self, mailbox: MailboxOptions) -> Self {
        self.mailbox = mailbox;
        self
    }

    /// Pin the actor to a caller-chosen address
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// The type label used in diagnostics
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The configured mailbox options
    pub fn mailbox_options(&self) -> MailboxOptions {
        self.mailbox
    }

    pub(crate) fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// Build a fresh instance
    pub(crate) fn instantiate(&self) -> Result<A> {
        (self.instantiator)()
    }
}
