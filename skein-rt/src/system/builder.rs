//! Spawn options and the fluent spawn builder.

// Layer 1: Standard library imports
use std::any::TypeId;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::actor_system::ActorSystem;
use super::errors::SpawnError;
use crate::actor::blocking::BlockingContext;
use crate::actor::{ActorHandle, Address, Behavior, Context, Protocol, TypedHandle};

/// Options applied when an actor is spawned.
#[derive(Default)]
pub struct SpawnOptions {
    pub(crate) name: Option<String>,
    pub(crate) hidden: bool,
    pub(crate) mailbox_cap: Option<usize>,
    pub(crate) links: Vec<ActorHandle>,
    pub(crate) observers: Vec<Address>,
    pub(crate) trap_exit: bool,
    pub(crate) protocol: Option<TypeId>,
}

impl SpawnOptions {
    /// Fresh defaults: anonymous, visible, system-wide mailbox cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the actor under a unique name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the actor hidden: it is excluded from
    /// [`await_all_actors_done`](ActorSystem::await_all_actors_done)
    /// accounting.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Override the mailbox cap for this actor (0 = unbounded).
    pub fn with_mailbox_cap(mut self, cap: usize) -> Self {
        self.mailbox_cap = Some(cap);
        self
    }

    /// Link the new actor to `other` before it processes any message.
    pub fn linked_to(mut self, other: &ActorHandle) -> Self {
        self.links.push(other.clone());
        self
    }

    /// Have `watcher` monitor the new actor from the start.
    pub fn monitored_by(mut self, watcher: Address) -> Self {
        self.observers.push(watcher);
        self
    }

    /// Start with the trap-exit flag set.
    pub fn trapping_exits(mut self) -> Self {
        self.trap_exit = true;
        self
    }
}

/// Fluent builder returned by [`ActorSystem::spawn_with`].
pub struct SpawnBuilder<'a> {
    system: &'a ActorSystem,
    options: SpawnOptions,
}

impl<'a> SpawnBuilder<'a> {
    pub(crate) fn new(system: &'a ActorSystem) -> Self {
        Self {
            system,
            options: SpawnOptions::default(),
        }
    }

    /// Register the actor under a unique name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.options = self.options.named(name);
        self
    }

    /// Mark the actor hidden.
    pub fn hidden(mut self) -> Self {
        self.options = self.options.hidden();
        self
    }

    /// Override the mailbox cap for this actor (0 = unbounded).
    pub fn with_mailbox_cap(mut self, cap: usize) -> Self {
        self.options = self.options.with_mailbox_cap(cap);
        self
    }

    /// Link the new actor to `other` before it processes any message.
    pub fn linked_to(mut self, other: &ActorHandle) -> Self {
        self.options = self.options.linked_to(other);
        self
    }

    /// Have `watcher` monitor the new actor from the start.
    pub fn monitored_by(mut self, watcher: Address) -> Self {
        self.options = self.options.monitored_by(watcher);
        self
    }

    /// Start with the trap-exit flag set.
    pub fn trapping_exits(mut self) -> Self {
        self.options = self.options.trapping_exits();
        self
    }

    /// Spawn an event-based actor from a behavior factory.
    pub fn spawn<F>(self, factory: F) -> Result<ActorHandle, SpawnError>
    where
        F: FnOnce(&mut Context) -> Behavior + Send + 'static,
    {
        self.system.core().spawn_event(self.options, factory)
    }

    /// Spawn an event-based actor carrying protocol `P`'s runtime token,
    /// enabling checked casts back to [`TypedHandle`].
    pub fn spawn_typed<P, F>(mut self, factory: F) -> Result<TypedHandle<P>, SpawnError>
    where
        P: Protocol,
        F: FnOnce(&mut Context) -> Behavior + Send + 'static,
    {
        self.options.protocol = Some(TypeId::of::<P>());
        let handle = self.system.core().spawn_event(self.options, factory)?;
        match handle.downcast::<P>() {
            Ok(typed) => Ok(typed),
            // The token was recorded two lines up.
            Err(_) => unreachable!(),
        }
    }

    /// Spawn a blocking actor on its own OS thread.
    pub fn spawn_blocking<F>(self, body: F) -> Result<ActorHandle, SpawnError>
    where
        F: FnOnce(&mut BlockingContext) + Send + 'static,
    {
        self.system.core().spawn_blocking(self.options, Box::new(body))
    }
}
