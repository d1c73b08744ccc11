//! The actor system: owner of scheduler, clock, groups and registries.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};

// Layer 3: Internal module imports
use super::builder::{SpawnBuilder, SpawnOptions};
use super::config::SystemConfig;
use super::errors::{SpawnError, SystemError};
use crate::actor::blocking::{blocking_main, BlockingBody, BlockingContext, ScopedActor};
use crate::actor::control::{ActorKind, ControlBlock};
use crate::actor::event::EventActor;
use crate::actor::{ActorHandle, Address, Behavior, Context, ExitMsg, ExitReason};
use crate::clock::Clock;
use crate::group::GroupRegistry;
use crate::message::{Envelope, Payload};
use crate::monitoring::{Monitor, NoopMonitor, RuntimeEvent};
use crate::scheduler::SchedulerPool;
use crate::util::{ActorId, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SystemState {
    Running,
    ShuttingDown,
    Stopped,
}

pub(crate) struct SystemCore {
    self_weak: std::sync::Weak<SystemCore>,
    pub(crate) config: SystemConfig,
    node: NodeId,
    pub(crate) scheduler: SchedulerPool,
    pub(crate) clock: Clock,
    pub(crate) monitor: Arc<dyn Monitor>,
    groups: GroupRegistry,
    actors: DashMap<u64, Arc<ControlBlock>>,
    names: DashMap<String, Address>,
    next_actor_id: AtomicU64,
    visible_live: Mutex<usize>,
    live_cv: Condvar,
    state: Mutex<SystemState>,
    blocking_threads: Mutex<Vec<JoinHandle<()>>>,
}

impl SystemCore {
    pub(crate) fn node(&self) -> NodeId {
        self.node
    }

    fn is_running(&self) -> bool {
        *self.state.lock() == SystemState::Running
    }

    fn allocate_id(&self) -> ActorId {
        ActorId::from_raw(self.next_actor_id.fetch_add(1, Ordering::AcqRel))
    }

    fn register(
        &self,
        options: &SpawnOptions,
        ctrl: &Arc<ControlBlock>,
    ) -> Result<(), SpawnError> {
        if let Some(name) = &options.name {
            let taken = self
                .names
                .entry(name.clone())
                .or_insert_with(|| ctrl.address());
            if *taken != ctrl.address() {
                return Err(SpawnError::NameTaken(name.clone()));
            }
        }
        self.actors.insert(ctrl.id().as_u64(), Arc::clone(ctrl));
        if !options.hidden {
            *self.visible_live.lock() += 1;
        }
        self.monitor.record(&RuntimeEvent::ActorSpawned {
            address: ctrl.address(),
            hidden: options.hidden,
        });
        Ok(())
    }

    fn apply_spawn_edges(&self, options: &SpawnOptions, ctrl: &Arc<ControlBlock>) {
        ctrl.set_trap_exit(options.trap_exit);
        for peer in &options.links {
            ctrl.link_to(peer.block());
        }
        for watcher in &options.observers {
            ctrl.add_monitor(watcher.clone());
        }
    }

    /// Spawn an event-based actor: allocate the control block, bind the
    /// behavior factory, wire initial links/monitors, and schedule the
    /// launch resumption.
    pub(crate) fn spawn_event<F>(
        &self,
        options: SpawnOptions,
        factory: F,
    ) -> Result<ActorHandle, SpawnError>
    where
        F: FnOnce(&mut Context) -> Behavior + Send + 'static,
    {
        if !self.is_running() {
            return Err(SpawnError::ShuttingDown);
        }
        let ctrl = ControlBlock::new(
            self.node,
            self.allocate_id(),
            ActorKind::Event,
            options.hidden,
            options.protocol,
            options.mailbox_cap.unwrap_or(self.config.mailbox_cap),
            options.name.clone(),
            self.self_weak.clone(),
        );
        self.register(&options, &ctrl)?;
        let actor = EventActor::new(Arc::clone(&ctrl), Box::new(factory));
        ctrl.install_body(actor);
        self.apply_spawn_edges(&options, &ctrl);
        // Launch resumption: the factory runs even before the first message.
        ctrl.try_schedule();
        Ok(ActorHandle::from_block(ctrl))
    }

    /// Spawn a blocking actor on a dedicated OS thread.
    pub(crate) fn spawn_blocking(
        &self,
        options: SpawnOptions,
        body: BlockingBody,
    ) -> Result<ActorHandle, SpawnError> {
        if !self.is_running() {
            return Err(SpawnError::ShuttingDown);
        }
        let ctrl = ControlBlock::new(
            self.node,
            self.allocate_id(),
            ActorKind::Blocking,
            options.hidden,
            options.protocol,
            options.mailbox_cap.unwrap_or(self.config.mailbox_cap),
            options.name.clone(),
            self.self_weak.clone(),
        );
        self.register(&options, &ctrl)?;
        self.apply_spawn_edges(&options, &ctrl);

        let thread_ctrl = Arc::clone(&ctrl);
        let spawned = std::thread::Builder::new()
            .name(format!("skein-blocking-{}", ctrl.id()))
            .spawn(move || blocking_main(thread_ctrl, body));
        match spawned {
            Ok(handle) => {
                self.blocking_threads.lock().push(handle);
                Ok(ActorHandle::from_block(ctrl))
            }
            Err(_) => {
                ctrl.trigger_exit(ExitReason::error(
                    crate::error::ErrorCode::RuntimeError,
                    "failed to spawn blocking actor thread",
                ));
                Err(SpawnError::ShuttingDown)
            }
        }
    }

    /// Create a scoped blocking actor bound to the caller's thread.
    pub(crate) fn scoped(&self) -> ScopedActor {
        let ctrl = ControlBlock::new(
            self.node,
            self.allocate_id(),
            ActorKind::Blocking,
            true,
            None,
            self.config.mailbox_cap,
            None,
            self.self_weak.clone(),
        );
        self.actors.insert(ctrl.id().as_u64(), Arc::clone(&ctrl));
        self.monitor.record(&RuntimeEvent::ActorSpawned {
            address: ctrl.address(),
            hidden: true,
        });
        ScopedActor::new(ctrl)
    }

    /// Termination callback from the control block.
    pub(crate) fn on_actor_terminated(&self, ctrl: &ControlBlock, reason: &ExitReason) {
        self.actors.remove(&ctrl.id().as_u64());
        if let Some(name) = ctrl.name() {
            self.names.remove_if(&name, |_, addr| *addr == ctrl.address());
        }
        if !ctrl.is_hidden() {
            let mut live = self.visible_live.lock();
            *live = live.saturating_sub(1);
            if *live == 0 {
                self.live_cv.notify_all();
            }
        }
        self.monitor.record(&RuntimeEvent::ActorTerminated {
            address: ctrl.address(),
            reason: reason.clone(),
        });
    }

    pub(crate) fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    fn resolve_name(&self, name: &str) -> Option<ActorHandle> {
        self.names.get(name)?.value().upgrade()
    }

    fn await_all_actors_done(&self) {
        let mut live = self.visible_live.lock();
        while *live > 0 {
            self.live_cv.wait(&mut live);
        }
    }

    fn shutdown(&self) -> Result<(), SystemError> {
        {
            let mut state = self.state.lock();
            if *state != SystemState::Running {
                return Err(SystemError::ShuttingDown);
            }
            *state = SystemState::ShuttingDown;
        }

        // Groups first: their intermediaries exit with user_shutdown.
        self.groups.stop_all();

        // Tell every remaining actor to leave.
        let targets: Vec<Arc<ControlBlock>> = self
            .actors
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for ctrl in targets {
            let _ = ctrl.enqueue_envelope(
                Envelope::new(Payload::from_tuple((ExitMsg {
                    source: Address::invalid(),
                    reason: ExitReason::UserShutdown,
                },)))
                .urgent(),
            );
        }

        let deadline = Instant::now() + self.config.shutdown_grace;
        while !self.actors.is_empty() && Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let timed_out = !self.actors.is_empty();

        // Dispose timers, then stop the workers.
        self.clock.stop();
        self.scheduler.shutdown();

        if !timed_out {
            let handles: Vec<JoinHandle<()>> = self.blocking_threads.lock().drain(..).collect();
            for handle in handles {
                let _ = handle.join();
            }
        }

        *self.state.lock() = SystemState::Stopped;
        self.monitor.record(&RuntimeEvent::SystemShutdown);

        if timed_out {
            Err(SystemError::ShutdownTimeout(self.config.shutdown_grace))
        } else {
            Ok(())
        }
    }
}

/// The actor system.
///
/// Owns the scheduler, the timer service, the group registry and the name
/// registry. Cloning is cheap and shares the same system.
///
/// # Examples
///
/// ```rust
/// use skein_rt::prelude::*;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// struct Hello;
///
/// let system = ActorSystem::new(SystemConfig::default()).unwrap();
/// let greeter = system
///     .spawn(|_| Behavior::new().on(|_, (_,): (Hello,)| ()))
///     .unwrap();
/// greeter.send(payload!(Hello)).unwrap();
/// system.shutdown().unwrap();
/// ```
pub struct ActorSystem {
    core: Arc<SystemCore>,
}

impl ActorSystem {
    /// Start a system with the default monitor.
    pub fn new(config: SystemConfig) -> Result<Self, SystemError> {
        Self::with_monitor(config, Arc::new(NoopMonitor))
    }

    /// Start a system reporting events to `monitor`.
    pub fn with_monitor(
        config: SystemConfig,
        monitor: Arc<dyn Monitor>,
    ) -> Result<Self, SystemError> {
        config.validate().map_err(SystemError::ConfigError)?;
        let node = NodeId::local();
        let core = Arc::new_cyclic(|weak| SystemCore {
            self_weak: weak.clone(),
            scheduler: SchedulerPool::start(config.workers, config.throughput, config.policy),
            clock: Clock::start(config.clock_cleanup_interval),
            monitor: Arc::clone(&monitor),
            groups: GroupRegistry::new(weak.clone()),
            actors: DashMap::new(),
            names: DashMap::new(),
            next_actor_id: AtomicU64::new(1),
            visible_live: Mutex::new(0),
            live_cv: Condvar::new(),
            state: Mutex::new(SystemState::Running),
            blocking_threads: Mutex::new(Vec::new()),
            node,
            config,
        });
        monitor.record(&RuntimeEvent::SystemStarted {
            workers: core.scheduler.workers(),
        });
        Ok(Self { core })
    }

    pub(crate) fn from_core(core: Arc<SystemCore>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Arc<SystemCore> {
        &self.core
    }

    /// The local node id.
    pub fn node(&self) -> NodeId {
        self.core.node
    }

    /// The configuration the system started with.
    pub fn config(&self) -> &SystemConfig {
        &self.core.config
    }

    /// Spawn an event-based actor with default options.
    pub fn spawn<F>(&self, factory: F) -> Result<ActorHandle, SpawnError>
    where
        F: FnOnce(&mut Context) -> Behavior + Send + 'static,
    {
        self.core.spawn_event(SpawnOptions::default(), factory)
    }

    /// Spawn a blocking actor on its own thread with default options.
    pub fn spawn_blocking<F>(&self, body: F) -> Result<ActorHandle, SpawnError>
    where
        F: FnOnce(&mut BlockingContext) + Send + 'static,
    {
        self.core
            .spawn_blocking(SpawnOptions::default(), Box::new(body))
    }

    /// Start a fluent spawn with options.
    pub fn spawn_with(&self) -> SpawnBuilder<'_> {
        SpawnBuilder::new(self)
    }

    /// A scoped blocking actor on the caller's thread, for synchronous
    /// drivers; terminates when dropped.
    pub fn scoped(&self) -> ScopedActor {
        self.core.scoped()
    }

    /// Anonymous asynchronous send.
    pub fn send(
        &self,
        target: &ActorHandle,
        payload: Payload,
    ) -> Result<(), crate::actor::SendError> {
        target.send(payload)
    }

    /// Establish a symmetric link between two actors.
    pub fn link(&self, a: &ActorHandle, b: &ActorHandle) {
        a.block().link_to(b.block());
    }

    /// Remove a link in both directions.
    pub fn unlink(&self, a: &ActorHandle, b: &ActorHandle) {
        a.block().unlink_from(b.block());
    }

    /// The group registry.
    pub fn groups(&self) -> &GroupRegistry {
        self.core.groups()
    }

    /// Look up an actor registered under `name`.
    pub fn resolve(&self, name: &str) -> Option<ActorHandle> {
        self.core.resolve_name(name)
    }

    /// Number of live actors, hidden ones included.
    pub fn actor_count(&self) -> usize {
        self.core.actors.len()
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        !self.core.is_running()
    }

    /// Block until every non-hidden actor has terminated.
    pub fn await_all_actors_done(&self) {
        self.core.await_all_actors_done();
    }

    /// Graceful shutdown: stop groups, deliver `user_shutdown` exits, wait
    /// up to the configured grace period, then stop the clock and join the
    /// worker pool.
    pub fn shutdown(&self) -> Result<(), SystemError> {
        self.core.shutdown()
    }
}

impl Clone for ActorSystem {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::payload;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    struct Ping;

    fn small_system() -> ActorSystem {
        let config = SystemConfig::builder()
            .with_workers(2)
            .with_shutdown_grace(Duration::from_secs(2))
            .build()
            .unwrap();
        ActorSystem::new(config).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SystemConfig {
            workers: 0,
            ..SystemConfig::default()
        };
        match ActorSystem::new(config) {
            Err(SystemError::ConfigError(msg)) => assert!(msg.contains("workers")),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn test_spawn_and_count() {
        let system = small_system();
        let handle = system
            .spawn(|_| Behavior::new().on(|_, (_,): (Ping,)| ()))
            .unwrap();
        assert_eq!(handle.node(), system.node());
        assert!(system.actor_count() >= 1);
        system.shutdown().unwrap();
    }

    #[test]
    fn test_named_spawn_and_resolution() {
        let system = small_system();
        let handle = system
            .spawn_with()
            .named("registrar")
            .spawn(|_| Behavior::new().on(|_, (_,): (Ping,)| ()))
            .unwrap();
        let resolved = system.resolve("registrar").unwrap();
        assert_eq!(resolved, handle);
        assert_eq!(resolved.name().as_deref(), Some("registrar"));

        let dup = system
            .spawn_with()
            .named("registrar")
            .spawn(|_| Behavior::new());
        assert!(matches!(dup, Err(SpawnError::NameTaken(_))));
        system.shutdown().unwrap();
    }

    #[test]
    fn test_actor_ids_are_monotonic() {
        let system = small_system();
        let a = system.spawn(|_| Behavior::new().on(|_, (_,): (Ping,)| ())).unwrap();
        let b = system.spawn(|_| Behavior::new().on(|_, (_,): (Ping,)| ())).unwrap();
        assert!(b.id() > a.id());
        system.shutdown().unwrap();
    }

    #[test]
    fn test_await_all_actors_done() {
        let system = small_system();
        let handle = system
            .spawn(|_| {
                Behavior::new().on(|ctx, (_,): (Ping,)| {
                    ctx.quit(ExitReason::Normal);
                })
            })
            .unwrap();
        handle.send(payload!(Ping)).unwrap();
        system.await_all_actors_done();
        assert!(handle.is_terminated());
        system.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_twice_errors() {
        let system = small_system();
        system.shutdown().unwrap();
        assert!(matches!(
            system.shutdown(),
            Err(SystemError::ShuttingDown)
        ));
        assert!(system.is_shutting_down());
    }

    #[test]
    fn test_spawn_after_shutdown_rejected() {
        let system = small_system();
        system.shutdown().unwrap();
        assert!(matches!(
            system.spawn(|_| Behavior::new()),
            Err(SpawnError::ShuttingDown)
        ));
    }

    #[test]
    fn test_name_released_after_termination() {
        let system = small_system();
        let handle = system
            .spawn_with()
            .named("transient")
            .spawn(|_| {
                Behavior::new().on(|ctx, (_,): (Ping,)| {
                    ctx.quit(ExitReason::Normal);
                })
            })
            .unwrap();
        handle.send(payload!(Ping)).unwrap();
        system.await_all_actors_done();
        assert!(system.resolve("transient").is_none());
        system.shutdown().unwrap();
    }
}
