//! The group registry: modules keyed by name, groups keyed by identifier.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::Mutex;

// Layer 3: Internal module imports
use super::local::Group;
use crate::system::{SpawnOptions, SystemCore};

/// Group lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    /// Unknown module name.
    #[error("no such group module: {0}")]
    NoSuchModule(String),

    /// The module has been stopped.
    #[error("group module stopped")]
    Stopped,
}

/// A family of groups sharing a lookup scheme.
pub trait GroupModule: Send + Sync {
    /// The module's registry key, e.g. `"local"`.
    fn name(&self) -> &str;

    /// Get or create the group with this identifier.
    fn get(&self, identifier: &str) -> Result<Group, GroupError>;

    /// Stop every group in the module.
    fn stop(&self);
}

/// Module of in-process groups, each backed by a hidden intermediary actor.
pub struct LocalGroupModule {
    system: Weak<SystemCore>,
    instances: Mutex<Option<HashMap<String, Group>>>,
}

impl LocalGroupModule {
    fn new(system: Weak<SystemCore>) -> Self {
        Self {
            system,
            instances: Mutex::new(Some(HashMap::new())),
        }
    }
}

impl GroupModule for LocalGroupModule {
    fn name(&self) -> &str {
        "local"
    }

    fn get(&self, identifier: &str) -> Result<Group, GroupError> {
        let mut guard = self.instances.lock();
        let instances = guard.as_mut().ok_or(GroupError::Stopped)?;
        if let Some(group) = instances.get(identifier) {
            return Ok(group.clone());
        }
        let sys = self.system.upgrade().ok_or(GroupError::Stopped)?;
        let group = Group::new("local", identifier, sys.node(), self.system.clone());
        let behavior_group = group.clone();
        let intermediary = sys
            .spawn_event(
                SpawnOptions::default().hidden(),
                move |_ctx| behavior_group.intermediary_behavior(),
            )
            .map_err(|_| GroupError::Stopped)?;
        group.install_intermediary(intermediary);
        instances.insert(identifier.to_string(), group.clone());
        Ok(group)
    }

    fn stop(&self) {
        let drained = self.instances.lock().take();
        if let Some(instances) = drained {
            for group in instances.values() {
                group.stop();
            }
        }
    }
}

/// Owns all group modules for the lifetime of the actor system.
pub struct GroupRegistry {
    modules: DashMap<String, Arc<dyn GroupModule>>,
}

impl GroupRegistry {
    pub(crate) fn new(system: Weak<SystemCore>) -> Self {
        let registry = Self {
            modules: DashMap::new(),
        };
        registry.register(Arc::new(LocalGroupModule::new(system)));
        registry
    }

    /// Register a module under its name.
    pub fn register(&self, module: Arc<dyn GroupModule>) {
        self.modules.insert(module.name().to_string(), module);
    }

    /// Look up `identifier` in the named module.
    pub fn get(&self, module: &str, identifier: &str) -> Result<Group, GroupError> {
        match self.modules.get(module) {
            Some(entry) => entry.get(identifier),
            None => Err(GroupError::NoSuchModule(module.to_string())),
        }
    }

    /// Look up a group in the `local` module.
    pub fn get_local(&self, identifier: &str) -> Result<Group, GroupError> {
        self.get("local", identifier)
    }

    /// Stop every module.
    pub(crate) fn stop_all(&self) {
        for entry in self.modules.iter() {
            entry.value().stop();
        }
    }
}
