//! Plugin registry: tracks the plugins bound to one host.
//!
//! Registration is idempotent per instance and initializes the plugin exactly
//! once. Destroy notifies plugins in registration order, so a composite is
//! torn down before the children it registered during its own init.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use stateforge_core::PluginError;

use crate::lifecycle::{Plugin, PluginId, PluginSupport};

#[derive(Default)]
struct Entries {
    order: Vec<Arc<dyn Plugin>>,
    ids: HashSet<PluginId>,
    destroyed: bool,
}

#[derive(Default)]
pub struct PluginRegistry {
    entries: Mutex<Entries>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register and initialize `plugin`.
    ///
    /// Returns `Ok(false)` if this instance is already registered. The lock is
    /// released before init runs, so composites may register children from
    /// their own `notify_init`.
    pub fn register(
        &self,
        plugin: Arc<dyn Plugin>,
        support: Arc<dyn PluginSupport>,
    ) -> Result<bool, PluginError> {
        let id = plugin.id();
        {
            let mut entries = self.entries();
            if entries.destroyed {
                return Err(PluginError::HostDestroyed {
                    plugin: plugin.name().to_string(),
                });
            }
            if !entries.ids.insert(id) {
                debug!(plugin = %plugin.name(), id = %id, "Plugin already registered");
                return Ok(false);
            }
            entries.order.push(plugin.clone());
        }

        if let Err(e) = plugin.notify_init(support) {
            let mut entries = self.entries();
            entries.ids.remove(&id);
            entries.order.retain(|p| p.id() != id);
            return Err(e);
        }
        info!(plugin = %plugin.name(), id = %id, "Plugin registered");
        Ok(true)
    }

    pub fn contains(&self, id: PluginId) -> bool {
        self.entries().ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.entries().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every plugin of destroy and clear the registry. Later
    /// registrations fail with [`PluginError::HostDestroyed`].
    pub fn destroy_all(&self) {
        let plugins = {
            let mut entries = self.entries();
            entries.destroyed = true;
            entries.ids.clear();
            std::mem::take(&mut entries.order)
        };
        for plugin in &plugins {
            debug!(plugin = %plugin.name(), id = %plugin.id(), "Destroying plugin");
            plugin.notify_destroy();
        }
        if !plugins.is_empty() {
            info!(count = plugins.len(), "Plugins destroyed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::PluginCore;
    use stateforge_core::TaskScope;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::watch;

    struct CountingPlugin {
        core: PluginCore,
        inits: AtomicUsize,
        destroys: AtomicUsize,
    }

    impl CountingPlugin {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                core: PluginCore::new("counting"),
                inits: AtomicUsize::new(0),
                destroys: AtomicUsize::new(0),
            })
        }
    }

    impl Plugin for CountingPlugin {
        fn id(&self) -> PluginId {
            self.core.id()
        }

        fn name(&self) -> &str {
            self.core.name()
        }

        fn notify_init(&self, support: Arc<dyn PluginSupport>) -> Result<(), PluginError> {
            self.core.init(support)?;
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn notify_destroy(&self) {
            self.destroys.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct StaticSupport;

    impl PluginSupport for StaticSupport {
        fn is_destroyed(&self) -> bool {
            false
        }

        fn is_active(&self) -> bool {
            true
        }

        fn active_signal(&self) -> watch::Receiver<bool> {
            watch::channel(true).1
        }

        fn scope(&self) -> TaskScope {
            TaskScope::new()
        }

        fn register_plugin(&self, _plugin: Arc<dyn Plugin>) -> Result<bool, PluginError> {
            Ok(false)
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = PluginRegistry::new();
        let plugin = CountingPlugin::new();

        assert_eq!(registry.register(plugin.clone(), Arc::new(StaticSupport)), Ok(true));
        assert_eq!(registry.register(plugin.clone(), Arc::new(StaticSupport)), Ok(false));
        assert_eq!(plugin.inits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(plugin.id()));
    }

    #[test]
    fn test_second_registry_fails_on_double_init() {
        let plugin = CountingPlugin::new();
        let first = PluginRegistry::new();
        let second = PluginRegistry::new();

        first.register(plugin.clone(), Arc::new(StaticSupport)).unwrap();
        let err = second
            .register(plugin.clone(), Arc::new(StaticSupport))
            .unwrap_err();
        assert_eq!(
            err,
            PluginError::AlreadyInitialized {
                plugin: "counting".into()
            }
        );
        assert!(second.is_empty());
    }

    #[test]
    fn test_destroy_all_notifies_and_locks_registry() {
        let registry = PluginRegistry::new();
        let a = CountingPlugin::new();
        let b = CountingPlugin::new();
        registry.register(a.clone(), Arc::new(StaticSupport)).unwrap();
        registry.register(b.clone(), Arc::new(StaticSupport)).unwrap();

        registry.destroy_all();
        assert_eq!(a.destroys.load(Ordering::SeqCst), 1);
        assert_eq!(b.destroys.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());

        let late = CountingPlugin::new();
        assert!(matches!(
            registry.register(late.clone(), Arc::new(StaticSupport)),
            Err(PluginError::HostDestroyed { .. })
        ));
        assert_eq!(late.inits.load(Ordering::SeqCst), 0);
    }
}
