//! Plugin lifecycle: init and destroy notifications, and the capability set a
//! host hands to each plugin at init.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use stateforge_core::{PluginError, TaskScope};

/// Identity of a plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginId(Uuid);

impl PluginId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PluginId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capabilities a host grants to its plugins.
///
/// Passed explicitly at init; plugins read nothing ambient.
pub trait PluginSupport: Send + Sync {
    fn is_destroyed(&self) -> bool;

    /// Always false once destroyed.
    fn is_active(&self) -> bool;

    fn active_signal(&self) -> watch::Receiver<bool>;

    /// Scope that runs plugin work and is cancelled when the host is destroyed.
    fn scope(&self) -> TaskScope;

    /// Register a child plugin with the same host. Returns `false` if it was
    /// already registered.
    fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<bool, PluginError>;
}

/// A unit of host-bound behaviour.
pub trait Plugin: Send + Sync + 'static {
    fn id(&self) -> PluginId;

    fn name(&self) -> &str;

    /// Bind the plugin to its host. Fails on a second call.
    fn notify_init(&self, support: Arc<dyn PluginSupport>) -> Result<(), PluginError>;

    /// The host is going away; cancel outstanding work.
    fn notify_destroy(&self);
}

/// Per-plugin bookkeeping shared by every plugin in this crate.
pub struct PluginCore {
    id: PluginId,
    name: String,
    support: OnceLock<Arc<dyn PluginSupport>>,
}

impl PluginCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PluginId::new(),
            name: name.into(),
            support: OnceLock::new(),
        }
    }

    pub fn id(&self) -> PluginId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn init(&self, support: Arc<dyn PluginSupport>) -> Result<(), PluginError> {
        self.support
            .set(support)
            .map_err(|_| PluginError::AlreadyInitialized {
                plugin: self.name.clone(),
            })?;
        debug!(plugin = %self.name, id = %self.id, "Plugin initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.support.get().is_some()
    }

    pub fn support(&self) -> Result<&Arc<dyn PluginSupport>, PluginError> {
        self.support.get().ok_or_else(|| PluginError::NotInitialized {
            plugin: self.name.clone(),
        })
    }

    /// Register `child` with this plugin's host.
    pub fn register_child(&self, child: Arc<dyn Plugin>) -> Result<bool, PluginError> {
        self.check_child(&child)?;
        self.support()?.register_plugin(child)
    }

    /// Init for a composite: register `children` with the host first and bind
    /// this core only once they are all in. If a child fails the core stays
    /// uninitialized, so registering the composite again can still succeed.
    pub fn init_with_children(
        &self,
        support: Arc<dyn PluginSupport>,
        children: &[Arc<dyn Plugin>],
    ) -> Result<(), PluginError> {
        if self.is_initialized() {
            return Err(PluginError::AlreadyInitialized {
                plugin: self.name.clone(),
            });
        }
        for child in children {
            self.check_child(child)?;
            support.register_plugin(child.clone())?;
        }
        self.init(support)
    }

    fn check_child(&self, child: &Arc<dyn Plugin>) -> Result<(), PluginError> {
        if child.id() == self.id {
            return Err(PluginError::RegisterSelf {
                plugin: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for PluginCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
