//! Reference host: the lifecycle owner plugins attach to.
//!
//! A host is active by default. It can be toggled inactive, which blocks new
//! loads, and destroyed once, which blocks new loads, cancels its scope and
//! tears every registered plugin down. Registration and destroy must happen in
//! the context that created the host: the tokio task when there is one,
//! otherwise the thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::fmt;
use std::thread::{self, ThreadId};

use tokio::sync::watch;
use tokio::task;
use tracing::{debug, info};

use stateforge_core::{PluginError, TaskScope};

use crate::lifecycle::{Plugin, PluginSupport};
use crate::registry::PluginRegistry;

/// Execution context a host is bound to. A task keeps its id across worker
/// threads, so a host created inside a task stays usable after any `.await`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Task(task::Id),
    Thread(ThreadId),
}

impl Context {
    fn current() -> Self {
        match task::try_id() {
            Some(id) => Self::Task(id),
            None => Self::Thread(thread::current().id()),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task(id) => write!(f, "task {id}"),
            Self::Thread(id) => write!(f, "thread {id:?}"),
        }
    }
}

struct HostInner {
    owner: Context,
    destroyed: AtomicBool,
    active: watch::Sender<bool>,
    scope: TaskScope,
    registry: PluginRegistry,
    handle: Weak<HostInner>,
}

impl HostInner {
    fn check_context(&self, operation: &'static str) -> Result<(), PluginError> {
        let actual = Context::current();
        if actual != self.owner {
            return Err(PluginError::WrongContext {
                operation,
                expected: self.owner.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    fn support(&self) -> Arc<dyn PluginSupport> {
        Arc::new(HostSupport {
            host: self.handle.clone(),
        })
    }

    fn register(&self, plugin: Arc<dyn Plugin>) -> Result<bool, PluginError> {
        self.check_context("plugin registration")?;
        if self.destroyed.load(Ordering::Acquire) {
            return Err(PluginError::HostDestroyed {
                plugin: plugin.name().to_string(),
            });
        }
        self.registry.register(plugin, self.support())
    }
}

impl Drop for HostInner {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

/// Capability view handed to plugins. Holds the host weakly so plugins never
/// keep their host alive; a dropped host reads as destroyed.
struct HostSupport {
    host: Weak<HostInner>,
}

impl PluginSupport for HostSupport {
    fn is_destroyed(&self) -> bool {
        self.host
            .upgrade()
            .map_or(true, |h| h.destroyed.load(Ordering::Acquire))
    }

    fn is_active(&self) -> bool {
        self.host.upgrade().is_some_and(|h| {
            !h.destroyed.load(Ordering::Acquire) && *h.active.borrow()
        })
    }

    fn active_signal(&self) -> watch::Receiver<bool> {
        match self.host.upgrade() {
            Some(h) => h.active.subscribe(),
            None => watch::channel(false).1,
        }
    }

    fn scope(&self) -> TaskScope {
        match self.host.upgrade() {
            Some(h) => h.scope.clone(),
            None => {
                let scope = TaskScope::new();
                scope.cancel();
                scope
            }
        }
    }

    fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<bool, PluginError> {
        match self.host.upgrade() {
            Some(h) => h.register(plugin),
            None => Err(PluginError::HostDestroyed {
                plugin: plugin.name().to_string(),
            }),
        }
    }
}

/// Lifecycle owner for a set of plugins.
#[derive(Clone)]
pub struct Host {
    inner: Arc<HostInner>,
}

impl Host {
    pub fn new() -> Self {
        let (active, _) = watch::channel(true);
        let inner = Arc::new_cyclic(|handle| HostInner {
            owner: Context::current(),
            destroyed: AtomicBool::new(false),
            active,
            scope: TaskScope::new(),
            registry: PluginRegistry::new(),
            handle: handle.clone(),
        });
        Self { inner }
    }

    /// Register `plugin` and hand back its typed handle.
    pub fn register<P: Plugin>(&self, plugin: Arc<P>) -> Result<Arc<P>, PluginError> {
        self.inner.register(plugin.clone())?;
        Ok(plugin)
    }

    /// Create a plugin and register it.
    pub fn plugin<P: Plugin>(&self, factory: impl FnOnce() -> P) -> Result<Arc<P>, PluginError> {
        self.register(Arc::new(factory()))
    }

    pub fn set_active(&self, active: bool) {
        if self.is_destroyed() {
            return;
        }
        let changed = self.inner.active.send_if_modified(|current| {
            if *current == active {
                return false;
            }
            *current = active;
            true
        });
        if changed {
            debug!(active, "Host active state changed");
        }
    }

    /// Always false once destroyed.
    pub fn is_active(&self) -> bool {
        !self.is_destroyed() && *self.inner.active.borrow()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    pub fn active_signal(&self) -> watch::Receiver<bool> {
        self.inner.active.subscribe()
    }

    pub fn scope(&self) -> TaskScope {
        self.inner.scope.clone()
    }

    /// Capability view of this host, as plugins see it.
    pub fn support(&self) -> Arc<dyn PluginSupport> {
        self.inner.support()
    }

    pub fn plugin_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Tear the host down. Idempotent.
    pub fn destroy(&self) -> Result<(), PluginError> {
        self.inner.check_context("host destroy")?;
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.active.send_if_modified(|current| {
            let was_active = *current;
            *current = false;
            was_active
        });
        self.inner.scope.cancel();
        self.inner.registry.destroy_all();
        info!("Host destroyed");
        Ok(())
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}
