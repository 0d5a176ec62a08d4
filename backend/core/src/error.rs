use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// A unit of work was cancelled or superseded before it finished.
///
/// Not a failure: callers absorb it and publish nothing beyond clearing their
/// loading flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unit of work cancelled")]
pub struct Cancelled;

/// Misuse of the plugin lifecycle. These are programming errors and are
/// returned to the caller instead of being absorbed into state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("plugin '{plugin}' has already been initialized")]
    AlreadyInitialized { plugin: String },

    #[error("plugin '{plugin}' has not been initialized")]
    NotInitialized { plugin: String },

    #[error("{operation} must run in the host context {expected}, but ran on {actual}")]
    WrongContext {
        operation: &'static str,
        expected: String,
        actual: String,
    },

    #[error("cannot register plugin '{plugin}': host is destroyed")]
    HostDestroyed { plugin: String },

    #[error("plugin '{plugin}' cannot register itself")]
    RegisterSelf { plugin: String },
}

/// Failure reported by a load callback.
///
/// Clones share the same underlying error. Equality is identity, so a
/// snapshot compares equal to itself while two separate failures never do.
#[derive(Clone)]
pub struct LoadError(Arc<anyhow::Error>);

impl LoadError {
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(error.into()))
    }

    pub fn msg(message: impl fmt::Display + fmt::Debug + Send + Sync + 'static) -> Self {
        Self::new(anyhow::Error::msg(message))
    }

    /// The wrapped error.
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl From<anyhow::Error> for LoadError {
    fn from(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }
}

impl PartialEq for LoadError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for LoadError {}

impl fmt::Debug for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoadError({:#})", self.0)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl std::error::Error for LoadError {}

impl Serialize for LoadError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
