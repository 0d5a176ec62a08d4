pub mod data;
mod engine;
pub mod host;
pub mod intent;
pub mod lifecycle;
pub mod load;
pub mod page;
pub mod registry;

pub use data::DataPlugin;
pub use engine::LoadOptions;
pub use host::Host;
pub use intent::{Intent, IntentDispatcher, IntentHandler};
pub use lifecycle::{Plugin, PluginCore, PluginId, PluginSupport};
pub use load::LoadPlugin;
pub use page::{PagePlugin, PageRequest};
pub use registry::PluginRegistry;

pub use stateforge_core::{
    Cancelled, DataState, LoadError, LoadOutcome, LoadResult, LoadState, PageState, PluginError,
};

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by stored load callbacks.
pub type BoxLoadFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
