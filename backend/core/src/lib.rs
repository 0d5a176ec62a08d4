pub mod error;
pub mod mutator;
pub mod scope;
pub mod state;
pub mod stater;

pub use error::{Cancelled, LoadError, PluginError};
pub use mutator::{Mutator, Ticket};
pub use scope::TaskScope;
pub use state::{DataState, LoadOutcome, LoadResult, LoadState, PageState};
pub use stater::Stater;
