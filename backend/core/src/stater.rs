use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::WatchStream;

/// Default number of buffered transitions kept for lagging subscribers.
pub const DEFAULT_TRANSITION_CAPACITY: usize = 64;

/// Single mutable state cell.
///
/// Every update is a synchronous transform of the current snapshot. Updates
/// are totally ordered and a new snapshot is published only when it differs
/// from the current one.
///
/// Observers either follow the latest value ([`Stater::subscribe`]) or
/// receive every published snapshot in order ([`Stater::transitions`]).
pub struct Stater<T> {
    tx: watch::Sender<T>,
    changes: broadcast::Sender<T>,
}

impl<T> Stater<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        Self::with_capacity(initial, DEFAULT_TRANSITION_CAPACITY)
    }

    pub fn with_capacity(initial: T, capacity: usize) -> Self {
        let (tx, _) = watch::channel(initial);
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self { tx, changes }
    }

    /// Replace the snapshot with `function(current)`.
    ///
    /// Returns whether a new snapshot was published.
    pub fn update(&self, function: impl FnOnce(&T) -> T) -> bool {
        self.tx.send_if_modified(|current| {
            let next = function(current);
            if next == *current {
                return false;
            }
            *current = next;
            // No subscribers is not an error.
            let _ = self.changes.send(current.clone());
            true
        })
    }

    /// Clone of the current snapshot.
    pub fn value(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Read the current snapshot without cloning it.
    pub fn with<R>(&self, read: impl FnOnce(&T) -> R) -> R {
        read(&self.tx.borrow())
    }

    /// Latest-value observer.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Latest-value observer as a stream, starting with the current snapshot.
    pub fn stream(&self) -> WatchStream<T> {
        WatchStream::new(self.tx.subscribe())
    }

    /// Every snapshot published after this call, in order.
    pub fn transitions(&self) -> broadcast::Receiver<T> {
        self.changes.subscribe()
    }
}
