//! Intent dispatch bound to a host's lifecycle.
//!
//! Intents are handled in the host scope. While the host is inactive only
//! intents that opt out of the active check run; after destroy nothing runs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::host::Host;
use crate::lifecycle::PluginSupport;

pub trait Intent: Send + 'static {
    /// Run this intent even while the host is inactive.
    fn ignore_active(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait IntentHandler: Send + Sync + 'static {
    type Intent: Intent;

    async fn handle_intent(&self, intent: Self::Intent);
}

pub struct IntentDispatcher<H> {
    support: Arc<dyn PluginSupport>,
    handler: Arc<H>,
}

impl<H: IntentHandler> IntentDispatcher<H> {
    pub fn new(host: &Host, handler: Arc<H>) -> Self {
        Self {
            support: host.support(),
            handler,
        }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Queue `intent`. The active check runs when the task starts, so an
    /// intent dispatched just before the host goes inactive is dropped.
    pub fn dispatch(&self, intent: H::Intent) {
        let support = self.support.clone();
        let handler = self.handler.clone();
        self.support.scope().spawn(async move {
            if support.is_active() || (!support.is_destroyed() && intent.ignore_active()) {
                handler.handle_intent(intent).await;
            } else {
                debug!("Intent dropped, host inactive");
            }
        });
    }
}

impl<H> Clone for IntentDispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            support: self.support.clone(),
            handler: self.handler.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum CounterIntent {
        Increment,
        IncrementAlways,
    }

    impl Intent for CounterIntent {
        fn ignore_active(&self) -> bool {
            matches!(self, CounterIntent::IncrementAlways)
        }
    }

    #[derive(Default)]
    struct Counter {
        count: AtomicUsize,
    }

    #[async_trait]
    impl IntentHandler for Counter {
        type Intent = CounterIntent;

        async fn handle_intent(&self, intent: CounterIntent) {
            match intent {
                CounterIntent::Increment | CounterIntent::IncrementAlways => {
                    self.count.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    fn count(dispatcher: &IntentDispatcher<Counter>) -> usize {
        dispatcher.handler().count.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn test_intent_active() {
        let host = Host::new();
        let dispatcher = IntentDispatcher::new(&host, Arc::new(Counter::default()));

        dispatcher.dispatch(CounterIntent::Increment);
        dispatcher.dispatch(CounterIntent::Increment);
        host.scope().wait_idle().await;
        assert_eq!(count(&dispatcher), 2);

        host.destroy().unwrap();
        dispatcher.dispatch(CounterIntent::Increment);
        dispatcher.dispatch(CounterIntent::IncrementAlways);
        host.scope().wait_idle().await;
        assert_eq!(count(&dispatcher), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_intent_inactive() {
        let host = Host::new();
        host.set_active(false);
        let dispatcher = IntentDispatcher::new(&host, Arc::new(Counter::default()));

        dispatcher.dispatch(CounterIntent::Increment);
        dispatcher.dispatch(CounterIntent::Increment);
        host.scope().wait_idle().await;
        assert_eq!(count(&dispatcher), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_intent_inactive_ignore() {
        let host = Host::new();
        host.set_active(false);
        let dispatcher = IntentDispatcher::new(&host, Arc::new(Counter::default()));

        dispatcher.dispatch(CounterIntent::IncrementAlways);
        dispatcher.dispatch(CounterIntent::IncrementAlways);
        host.scope().wait_idle().await;
        assert_eq!(count(&dispatcher), 2);
    }
}
