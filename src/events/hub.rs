use crate::events::RunEvent;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::trace;

type Registry = HashMap<i64, Vec<UnboundedSender<RunEvent>>>;

/// Per-run fan-out of live events
///
/// The registry is the only structure shared between a crawl task and the
/// callers that watch it. Each subscriber gets its own channel, so delivery
/// order per subscriber matches publish order.
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Mutex<Registry>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a subscriber for a run
    ///
    /// The returned receiver already holds a `PING` heartbeat. Dropping it
    /// unsubscribes on the next publish.
    pub fn subscribe(&self, run_id: i64) -> UnboundedReceiver<RunEvent> {
        let (tx, rx) = unbounded_channel();
        let _ = tx.send(RunEvent::ping());
        self.registry().entry(run_id).or_default().push(tx);
        rx
    }

    /// Delivers an event to every live subscriber of a run
    ///
    /// Subscribers whose receiver is gone are pruned. Publishing to a run
    /// nobody watches does nothing.
    ///
    /// # Returns
    ///
    /// Number of subscribers the event reached
    pub fn publish(&self, run_id: i64, event: RunEvent) -> usize {
        let mut registry = self.registry();
        let Some(senders) = registry.get_mut(&run_id) else {
            return 0;
        };

        senders.retain(|tx| tx.send(event.clone()).is_ok());
        let delivered = senders.len();
        if delivered == 0 {
            registry.remove(&run_id);
        }

        trace!("Published {} for run {} to {} subscribers", event.kind(), run_id, delivered);
        delivered
    }

    /// Number of registered subscribers for a run
    pub fn subscriber_count(&self, run_id: i64) -> usize {
        self.registry().get(&run_id).map_or(0, Vec::len)
    }
}
