//! Auth event fan-out
//!
//! An explicit observer seam over the provider's auth-event stream.
//! Server handlers emit events as they act on the provider (code
//! exchange, refresh, sign-out); auth-state contexts subscribe and
//! mirror them. Dropping an `EventSubscription` detaches the listener,
//! so teardown cannot leak subscribers.

use tokio::sync::broadcast;

use crate::provider::AuthEvent;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Broadcast hub for auth events.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<AuthEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all live subscriptions.
    ///
    /// Emitting with no subscribers is fine; events are notifications,
    /// not commands.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.tx.send(event);
    }

    /// Register an observer. The subscription ends when the returned
    /// guard is dropped.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Live subscription to the auth-event stream.
pub struct EventSubscription {
    rx: broadcast::Receiver<AuthEvent>,
}

impl EventSubscription {
    /// Wait for the next event.
    ///
    /// Returns `None` once the hub is gone. A slow subscriber that
    /// lags behind the channel skips to the oldest retained event
    /// rather than ending the stream.
    pub async fn next(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth event subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
