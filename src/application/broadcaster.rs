// Fanout broadcaster - Pushes every notification to every connected observer
use crate::domain::telemetry::TelemetryNotification;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};

pub const DEFAULT_OBSERVER_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Receiving end handed to an observer. Dropping it disconnects the observer
/// on the next publish.
#[derive(Debug)]
pub struct Subscription {
    pub id: ObserverId,
    pub receiver: mpsc::Receiver<TelemetryNotification>,
}

/// Outcome of one publish, for logging only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub lagged: usize,
    pub disconnected: usize,
}

/// Registry of live observers. No topic routing and no backlog: an observer
/// sees only what is published while it is subscribed.
pub struct Broadcaster {
    observers: Mutex<HashMap<ObserverId, mpsc::Sender<TelemetryNotification>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Broadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, tx);
        tracing::debug!(observer = id.0, "observer subscribed");
        Subscription { id, receiver: rx }
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        if self.lock().remove(&id).is_some() {
            tracing::debug!(observer = id.0, "observer unsubscribed");
        }
    }

    /// Run `handler` for every notification on a background task until the
    /// observer is unsubscribed.
    pub fn on_notification<F>(&self, handler: F) -> ObserverId
    where
        F: Fn(TelemetryNotification) + Send + 'static,
    {
        let Subscription { id, mut receiver } = self.subscribe();
        tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                handler(notification);
            }
        });
        id
    }

    pub fn observer_count(&self) -> usize {
        self.lock().len()
    }

    /// Never blocks. A full observer queue drops this notification for that
    /// observer; a closed one is removed from the set.
    pub fn publish(&self, notification: TelemetryNotification) -> PublishReport {
        let mut report = PublishReport::default();
        let mut observers = self.lock();

        observers.retain(|id, tx| match tx.try_send(notification.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(observer = id.0, "observer lagging, notification dropped");
                report.lagged += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(observer = id.0, "observer gone, removing");
                report.disconnected += 1;
                false
            }
        });

        report
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ObserverId, mpsc::Sender<TelemetryNotification>>> {
        // Sends never panic while holding the lock; recover rather than propagate poison
        self.observers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_OBSERVER_BUFFER)
    }
}
