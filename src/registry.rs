use std::{
    collections::BTreeMap,
    panic::AssertUnwindSafe,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures_util::FutureExt;

use crate::{Envelope, Error, Handler, Result, Subscription, SubscriptionId, internal::lock};

struct Subscriber {
    filter: Subscription,
    handler: Arc<dyn Handler>,
}

/// Outcome of notifying the subscribers of a single envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub delivered: usize,
    pub failed: usize,
}

impl NotifyReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Tracks subscribers and fans envelopes out to the matching ones.
///
/// Subscribers are notified in registration order. Each invocation is
/// isolated: an error, a panic or (when configured) a timeout is logged and
/// counted, and the remaining subscribers are still notified.
pub struct SubscriptionRegistry {
    subscribers: Mutex<BTreeMap<SubscriptionId, Subscriber>>,
    last_id: AtomicU64,
    handler_timeout: Option<Duration>,
}

impl SubscriptionRegistry {
    pub fn new(handler_timeout: Option<Duration>) -> Self {
        Self {
            subscribers: Mutex::new(BTreeMap::new()),
            last_id: AtomicU64::new(0),
            handler_timeout,
        }
    }

    pub fn subscribe<H>(&self, filter: Subscription, handler: H) -> SubscriptionId
    where
        H: Handler + 'static,
    {
        let id = SubscriptionId::new(self.last_id.fetch_add(1, Ordering::Relaxed) + 1);
        lock(&self.subscribers).insert(
            id,
            Subscriber {
                filter,
                handler: Arc::new(handler),
            },
        );
        tracing::debug!(subscription_id = %id, %filter, "Subscribed");
        id
    }

    /// Remove a subscription. Returns `false` if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = lock(&self.subscribers).remove(&id).is_some();
        if removed {
            tracing::debug!(subscription_id = %id, "Unsubscribed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        lock(&self.subscribers).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.subscribers).is_empty()
    }

    /// Deliver the envelope to every subscriber whose filter matches its kind.
    ///
    /// The set of recipients is fixed before the first handler runs, so a
    /// handler may subscribe or unsubscribe without affecting this delivery.
    pub async fn notify(&self, envelope: Arc<Envelope>) -> NotifyReport {
        let kind = envelope.kind();
        let recipients: Vec<_> = lock(&self.subscribers)
            .iter()
            .filter(|(_, s)| s.filter.matches(kind))
            .map(|(id, s)| (*id, s.handler.clone()))
            .collect();

        let mut report = NotifyReport::default();
        for (id, handler) in recipients {
            match self.invoke(handler.as_ref(), envelope.clone()).await {
                Ok(()) => {
                    tracing::debug!(subscription_id = %id, envelope_id = %envelope.id(), %kind, "Delivered");
                    report.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(subscription_id = %id, envelope_id = %envelope.id(), %kind, error = %e, "Subscriber failed");
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn invoke(&self, handler: &dyn Handler, envelope: Arc<Envelope>) -> Result<()> {
        let call = AssertUnwindSafe(handler.handle(envelope)).catch_unwind();
        let outcome = match self.handler_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| Error::HandlerTimeout(limit))?,
            None => call.await,
        };
        outcome.map_err(|_| Error::HandlerPanicked)?
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}
