use std::sync::Arc;

use async_trait::async_trait;

use crate::{Envelope, Result};

/// Delivery callback attached to a subscription.
///
/// Implement it for stateful consumers that need to await (forwarding to a
/// websocket, writing to a store). Synchronous closures taking `&Envelope`
/// implement it as well.
///
/// Errors, panics and timeouts are contained by the registry: they are logged
/// and never reach other subscribers or the dispatch loop. Handlers are not
/// retried.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, envelope: Arc<Envelope>) -> Result<()>;
}

#[async_trait]
impl<F> Handler for F
where
    F: Fn(&Envelope) -> Result<()> + Send + Sync,
{
    async fn handle(&self, envelope: Arc<Envelope>) -> Result<()> {
        self(&envelope)
    }
}
