//! The boundary between the dispatch registry and whatever supplies events.
//!
//! A [`Transport`] is handed an [`EventSink`] when the
//! [`Orchestrator`](crate::Orchestrator) connects, and pushes envelopes into
//! it until it is disconnected. The registry itself never assumes a specific
//! transport.
//!
//! Provided implementations:
//! - [`LocalTransport`] - no upstream at all; only locally sent events flow.
//! - [`ChannelTransport`] - in-process push delivery over a tokio channel.
//! - [`JsonLinesTransport`] - newline-delimited JSON over a persistent
//!   stream such as TCP (requires the `serde` feature).

mod channel;
mod local;
mod sink;

#[cfg(feature = "serde")]
mod json_lines;

use async_trait::async_trait;

use crate::Result;

pub use channel::{ChannelTransport, ChannelTransportHandle};
pub use local::LocalTransport;
pub use sink::EventSink;

#[cfg(feature = "serde")]
pub use json_lines::{Connector, JsonLinesTransport, TcpConnector};

/// Upstream source of envelopes.
///
/// `connect` may be called again after `disconnect` or after a failed
/// attempt, so implementations must be restartable. Returning an error from
/// `connect` makes the orchestrator retry with a linearly growing delay.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name used as the `source` of every envelope pushed by this transport.
    fn name(&self) -> &str;

    async fn connect(&self, sink: EventSink) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}
