use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{Envelope, EnvelopeId, Event, EventQueue, Priority, Result, internal::lock};

/// Handle through which producers put envelopes into the shared queue.
///
/// Cheap to clone. Every envelope pushed through a sink carries the sink's
/// source name.
#[derive(Clone)]
pub struct EventSink {
    source: Arc<str>,
    queue: Arc<Mutex<EventQueue>>,
    connected: Arc<watch::Sender<bool>>,
    shutdown: CancellationToken,
}

impl EventSink {
    pub(crate) fn new(
        source: Arc<str>,
        queue: Arc<Mutex<EventQueue>>,
        connected: Arc<watch::Sender<bool>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            queue,
            connected,
            shutdown,
        }
    }

    /// Wrap the event in an envelope and enqueue it.
    ///
    /// Obeys the queue's overflow policy: with `Reject` a full queue yields
    /// [`Error::QueueFull`](crate::Error::QueueFull).
    pub fn push(&self, event: Event, priority: Priority) -> Result<EnvelopeId> {
        self.push_envelope(Envelope::new(event, priority, self.source.clone()))
    }

    pub fn push_envelope(&self, envelope: Envelope) -> Result<EnvelopeId> {
        let id = envelope.id();
        let kind = envelope.kind();
        let priority = envelope.priority();
        if let Some(dropped) = lock(&self.queue).enqueue(envelope)? {
            tracing::warn!(
                envelope_id = %dropped.id(),
                kind = %dropped.kind(),
                "Queue full, envelope dropped"
            );
        }
        tracing::trace!(envelope_id = %id, %kind, %priority, source = %self.source, "Enqueued");
        Ok(id)
    }

    /// Tell the orchestrator the upstream went away.
    ///
    /// The status flips to disconnected; the next `send_event` or explicit
    /// `connect` reconnects.
    pub fn connection_lost(&self, reason: &str) {
        tracing::warn!(source = %self.source, reason, "Upstream connection lost");
        self.connected.send_replace(false);
    }

    /// Token for a transport worker. It is cancelled when the orchestrator
    /// that issued this sink is dropped, and may be cancelled earlier on its
    /// own.
    pub fn child_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn queue_len(&self) -> usize {
        lock(&self.queue).len()
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
