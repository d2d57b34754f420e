use std::sync::Arc;

use crate::{EnvelopeId, Event, EventKind, Meta, Priority};

/// Event plus metadata moved through the queue and handed to subscribers.
///
/// - `event`: the typed payload.
/// - `meta`: [`Meta`] describing id, creation time, priority and producer.
/// - `processed`: set once a processor ran successfully and subscribers
///   were notified.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Envelope {
    pub meta: Meta,
    pub event: Event,
    pub(crate) processed: bool,
}

impl Envelope {
    /// Create a new envelope tagging the event with its producer.
    pub fn new<N>(event: Event, priority: Priority, source: N) -> Self
    where
        N: Into<Arc<str>>,
    {
        Self {
            meta: Meta::new(priority, source.into()),
            event,
            processed: false,
        }
    }

    #[inline]
    pub fn id(&self) -> EnvelopeId {
        self.meta.id()
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.meta.priority()
    }

    #[inline]
    pub fn is_processed(&self) -> bool {
        self.processed
    }
}
