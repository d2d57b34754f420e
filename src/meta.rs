use std::{sync::Arc, time::SystemTime};

use uuid::Uuid;

use crate::{EnvelopeId, Priority};

/// Metadata attached to every envelope.
///
/// - `id`: unique identifier for the envelope.
/// - `timestamp`: creation time in nanoseconds since Unix epoch (truncated to `u64`).
/// - `priority`: decides queue placement and retry eligibility.
/// - `source`: name of the producer, `"local"` for [`Orchestrator::send_event`]
///   or the transport name for pushed envelopes.
/// - `attempts`: number of failed processing attempts so far.
///
/// [`Orchestrator::send_event`]: crate::Orchestrator::send_event
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Meta {
    id: EnvelopeId,
    timestamp: u64,
    priority: Priority,
    source: Arc<str>,
    pub(crate) attempts: u32,
}

impl Meta {
    pub fn new(priority: Priority, source: Arc<str>) -> Self {
        Self {
            id: Uuid::new_v4().as_u128(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default(),
            priority,
            source,
            attempts: 0,
        }
    }

    /// Unique identifier for this envelope.
    pub fn id(&self) -> EnvelopeId {
        self.id
    }

    /// Timestamp in nanoseconds since Unix epoch (u64 truncation).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
