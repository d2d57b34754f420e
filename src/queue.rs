use std::collections::VecDeque;

use crate::{Envelope, Error, OverflowPolicy, Result};

/// Bounded buffer of envelopes waiting for the dispatch loop.
///
/// Critical envelopes jump to the head, everything else joins the tail.
/// There is no re-sorting afterwards: a critical envelope enqueued later
/// overtakes earlier critical ones.
#[derive(Debug)]
pub struct EventQueue {
    items: VecDeque<Envelope>,
    capacity: usize,
    overflow_policy: OverflowPolicy,
}

impl EventQueue {
    pub fn new(capacity: usize, overflow_policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            overflow_policy,
        }
    }

    /// Insert an envelope according to its priority.
    ///
    /// Returns the envelope that was dropped to honour the capacity, if any.
    /// With [`OverflowPolicy::Reject`] a full queue yields [`Error::QueueFull`]
    /// and the envelope is not stored.
    pub fn enqueue(&mut self, envelope: Envelope) -> Result<Option<Envelope>> {
        let mut dropped = None;
        if self.items.len() >= self.capacity {
            match self.overflow_policy {
                OverflowPolicy::Reject => return Err(Error::QueueFull(self.capacity)),
                OverflowPolicy::DropNewest => return Ok(Some(envelope)),
                OverflowPolicy::DropOldest => match self.oldest_evictable(&envelope) {
                    Some(idx) => dropped = self.items.remove(idx),
                    None => return Ok(Some(envelope)),
                },
            }
        }

        if envelope.priority().is_critical() {
            self.items.push_front(envelope);
        } else {
            self.items.push_back(envelope);
        }
        Ok(dropped)
    }

    /// Index of the envelope `DropOldest` gives up to make room for `incoming`.
    ///
    /// The oldest non-critical envelope sits closest to the head. When only
    /// critical envelopes are pending, a non-critical newcomer is refused
    /// instead, and a critical one displaces the oldest critical envelope,
    /// which is the one closest to the tail.
    fn oldest_evictable(&self, incoming: &Envelope) -> Option<usize> {
        let is_critical = |e: &Envelope| e.priority().is_critical();
        self.items
            .iter()
            .position(|e| !is_critical(e))
            .or_else(|| {
                is_critical(incoming)
                    .then(|| self.items.iter().rposition(is_critical))
                    .flatten()
            })
    }

    /// Remove up to `max` envelopes from the head, keeping the order of the rest.
    pub fn dequeue_batch(&mut self, max: usize) -> Vec<Envelope> {
        let n = max.min(self.items.len());
        self.items.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
