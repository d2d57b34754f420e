use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use crate::{Error, Event, EventKind, Result};

/// Kind-specific enrichment applied to an event before delivery.
///
/// A processor receives the owned event and returns the enriched one. It must
/// return an event of the same kind; anything else is treated as a failure.
/// Plain closures implement this trait:
///
/// ```rust
/// use sentinel::{Event, ProcessorTable, EventKind};
///
/// let mut table = ProcessorTable::default();
/// table.register(EventKind::Voice, |event: Event| -> sentinel::Result<Event> {
///     Ok(event.annotate("lang", "en"))
/// });
/// ```
pub trait Processor: Send + Sync {
    fn process(&self, event: Event) -> Result<Event>;
}

impl<F> Processor for F
where
    F: Fn(Event) -> Result<Event> + Send + Sync,
{
    fn process(&self, event: Event) -> Result<Event> {
        self(event)
    }
}

/// Mapping from event kind to its processor.
#[derive(Default, Clone)]
pub struct ProcessorTable {
    processors: HashMap<EventKind, Arc<dyn Processor>>,
}

impl ProcessorTable {
    /// Register a processor for `kind`. Returns `true` if it replaced an
    /// earlier registration.
    pub fn register<P>(&mut self, kind: EventKind, processor: P) -> bool
    where
        P: Processor + 'static,
    {
        self.processors.insert(kind, Arc::new(processor)).is_some()
    }

    pub fn unregister(&mut self, kind: EventKind) -> bool {
        self.processors.remove(&kind).is_some()
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.processors.contains_key(&kind)
    }

    pub(crate) fn get(&self, kind: EventKind) -> Option<Arc<dyn Processor>> {
        self.processors.get(&kind).cloned()
    }

    /// Run the processor registered for the event's kind.
    ///
    /// Without a processor the event is returned unchanged.
    pub fn apply(&self, event: Event) -> Result<Event> {
        apply_with(self.get(event.kind()).as_deref(), event)
    }
}

impl std::fmt::Debug for ProcessorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorTable")
            .field("kinds", &self.processors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Shared by [`ProcessorTable::apply`] and the dispatch loop, which looks the
/// processor up under a lock and runs it outside.
pub(crate) fn apply_with(processor: Option<&dyn Processor>, event: Event) -> Result<Event> {
    let kind = event.kind();
    let Some(processor) = processor else {
        tracing::warn!(%kind, "No processor registered, delivering payload as is");
        return Ok(event);
    };

    let processed = catch_unwind(AssertUnwindSafe(|| processor.process(event)))
        .map_err(|_| Error::ProcessorPanicked(kind))??;

    if processed.kind() != kind {
        return Err(Error::KindMismatch {
            expected: kind,
            actual: processed.kind(),
        });
    }
    Ok(processed)
}
