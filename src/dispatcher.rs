use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    select,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;

use crate::{
    Config, Envelope, Error, EventQueue, ProcessorTable, SubscriptionRegistry,
    config::MIN_DISPATCH_INTERVAL, internal::lock, processor::apply_with,
};

/// Whether the loop is waiting for the next tick or working through a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Draining,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Envelopes taken from the queue.
    pub dequeued: usize,
    /// Envelopes processed and handed to subscribers.
    pub delivered: usize,
    /// Envelopes put back after a processor failure.
    pub requeued: usize,
    /// Envelopes dropped after a processor failure.
    pub abandoned: usize,
}

/// Periodic task that drains the queue, enriches and delivers envelopes.
///
/// Each tick takes at most `batch_size` envelopes from the head of the queue.
/// Processor failures are isolated per envelope: `high` and `critical`
/// envelopes go back to the queue until they have failed `max_retries + 1`
/// times, everything else is dropped after its first failure.
pub struct DispatchLoop {
    queue: Arc<Mutex<EventQueue>>,
    processors: Arc<Mutex<ProcessorTable>>,
    registry: Arc<SubscriptionRegistry>,
    draining: AtomicBool,
    interval: Duration,
    batch_size: usize,
    max_retries: u32,
}

impl DispatchLoop {
    pub(crate) fn new(
        config: &Config,
        queue: Arc<Mutex<EventQueue>>,
        processors: Arc<Mutex<ProcessorTable>>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            queue,
            processors,
            registry,
            draining: AtomicBool::new(false),
            interval: config.dispatch_interval.max(MIN_DISPATCH_INTERVAL),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        }
    }

    pub fn state(&self) -> DispatchState {
        if self.draining.load(Ordering::Acquire) {
            DispatchState::Draining
        } else {
            DispatchState::Idle
        }
    }

    /// Run one dispatch cycle.
    pub async fn tick(&self) -> TickReport {
        let batch = {
            let mut queue = lock(&self.queue);
            if queue.is_empty() {
                return TickReport::default();
            }
            queue.dequeue_batch(self.batch_size)
        };

        self.draining.store(true, Ordering::Release);
        let mut report = TickReport {
            dequeued: batch.len(),
            ..Default::default()
        };
        tracing::trace!(batch = batch.len(), "Draining");

        for envelope in batch {
            self.dispatch(envelope, &mut report).await;
        }

        self.draining.store(false, Ordering::Release);
        report
    }

    async fn dispatch(&self, mut envelope: Envelope, report: &mut TickReport) {
        let processor = lock(&self.processors).get(envelope.kind());
        match apply_with(processor.as_deref(), envelope.event.clone()) {
            Ok(event) => {
                envelope.event = event;
                envelope.processed = true;
                self.registry.notify(Arc::new(envelope)).await;
                report.delivered += 1;
            }
            Err(e) => self.on_processor_failure(envelope, e, report),
        }
    }

    fn on_processor_failure(&self, mut envelope: Envelope, error: Error, report: &mut TickReport) {
        let id = envelope.id();
        let kind = envelope.kind();
        let priority = envelope.priority();
        let attempt = envelope.meta.attempts + 1;

        if !priority.is_retryable() || envelope.meta.attempts >= self.max_retries {
            tracing::error!(envelope_id = %id, %kind, %priority, attempt, error = %error, "Processor failed, abandoning envelope");
            report.abandoned += 1;
            return;
        }

        envelope.meta.attempts = attempt;
        tracing::warn!(envelope_id = %id, %kind, %priority, attempt, error = %error, "Processor failed, requeueing envelope");
        match lock(&self.queue).enqueue(envelope) {
            Ok(dropped) => {
                report.requeued += 1;
                if let Some(dropped) = dropped {
                    tracing::warn!(envelope_id = %dropped.id(), kind = %dropped.kind(), "Queue full, envelope dropped");
                }
            }
            Err(e) => {
                tracing::error!(envelope_id = %id, %kind, error = %e, "Could not requeue envelope");
                report.abandoned += 1;
            }
        }
    }

    /// Tick every `dispatch_interval` until `cancel` fires. The first tick
    /// happens one period after the call.
    ///
    /// A tick in progress is completed before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = interval_at(Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let report = self.tick().await;
                    if report.dequeued > 0 {
                        tracing::debug!(?report, "Tick finished");
                    }
                }
            }
        }
        tracing::debug!("Dispatch loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::{
        Event, EventKind, OverflowPolicy, Priority, Result, Subscription,
        event::{EmergencyAlert, VoiceAnalysis},
    };

    struct Fixture {
        queue: Arc<Mutex<EventQueue>>,
        processors: Arc<Mutex<ProcessorTable>>,
        registry: Arc<SubscriptionRegistry>,
        dispatcher: DispatchLoop,
    }

    fn fixture(config: Config) -> Fixture {
        let queue = Arc::new(Mutex::new(EventQueue::new(
            config.queue_capacity,
            OverflowPolicy::Reject,
        )));
        let processors = Arc::new(Mutex::new(ProcessorTable::default()));
        let registry = Arc::new(SubscriptionRegistry::default());
        let dispatcher =
            DispatchLoop::new(&config, queue.clone(), processors.clone(), registry.clone());
        Fixture {
            queue,
            processors,
            registry,
            dispatcher,
        }
    }

    fn voice(priority: Priority) -> Envelope {
        Envelope::new(Event::Voice(VoiceAnalysis::default()), priority, "test")
    }

    fn failing_voice_processor(
        calls: &Arc<AtomicUsize>,
    ) -> impl Fn(Event) -> Result<Event> + use<> {
        let calls = calls.clone();
        move |_: Event| -> Result<Event> {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::processor("model unavailable"))
        }
    }

    #[tokio::test]
    async fn test_empty_queue_stays_idle() {
        let f = fixture(Config::default());
        assert_eq!(f.dispatcher.tick().await, TickReport::default());
        assert_eq!(f.dispatcher.state(), DispatchState::Idle);
    }

    #[tokio::test]
    async fn test_tick_respects_batch_size() {
        let f = fixture(Config::default().with_batch_size(2));
        for _ in 0..5 {
            lock(&f.queue).enqueue(voice(Priority::Low)).unwrap();
        }
        let report = f.dispatcher.tick().await;
        assert_eq!(report.dequeued, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(lock(&f.queue).len(), 3);
        assert_eq!(f.dispatcher.state(), DispatchState::Idle);
    }

    #[tokio::test]
    async fn test_delivered_envelopes_are_processed_and_enriched() {
        let f = fixture(Config::default());
        lock(&f.processors).register(EventKind::Voice, |e: Event| -> Result<Event> {
            Ok(e.annotate("stress", "low"))
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        f.registry.subscribe(Subscription::All, move |e: &Envelope| -> Result<()> {
            lock(&sink).push((e.is_processed(), e.event.annotations().get("stress").cloned()));
            Ok(())
        });
        lock(&f.queue).enqueue(voice(Priority::Medium)).unwrap();

        f.dispatcher.tick().await;
        assert_eq!(*lock(&seen), vec![(true, Some("low".to_string()))]);
    }

    #[tokio::test]
    async fn test_low_priority_failure_is_not_retried() {
        let f = fixture(Config::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let delivered = Arc::new(AtomicUsize::new(0));
        lock(&f.processors).register(EventKind::Voice, failing_voice_processor(&calls));
        let d = delivered.clone();
        f.registry.subscribe(Subscription::All, move |_: &Envelope| -> Result<()> {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        lock(&f.queue).enqueue(voice(Priority::Low)).unwrap();
        let report = f.dispatcher.tick().await;
        assert_eq!(report.abandoned, 1);
        assert_eq!(report.requeued, 0);
        assert!(lock(&f.queue).is_empty());

        f.dispatcher.tick().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_high_priority_failure_is_retried_boundedly() {
        let f = fixture(Config::default().with_max_retries(2));
        let calls = Arc::new(AtomicUsize::new(0));
        lock(&f.processors).register(EventKind::Voice, failing_voice_processor(&calls));

        lock(&f.queue).enqueue(voice(Priority::High)).unwrap();
        let first = f.dispatcher.tick().await;
        assert_eq!(first.requeued, 1);
        assert_eq!(lock(&f.queue).len(), 1);

        for _ in 0..5 {
            f.dispatcher.tick().await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(lock(&f.queue).is_empty());
    }

    #[tokio::test]
    async fn test_requeued_critical_returns_to_head() {
        let f = fixture(Config::default().with_batch_size(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        lock(&f.processors).register(EventKind::Emergency, move |e: Event| -> Result<Event> {
            if c.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::processor("geocoder timeout"))
            } else {
                Ok(e)
            }
        });
        let order = Arc::new(Mutex::new(Vec::new()));
        let o = order.clone();
        f.registry.subscribe(Subscription::All, move |e: &Envelope| -> Result<()> {
            lock(&o).push(e.kind());
            Ok(())
        });

        lock(&f.queue)
            .enqueue(Envelope::new(
                Event::Emergency(EmergencyAlert::new("fall detected")),
                Priority::Critical,
                "test",
            ))
            .unwrap();
        lock(&f.queue).enqueue(voice(Priority::Low)).unwrap();

        f.dispatcher.tick().await; // emergency fails and goes back to the head
        f.dispatcher.tick().await;
        f.dispatcher.tick().await;
        assert_eq!(*lock(&order), vec![EventKind::Emergency, EventKind::Voice]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_cancelled() {
        let f = fixture(Config::default());
        let delivered = Arc::new(AtomicUsize::new(0));
        let d = delivered.clone();
        f.registry.subscribe(Subscription::All, move |_: &Envelope| -> Result<()> {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        for _ in 0..15 {
            lock(&f.queue).enqueue(voice(Priority::Low)).unwrap();
        }

        let dispatcher = Arc::new(f.dispatcher);
        let cancel = CancellationToken::new();
        let task = {
            let dispatcher = dispatcher.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { dispatcher.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(250)).await;
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(delivered.load(Ordering::SeqCst), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_ticks() {
        let f = fixture(Config {
            dispatch_interval: Duration::ZERO,
            ..Config::default()
        });
        let delivered = Arc::new(AtomicUsize::new(0));
        let d = delivered.clone();
        f.registry.subscribe(Subscription::All, move |_: &Envelope| -> Result<()> {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        lock(&f.queue).enqueue(voice(Priority::Low)).unwrap();

        let dispatcher = Arc::new(f.dispatcher);
        let cancel = CancellationToken::new();
        let task = {
            let dispatcher = dispatcher.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { dispatcher.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }
}
