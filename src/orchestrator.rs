use std::sync::{Arc, Mutex};

use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    Config, DispatchLoop, EnvelopeId, Error, Event, EventKind, EventQueue, Handler, Priority,
    Processor, ProcessorTable, Result, Subscription, SubscriptionId, SubscriptionRegistry,
    internal::lock,
    transport::{EventSink, Transport},
};

const LOCAL_SOURCE: &str = "local";

/// Externally observable health of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionStatus {
    pub connected: bool,
    pub queue_size: usize,
}

#[derive(Default)]
struct Lifecycle {
    dispatch: Option<(CancellationToken, JoinHandle<()>)>,
    transport_open: bool,
}

/// Owns the queue, subscription registry, processor table, dispatch loop and
/// transport, and manages the connection lifecycle.
///
/// - `connect()` opens the transport (retrying with linear backoff) and starts
///   the dispatch loop.
/// - `disconnect()` stops the loop and closes the transport; idempotent.
/// - `send_event(event, priority)` enqueues a local event, connecting first
///   if needed.
/// - `subscribe(filter, handler)` / `unsubscribe(id)` manage consumers.
/// - `register_processor(kind, processor)` installs per-kind enrichment.
///
/// Construct one per host (or per test); nothing is global.
///
/// See also: [`Transport`], [`Handler`], [`Processor`].
pub struct Orchestrator {
    config: Arc<Config>,
    queue: Arc<Mutex<EventQueue>>,
    processors: Arc<Mutex<ProcessorTable>>,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Arc<DispatchLoop>,
    transport: Arc<dyn Transport>,
    connected: Arc<watch::Sender<bool>>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new<T>(config: Config, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        let config = Arc::new(config.normalized());
        let queue = Arc::new(Mutex::new(EventQueue::new(
            config.queue_capacity,
            config.overflow_policy,
        )));
        let processors = Arc::new(Mutex::new(ProcessorTable::default()));
        let registry = Arc::new(SubscriptionRegistry::new(config.handler_timeout));
        let dispatcher = Arc::new(DispatchLoop::new(
            &config,
            queue.clone(),
            processors.clone(),
            registry.clone(),
        ));
        let (connected, _) = watch::channel(false);
        Self {
            config,
            queue,
            processors,
            registry,
            dispatcher,
            transport,
            connected: Arc::new(connected),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::default()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Open the transport and start the dispatch loop.
    ///
    /// Up to `max_connect_attempts` attempts are made; after failed attempt
    /// `n` the call waits `n * reconnect_delay`. When every attempt fails the
    /// status stays disconnected and [`Error::ConnectFailed`] is returned.
    /// There is no further automatic retry.
    pub async fn connect(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let max = self.config.max_connect_attempts;
        for attempt in 1..=max {
            match self.transport.connect(self.sink(self.transport.name())).await {
                Ok(()) => {
                    lifecycle.transport_open = true;
                    self.start_dispatch(&mut lifecycle);
                    self.connected.send_replace(true);
                    tracing::info!(transport = self.transport.name(), attempt, "Connected");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(transport = self.transport.name(), attempt, max, error = %e, "Connect attempt failed");
                    if attempt < max {
                        tokio::time::sleep(self.config.reconnect_delay_after(attempt)).await;
                    }
                }
            }
        }

        self.connected.send_replace(false);
        tracing::error!(transport = self.transport.name(), attempts = max, "Giving up connecting");
        Err(Error::ConnectFailed { attempts: max })
    }

    fn start_dispatch(&self, lifecycle: &mut Lifecycle) {
        let running = lifecycle
            .dispatch
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished());
        if running {
            return;
        }
        let token = self.shutdown.child_token();
        let cancel = token.clone();
        let dispatcher = self.dispatcher.clone();
        let handle = tokio::spawn(async move { dispatcher.run(cancel).await });
        lifecycle.dispatch = Some((token, handle));
    }

    /// Stop the dispatch loop and release the transport.
    ///
    /// Pending envelopes stay queued. Calling it when already disconnected is
    /// a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.connected.send_replace(false);

        if let Some((token, handle)) = lifecycle.dispatch.take() {
            token.cancel();
            handle.await?;
        }
        if std::mem::take(&mut lifecycle.transport_open) {
            self.transport.disconnect().await?;
            tracing::info!(transport = self.transport.name(), "Disconnected");
        }
        Ok(())
    }

    /// Enqueue a locally originated event, connecting first when disconnected.
    pub async fn send_event(&self, event: Event, priority: Priority) -> Result<EnvelopeId> {
        if !self.is_connected() {
            self.connect().await?;
        }
        self.sink(LOCAL_SOURCE).push(event, priority)
    }

    pub fn subscribe<H>(&self, filter: Subscription, handler: H) -> SubscriptionId
    where
        H: Handler + 'static,
    {
        self.registry.subscribe(filter, handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.unsubscribe(id)
    }

    /// Install the processor for `kind`, replacing any earlier one.
    pub fn register_processor<P>(&self, kind: EventKind, processor: P) -> bool
    where
        P: Processor + 'static,
    {
        lock(&self.processors).register(kind, processor)
    }

    pub fn unregister_processor(&self, kind: EventKind) -> bool {
        lock(&self.processors).unregister(kind)
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.is_connected(),
            queue_size: lock(&self.queue).len(),
        }
    }

    /// Receiver that changes whenever the connection state flips.
    pub fn watch_status(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// The dispatch loop, e.g. to drive ticks by hand.
    pub fn dispatcher(&self) -> &DispatchLoop {
        &self.dispatcher
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    fn sink(&self, source: &str) -> EventSink {
        EventSink::new(
            Arc::from(source),
            self.queue.clone(),
            self.connected.clone(),
            self.shutdown.clone(),
        )
    }
}

/// Stops the dispatch loop and every transport worker started through a sink.
impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
