use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::{
    select,
    sync::{self, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    Error, Event, Priority, Result,
    internal::lock,
    transport::{EventSink, Transport},
};

type Message = (Event, Priority);

/// In-process push transport.
///
/// Producers hold a [`ChannelTransportHandle`] and send events into a bounded
/// channel; while connected, a forwarding task moves them into the dispatch
/// queue. Events sent while disconnected wait in the channel (and apply
/// backpressure to producers once it is full). Once every handle is dropped
/// and the backlog is forwarded, the transport cannot connect again.
pub struct ChannelTransport {
    name: Arc<str>,
    receiver: Arc<sync::Mutex<mpsc::Receiver<Message>>>,
    worker: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

/// Producer side of a [`ChannelTransport`].
#[derive(Debug, Clone)]
pub struct ChannelTransportHandle {
    sender: mpsc::Sender<Message>,
}

impl ChannelTransport {
    pub fn new(name: &str, capacity: usize) -> (Self, ChannelTransportHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let transport = Self {
            name: Arc::from(name),
            receiver: Arc::new(sync::Mutex::new(rx)),
            worker: Mutex::new(None),
        };
        (transport, ChannelTransportHandle { sender: tx })
    }

    fn is_running(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, sink: EventSink) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        {
            let receiver = self.receiver.lock().await;
            if receiver.is_closed() && receiver.is_empty() {
                return Err(Error::transport("all channel handles dropped"));
            }
        }

        let token = sink.child_token();
        let cancel = token.clone();
        let receiver = self.receiver.clone();
        let handle = tokio::spawn(async move {
            let mut receiver = receiver.lock().await;
            loop {
                select! {
                    _ = cancel.cancelled() => break,
                    msg = receiver.recv() => match msg {
                        Some((event, priority)) => {
                            if let Err(e) = sink.push(event, priority) {
                                tracing::warn!(source = %sink.source(), error = %e, "Could not enqueue event");
                            }
                        }
                        None => {
                            sink.connection_lost("all channel handles dropped");
                            break;
                        }
                    }
                }
            }
        });
        *lock(&self.worker) = Some((token, handle));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let worker = lock(&self.worker).take();
        if let Some((token, handle)) = worker {
            token.cancel();
            handle.await?;
        }
        Ok(())
    }
}

impl ChannelTransportHandle {
    /// Send an event, waiting for channel capacity.
    pub async fn send(&self, event: Event, priority: Priority) -> Result<()> {
        self.sender
            .send((event, priority))
            .await
            .map_err(|e| Error::transport(e.to_string()))
    }

    /// Send an event without waiting; fails when the channel is full.
    pub fn try_send(&self, event: Event, priority: Priority) -> Result<()> {
        self.sender
            .try_send((event, priority))
            .map_err(|e| Error::transport(e.to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Completes once the transport side is gone.
    pub async fn closed(&self) {
        self.sender.closed().await
    }
}
