use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    net::TcpStream,
    select,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    Error, Event, Priority, Result,
    internal::lock,
    transport::{EventSink, Transport},
};

/// Opens the byte stream a [`JsonLinesTransport`] reads from.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + Unpin + Send + 'static;

    async fn open(&self) -> std::io::Result<Self::Stream>;
}

/// Connects to a TCP endpoint such as `127.0.0.1:7400`.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn open(&self) -> std::io::Result<TcpStream> {
        TcpStream::connect(&self.addr).await
    }
}

/// Persistent-connection transport reading one JSON record per line:
///
/// ```json
/// {"type": "biometric", "payload": {"heart_rate_bpm": 128}, "priority": "high"}
/// ```
///
/// `priority` is optional and defaults to `medium`. Lines that fail to decode
/// are logged and skipped. When the stream ends the orchestrator is told the
/// connection was lost.
pub struct JsonLinesTransport<C: Connector> {
    name: Arc<str>,
    connector: C,
    worker: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl<C: Connector> JsonLinesTransport<C> {
    pub fn new(name: &str, connector: C) -> Self {
        Self {
            name: Arc::from(name),
            connector,
            worker: Mutex::new(None),
        }
    }

    fn is_running(&self) -> bool {
        lock(&self.worker)
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }
}

/// Decode a single record into its event and priority.
pub(crate) fn decode_line(line: &str) -> Result<(Event, Priority)> {
    let mut value: serde_json::Value = serde_json::from_str(line)?;
    let priority = match value.as_object_mut().and_then(|o| o.remove("priority")) {
        Some(p) => serde_json::from_value(p)?,
        None => Priority::default(),
    };
    let event = serde_json::from_value(value)?;
    Ok((event, priority))
}

async fn read_lines<R>(stream: R, sink: EventSink, cancel: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match decode_line(&line) {
                    Ok((event, priority)) => {
                        if let Err(e) = sink.push(event, priority) {
                            tracing::warn!(source = %sink.source(), error = %e, "Could not enqueue event");
                        }
                    }
                    Err(e) => tracing::warn!(source = %sink.source(), error = %e, "Skipping malformed record"),
                },
                Ok(None) => {
                    sink.connection_lost("stream closed by peer");
                    break;
                }
                Err(e) => {
                    sink.connection_lost(&e.to_string());
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl<C: Connector> Transport for JsonLinesTransport<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self, sink: EventSink) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        let stream = self
            .connector
            .open()
            .await
            .map_err(|e| Error::transport(e.to_string()))?;

        let token = sink.child_token();
        let handle = tokio::spawn(read_lines(stream, sink, token.clone()));
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
