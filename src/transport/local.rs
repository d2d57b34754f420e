use async_trait::async_trait;

use crate::{Result, transport::EventSink, transport::Transport};

/// Transport without an upstream. Connecting always succeeds and only
/// events sent through [`Orchestrator::send_event`](crate::Orchestrator::send_event)
/// are dispatched.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTransport;

#[async_trait]
impl Transport for LocalTransport {
    fn name(&self) -> &str {
        "local"
    }

    async fn connect(&self, _sink: EventSink) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}
