use std::{sync::Arc, time::Duration};

use crate::EventKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected to the upstream transport")]
    NotConnected,

    #[error("Could not connect after {attempts} attempts")]
    ConnectFailed { attempts: u32 },

    #[error("Transport error: {0}")]
    Transport(Arc<str>),

    #[error("The event queue has reached its capacity ({0}).")]
    QueueFull(usize),

    #[error("Processor failed: {0}")]
    Processor(Arc<str>),

    #[error("Processor for '{0}' events panicked")]
    ProcessorPanicked(EventKind),

    #[error("Processor turned a '{expected}' event into a '{actual}' event")]
    KindMismatch {
        expected: EventKind,
        actual: EventKind,
    },

    #[error("Subscriber handler panicked")]
    HandlerPanicked,

    #[error("Subscriber handler did not finish within {0:?}")]
    HandlerTimeout(Duration),

    #[error("Error external to Sentinel occured: {0}")]
    External(Arc<str>),

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Dispatch task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[cfg(feature = "serde")]
    #[error("Could not decode event: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for processors reporting a failure.
    pub fn processor(msg: impl Into<Arc<str>>) -> Self {
        Error::Processor(msg.into())
    }

    /// Shorthand for transports reporting a failure.
    pub fn transport(msg: impl Into<Arc<str>>) -> Self {
        Error::Transport(msg.into())
    }

    pub fn external(msg: impl Into<Arc<str>>) -> Self {
        Error::External(msg.into())
    }
}
