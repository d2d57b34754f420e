//! Sentinel - event dispatch registry
//!
//! The event fan-out core of the Guardian Sentinel safety dashboard: producers
//! push typed events (voice, pose, face, location, biometric, environmental,
//! emergency) into a priority-aware queue, a periodic dispatch loop enriches
//! them with per-kind processors, and subscribers receive every envelope that
//! matches their filter.
//!
//! Everything hangs off an explicitly constructed [`Orchestrator`], so tests
//! and hosts can build as many independent registries as they need.
//!
//! ```rust,no_run
//! use sentinel::{
//!     Config, Envelope, Event, EventKind, LocalTransport, Orchestrator, Priority, Subscription,
//! };
//! use sentinel::event::EmergencyAlert;
//!
//! # async fn demo() -> sentinel::Result {
//! let hub = Orchestrator::new(Config::default(), LocalTransport);
//! hub.subscribe(Subscription::Kind(EventKind::Emergency), |e: &Envelope| -> sentinel::Result {
//!     println!("emergency: {:?}", e.event);
//!     Ok(())
//! });
//! hub.send_event(Event::Emergency(EmergencyAlert::new("panic button")), Priority::Critical)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod dispatcher;
mod envelope;
mod error;
mod handler;
mod internal;
mod meta;
mod orchestrator;
mod overflow_policy;
mod priority;
mod processor;
mod queue;
mod registry;
mod subscription;

pub mod event;
pub mod transport;

pub use config::Config;
pub use dispatcher::{DispatchLoop, DispatchState, TickReport};
pub use envelope::Envelope;
pub use error::Error;
pub use event::{Event, EventKind};
pub use handler::Handler;
pub use meta::Meta;
pub use orchestrator::{ConnectionStatus, Orchestrator};
pub use overflow_policy::OverflowPolicy;
pub use priority::Priority;
pub use processor::{Processor, ProcessorTable};
pub use queue::EventQueue;
pub use registry::{NotifyReport, SubscriptionRegistry};
pub use subscription::Subscription;
pub use transport::{ChannelTransport, ChannelTransportHandle, EventSink, LocalTransport, Transport};

pub type Result<T = ()> = std::result::Result<T, Error>;
pub type EnvelopeId = u128;

/// Identifier returned by [`Orchestrator::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}
