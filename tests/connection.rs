use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use sentinel::{
    ChannelTransport, Config, Envelope, Error, Event, EventKind, EventSink, Orchestrator, Priority,
    Result, Transport,
    event::{BiometricReading, EmergencyAlert},
};
use tokio::time::Instant;

/// Fails the first `failures` connect attempts, then succeeds.
struct FlakyTransport {
    failures: u32,
    attempts: Arc<AtomicU32>,
}

impl FlakyTransport {
    fn new(failures: u32) -> (Self, Arc<AtomicU32>) {
        let attempts = Arc::new(AtomicU32::new(0));
        (
            Self {
                failures,
                attempts: attempts.clone(),
            },
            attempts,
        )
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn connect(&self, _sink: EventSink) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            Err(Error::transport("handshake refused"))
        } else {
            Ok(())
        }
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_gives_up_after_five_failures() {
    let (transport, attempts) = FlakyTransport::new(u32::MAX);
    let hub = Orchestrator::new(Config::default(), transport);

    let start = Instant::now();
    let result = hub.connect().await;
    assert!(matches!(result, Err(Error::ConnectFailed { attempts: 5 })));
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
    // 2s + 4s + 6s + 8s between the five attempts, none after the last
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(20) && elapsed < Duration::from_secs(21));
    assert!(!hub.status().connected);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_connect_succeeds_after_transient_failures() {
    let (transport, attempts) = FlakyTransport::new(2);
    let hub = Orchestrator::new(Config::default(), transport);

    let start = Instant::now();
    hub.connect().await.unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    assert!(hub.status().connected);

    hub.connect().await.unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    hub.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_send_event_fails_when_connect_fails() {
    let (transport, _) = FlakyTransport::new(u32::MAX);
    let hub = Orchestrator::new(
        Config::default().with_max_connect_attempts(2),
        transport,
    );
    let result = hub
        .send_event(Event::Emergency(EmergencyAlert::new("sos")), Priority::Critical)
        .await;
    assert!(matches!(result, Err(Error::ConnectFailed { attempts: 2 })));
    assert_eq!(hub.status().queue_size, 0);
}

#[tokio::test(start_paused = true)]
async fn test_channel_transport_delivers_pushed_events() {
    let (transport, handle) = ChannelTransport::new("wearable", 16);
    let hub = Orchestrator::new(Config::default(), transport);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    hub.subscribe(
        EventKind::Biometric.into(),
        move |e: &Envelope| -> Result {
            s.lock().unwrap().push(e.meta.source().to_string());
            Ok(())
        },
    );

    hub.connect().await.unwrap();
    handle
        .send(
            Event::Biometric(BiometricReading {
                heart_rate_bpm: 142,
                ..Default::default()
            }),
            Priority::High,
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(*seen.lock().unwrap(), vec!["wearable".to_string()]);
    hub.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_dropped_channel_handles_report_connection_loss() {
    let (transport, handle) = ChannelTransport::new("wearable", 16);
    let hub = Orchestrator::new(Config::default(), transport);
    let mut status = hub.watch_status();

    hub.connect().await.unwrap();
    assert!(*status.borrow_and_update());

    drop(handle);
    status.changed().await.unwrap();
    assert!(!*status.borrow());
    assert!(!hub.status().connected);
    hub.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_events_sent_while_disconnected_wait_in_channel() {
    let (transport, handle) = ChannelTransport::new("wearable", 4);
    let hub = Orchestrator::new(Config::default(), transport);

    handle
        .try_send(Event::Emergency(EmergencyAlert::new("fall")), Priority::Critical)
        .unwrap();
    assert_eq!(hub.status().queue_size, 0);

    hub.connect().await.unwrap();
    while hub.status().queue_size == 0 {
        tokio::task::yield_now().await;
    }
    hub.disconnect().await.unwrap();
    let report = hub.dispatcher().tick().await;
    assert_eq!(report.delivered, 1);
    assert_eq!(hub.status().queue_size, 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_fails_once_channel_handles_are_gone() {
    let (transport, handle) = ChannelTransport::new("wearable", 16);
    let hub = Orchestrator::new(Config::default().with_max_connect_attempts(2), transport);
    let mut status = hub.watch_status();

    hub.connect().await.unwrap();
    assert!(*status.borrow_and_update());
    drop(handle);
    status.changed().await.unwrap();

    let result = hub
        .send_event(Event::Emergency(EmergencyAlert::new("sos")), Priority::Critical)
        .await;
    assert!(matches!(result, Err(Error::ConnectFailed { attempts: 2 })));
    assert!(!hub.status().connected);
    hub.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_dropping_orchestrator_stops_channel_worker() {
    let (transport, handle) = ChannelTransport::new("wearable", 16);
    let hub = Orchestrator::new(Config::default(), transport);
    hub.connect().await.unwrap();
    assert!(!handle.is_closed());

    drop(hub);
    let stopped = tokio::time::timeout(Duration::from_secs(1), handle.closed()).await;
    assert!(stopped.is_ok());
}
