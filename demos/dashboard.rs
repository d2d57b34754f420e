//! Wires a dashboard-like setup: a simulated wearable pushes readings through
//! a channel transport, processors enrich them, and panels subscribe to the
//! kinds they render.
//!
//! Run with `RUST_LOG=sentinel=debug cargo run --example dashboard`.

use std::{sync::Arc, time::Duration};

use rand::Rng;
use sentinel::{
    ChannelTransport, ChannelTransportHandle, Config, Envelope, Event, EventKind, Handler,
    Orchestrator, Priority, Result, Subscription,
    event::{BiometricReading, EmergencyAlert, EnvironmentalReading, LocationFix},
};
use tracing_subscriber::EnvFilter;

/// Escalates emergencies; stands in for paging a contact.
struct EmergencyPanel;

#[async_trait::async_trait]
impl Handler for EmergencyPanel {
    async fn handle(&self, envelope: Arc<Envelope>) -> Result<()> {
        if let Event::Emergency(alert) = &envelope.event {
            tokio::time::sleep(Duration::from_millis(5)).await;
            println!(
                "!! EMERGENCY ({}) {} {:?}",
                envelope.priority(),
                alert.reason,
                alert.annotations
            );
        }
        Ok(())
    }
}

fn reading() -> (Event, Priority) {
    let mut rng = rand::rng();
    match rng.random_range(0..10) {
        0..=4 => {
            let heart_rate_bpm = rng.random_range(55..190);
            let priority = if heart_rate_bpm > 170 {
                Priority::High
            } else {
                Priority::Low
            };
            let event = Event::Biometric(BiometricReading {
                heart_rate_bpm,
                spo2_percent: rng.random_range(90.0..100.0),
                skin_temp_c: rng.random_range(35.5..38.0),
                ..Default::default()
            });
            (event, priority)
        }
        5..=7 => (
            Event::Location(LocationFix::new(
                40.4168 + rng.random_range(-0.01..0.01),
                -3.7038 + rng.random_range(-0.01..0.01),
                rng.random_range(3.0..25.0),
            )),
            Priority::Medium,
        ),
        8 => (
            Event::Environmental(EnvironmentalReading {
                temperature_c: rng.random_range(10.0..35.0),
                noise_db: rng.random_range(30.0..100.0),
                air_quality_index: rng.random_range(0..200),
                ..Default::default()
            }),
            Priority::Low,
        ),
        _ => (
            Event::Emergency(EmergencyAlert::new("fall detected")),
            Priority::Critical,
        ),
    }
}

async fn wearable(handle: ChannelTransportHandle, count: usize) -> Result<()> {
    for _ in 0..count {
        let (event, priority) = reading();
        handle.send(event, priority).await?;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (transport, handle) = ChannelTransport::new("wearable", 64);
    let hub = Orchestrator::new(
        Config::default().with_handler_timeout(Some(Duration::from_millis(500))),
        transport,
    );

    hub.register_processor(EventKind::Biometric, |event: Event| -> Result<Event> {
        let zone = match &event {
            Event::Biometric(r) if r.heart_rate_bpm > 170 => "critical",
            Event::Biometric(r) if r.heart_rate_bpm > 120 => "elevated",
            _ => "normal",
        };
        Ok(event.annotate("zone", zone))
    });
    hub.register_processor(EventKind::Emergency, |event: Event| -> Result<Event> {
        Ok(event.annotate("escalation", "contacts notified"))
    });

    hub.subscribe(EventKind::Emergency.into(), EmergencyPanel);
    hub.subscribe(EventKind::Biometric.into(), |e: &Envelope| -> Result {
        if let Event::Biometric(r) = &e.event {
            println!("heart {} bpm [{}]", r.heart_rate_bpm, r.annotations["zone"]);
        }
        Ok(())
    });
    let log = hub.subscribe(Subscription::All, |e: &Envelope| -> Result {
        tracing::debug!(kind = %e.kind(), source = e.meta.source(), "panel refresh");
        Ok(())
    });

    hub.connect().await?;
    hub.send_event(
        Event::Emergency(EmergencyAlert::new("manual panic button")),
        Priority::Critical,
    )
    .await?;

    wearable(handle, 50).await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    println!("status: {:?}", hub.status());
    hub.unsubscribe(log);
    hub.disconnect().await
}
