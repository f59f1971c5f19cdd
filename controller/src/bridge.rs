use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use homeclimate_common::{ControlConfig, SensorRegistry};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, QoS};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::daemon::monotonic_ms;

const MAX_PAYLOAD_BYTES: usize = 512;

/// Single subscriber loop routing bus events to the registry.
///
/// Every failure here is local: a bad message is logged and discarded, a
/// broken connection is retried, and the control loop never waits on any
/// of it. Watchdogs request reconnects over `reconnect_rx` when their
/// sensor has gone quiet for half the staleness timeout.
pub fn spawn_bridge(
    registry: Arc<SensorRegistry>,
    client: AsyncClient,
    mut eventloop: EventLoop,
    topics: HashSet<String>,
    mut reconnect_rx: mpsc::Receiver<String>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Incoming::Publish(message))) => {
                        route_message(&registry, &topics, &message.payload);
                    }
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("message bus connected, subscribing");
                        for topic in &topics {
                            if let Err(err) = client.subscribe(topic, QoS::AtMostOnce).await {
                                warn!("subscribe to {topic} failed: {err}");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!("message bus poll error: {err}");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                },
                Some(sensor) = reconnect_rx.recv() => {
                    warn!("forcing bus reconnect on behalf of sensor {sensor}");
                    if let Err(err) = client.disconnect().await {
                        warn!("bus disconnect failed: {err}");
                    }
                }
            }
        }
    });
}

/// Decodes a `topic name value` payload and routes it to the named sensor.
/// Malformed or unknown input is logged and dropped, never escalated.
fn route_message(registry: &SensorRegistry, topics: &HashSet<String>, payload: &[u8]) {
    if payload.len() > MAX_PAYLOAD_BYTES {
        warn!("dropping oversized bus payload ({} bytes)", payload.len());
        return;
    }
    let Ok(text) = std::str::from_utf8(payload) else {
        warn!("dropping non-utf8 bus payload");
        return;
    };

    let mut parts = text.split_whitespace();
    let (Some(topic), Some(name), Some(value), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        warn!("dropping malformed bus payload {text:?}");
        return;
    };

    if !topics.contains(topic) {
        warn!("dropping bus payload with unexpected topic {topic:?}");
        return;
    }
    let Ok(value) = value.parse::<f64>() else {
        warn!("dropping non-numeric reading {value:?} for sensor {name}");
        return;
    };
    if !value.is_finite() {
        warn!("dropping non-finite reading for sensor {name}");
        return;
    }

    if let Err(err) = registry.record_sample(name, value, monotonic_ms()) {
        warn!("dropping bus reading: {err}");
    }
}

/// Per-subscribed-sensor freshness watchdog. A silently-dropped connection
/// looks like a quiet sensor; kicking the shared subscription well before
/// the staleness timeout gives it a chance to recover unnoticed.
pub fn spawn_watchdog(
    name: String,
    registry: Arc<SensorRegistry>,
    reconnect_tx: mpsc::Sender<String>,
    config: ControlConfig,
) {
    tokio::spawn(async move {
        let threshold_ms = config.stale_timeout_ms / 2;
        let mut last_kick_ms = 0u64;
        let mut interval = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();
            let last_sample_ms = match registry.last_sample_ms(&name) {
                Ok(last) => last.unwrap_or(0),
                Err(err) => {
                    warn!("watchdog for sensor {name} stopping: {err}");
                    return;
                }
            };

            if now_ms.saturating_sub(last_sample_ms) > threshold_ms
                && now_ms.saturating_sub(last_kick_ms) > threshold_ms
            {
                last_kick_ms = now_ms;
                if reconnect_tx.send(name.clone()).await.is_err() {
                    warn!("watchdog for sensor {name} lost the bridge, stopping");
                    return;
                }
            }
        }
    });
}
