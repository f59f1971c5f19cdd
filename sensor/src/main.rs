use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use homeclimate_common::{celsius_to_fahrenheit, parse_w1_reading};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{info, warn};

const W1_BUS_DIR: &str = "/sys/devices/w1_bus_master1";
const TOPIC: &str = "temperature";

/// Standalone probe publisher: reads the local one-wire sensor and
/// publishes `temperature <name> <value>` to the message bus on a fixed
/// cadence. The controller's bridge consumes these on the other end.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let name = sensor_name();
    let device = find_device().await?;
    info!("found temp sensor {}", device.display());

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(1883);
    let mqtt_options = MqttOptions::new(format!("homeclimate-sensor-{name}"), mqtt_host, mqtt_port);
    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);

    tokio::spawn(async move {
        loop {
            if let Err(err) = eventloop.poll().await {
                warn!("sensor mqtt poll error: {err}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    info!("sensor publisher started as {name}");
    let mut interval = tokio::time::interval(Duration::from_secs(5));

    loop {
        interval.tick().await;

        let raw = match tokio::fs::read(&device).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!("device read failed, skipping sample: {err}");
                continue;
            }
        };
        let celsius = match parse_w1_reading(&raw) {
            Ok(celsius) => celsius,
            Err(err) => {
                warn!("bad reading, skipping sample: {err}");
                continue;
            }
        };

        let payload = format!("{TOPIC} {name} {:.3}", celsius_to_fahrenheit(celsius));
        if let Err(err) = mqtt.publish(TOPIC, QoS::AtMostOnce, false, payload).await {
            warn!("publish failed: {err}");
        }
    }
}

fn sensor_name() -> String {
    if let Ok(name) = std::env::var("HOMECLIMATE_SENSOR_NAME") {
        return name;
    }
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "probe".to_string())
}

/// Scans the one-wire bus until a DS18B20 (family 28) shows up; probes can
/// power up before the bus enumerates.
async fn find_device() -> anyhow::Result<PathBuf> {
    if let Ok(path) = std::env::var("HOMECLIMATE_W1_DEVICE") {
        return Ok(PathBuf::from(path));
    }
    loop {
        let mut entries = tokio::fs::read_dir(W1_BUS_DIR)
            .await
            .with_context(|| format!("listing {W1_BUS_DIR}"))?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with("28-") {
                return Ok(entry.path().join("w1_slave"));
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
