use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use homeclimate_common::{celsius_to_fahrenheit, parse_w1_reading, ControlConfig, SensorRegistry};
use tokio::process::Command;
use tracing::{info, warn};

use crate::daemon::monotonic_ms;

/// Raw-reading capability for a command-polled sensor: either a local
/// one-wire device file or a shell command reaching a remote probe.
#[derive(Debug, Clone)]
pub enum Probe {
    File { path: String },
    Command { command: String },
}

impl Probe {
    async fn poll(&self) -> anyhow::Result<Vec<u8>> {
        match self {
            Self::File { path } => tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {path}")),
            Self::Command { command } => {
                let output = Command::new("sh")
                    .arg("-c")
                    .arg(command)
                    .stdin(Stdio::null())
                    .output()
                    .await
                    .with_context(|| format!("running {command:?}"))?;
                if !output.status.success() {
                    bail!("probe command exited with {}", output.status);
                }
                Ok(output.stdout)
            }
        }
    }
}

/// Runs one sensor's poll loop on its own schedule, restarting it if it
/// ever crashes. A hung or failing probe degrades only this sensor.
pub fn spawn_poller(
    name: String,
    probe: Probe,
    registry: Arc<SensorRegistry>,
    config: ControlConfig,
) {
    tokio::spawn(async move {
        loop {
            let handle = tokio::spawn(poll_loop(
                name.clone(),
                probe.clone(),
                Arc::clone(&registry),
                config.clone(),
            ));
            if let Err(err) = handle.await {
                warn!("poller for sensor {name} crashed, restarting: {err}");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    });
}

async fn poll_loop(name: String, probe: Probe, registry: Arc<SensorRegistry>, config: ControlConfig) {
    info!("starting poller for sensor {name}");
    let mut interval = tokio::time::interval(Duration::from_millis(config.poll_interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match poll_once(&name, &probe, config.poll_timeout_ms).await {
            Ok(temp_f) => {
                // Registration happens before any poller starts.
                if let Err(err) = registry.record_sample(&name, temp_f, monotonic_ms()) {
                    warn!("dropping sample for sensor {name}: {err}");
                }
            }
            Err(err) => warn!("poll failed for sensor {name}, skipping sample: {err:#}"),
        }
    }
}

/// One bounded poll: raw bytes, one-wire parse, Celsius to Fahrenheit.
async fn poll_once(name: &str, probe: &Probe, timeout_ms: u64) -> anyhow::Result<f64> {
    let raw = tokio::time::timeout(Duration::from_millis(timeout_ms), probe.poll())
        .await
        .with_context(|| format!("probe for sensor {name} timed out"))??;
    let celsius = parse_w1_reading(&raw)?;
    Ok(celsius_to_fahrenheit(celsius))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn command_probe_parses_a_reading_end_to_end() {
        let probe = Probe::Command {
            command: "printf '4b 46 : crc=4b YES\\n4b 46 t=20000\\n'".to_string(),
        };
        let temp_f = poll_once("test", &probe, 10_000).await.unwrap();
        assert_eq!(temp_f, 68.0);
    }

    #[tokio::test]
    async fn failing_command_reports_an_error() {
        let probe = Probe::Command {
            command: "exit 3".to_string(),
        };
        assert!(poll_once("test", &probe, 10_000).await.is_err());
    }

    #[tokio::test]
    async fn invalid_reading_reports_an_error() {
        let probe = Probe::Command {
            command: "printf 'crc=4b NO\\n'".to_string(),
        };
        assert!(poll_once("test", &probe, 10_000).await.is_err());
    }

    #[tokio::test]
    async fn missing_file_reports_an_error() {
        let probe = Probe::File {
            path: "/nonexistent/w1_slave".to_string(),
        };
        assert!(poll_once("test", &probe, 10_000).await.is_err());
    }
}
