use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::Context;
use homeclimate_common::{
    ActuatorBank, ControlConfig, ControlEngine, RuntimeConfig, SensorRegistry, SensorSource,
};
use rumqttc::{AsyncClient, MqttOptions};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::api::{self, ApiState};
use crate::bridge;
use crate::poller::{self, Probe};
use crate::relay::LogRelay;
use crate::store::StateStore;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::var("HOMECLIMATE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.homeclimate"));

    let config = load_runtime_config(&data_dir.join("config.json")).await;

    let mut registry = SensorRegistry::new(config.control.stale_timeout_ms);
    for spec in &config.sensors {
        registry
            .register(&spec.name, config.control.window_size)
            .with_context(|| format!("invalid sensor configuration for {:?}", spec.name))?;
    }
    let registry = Arc::new(registry);

    let store = StateStore::load(data_dir.join("state.json")).await;

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or_else(|_| config.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.mqtt_port);
    let mqtt_options = MqttOptions::new("homeclimate-controller", mqtt_host, mqtt_port);
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let topics: HashSet<String> = config
        .sensors
        .iter()
        .filter_map(|spec| match &spec.source {
            SensorSource::Subscribed { topic } => Some(topic.clone()),
            _ => None,
        })
        .collect();

    let (reconnect_tx, reconnect_rx) = mpsc::channel(8);
    bridge::spawn_bridge(
        Arc::clone(&registry),
        mqtt,
        eventloop,
        topics,
        reconnect_rx,
    );

    for spec in &config.sensors {
        match &spec.source {
            SensorSource::File { path } => poller::spawn_poller(
                spec.name.clone(),
                Probe::File { path: path.clone() },
                Arc::clone(&registry),
                config.control.clone(),
            ),
            SensorSource::Command { command } => poller::spawn_poller(
                spec.name.clone(),
                Probe::Command {
                    command: command.clone(),
                },
                Arc::clone(&registry),
                config.control.clone(),
            ),
            SensorSource::Subscribed { .. } => bridge::spawn_watchdog(
                spec.name.clone(),
                Arc::clone(&registry),
                reconnect_tx.clone(),
                config.control.clone(),
            ),
        }
    }

    spawn_control_loop(Arc::clone(&registry), store.clone(), config.control.clone());

    let app = api::router(ApiState { registry, store });
    let port = std::env::var("HOMECLIMATE_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = format!("0.0.0.0:{port}")
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind command api at {addr}"))?;

    info!("command api listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// The control tick: read averages, decide, actuate, update the ledger,
/// persist on its own slower cadence. One loop, strictly sequential; a
/// sample arriving mid-tick is picked up on the next one.
fn spawn_control_loop(registry: Arc<SensorRegistry>, store: StateStore, control: ControlConfig) {
    tokio::spawn(async move {
        let actuators = ActuatorBank::new(
            Box::new(LogRelay::new("heat")),
            Box::new(LogRelay::new("cool")),
            Box::new(LogRelay::new("fan")),
        );
        let mut engine = ControlEngine::new(control.clone(), actuators);
        let mut interval = tokio::time::interval(Duration::from_millis(control.tick_interval_ms));
        let mut last_persist_ms = monotonic_ms();

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();
            let average = registry.average_for_control(now_ms);
            store.apply(|state| engine.tick(now_ms, average, state)).await;

            if now_ms.saturating_sub(last_persist_ms) >= control.persist_interval_ms {
                last_persist_ms = now_ms;
                if let Err(err) = store.persist().await {
                    warn!("state persist failed: {err:#}");
                }
            }
        }
    });
}

async fn load_runtime_config(path: &Path) -> RuntimeConfig {
    match tokio::fs::read(path).await {
        Ok(raw) => match serde_json::from_slice(&raw) {
            Ok(config) => config,
            Err(err) => {
                warn!("corrupt config {}, using defaults: {err}", path.display());
                RuntimeConfig::default()
            }
        },
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!("no config at {}, using defaults", path.display());
            RuntimeConfig::default()
        }
        Err(err) => {
            warn!("unreadable config {}, using defaults: {err}", path.display());
            RuntimeConfig::default()
        }
    }
}

pub fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
