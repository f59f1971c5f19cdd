use serde::{Deserialize, Serialize};

use crate::types::{FanMode, OperatingMode, SystemStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    pub tick_interval_ms: u64,
    pub margin: f64,
    pub window_size: usize,
    pub stale_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub hold_ms: u64,
    pub persist_interval_ms: u64,
    /// Trailing-1h duty percentage above which an overuse hold is armed.
    pub overuse_duty_threshold: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            margin: 0.5,
            window_size: 5,
            stale_timeout_ms: 60_000,
            poll_interval_ms: 5_000,
            poll_timeout_ms: 10_000,
            hold_ms: 300_000,
            persist_interval_ms: 300_000,
            overuse_duty_threshold: 99.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SensorSource {
    /// Local one-wire device file, read directly.
    File { path: String },
    /// Remote probe reached by running a shell command (typically ssh).
    Command { command: String },
    /// Probe that publishes readings over the message bus.
    Subscribed { topic: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSpec {
    pub name: String,
    pub source: SensorSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub sensors: Vec<SensorSpec>,
    #[serde(default = "default_mqtt_host")]
    pub mqtt_host: String,
    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,
}

fn default_mqtt_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            sensors: Vec::new(),
            mqtt_host: default_mqtt_host(),
            mqtt_port: default_mqtt_port(),
        }
    }
}

/// The daemon's entire durable memory. Mutated by the control engine every
/// tick and by the command API on user input, flushed to disk on a fixed
/// interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub mode: OperatingMode,
    pub fan_mode: FanMode,
    pub target_temp: i32,
    pub average_temp: Option<f64>,
    pub status: SystemStatus,
    pub duty_cycle_1h: f64,
    pub duty_cycle_24h: f64,
    pub current_run_ms: u64,
    pub last_run_ms: u64,
    pub hold_until_ms: u64,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            mode: OperatingMode::Off,
            fan_mode: FanMode::Auto,
            target_temp: 70,
            average_temp: None,
            status: SystemStatus::Off,
            duty_cycle_1h: 0.0,
            duty_cycle_24h: 0.0,
            current_run_ms: 0,
            last_run_ms: 0,
            hold_until_ms: 0,
        }
    }
}
