use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown sensor {0:?}")]
    UnknownSensor(String),
    #[error("sensor {0:?} is already registered")]
    DuplicateSensor(String),
}

/// Per-sensor view published in the state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature: Option<f64>,
    pub eligible: bool,
}

/// Rolling-window state for one sensor. Owned by the registry; mutated by
/// the sensor's own poller or event handler, read by the control tick.
#[derive(Debug)]
pub struct SensorState {
    window: VecDeque<f64>,
    capacity: usize,
    last_sample_ms: Option<u64>,
    use_for_control: bool,
    stale_logged: bool,
}

impl SensorState {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            last_sample_ms: None,
            use_for_control: true,
            stale_logged: false,
        }
    }

    pub fn add_sample(&mut self, value: f64, now_ms: u64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
        self.last_sample_ms = Some(now_ms);
        self.stale_logged = false;
    }

    /// Arithmetic mean of the current window; `None` when empty, never zero.
    pub fn average(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    pub fn last_sample_ms(&self) -> Option<u64> {
        self.last_sample_ms
    }

    pub fn use_for_control(&self) -> bool {
        self.use_for_control
    }

    fn is_stale(&self, now_ms: u64, timeout_ms: u64) -> bool {
        match self.last_sample_ms {
            Some(last) => now_ms.saturating_sub(last) > timeout_ms,
            None => true,
        }
    }

    /// Withdraws the sensor's contribution once it has gone quiet. The
    /// sensor stays registered and recovers on its next sample.
    fn expire_if_stale(&mut self, name: &str, now_ms: u64, timeout_ms: u64) {
        if !self.is_stale(now_ms, timeout_ms) {
            return;
        }
        if !self.window.is_empty() || (self.last_sample_ms.is_some() && !self.stale_logged) {
            if !self.stale_logged {
                warn!("sensor {name} is stale, withdrawing its readings");
                self.stale_logged = true;
            }
            self.window.clear();
        }
    }
}

/// Owns every sensor for the daemon's lifetime. The map is fixed at startup;
/// each sensor carries its own lock so independent pollers never contend.
/// Locks are only ever held for the few instructions of a read or append.
pub struct SensorRegistry {
    sensors: HashMap<String, Mutex<SensorState>>,
    stale_timeout_ms: u64,
}

impl SensorRegistry {
    pub fn new(stale_timeout_ms: u64) -> Self {
        Self {
            sensors: HashMap::new(),
            stale_timeout_ms,
        }
    }

    pub fn register(&mut self, name: &str, window_size: usize) -> Result<(), RegistryError> {
        if self.sensors.contains_key(name) {
            return Err(RegistryError::DuplicateSensor(name.to_string()));
        }
        self.sensors
            .insert(name.to_string(), Mutex::new(SensorState::new(window_size)));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sensors.contains_key(name)
    }

    pub fn record_sample(&self, name: &str, value: f64, now_ms: u64) -> Result<(), RegistryError> {
        let sensor = self
            .sensors
            .get(name)
            .ok_or_else(|| RegistryError::UnknownSensor(name.to_string()))?;
        sensor
            .lock()
            .expect("sensor lock poisoned")
            .add_sample(value, now_ms);
        Ok(())
    }

    pub fn last_sample_ms(&self, name: &str) -> Result<Option<u64>, RegistryError> {
        let sensor = self
            .sensors
            .get(name)
            .ok_or_else(|| RegistryError::UnknownSensor(name.to_string()))?;
        Ok(sensor.lock().expect("sensor lock poisoned").last_sample_ms())
    }

    pub fn toggle_eligibility(&self, name: &str) -> Result<bool, RegistryError> {
        let sensor = self
            .sensors
            .get(name)
            .ok_or_else(|| RegistryError::UnknownSensor(name.to_string()))?;
        let mut sensor = sensor.lock().expect("sensor lock poisoned");
        sensor.use_for_control = !sensor.use_for_control;
        Ok(sensor.use_for_control)
    }

    /// Unweighted mean over eligible, non-stale sensors. Stale sensors are
    /// expired (window cleared, displayed value withdrawn) as a side effect.
    pub fn average_for_control(&self, now_ms: u64) -> Option<f64> {
        let mut values = Vec::with_capacity(self.sensors.len());
        for (name, sensor) in &self.sensors {
            let mut sensor = sensor.lock().expect("sensor lock poisoned");
            sensor.expire_if_stale(name, now_ms, self.stale_timeout_ms);
            if !sensor.use_for_control {
                continue;
            }
            if let Some(average) = sensor.average() {
                values.push(average);
            }
        }
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Per-sensor snapshot for the state document. A stale sensor shows an
    /// unknown temperature.
    pub fn readings(&self, now_ms: u64) -> BTreeMap<String, SensorReading> {
        self.sensors
            .iter()
            .map(|(name, sensor)| {
                let mut sensor = sensor.lock().expect("sensor lock poisoned");
                sensor.expire_if_stale(name, now_ms, self.stale_timeout_ms);
                (
                    name.clone(),
                    SensorReading {
                        temperature: sensor.average(),
                        eligible: sensor.use_for_control,
                    },
                )
            })
            .collect()
    }
}
