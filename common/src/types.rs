use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sensor::SensorReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Off,
    Heat,
    Cool,
}

impl OperatingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Cool => "cool",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanMode {
    Auto,
    On,
}

impl FanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::On => "on",
        }
    }
}

/// Composite status derived each tick from actuator state, in priority
/// order: Error > Hold > Heating/Cooling > Fan > Off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Off,
    Heating,
    Cooling,
    Fan,
    Hold,
    Error,
}

impl SystemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heating => "heating",
            Self::Cooling => "cooling",
            Self::Fan => "fan",
            Self::Hold => "hold",
            Self::Error => "error",
        }
    }
}

/// A single-token command accepted by `POST /button`.
///
/// Any token that is not one of the fixed buttons is treated as a sensor
/// name; the registry decides whether it exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    TargetUp,
    TargetDown,
    FanAuto,
    FanOn,
    ModeCool,
    ModeHeat,
    ModeOff,
    ToggleSensor(String),
}

impl Button {
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() || token.split_whitespace().count() != 1 {
            return None;
        }
        Some(match token {
            "up" => Self::TargetUp,
            "down" => Self::TargetDown,
            "auto" => Self::FanAuto,
            "on" => Self::FanOn,
            "cool" => Self::ModeCool,
            "heat" => Self::ModeHeat,
            "off" => Self::ModeOff,
            _ => Self::ToggleSensor(token.to_string()),
        })
    }
}

/// Full response body for `GET /state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    pub mode: OperatingMode,
    #[serde(rename = "fanMode")]
    pub fan_mode: FanMode,
    #[serde(rename = "targetTemp")]
    pub target_temp: i32,
    #[serde(rename = "averageTemp")]
    pub average_temp: Option<f64>,
    pub status: SystemStatus,
    #[serde(rename = "dutyCycle1h")]
    pub duty_cycle_1h: f64,
    #[serde(rename = "dutyCycle24h")]
    pub duty_cycle_24h: f64,
    #[serde(rename = "currentRunMs")]
    pub current_run_ms: u64,
    #[serde(rename = "lastRunMs")]
    pub last_run_ms: u64,
    #[serde(rename = "holdActive")]
    pub hold_active: bool,
    pub sensors: BTreeMap<String, SensorReading>,
    #[serde(rename = "lastUpdate")]
    pub last_update: String,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn fixed_buttons_match_their_exact_tokens() {
        assert_eq!(Button::parse("up"), Some(Button::TargetUp));
        assert_eq!(Button::parse("down"), Some(Button::TargetDown));
        assert_eq!(Button::parse("auto"), Some(Button::FanAuto));
        assert_eq!(Button::parse("on"), Some(Button::FanOn));
        assert_eq!(Button::parse("cool"), Some(Button::ModeCool));
        assert_eq!(Button::parse("heat"), Some(Button::ModeHeat));
        assert_eq!(Button::parse("off"), Some(Button::ModeOff));
    }

    #[test]
    fn fixed_button_matching_is_case_sensitive() {
        // Differently-cased tokens fall through to sensor-name handling,
        // where an unregistered name is rejected at the API boundary.
        assert_eq!(
            Button::parse("Up"),
            Some(Button::ToggleSensor("Up".to_string()))
        );
        assert_eq!(
            Button::parse("HEAT"),
            Some(Button::ToggleSensor("HEAT".to_string()))
        );
    }

    #[test]
    fn other_tokens_name_a_sensor() {
        assert_eq!(
            Button::parse("bedroom"),
            Some(Button::ToggleSensor("bedroom".to_string()))
        );
        assert_eq!(
            Button::parse("  basement \n"),
            Some(Button::ToggleSensor("basement".to_string()))
        );
    }

    #[test]
    fn empty_or_multi_token_bodies_are_rejected() {
        assert_eq!(Button::parse(""), None);
        assert_eq!(Button::parse("   "), None);
        assert_eq!(Button::parse("up down"), None);
    }
}
