pub mod actuator;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod parse;
pub mod sensor;
pub mod types;

pub use actuator::{Actuator, ActuatorBank};
pub use config::{ControlConfig, ControlState, RuntimeConfig, SensorSource, SensorSpec};
pub use engine::ControlEngine;
pub use ledger::DutyCycleLedger;
pub use parse::{celsius_to_fahrenheit, parse_w1_reading, ParseError};
pub use sensor::{RegistryError, SensorReading, SensorRegistry, SensorState};
pub use types::{Button, FanMode, OperatingMode, StateDocument, SystemStatus};
