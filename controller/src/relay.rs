use homeclimate_common::Actuator;
use tracing::info;

/// Actuator line that records transitions in the log. GPIO output drivers
/// hook in here on deployments with real relay hardware.
pub struct LogRelay {
    name: &'static str,
    on: bool,
}

impl LogRelay {
    pub fn new(name: &'static str) -> Self {
        Self { name, on: false }
    }
}

impl Actuator for LogRelay {
    fn turn_on(&mut self) {
        if !self.on {
            info!("turning on {}", self.name);
            self.on = true;
        }
    }

    fn turn_off(&mut self) {
        if self.on {
            info!("turning off {}", self.name);
            self.on = false;
        }
    }

    fn is_on(&self) -> bool {
        self.on
    }
}
