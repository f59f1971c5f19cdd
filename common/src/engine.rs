use tracing::warn;

use crate::actuator::ActuatorBank;
use crate::config::{ControlConfig, ControlState};
use crate::ledger::{DutyCycleLedger, DAY_MS, HOUR_MS};
use crate::types::{FanMode, OperatingMode, SystemStatus};

/// The hysteresis state machine. Consumes the house-average temperature and
/// the user-set mode/target each tick, drives the actuator bank, and keeps
/// the duty-cycle ledger and run timers.
///
/// All timing is injected as monotonic `now_ms`; the engine itself never
/// reads a clock, which keeps every transition deterministic under test.
pub struct ControlEngine {
    config: ControlConfig,
    actuators: ActuatorBank,
    ledger: DutyCycleLedger,
    run_started_ms: Option<u64>,
}

impl ControlEngine {
    pub fn new(config: ControlConfig, actuators: ActuatorBank) -> Self {
        Self {
            config,
            actuators,
            ledger: DutyCycleLedger::new(),
            run_started_ms: None,
        }
    }

    /// One control tick: decide transitions, derive composite status,
    /// update the ledger. Strictly sequential; the caller guarantees ticks
    /// never overlap by running them from a single loop under the state
    /// store's lock.
    pub fn tick(&mut self, now_ms: u64, average: Option<f64>, state: &mut ControlState) {
        state.average_temp = average;

        let Some(average) = average else {
            // Insufficient data: never actuate blind.
            self.actuators.heat.turn_off();
            self.actuators.cool.turn_off();
            state.status = SystemStatus::Error;
            warn!("no eligible sensor data, heat and cool forced off");
            self.finish_tick(now_ms, state, false);
            return;
        };

        let target = f64::from(state.target_temp);
        let on_hold = now_ms < state.hold_until_ms;

        match state.mode {
            OperatingMode::Off => {
                self.actuators.heat.turn_off();
                self.actuators.cool.turn_off();
            }
            OperatingMode::Heat => {
                self.actuators.cool.turn_off();
                if self.actuators.heat.is_on() {
                    // Overuse hold forces a running actuator off, checked
                    // ahead of the normal off threshold.
                    if on_hold || average >= target + self.config.margin {
                        self.actuators.heat.turn_off();
                    }
                } else if average <= target - self.config.margin && !on_hold {
                    self.actuators.heat.turn_on();
                }
            }
            OperatingMode::Cool => {
                self.actuators.heat.turn_off();
                if self.actuators.cool.is_on() {
                    if on_hold || average <= target - self.config.margin {
                        self.actuators.cool.turn_off();
                    }
                } else if average >= target + self.config.margin && !on_hold {
                    self.actuators.cool.turn_on();
                }
            }
        }

        match state.fan_mode {
            FanMode::Auto => self.actuators.fan.turn_off(),
            FanMode::On => self.actuators.fan.turn_on(),
        }

        state.status = if on_hold {
            SystemStatus::Hold
        } else if self.actuators.heat.is_on() {
            SystemStatus::Heating
        } else if self.actuators.cool.is_on() {
            SystemStatus::Cooling
        } else if self.actuators.fan.is_on() {
            SystemStatus::Fan
        } else {
            SystemStatus::Off
        };

        let active = self.actuators.heat.is_on() || self.actuators.cool.is_on();
        self.finish_tick(now_ms, state, active);
    }

    /// Ledger, duty percentages, run timers, and the overuse safety valve.
    fn finish_tick(&mut self, now_ms: u64, state: &mut ControlState, active: bool) {
        self.ledger.record(now_ms, active);
        state.duty_cycle_1h = self.ledger.duty_percent(now_ms, HOUR_MS);
        state.duty_cycle_24h = self.ledger.duty_percent(now_ms, DAY_MS);

        match (self.run_started_ms, active) {
            (None, true) => {
                self.run_started_ms = Some(now_ms);
                state.current_run_ms = 0;
            }
            (Some(start), true) => {
                state.current_run_ms = now_ms.saturating_sub(start);
            }
            (Some(_), false) => {
                state.last_run_ms = state.current_run_ms;
                state.current_run_ms = 0;
                self.run_started_ms = None;
            }
            (None, false) => {}
        }

        // A sparse ledger reads 100% trivially; require an hour of coverage.
        if state.duty_cycle_1h > self.config.overuse_duty_threshold
            && self.ledger.span_ms(now_ms) >= HOUR_MS
        {
            state.hold_until_ms = now_ms + self.config.hold_ms;
            warn!(
                duty_cycle_1h = state.duty_cycle_1h,
                "sustained continuous operation, arming overuse hold"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::actuator::testing::FakeActuator;

    struct Harness {
        engine: ControlEngine,
        state: ControlState,
        heat: Arc<AtomicBool>,
        cool: Arc<AtomicBool>,
        fan: Arc<AtomicBool>,
    }

    impl Harness {
        fn new() -> Self {
            let heat = FakeActuator::new();
            let cool = FakeActuator::new();
            let fan = FakeActuator::new();
            let lines = (heat.line(), cool.line(), fan.line());
            let bank = ActuatorBank::new(Box::new(heat), Box::new(cool), Box::new(fan));
            Self {
                engine: ControlEngine::new(ControlConfig::default(), bank),
                state: ControlState::default(),
                heat: lines.0,
                cool: lines.1,
                fan: lines.2,
            }
        }

        fn tick(&mut self, now_ms: u64, average: Option<f64>) {
            self.engine.tick(now_ms, average, &mut self.state);
        }

        fn heat_on(&self) -> bool {
            self.heat.load(Ordering::SeqCst)
        }

        fn cool_on(&self) -> bool {
            self.cool.load(Ordering::SeqCst)
        }

        fn fan_on(&self) -> bool {
            self.fan.load(Ordering::SeqCst)
        }
    }

    fn heat_mode_harness() -> Harness {
        let mut h = Harness::new();
        h.state.mode = OperatingMode::Heat;
        h.state.target_temp = 68;
        h
    }

    #[test]
    fn heat_turns_on_only_at_the_inclusive_lower_margin() {
        let mut h = heat_mode_harness();

        h.tick(0, Some(67.6));
        assert!(!h.heat_on(), "67.6 is inside the deadband");

        h.tick(5_000, Some(67.5));
        assert!(h.heat_on(), "67.5 meets target - margin");
        assert_eq!(h.state.status, SystemStatus::Heating);
    }

    #[test]
    fn readings_colder_than_the_margin_also_turn_heat_on() {
        let mut h = heat_mode_harness();
        h.tick(0, Some(67.4));
        assert!(h.heat_on());
    }

    #[test]
    fn heat_turns_off_only_at_the_inclusive_upper_margin() {
        let mut h = heat_mode_harness();
        h.tick(0, Some(67.0));
        assert!(h.heat_on());

        h.tick(5_000, Some(68.4));
        assert!(h.heat_on(), "68.4 is inside the deadband");

        h.tick(10_000, Some(68.5));
        assert!(!h.heat_on(), "68.5 meets target + margin");
        assert_eq!(h.state.status, SystemStatus::Off);
    }

    #[test]
    fn cool_mode_is_symmetric() {
        let mut h = Harness::new();
        h.state.mode = OperatingMode::Cool;
        h.state.target_temp = 68;

        h.tick(0, Some(68.4));
        assert!(!h.cool_on());

        h.tick(5_000, Some(68.5));
        assert!(h.cool_on());
        assert_eq!(h.state.status, SystemStatus::Cooling);

        h.tick(10_000, Some(67.6));
        assert!(h.cool_on());

        h.tick(15_000, Some(67.5));
        assert!(!h.cool_on());
    }

    #[test]
    fn average_inside_the_deadband_never_toggles() {
        // 66 + 70 + 68 averages to exactly the 68 target.
        let mut h = heat_mode_harness();
        h.tick(0, Some(68.0));
        assert!(!h.heat_on());

        h.tick(5_000, Some(67.0));
        assert!(h.heat_on());
        h.tick(10_000, Some(68.0));
        assert!(h.heat_on(), "deadband must not turn a running actuator off");
    }

    #[test]
    fn missing_average_forces_actuators_off_and_reports_error() {
        let mut h = heat_mode_harness();
        h.tick(0, Some(60.0));
        assert!(h.heat_on());

        h.tick(5_000, None);
        assert!(!h.heat_on());
        assert!(!h.cool_on());
        assert_eq!(h.state.status, SystemStatus::Error);
        assert_eq!(h.state.average_temp, None);
    }

    #[test]
    fn mode_off_forces_both_actuators_off() {
        let mut h = heat_mode_harness();
        h.tick(0, Some(60.0));
        assert!(h.heat_on());

        h.state.mode = OperatingMode::Off;
        h.tick(5_000, Some(60.0));
        assert!(!h.heat_on());
        assert!(!h.cool_on());
        assert_eq!(h.state.status, SystemStatus::Off);
    }

    #[test]
    fn fan_follows_fan_mode_independently() {
        let mut h = heat_mode_harness();
        h.state.fan_mode = FanMode::On;
        h.tick(0, Some(68.0));
        assert!(h.fan_on());
        assert!(!h.heat_on());
        assert_eq!(h.state.status, SystemStatus::Fan);

        h.state.fan_mode = FanMode::Auto;
        h.tick(5_000, Some(68.0));
        assert!(!h.fan_on());
        assert_eq!(h.state.status, SystemStatus::Off);
    }

    #[test]
    fn hold_suppresses_turning_on_until_expiry() {
        let mut h = heat_mode_harness();
        h.state.hold_until_ms = 100_000;

        h.tick(50_000, Some(60.0));
        assert!(!h.heat_on(), "hold gates turn-on even below the margin");
        assert_eq!(h.state.status, SystemStatus::Hold);

        h.tick(100_000, Some(60.0));
        assert!(h.heat_on(), "hold expired, normal hysteresis resumes");
    }

    #[test]
    fn hold_forces_off_a_running_actuator() {
        let mut h = heat_mode_harness();
        h.tick(0, Some(60.0));
        assert!(h.heat_on());

        h.state.hold_until_ms = 200_000;
        h.tick(5_000, Some(60.0));
        assert!(!h.heat_on());
        assert_eq!(h.state.status, SystemStatus::Hold);
    }

    #[test]
    fn fully_active_hour_arms_the_overuse_hold() {
        let mut h = heat_mode_harness();
        // Cold house, heat runs every 5s tick for a full hour.
        let mut now = 0u64;
        for _ in 0..=720 {
            h.tick(now, Some(60.0));
            now += 5_000;
        }
        assert_eq!(h.state.duty_cycle_1h, 100.0);
        assert!(h.state.hold_until_ms > now - 5_000);

        // The armed hold takes the actuator down on the next tick.
        h.tick(now, Some(60.0));
        assert!(!h.heat_on());
        assert_eq!(h.state.status, SystemStatus::Hold);
    }

    #[test]
    fn run_timers_track_continuous_operation() {
        let mut h = heat_mode_harness();
        h.tick(0, Some(60.0));
        assert!(h.heat_on());
        assert_eq!(h.state.current_run_ms, 0);

        h.tick(5_000, Some(60.0));
        h.tick(10_000, Some(60.0));
        assert_eq!(h.state.current_run_ms, 10_000);

        h.tick(15_000, Some(69.0));
        assert!(!h.heat_on());
        assert_eq!(h.state.last_run_ms, 10_000);
        assert_eq!(h.state.current_run_ms, 0);
    }

    #[test]
    fn error_ticks_count_as_inactive_in_the_ledger() {
        let mut h = heat_mode_harness();
        h.tick(0, Some(60.0));
        assert_eq!(h.state.duty_cycle_1h, 100.0);

        h.tick(5_000, None);
        assert_eq!(h.state.duty_cycle_1h, 50.0);
    }

    #[test]
    fn heat_mode_forces_cool_off_and_vice_versa() {
        let mut h = Harness::new();
        h.state.mode = OperatingMode::Cool;
        h.state.target_temp = 68;
        h.tick(0, Some(75.0));
        assert!(h.cool_on());

        h.state.mode = OperatingMode::Heat;
        h.tick(5_000, Some(75.0));
        assert!(!h.cool_on());
        assert!(!h.heat_on());
    }
}
