/// Binary output line for one actuator. How the line reaches hardware is
/// the caller's concern; the engine only flips and inspects it.
pub trait Actuator: Send {
    fn turn_on(&mut self);
    fn turn_off(&mut self);
    fn is_on(&self) -> bool;
}

/// The three lines a single-zone installation drives.
pub struct ActuatorBank {
    pub heat: Box<dyn Actuator>,
    pub cool: Box<dyn Actuator>,
    pub fan: Box<dyn Actuator>,
}

impl ActuatorBank {
    pub fn new(heat: Box<dyn Actuator>, cool: Box<dyn Actuator>, fan: Box<dyn Actuator>) -> Self {
        Self { heat, cool, fan }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::Actuator;

    /// Test double sharing its on/off line with the asserting test.
    #[derive(Clone, Default)]
    pub struct FakeActuator {
        on: Arc<AtomicBool>,
    }

    impl FakeActuator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn line(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.on)
        }
    }

    impl Actuator for FakeActuator {
        fn turn_on(&mut self) {
            self.on.store(true, Ordering::SeqCst);
        }

        fn turn_off(&mut self) {
            self.on.store(false, Ordering::SeqCst);
        }

        fn is_on(&self) -> bool {
            self.on.load(Ordering::SeqCst)
        }
    }
}
