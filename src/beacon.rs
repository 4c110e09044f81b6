/// Liveness beacon toggled on a fixed cadence
use log::{debug, warn};

use crate::gpio::DigitalOutput;
use crate::models::{Channel, Value};
use crate::telemetry::Telemetry;

#[derive(Debug)]
pub struct LivenessBeacon {
    pin: u32,
    state: bool,
}

impl LivenessBeacon {
    pub fn new(pin: u32) -> Self {
        Self { pin, state: false }
    }

    pub fn state(&self) -> bool {
        self.state
    }

    /// Flip the state and mirror it to the pin and the watchdog channel
    pub fn toggle<O, T>(&mut self, output: &mut O, telemetry: &mut T)
    where
        O: DigitalOutput + ?Sized,
        T: Telemetry + ?Sized,
    {
        self.state = !self.state;
        debug!("Watchdog {}", if self.state { "on" } else { "off" });

        if let Err(e) = output.set_output(self.pin, self.state) {
            warn!("Failed to drive watchdog pin {}: {}", self.pin, e);
        }
        telemetry.publish(Channel::Watchdog, Value::Flag(self.state));
    }
}
