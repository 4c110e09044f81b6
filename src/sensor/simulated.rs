/// Simulated climate sensor for running without hardware
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::ClimateReading;
use crate::sensor::{Sensor, SensorError};

const START_TEMPERATURE: f32 = 21.0;
const START_HUMIDITY: f32 = 45.0;
const TEMPERATURE_STEP: f32 = 0.2;
const HUMIDITY_STEP: f32 = 0.5;
const LIGHT_MAX: f32 = 1023.0; // 10-bit ADC

/// Random walk around room conditions with occasional failed reads
#[derive(Debug)]
pub struct SimulatedSensor {
    rng: StdRng,
    failure_rate: f64,
    temperature: f32,
    humidity: f32,
}

impl SimulatedSensor {
    pub fn new(failure_rate: f64) -> Self {
        Self::with_rng(StdRng::from_entropy(), failure_rate)
    }

    pub fn with_rng(rng: StdRng, failure_rate: f64) -> Self {
        Self {
            rng,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            temperature: START_TEMPERATURE,
            humidity: START_HUMIDITY,
        }
    }
}

impl Sensor for SimulatedSensor {
    fn read(&mut self) -> Result<ClimateReading, SensorError> {
        if self.rng.gen_bool(self.failure_rate) {
            debug!("Simulated sensor dropped a reading");
            return Err(SensorError::NoData);
        }

        self.temperature += self.rng.gen_range(-TEMPERATURE_STEP..=TEMPERATURE_STEP);
        self.humidity = (self.humidity + self.rng.gen_range(-HUMIDITY_STEP..=HUMIDITY_STEP))
            .clamp(0.0, 100.0);

        Ok(ClimateReading {
            temperature: self.temperature,
            humidity: self.humidity,
        })
    }

    fn read_light(&mut self) -> Option<f32> {
        Some(self.rng.gen_range(0.0..=LIGHT_MAX).round())
    }
}
