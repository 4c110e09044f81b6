/// Periodic sensor sampling into running-average buffers
use log::{debug, warn};

use crate::buffer::{paired_valid_count, Sample, SampleBuffer};
use crate::models::{CurrentReading, Quantity};
use crate::sensor::Sensor;

/// Bookkeeping for the sampling ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleCycle {
    /// Slot the next sample lands in
    pub write_index: usize,
    /// Ticks since startup, diagnostic only
    pub total_ticks: u64,
}

/// Result of one sampling tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Fresh,
    Missed,
}

/// Owns the current readings, the per-quantity buffers and the error flag
#[derive(Debug, Default)]
pub struct Sampler {
    current: CurrentReading,
    temperature: SampleBuffer,
    humidity: SampleBuffer,
    light: SampleBuffer,
    total_ticks: u64,
    error: bool,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt one read and fold it into the buffers
    ///
    /// A failed read writes a missing sample to every buffer so that old
    /// readings age out after a full buffer's worth of failures. The current
    /// readings keep their last successful values.
    pub fn tick<S: Sensor + ?Sized>(&mut self, sensor: &mut S) -> SampleOutcome {
        self.total_ticks += 1;

        match sensor.read() {
            Ok(reading) => {
                let light = sensor.read_light();
                debug!(
                    "Sample {}: temp={:.2}°C, humidity={:.2}%, light={:?}",
                    self.total_ticks, reading.temperature, reading.humidity, light
                );

                self.current.temperature = Some(reading.temperature);
                self.current.humidity = Some(reading.humidity);
                if light.is_some() {
                    self.current.light = light;
                }

                self.record(Some(reading.temperature), Some(reading.humidity), light);
                self.error = false;
                SampleOutcome::Fresh
            }
            Err(e) => {
                warn!("Sample {} failed: {}", self.total_ticks, e);
                self.record(None, None, None);
                self.error = true;
                SampleOutcome::Missed
            }
        }
    }

    fn record(&mut self, temperature: Sample, humidity: Sample, light: Sample) {
        self.temperature.write(temperature);
        self.humidity.write(humidity);
        self.light.write(light);
    }

    pub fn buffer(&self, quantity: Quantity) -> &SampleBuffer {
        match quantity {
            Quantity::Temperature => &self.temperature,
            Quantity::Humidity => &self.humidity,
            Quantity::Light => &self.light,
        }
    }

    pub fn current(&self, quantity: Quantity) -> Option<f32> {
        self.current.get(quantity)
    }

    pub fn average(&self, quantity: Quantity) -> Option<f32> {
        self.buffer(quantity).mean()
    }

    /// Slots where both temperature and humidity are present
    pub fn sample_count(&self) -> usize {
        paired_valid_count(&self.temperature, &self.humidity)
    }

    /// Whether the most recent tick failed
    pub fn error(&self) -> bool {
        self.error
    }

    pub fn cycle(&self) -> SampleCycle {
        SampleCycle {
            write_index: self.temperature.write_index(),
            total_ticks: self.total_ticks,
        }
    }
}
