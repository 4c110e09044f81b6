//! Fakes shared by unit tests
use std::collections::VecDeque;

use crate::models::{Channel, ClimateReading, Value};
use crate::sensor::{Sensor, SensorError};
use crate::telemetry::Telemetry;

/// Sensor that replays queued outcomes and fails once the queue is empty
#[derive(Debug, Default)]
pub struct ScriptedSensor {
    script: VecDeque<Option<ClimateReading>>,
    light: Option<f32>,
    pub reads: usize,
}

impl ScriptedSensor {
    pub fn failing(count: usize) -> Self {
        let mut sensor = Self::default();
        for _ in 0..count {
            sensor.push_failure();
        }
        sensor
    }

    pub fn with_light(level: f32) -> Self {
        Self {
            light: Some(level),
            ..Self::default()
        }
    }

    pub fn push_reading(&mut self, temperature: f32, humidity: f32) {
        self.script.push_back(Some(ClimateReading {
            temperature,
            humidity,
        }));
    }

    pub fn push_failure(&mut self) {
        self.script.push_back(None);
    }
}

impl Sensor for ScriptedSensor {
    fn read(&mut self) -> Result<ClimateReading, SensorError> {
        self.reads += 1;
        self.script
            .pop_front()
            .flatten()
            .ok_or(SensorError::NoData)
    }

    fn read_light(&mut self) -> Option<f32> {
        self.light
    }
}

/// Telemetry boundary that records every write and serves queued pulls
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    pub published: Vec<(Channel, Value)>,
    pub requests: Vec<Channel>,
}

impl RecordingTelemetry {
    pub fn last(&self, channel: Channel) -> Option<Value> {
        self.published
            .iter()
            .rev()
            .find(|(published, _)| *published == channel)
            .map(|(_, value)| *value)
    }
}

impl Telemetry for RecordingTelemetry {
    fn publish(&mut self, channel: Channel, value: Value) {
        self.published.push((channel, value));
    }

    fn pending_reads(&mut self) -> Vec<Channel> {
        std::mem::take(&mut self.requests)
    }
}
