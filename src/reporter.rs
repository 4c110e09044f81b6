/// Maps station state onto telemetry channels
///
/// Each channel has one reader function. Periodic pushes and on-demand pulls
/// both go through the same reader, so a pull always matches what the next
/// push would send.
use log::debug;
use std::collections::HashMap;

use crate::models::{Channel, Quantity, Value};
use crate::sampler::Sampler;
use crate::telemetry::Telemetry;

/// State visible to channel readers
#[derive(Debug, Clone, Copy)]
pub struct Readings<'a> {
    pub sampler: &'a Sampler,
    pub liveness: bool,
}

/// Produces a channel's value, `None` when there is nothing to report yet
pub type Reader = fn(&Readings<'_>) -> Option<Value>;

/// Channels pushed after every sampling tick
pub const SAMPLE_CHANNELS: [Channel; 8] = [
    Channel::CurrentTemperature,
    Channel::CurrentHumidity,
    Channel::CurrentLight,
    Channel::AverageTemperature,
    Channel::AverageHumidity,
    Channel::AverageLight,
    Channel::ErrorIndicator,
    Channel::SampleCount,
];

#[derive(Clone)]
pub struct SignalReporter {
    readers: HashMap<Channel, Reader>,
}

impl SignalReporter {
    /// Reporter with a reader registered for every channel
    pub fn new() -> Self {
        let mut reporter = Self::empty();
        reporter.register(Channel::CurrentTemperature, |r| {
            current(r, Quantity::Temperature)
        });
        reporter.register(Channel::CurrentHumidity, |r| current(r, Quantity::Humidity));
        reporter.register(Channel::CurrentLight, |r| current(r, Quantity::Light));
        reporter.register(Channel::AverageTemperature, |r| {
            average(r, Quantity::Temperature)
        });
        reporter.register(Channel::AverageHumidity, |r| average(r, Quantity::Humidity));
        reporter.register(Channel::AverageLight, |r| average(r, Quantity::Light));
        reporter.register(Channel::ErrorIndicator, |r| {
            Some(Value::Flag(r.sampler.error()))
        });
        reporter.register(Channel::SampleCount, |r| {
            Some(Value::Count(r.sampler.sample_count()))
        });
        reporter.register(Channel::Watchdog, |r| Some(Value::Flag(r.liveness)));
        reporter
    }

    pub fn empty() -> Self {
        Self {
            readers: HashMap::new(),
        }
    }

    pub fn register(&mut self, channel: Channel, reader: Reader) {
        self.readers.insert(channel, reader);
    }

    pub fn read(&self, channel: Channel, readings: &Readings<'_>) -> Option<Value> {
        self.readers.get(&channel).and_then(|reader| reader(readings))
    }

    /// Answer a pull request by publishing to the requested channel
    ///
    /// Returns whether a value was published.
    pub fn answer<T>(&self, channel: Channel, readings: &Readings<'_>, telemetry: &mut T) -> bool
    where
        T: Telemetry + ?Sized,
    {
        match self.read(channel, readings) {
            Some(value) => {
                telemetry.publish(channel, value);
                true
            }
            None => {
                debug!("Nothing to report on {} yet", channel);
                false
            }
        }
    }

    /// Push every sample-derived channel that has a value
    pub fn publish_samples<T>(&self, readings: &Readings<'_>, telemetry: &mut T)
    where
        T: Telemetry + ?Sized,
    {
        for channel in SAMPLE_CHANNELS {
            if let Some(value) = self.read(channel, readings) {
                telemetry.publish(channel, value);
            }
        }
    }
}

impl Default for SignalReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn current(readings: &Readings<'_>, quantity: Quantity) -> Option<Value> {
    readings.sampler.current(quantity).map(Value::Number)
}

fn average(readings: &Readings<'_>, quantity: Quantity) -> Option<Value> {
    readings.sampler.average(quantity).map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BUFFER_SIZE;
    use crate::testing::{RecordingTelemetry, ScriptedSensor};

    #[test]
    fn missing_values_are_not_pushed() {
        let sampler = Sampler::new();
        let reporter = SignalReporter::new();
        let mut telemetry = RecordingTelemetry::default();

        reporter.publish_samples(
            &Readings {
                sampler: &sampler,
                liveness: false,
            },
            &mut telemetry,
        );

        assert_eq!(
            telemetry.published,
            vec![
                (Channel::ErrorIndicator, Value::Flag(false)),
                (Channel::SampleCount, Value::Count(0)),
            ]
        );
    }

    #[test]
    fn pushes_after_failure_run_then_success() {
        let mut sampler = Sampler::new();
        let mut sensor = ScriptedSensor::failing(BUFFER_SIZE);
        let reporter = SignalReporter::new();
        let mut telemetry = RecordingTelemetry::default();

        for _ in 0..BUFFER_SIZE {
            sampler.tick(&mut sensor);
        }
        let readings = Readings {
            sampler: &sampler,
            liveness: false,
        };
        reporter.publish_samples(&readings, &mut telemetry);
        assert_eq!(telemetry.last(Channel::ErrorIndicator), Some(Value::Flag(true)));
        assert_eq!(telemetry.last(Channel::SampleCount), Some(Value::Count(0)));
        assert_eq!(telemetry.last(Channel::AverageTemperature), None);
        assert_eq!(telemetry.last(Channel::CurrentTemperature), None);

        sensor.push_reading(21.5, 40.0);
        sampler.tick(&mut sensor);
        let readings = Readings {
            sampler: &sampler,
            liveness: false,
        };
        reporter.publish_samples(&readings, &mut telemetry);

        assert_eq!(telemetry.last(Channel::CurrentTemperature), Some(Value::Number(21.5)));
        assert_eq!(telemetry.last(Channel::CurrentHumidity), Some(Value::Number(40.0)));
        assert_eq!(telemetry.last(Channel::AverageTemperature), Some(Value::Number(21.5)));
        assert_eq!(telemetry.last(Channel::AverageHumidity), Some(Value::Number(40.0)));
        assert_eq!(telemetry.last(Channel::SampleCount), Some(Value::Count(1)));
        assert_eq!(telemetry.last(Channel::ErrorIndicator), Some(Value::Flag(false)));
        assert_eq!(telemetry.last(Channel::AverageLight), None);
    }

    #[test]
    fn pull_matches_push_for_every_channel() {
        let mut sampler = Sampler::new();
        let mut sensor = ScriptedSensor::with_light(512.0);
        sensor.push_reading(19.0, 48.0);
        sensor.push_failure();
        sampler.tick(&mut sensor);
        sampler.tick(&mut sensor);

        let reporter = SignalReporter::new();
        let readings = Readings {
            sampler: &sampler,
            liveness: true,
        };

        let mut pushed = RecordingTelemetry::default();
        reporter.publish_samples(&readings, &mut pushed);

        for channel in SAMPLE_CHANNELS {
            let mut pulled = RecordingTelemetry::default();
            let answered = reporter.answer(channel, &readings, &mut pulled);
            assert!(answered);
            assert_eq!(pulled.published, vec![(channel, pushed.last(channel).unwrap())]);
        }

        let mut pulled = RecordingTelemetry::default();
        reporter.answer(Channel::Watchdog, &readings, &mut pulled);
        assert_eq!(pulled.published, vec![(Channel::Watchdog, Value::Flag(true))]);
    }

    #[test]
    fn pull_for_missing_value_sends_nothing() {
        let sampler = Sampler::new();
        let reporter = SignalReporter::new();
        let mut telemetry = RecordingTelemetry::default();
        let readings = Readings {
            sampler: &sampler,
            liveness: false,
        };

        assert!(!reporter.answer(Channel::AverageHumidity, &readings, &mut telemetry));
        assert!(!SignalReporter::empty().answer(Channel::SampleCount, &readings, &mut telemetry));
        assert!(telemetry.published.is_empty());
    }
}
