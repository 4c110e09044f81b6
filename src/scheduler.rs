/// Cooperative scheduling of the sampler and the liveness beacon
use log::{debug, info};
use std::time::{Duration, Instant};

use crate::beacon::LivenessBeacon;
use crate::config::ScheduleConfig;
use crate::gpio::DigitalOutput;
use crate::reporter::{Readings, SignalReporter};
use crate::sampler::Sampler;
use crate::sensor::Sensor;
use crate::telemetry::Telemetry;

/// Interval timer that fires at most once per check
///
/// A check that comes late fires once and restarts the interval from the
/// time of the check; missed intervals are not made up.
#[derive(Debug, Clone, Copy)]
pub struct Periodic {
    interval: Duration,
    last_run: Instant,
}

impl Periodic {
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last_run: start,
        }
    }

    pub fn due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_run) >= self.interval {
            self.last_run = now;
            true
        } else {
            false
        }
    }
}

/// All station state, serviced from a single loop
pub struct Station<S, T, O> {
    sensor: S,
    telemetry: T,
    output: O,
    sampler: Sampler,
    beacon: LivenessBeacon,
    reporter: SignalReporter,
    sample_timer: Periodic,
    beacon_timer: Periodic,
}

impl<S, T, O> Station<S, T, O>
where
    S: Sensor,
    T: Telemetry,
    O: DigitalOutput,
{
    pub fn new(sensor: S, telemetry: T, output: O, schedule: &ScheduleConfig, start: Instant) -> Self {
        info!(
            "Station ready: sample every {:?}, watchdog every {:?}",
            schedule.sample_interval, schedule.beacon_interval
        );
        Self {
            sensor,
            telemetry,
            output,
            sampler: Sampler::new(),
            beacon: LivenessBeacon::new(schedule.watchdog_pin),
            reporter: SignalReporter::new(),
            sample_timer: Periodic::new(schedule.sample_interval, start),
            beacon_timer: Periodic::new(schedule.beacon_interval, start),
        }
    }

    /// One pass of the loop
    ///
    /// Answers pending pull requests first, then runs whichever periodic
    /// tasks are due. Every task runs to completion before the next starts.
    pub fn service(&mut self, now: Instant) {
        self.answer_reads();

        if self.beacon_timer.due(now) {
            self.beacon.toggle(&mut self.output, &mut self.telemetry);
        }

        if self.sample_timer.due(now) {
            self.sample();
        }
    }

    fn answer_reads(&mut self) {
        let reads = self.telemetry.pending_reads();
        if reads.is_empty() {
            return;
        }

        let readings = Readings {
            sampler: &self.sampler,
            liveness: self.beacon.state(),
        };
        for channel in reads {
            debug!("Answering read request for {}", channel);
            self.reporter.answer(channel, &readings, &mut self.telemetry);
        }
    }

    fn sample(&mut self) {
        let outcome = self.sampler.tick(&mut self.sensor);
        let cycle = self.sampler.cycle();
        debug!(
            "Tick {} {:?}, next slot {}, {} paired samples",
            cycle.total_ticks,
            outcome,
            cycle.write_index,
            self.sampler.sample_count()
        );

        let readings = Readings {
            sampler: &self.sampler,
            liveness: self.beacon.state(),
        };
        self.reporter.publish_samples(&readings, &mut self.telemetry);
    }
}

#[cfg(test)]
impl<S, T, O> Station<S, T, O> {
    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    pub fn beacon(&self) -> &LivenessBeacon {
        &self.beacon
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut T {
        &mut self.telemetry
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}
