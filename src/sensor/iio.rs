/// Linux Industrial I/O sensor driver
///
/// The kernel's DHT11/DHT22 driver exposes the last measurement as sysfs
/// attributes under `/sys/bus/iio/devices/iio:deviceN`. Reading an attribute
/// triggers a measurement; the kernel answers with EIO or ETIMEDOUT when the
/// sensor's checksum or timing is off.
///
/// A measurement can block for up to a second, so climate reads run on a
/// dedicated thread and the caller waits at most `read_timeout` for them.
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use crate::models::ClimateReading;
use crate::sensor::{Sensor, SensorError};

const TEMPERATURE_ATTRIBUTE: &str = "in_temp_input"; // milli-degrees Celsius
const HUMIDITY_ATTRIBUTE: &str = "in_humidityrelative_input"; // milli-percent RH

/// Optional ADC channel wired to a photoresistor
#[derive(Debug, Clone)]
pub struct LightChannel {
    pub device: PathBuf,
    pub attribute: String,
}

#[derive(Debug)]
pub struct IioSensor {
    device: PathBuf,
    light: Option<LightChannel>,
    last_light: Option<f32>,
    read_timeout: Duration,
    requests: Sender<()>,
    results: Receiver<Result<ClimateReading, SensorError>>,
    in_flight: bool,
}

impl IioSensor {
    /// Start the measurement thread for `device`
    pub fn new(
        device: impl Into<PathBuf>,
        light: Option<LightChannel>,
        read_timeout: Duration,
    ) -> io::Result<Self> {
        let device = device.into();
        let (requests, request_rx) = mpsc::channel();
        let (result_tx, results) = mpsc::channel();

        let worker_device = device.clone();
        thread::Builder::new()
            .name("iio-reader".to_string())
            .spawn(move || measure(&worker_device, request_rx, result_tx))?;

        Ok(Self {
            device,
            light,
            last_light: None,
            read_timeout,
            requests,
            results,
            in_flight: false,
        })
    }

    /// Collect a measurement that finished after its caller gave up on it
    fn settle_late_read(&mut self) -> Result<(), SensorError> {
        if !self.in_flight {
            return Ok(());
        }
        match self.results.try_recv() {
            Ok(late) => {
                self.in_flight = false;
                debug!("Discarding late IIO measurement: {:?}", late);
                Ok(())
            }
            Err(TryRecvError::Empty) => Err(SensorError::Busy),
            Err(TryRecvError::Disconnected) => Err(reader_stopped()),
        }
    }
}

/// Body of the measurement thread; exits when the sensor is dropped
fn measure(
    device: &Path,
    requests: Receiver<()>,
    results: Sender<Result<ClimateReading, SensorError>>,
) {
    for () in requests {
        if results.send(read_climate(device)).is_err() {
            break;
        }
    }
}

fn read_climate(device: &Path) -> Result<ClimateReading, SensorError> {
    let temperature = read_attribute(&device.join(TEMPERATURE_ATTRIBUTE))? / 1000.0;
    let humidity = read_attribute(&device.join(HUMIDITY_ATTRIBUTE))? / 1000.0;
    Ok(ClimateReading {
        temperature,
        humidity,
    })
}

fn reader_stopped() -> SensorError {
    SensorError::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "IIO reader thread stopped",
    ))
}

/// Read a sysfs attribute holding a single number
fn read_attribute(path: &Path) -> Result<f32, SensorError> {
    let content = fs::read_to_string(path)?;
    let trimmed = content.trim();
    trimmed
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| SensorError::Malformed {
            path: path.to_path_buf(),
            value: trimmed.to_string(),
        })
}

impl Sensor for IioSensor {
    fn read(&mut self) -> Result<ClimateReading, SensorError> {
        self.settle_late_read()?;

        self.requests.send(()).map_err(|_| reader_stopped())?;
        self.in_flight = true;

        match self.results.recv_timeout(self.read_timeout) {
            Ok(result) => {
                self.in_flight = false;
                let reading = result?;
                debug!(
                    "IIO read from {}: temp={:.2}°C, humidity={:.2}%",
                    self.device.display(),
                    reading.temperature,
                    reading.humidity
                );
                Ok(reading)
            }
            Err(RecvTimeoutError::Timeout) => Err(SensorError::Timeout(self.read_timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                self.in_flight = false;
                Err(reader_stopped())
            }
        }
    }

    fn read_light(&mut self) -> Option<f32> {
        let channel = self.light.as_ref()?;
        match read_attribute(&channel.device.join(&channel.attribute)) {
            Ok(level) => {
                self.last_light = Some(level);
            }
            Err(e) => {
                // Light has no failure path downstream; keep the last level.
                warn!("Light read failed, reusing last level: {}", e);
            }
        }
        self.last_light
    }
}
