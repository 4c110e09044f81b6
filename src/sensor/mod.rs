pub mod iio;
pub mod simulated;

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::models::ClimateReading;

pub use iio::IioSensor;
pub use simulated::SimulatedSensor;

/// Transient failure of a single sensor read
#[derive(Error, Debug)]
pub enum SensorError {
    /// The driver refused the read (timing or checksum fault)
    #[error("sensor read failed: {0}")]
    Io(#[from] io::Error),

    /// The driver returned something that is not a number
    #[error("unparseable reading {value:?} from {}", path.display())]
    Malformed { path: PathBuf, value: String },

    /// The sensor produced no data this time
    #[error("sensor returned no data")]
    NoData,

    /// The measurement did not finish within the allowed wait
    #[error("sensor read timed out after {0:?}")]
    Timeout(Duration),

    /// An earlier measurement that timed out is still running
    #[error("previous sensor read still in progress")]
    Busy,
}

/// Hardware capability behind the sampler
pub trait Sensor {
    /// Read temperature and humidity together
    fn read(&mut self) -> Result<ClimateReading, SensorError>;

    /// Current light level, `None` when no photoresistor is fitted
    fn read_light(&mut self) -> Option<f32> {
        None
    }
}

impl<S: Sensor + ?Sized> Sensor for Box<S> {
    fn read(&mut self) -> Result<ClimateReading, SensorError> {
        (**self).read()
    }

    fn read_light(&mut self) -> Option<f32> {
        (**self).read_light()
    }
}
