use std::fmt;

/// Physical quantity tracked by the station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Temperature,
    Humidity,
    Light,
}

/// One successful climate sensor read
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub temperature: f32,
    pub humidity: f32,
}

/// Latest known value per quantity
///
/// Values stay in place when a read fails; they are only `None` until the
/// first successful read.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurrentReading {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub light: Option<f32>,
}

impl CurrentReading {
    pub fn get(&self, quantity: Quantity) -> Option<f32> {
        match quantity {
            Quantity::Temperature => self.temperature,
            Quantity::Humidity => self.humidity,
            Quantity::Light => self.light,
        }
    }
}

/// Telemetry channel, addressed on the wire by its virtual pin number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    AverageTemperature,
    AverageHumidity,
    AverageLight,
    CurrentTemperature,
    CurrentHumidity,
    CurrentLight,
    Watchdog,
    ErrorIndicator,
    SampleCount,
}

impl Channel {
    pub const ALL: [Channel; 9] = [
        Channel::AverageTemperature,
        Channel::AverageHumidity,
        Channel::AverageLight,
        Channel::CurrentTemperature,
        Channel::CurrentHumidity,
        Channel::CurrentLight,
        Channel::Watchdog,
        Channel::ErrorIndicator,
        Channel::SampleCount,
    ];

    pub const fn pin(self) -> u8 {
        match self {
            Channel::AverageTemperature => 0,
            Channel::AverageHumidity => 1,
            Channel::AverageLight => 2,
            Channel::CurrentTemperature => 3,
            Channel::CurrentHumidity => 4,
            Channel::CurrentLight => 5,
            Channel::Watchdog => 6,
            Channel::ErrorIndicator => 7,
            Channel::SampleCount => 8,
        }
    }

    pub fn from_pin(pin: u8) -> Option<Channel> {
        Channel::ALL.into_iter().find(|channel| channel.pin() == pin)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.pin())
    }
}

/// Scalar written to a telemetry channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f32),
    Flag(bool),
    Count(usize),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(value) => write!(f, "{:.2}", value),
            Value::Flag(true) => f.write_str("1"),
            Value::Flag(false) => f.write_str("0"),
            Value::Count(count) => write!(f, "{}", count),
        }
    }
}
