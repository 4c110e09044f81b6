use log::{debug, info};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::utils::parse_setting;

const DEFAULT_PORT: u16 = 8442;
const DEFAULT_HEARTBEAT_SECS: u64 = 10;
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
const DEFAULT_LIGHT_CHANNEL: &str = "in_voltage0_raw";
const DEFAULT_SENSOR_READ_TIMEOUT_MS: u64 = 250;
const DEFAULT_FAILURE_RATE: f64 = 0.1;
const DEFAULT_WATCHDOG_PIN: u32 = 2;
const DEFAULT_BEACON_INTERVAL_MS: u64 = 1000;
const DEFAULT_SAMPLE_INTERVAL_MULTIPLE: u32 = 60;

/// Telemetry server address and session settings
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub host: String,
    pub port: u16,
    pub token: String,
    pub heartbeat: Duration,
    pub reconnect_delay: Duration,
}

/// Where climate readings come from
#[derive(Debug, Clone, PartialEq)]
pub enum SensorSource {
    Iio {
        device: PathBuf,
        light_device: Option<PathBuf>,
        light_channel: String,
        read_timeout: Duration,
    },
    Simulated {
        failure_rate: f64,
    },
}

/// Watchdog pin and the cadence of the two periodic tasks
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub watchdog_pin: u32,
    pub gpio_root: Option<PathBuf>,
    pub beacon_interval: Duration,
    pub sample_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub telemetry: TelemetryConfig,
    pub sensor: SensorSource,
    pub schedule: ScheduleConfig,
}

impl StationConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telemetry = telemetry_config(&lookup)?;
        let sensor = sensor_source(&lookup)?;
        let schedule = schedule_config(&lookup)?;

        info!(
            "Telemetry server: {}:{}, sampling every {:?}, watchdog every {:?} on pin {}",
            telemetry.host,
            telemetry.port,
            schedule.sample_interval,
            schedule.beacon_interval,
            schedule.watchdog_pin
        );
        debug!("Sensor source: {:?}", sensor);

        Ok(StationConfig {
            telemetry,
            sensor,
            schedule,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| format!("{} environment variable not set", key))
}

fn optional_path<F>(lookup: &F, key: &str) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn telemetry_config<F>(lookup: &F) -> Result<TelemetryConfig, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
{
    let raw_url = required(lookup, "TELEMETRY_URL")?;
    let url = Url::parse(&raw_url).map_err(|e| format!("TELEMETRY_URL is invalid: {}", e))?;

    if url.scheme() != "tcp" {
        return Err(format!("TELEMETRY_URL must use tcp://, got {}://", url.scheme()).into());
    }
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or("TELEMETRY_URL has no host")?
        .to_string();
    let port = url.port().unwrap_or(DEFAULT_PORT);

    let token = required(lookup, "TELEMETRY_TOKEN")?;
    if token.contains(char::is_whitespace) {
        return Err("TELEMETRY_TOKEN must not contain whitespace".into());
    }

    let heartbeat_secs = parse_setting(lookup, "HEARTBEAT_SECS", DEFAULT_HEARTBEAT_SECS)?;
    if heartbeat_secs == 0 {
        return Err("HEARTBEAT_SECS must be at least 1".into());
    }
    let reconnect_secs =
        parse_setting(lookup, "RECONNECT_DELAY_SECS", DEFAULT_RECONNECT_DELAY_SECS)?;

    Ok(TelemetryConfig {
        host,
        port,
        token,
        heartbeat: Duration::from_secs(heartbeat_secs),
        reconnect_delay: Duration::from_secs(reconnect_secs),
    })
}

fn sensor_source<F>(lookup: &F) -> Result<SensorSource, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
{
    match optional_path(lookup, "SENSOR_IIO_DEVICE") {
        Some(device) => {
            let timeout_ms = parse_setting(
                lookup,
                "SENSOR_READ_TIMEOUT_MS",
                DEFAULT_SENSOR_READ_TIMEOUT_MS,
            )?;
            if timeout_ms == 0 {
                return Err("SENSOR_READ_TIMEOUT_MS must be at least 1".into());
            }
            Ok(SensorSource::Iio {
                device,
                light_device: optional_path(lookup, "LIGHT_IIO_DEVICE"),
                light_channel: parse_setting(
                    lookup,
                    "LIGHT_IIO_CHANNEL",
                    DEFAULT_LIGHT_CHANNEL.to_string(),
                )?,
                read_timeout: Duration::from_millis(timeout_ms),
            })
        }
        None => {
            let failure_rate =
                parse_setting(lookup, "SIMULATED_FAILURE_RATE", DEFAULT_FAILURE_RATE)?;
            if !(0.0..=1.0).contains(&failure_rate) {
                return Err(format!(
                    "SIMULATED_FAILURE_RATE must be between 0 and 1, got {}",
                    failure_rate
                )
                .into());
            }
            Ok(SensorSource::Simulated { failure_rate })
        }
    }
}

fn schedule_config<F>(lookup: &F) -> Result<ScheduleConfig, Box<dyn std::error::Error>>
where
    F: Fn(&str) -> Option<String>,
{
    let beacon_ms = parse_setting(lookup, "BEACON_INTERVAL_MS", DEFAULT_BEACON_INTERVAL_MS)?;
    let multiple = parse_setting(
        lookup,
        "SAMPLE_INTERVAL_MULTIPLE",
        DEFAULT_SAMPLE_INTERVAL_MULTIPLE,
    )?;
    if beacon_ms == 0 || multiple == 0 {
        return Err("BEACON_INTERVAL_MS and SAMPLE_INTERVAL_MULTIPLE must be at least 1".into());
    }

    let beacon_interval = Duration::from_millis(beacon_ms);
    let sample_interval = beacon_interval.checked_mul(multiple).ok_or_else(|| {
        format!(
            "BEACON_INTERVAL_MS ({}) times SAMPLE_INTERVAL_MULTIPLE ({}) is too large",
            beacon_ms, multiple
        )
    })?;
    Ok(ScheduleConfig {
        watchdog_pin: parse_setting(lookup, "WATCHDOG_PIN", DEFAULT_WATCHDOG_PIN)?,
        gpio_root: optional_path(lookup, "WATCHDOG_GPIO_ROOT"),
        beacon_interval,
        sample_interval,
    })
}
