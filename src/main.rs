mod beacon;
mod buffer;
mod config;
mod gpio;
mod models;
mod reporter;
mod sampler;
mod scheduler;
mod sensor;
mod telemetry;
mod utils;

#[cfg(test)]
mod testing;

use log::{error, info, warn};
use std::time::Instant;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use config::{SensorSource, StationConfig};
use gpio::{DigitalOutput, MemoryOutput, SysfsGpio};
use scheduler::Station;
use sensor::iio::LightChannel;
use sensor::{IioSensor, Sensor, SimulatedSensor};
use telemetry::spawn_connection;
use utils::format_datetime;

const POLL_INTERVAL_MS: u64 = 50;

fn build_sensor(source: &SensorSource) -> Result<Box<dyn Sensor>, Box<dyn std::error::Error>> {
    match source {
        SensorSource::Iio {
            device,
            light_device,
            light_channel,
            read_timeout,
        } => {
            info!("Reading climate from IIO device {}", device.display());
            let light = light_device.as_ref().map(|light_device| LightChannel {
                device: light_device.clone(),
                attribute: light_channel.clone(),
            });
            let sensor = IioSensor::new(device.clone(), light, *read_timeout)
                .map_err(|e| format!("Failed to start IIO reader thread: {}", e))?;
            Ok(Box::new(sensor))
        }
        SensorSource::Simulated { failure_rate } => {
            warn!(
                "No IIO device configured, using simulated sensor (failure rate {:.2})",
                failure_rate
            );
            Ok(Box::new(SimulatedSensor::new(*failure_rate)))
        }
    }
}

fn build_output(config: &StationConfig) -> Result<Box<dyn DigitalOutput>, Box<dyn std::error::Error>> {
    let pin = config.schedule.watchdog_pin;
    match &config.schedule.gpio_root {
        Some(root) => {
            let gpio = SysfsGpio::open(root, pin)
                .map_err(|e| format!("Failed to open watchdog GPIO {}: {}", pin, e))?;
            Ok(Box::new(gpio))
        }
        None => {
            info!("No GPIO root configured, watchdog pin {} kept in memory", pin);
            Ok(Box::new(MemoryOutput::new()))
        }
    }
}

async fn wait_until_connected(status: &mut watch::Receiver<bool>) -> Result<(), Box<dyn std::error::Error>> {
    while !*status.borrow() {
        status
            .changed()
            .await
            .map_err(|_| "Telemetry connection task stopped")?;
    }
    Ok(())
}

async fn main_loop(config: StationConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting cloud thermometer station");

    let sensor = build_sensor(&config.sensor)?;
    let output = build_output(&config)?;

    let (client, mut status) = spawn_connection(config.telemetry.clone());
    info!(
        "Waiting for telemetry server {}:{}",
        config.telemetry.host, config.telemetry.port
    );
    wait_until_connected(&mut status).await?;

    info!(
        "Station started at: {}",
        format_datetime(&OffsetDateTime::now_utc())
    );

    let mut station = Station::new(sensor, client, output, &config.schedule, Instant::now());

    let mut ticker = interval(Duration::from_millis(POLL_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        station.service(Instant::now());
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match StationConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(config) => {
            match result {
                Ok(_) => info!("Station stopped"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Station terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
