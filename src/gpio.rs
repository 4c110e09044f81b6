/// Digital output pins for the watchdog indicator
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

pub trait DigitalOutput {
    fn set_output(&mut self, pin: u32, level: bool) -> io::Result<()>;

    fn output(&self, pin: u32) -> io::Result<bool>;
}

impl<O: DigitalOutput + ?Sized> DigitalOutput for Box<O> {
    fn set_output(&mut self, pin: u32, level: bool) -> io::Result<()> {
        (**self).set_output(pin, level)
    }

    fn output(&self, pin: u32) -> io::Result<bool> {
        (**self).output(pin)
    }
}

/// Pins kept in memory, for hosts without a GPIO header
#[derive(Debug, Default)]
pub struct MemoryOutput {
    levels: HashMap<u32, bool>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DigitalOutput for MemoryOutput {
    fn set_output(&mut self, pin: u32, level: bool) -> io::Result<()> {
        debug!("Pin {} -> {}", pin, if level { "high" } else { "low" });
        self.levels.insert(pin, level);
        Ok(())
    }

    fn output(&self, pin: u32) -> io::Result<bool> {
        Ok(self.levels.get(&pin).copied().unwrap_or(false))
    }
}

/// Legacy sysfs GPIO interface (`/sys/class/gpio`)
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    /// Export `pin` if needed and configure it as an output
    pub fn open(root: impl Into<PathBuf>, pin: u32) -> io::Result<Self> {
        let gpio = Self { root: root.into() };
        let pin_dir = gpio.pin_dir(pin);

        if !pin_dir.exists() {
            fs::write(gpio.root.join("export"), pin.to_string())?;
        }
        fs::write(pin_dir.join("direction"), "out")?;

        Ok(gpio)
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }
}

impl DigitalOutput for SysfsGpio {
    fn set_output(&mut self, pin: u32, level: bool) -> io::Result<()> {
        fs::write(self.pin_dir(pin).join("value"), if level { "1" } else { "0" })
    }

    fn output(&self, pin: u32) -> io::Result<bool> {
        let value = fs::read_to_string(self.pin_dir(pin).join("value"))?;
        match value.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected GPIO value {:?}", other),
            )),
        }
    }
}
