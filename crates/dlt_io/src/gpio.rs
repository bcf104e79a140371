use crate::GpioError;
use crate::edge::EdgeLine;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Signal direction of a GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
        }
    }
}

/// Transition that wakes a waiter on the line's `value` file.
///
/// `None` leaves the pin as a plain input that never raises `POLLPRI`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    None,
    Rising,
}

impl Edge {
    pub fn as_str(self) -> &'static str {
        match self {
            Edge::None => "none",
            Edge::Rising => "rising",
        }
    }
}

/// Handle on a sysfs GPIO class directory.
///
/// All paths are derived from `root`, which is `/sys/class/gpio` on a real
/// system and a scratch directory in tests.
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    pub fn value_path(&self, pin: u32) -> PathBuf {
        self.pin_dir(pin).join("value")
    }

    fn write_attr(&self, path: PathBuf, value: &str) -> Result<(), GpioError> {
        let result = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .and_then(|mut f| f.write_all(value.as_bytes()));
        result.map_err(|source| GpioError::Write {
            path,
            value: value.to_string(),
            source,
        })
    }

    pub fn export(&self, pin: u32) -> Result<(), GpioError> {
        self.write_attr(self.root.join("export"), &pin.to_string())
    }

    pub fn unexport(&self, pin: u32) -> Result<(), GpioError> {
        self.write_attr(self.root.join("unexport"), &pin.to_string())
    }

    pub fn set_direction(&self, pin: u32, dir: Direction) -> Result<(), GpioError> {
        self.write_attr(self.pin_dir(pin).join("direction"), dir.as_str())
    }

    pub fn set_edge(&self, pin: u32, edge: Edge) -> Result<(), GpioError> {
        self.write_attr(self.pin_dir(pin).join("edge"), edge.as_str())
    }

    /// Opens the pin's `value` file read-only for edge waits.
    pub fn open_line(&self, pin: u32) -> Result<EdgeLine, GpioError> {
        let path = self.value_path(pin);
        let file = File::open(&path).map_err(|source| GpioError::Open { path, source })?;
        Ok(EdgeLine::new(pin, file))
    }

    /// Brings one pin up as a rising-edge interrupt input.
    ///
    /// A stale export is released first; failing to do so is the normal
    /// case for a pin nobody exported, so that step never fails the call.
    pub fn bootstrap(&self, pin: u32) -> Result<EdgeLine, GpioError> {
        if let Err(e) = self.unexport(pin) {
            debug!("gpio{}: no stale export ({})", pin, e);
        }
        self.export(pin)?;
        self.set_direction(pin, Direction::In)?;
        self.set_edge(pin, Edge::Rising)?;
        let line = self.open_line(pin)?;
        info!("gpio{}: opened {}", pin, self.value_path(pin).display());
        Ok(line)
    }

    /// Disarms a pin's interrupt and hands it back to the kernel.
    ///
    /// Any [`EdgeLine`] on the pin should be dropped first.
    pub fn release(&self, pin: u32) -> Result<(), GpioError> {
        self.set_edge(pin, Edge::None)?;
        self.unexport(pin)?;
        debug!("gpio{}: released", pin);
        Ok(())
    }

    /// Brings up every pin in `pins`.
    ///
    /// A failure on a pin listed in `required` aborts with that error; a
    /// failure on any other pin is logged and the pin is left out of the
    /// returned map.
    pub fn bring_up(
        &self,
        pins: &[u32],
        required: &[u32],
    ) -> Result<BTreeMap<u32, EdgeLine>, GpioError> {
        let mut lines = BTreeMap::new();
        for &pin in pins {
            match self.bootstrap(pin) {
                Ok(line) => {
                    lines.insert(pin, line);
                }
                Err(e) if required.contains(&pin) => return Err(e),
                Err(e) => warn!("gpio{}: bring-up failed, pin unused: {}", pin, e),
            }
        }
        Ok(lines)
    }
}
