//! Sysfs GPIO lines for the request and ack handshake
//!
//! On a Linux host the two handshake wires are plain GPIOs:
//! - the ack line is an output pulsed after every completed request
//! - the request line is an input whose rising edge is the target's interrupt
//!
//! Both are driven through `/sys/class/gpio`. Edge waits use `poll(2)` with
//! `POLLPRI`, which is how the sysfs interface reports a configured edge.

use crate::ack::AckLine;
use crate::error::{BridgeError, Result};
use rustix::event::{poll, PollFd, PollFlags};
use rustix::io::Errno;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const GPIO_ROOT: &str = "/sys/class/gpio";

/// Direction of a sysfs GPIO
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Driven by the host
    Output,
    /// Sampled by the host, rising edges reported
    RisingEdgeInput,
}

/// One exported sysfs GPIO
#[derive(Debug)]
pub struct SysfsGpio {
    pin: u32,
    value: File,
}

impl SysfsGpio {
    /// Export `pin` (if needed) and configure it
    ///
    /// # Errors
    ///
    /// Returns error if the pin cannot be exported or configured.
    pub fn open(pin: u32, direction: Direction) -> Result<Self> {
        let dir = PathBuf::from(GPIO_ROOT).join(format!("gpio{pin}"));
        if !dir.exists() {
            debug!("Exporting GPIO {pin}");
            write_attr(&PathBuf::from(GPIO_ROOT).join("export"), &pin.to_string())?;
        }

        match direction {
            Direction::Output => write_attr(&dir.join("direction"), "low")?,
            Direction::RisingEdgeInput => {
                write_attr(&dir.join("direction"), "in")?;
                write_attr(&dir.join("edge"), "rising")?;
            }
        }

        let value = OpenOptions::new()
            .read(true)
            .write(direction == Direction::Output)
            .open(dir.join("value"))
            .map_err(|e| BridgeError::link_failed(format!("GPIO {pin} value: {e}")))?;

        tracing::info!("GPIO {pin} configured as {direction:?}");
        Ok(Self { pin, value })
    }

    /// Pin number
    pub const fn pin(&self) -> u32 {
        self.pin
    }

    /// Current level
    ///
    /// # Errors
    ///
    /// Returns error if the value file cannot be read.
    pub fn level(&mut self) -> Result<bool> {
        let mut buf = [0u8; 2];
        self.value.seek(SeekFrom::Start(0))?;
        let n = self.value.read(&mut buf)?;
        Ok(n > 0 && buf[0] == b'1')
    }

    /// Block until the next configured edge
    ///
    /// # Errors
    ///
    /// Returns error if polling fails.
    pub fn wait_edge(&mut self) -> Result<()> {
        // Consume the current state first, otherwise poll reports the
        // edge that was already seen.
        self.level()?;
        let value = &self.value;
        poll_retrying(|| poll(&mut [PollFd::new(value, PollFlags::PRI | PollFlags::ERR)], -1))
            .map_err(|e| BridgeError::link_failed(format!("GPIO {} poll: {e}", self.pin)))?;
        self.level()?;
        Ok(())
    }
}

impl AckLine for SysfsGpio {
    fn set(&mut self, high: bool) -> Result<()> {
        self.value.seek(SeekFrom::Start(0))?;
        self.value.write_all(if high { b"1" } else { b"0" })?;
        Ok(())
    }
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    std::fs::write(path, value)
        .map_err(|e| BridgeError::link_failed(format!("{}: {e}", path.display())))
}

/// Repeat a `poll` that returned `EINTR`.
fn poll_retrying(
    mut poll_once: impl FnMut() -> rustix::io::Result<usize>,
) -> rustix::io::Result<usize> {
    loop {
        match poll_once() {
            Err(e) if e == Errno::INTR => {}
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_poll_is_repeated() {
        let mut calls = 0;
        let ready = poll_retrying(|| {
            calls += 1;
            if calls == 1 {
                Err(Errno::INTR)
            } else {
                Ok(1)
            }
        });
        assert_eq!(ready, Ok(1));
        assert_eq!(calls, 2);
    }

    #[test]
    fn poll_failure_is_reported() {
        assert_eq!(poll_retrying(|| Err(Errno::BADF)), Err(Errno::BADF));
    }

    #[test]
    fn missing_gpio_fails_to_open() {
        assert!(SysfsGpio::open(u32::MAX, Direction::Output).is_err());
    }
}
