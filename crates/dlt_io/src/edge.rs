use crate::GpioError;
use dlt_common::gpio::ACK_READ_LEN;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, poll};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

/// Result of one bounded wait on an interrupt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeWait {
    /// An edge fired and has been acknowledged.
    Edge,

    /// The timeout elapsed without an edge.
    TimedOut,

    /// The wait returned without the priority condition (signal, stray
    /// readiness); nothing was acknowledged.
    Spurious,
}

/// A line a receive worker can block on until the hardware signals
/// completion.
pub trait EdgeSource: Send {
    /// GPIO number (or lane-specific id for software lines).
    fn pin(&self) -> u32;

    /// Clears any edge latched before the worker started listening.
    fn arm(&mut self) -> Result<(), GpioError>;

    /// Blocks until an edge fires or `timeout` elapses.
    ///
    /// `None` waits forever.
    fn wait_edge(&mut self, timeout: Option<Duration>) -> Result<EdgeWait, GpioError>;
}

/// Converts an optional timeout into the millisecond argument of `poll(2)`.
pub fn poll_timeout_ms(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
    }
}

/// An exported sysfs GPIO `value` file configured for edge interrupts.
///
/// The kernel flags the file with `POLLPRI` when the configured edge occurs;
/// the flag stays raised until the file is rewound and read again.
pub struct EdgeLine {
    pin: u32,
    file: File,
}

impl EdgeLine {
    pub fn new(pin: u32, file: File) -> Self {
        Self { pin, file }
    }

    fn rewind_read(&mut self, buf: &mut [u8]) -> Result<usize, GpioError> {
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read(buf))
            .map_err(|source| GpioError::Value {
                pin: self.pin,
                source,
            })
    }

    /// Reads the current logic level of the line.
    pub fn level(&mut self) -> Result<bool, GpioError> {
        let mut buf = [0u8; ACK_READ_LEN];
        let n = self.rewind_read(&mut buf)?;
        Ok(buf[..n].first() == Some(&b'1'))
    }
}

impl EdgeSource for EdgeLine {
    fn pin(&self) -> u32 {
        self.pin
    }

    fn arm(&mut self) -> Result<(), GpioError> {
        let mut buf = [0u8; ACK_READ_LEN];
        self.file
            .read(&mut buf)
            .map(|_| ())
            .map_err(|source| GpioError::Value {
                pin: self.pin,
                source,
            })
    }

    fn wait_edge(&mut self, timeout: Option<Duration>) -> Result<EdgeWait, GpioError> {
        let mut fds = [PollFd::new(self.file.as_raw_fd(), PollFlags::POLLPRI)];
        let ready = match poll(&mut fds, poll_timeout_ms(timeout)) {
            Ok(n) => n,
            Err(Errno::EINTR) => return Ok(EdgeWait::Spurious),
            Err(source) => {
                return Err(GpioError::Poll {
                    pin: self.pin,
                    source,
                });
            }
        };
        if ready == 0 {
            return Ok(EdgeWait::TimedOut);
        }

        let fired = fds[0]
            .revents()
            .is_some_and(|r| r.contains(PollFlags::POLLPRI));
        if !fired {
            return Ok(EdgeWait::Spurious);
        }
        let mut buf = [0u8; ACK_READ_LEN];
        self.rewind_read(&mut buf)?;
        Ok(EdgeWait::Edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn value_file(contents: &str) -> (tempfile::TempDir, File) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value");
        fs::write(&path, contents).unwrap();
        let file = File::open(&path).unwrap();
        (dir, file)
    }

    #[test]
    fn regular_file_never_raises_priority() {
        // Plain files only report POLLIN/POLLOUT, which a POLLPRI-only
        // wait filters out, so the wait runs into its timeout.
        let (_dir, file) = value_file("0\n");
        let mut line = EdgeLine::new(961, file);
        line.arm().unwrap();
        let got = line.wait_edge(Some(Duration::from_millis(20))).unwrap();
        assert_eq!(got, EdgeWait::TimedOut);
    }

    #[test]
    fn level_reads_value() {
        let (_dir, file) = value_file("1\n");
        let mut line = EdgeLine::new(963, file);
        assert!(line.level().unwrap());
        // Re-reading rewinds first.
        assert!(line.level().unwrap());

        let (_dir, file) = value_file("0\n");
        let mut line = EdgeLine::new(963, file);
        assert!(!line.level().unwrap());
    }

    #[test]
    fn timeout_conversion() {
        assert_eq!(poll_timeout_ms(None), -1);
        assert_eq!(poll_timeout_ms(Some(Duration::from_millis(250))), 250);
        assert_eq!(poll_timeout_ms(Some(Duration::from_secs(u64::MAX))), i32::MAX);
    }
}
