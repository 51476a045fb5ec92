//! Digital output lines driven by the software PWM engine.
//!
//! [`PwmEngine`] doesn't talk to any GPIO peripheral directly. Instead, it drives
//! anything that implements [`OutputLine`], a single `write` operation that sets
//! the line's logic level. Acquiring the line and configuring it as an output is
//! done up front, before the line is handed to the engine.
//!
//! Two implementations are included:
//!
//! * [`SysfsLine`] controls a line through the Linux `/sys/class/gpio` interface.
//!   It's opened by name, exported, and configured as an output that starts low.
//!   The line is unexported again when the `SysfsLine` goes out of scope.
//! * `HalLine` wraps any `embedded-hal` v1.0 `OutputPin`. It's only available
//!   when the `hal` feature flag is enabled.
//!
//! ## Line names
//!
//! [`SysfsLine::open`] accepts the kernel's GPIO number, optionally prefixed by
//! `BCM`, `GPIO` or `gpio` (the prefix is case-insensitive). `"BCM21"`, `"GPIO21"`,
//! `"gpio21"` and `"21"` all refer to the same line.
//!
//! ## Troubleshooting
//!
//! ### Permission denied
//!
//! Users that are part of the `gpio` group can usually export lines without
//! superuser privileges, provided udev is configured to hand exported lines to
//! that group. If [`SysfsLine::open`] returns [`Error::PermissionDenied`], either
//! the current user isn't a member of the `gpio` group, or the udev rules haven't
//! been set up.
//!
//! [`PwmEngine`]: ../pwm/struct.PwmEngine.html
//! [`OutputLine`]: trait.OutputLine.html
//! [`SysfsLine`]: struct.SysfsLine.html
//! [`SysfsLine::open`]: struct.SysfsLine.html#method.open
//! [`Error::PermissionDenied`]: enum.Error.html#variant.PermissionDenied

use std::error;
use std::fmt;
use std::io;
use std::ops::Not;
use std::result;

#[cfg(feature = "hal")]
mod hal;
mod sysfs;

#[cfg(feature = "hal")]
pub use self::hal::HalLine;
pub use self::sysfs::SysfsLine;

/// Errors that can occur when opening a GPIO line.
#[derive(Debug)]
pub enum Error {
    /// Invalid line name.
    ///
    /// The name isn't a GPIO number, optionally prefixed by `BCM`, `GPIO` or `gpio`.
    InvalidLineName(String),
    /// Line is not available.
    ///
    /// The kernel refused to export the line, usually because no GPIO
    /// controller exposes a line with the specified number.
    LineNotAvailable(u32),
    /// Permission denied when exporting or configuring the line.
    ///
    /// More information on possible causes for this error can be found [here].
    ///
    /// [here]: index.html#permission-denied
    PermissionDenied(String),
    /// I/O error.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::InvalidLineName(ref name) => write!(f, "Invalid GPIO line name: {}", name),
            Error::LineNotAvailable(line) => write!(f, "GPIO line {} is not available", line),
            Error::PermissionDenied(ref path) => write!(f, "Permission denied: {}", path),
            Error::Io(ref err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Result type returned from methods that can have `softpwm::gpio::Error`s.
pub type Result<T> = result::Result<T, Error>;

/// Line logic levels.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum Level {
    Low = 0,
    High = 1,
}

impl From<bool> for Level {
    fn from(e: bool) -> Level {
        if e {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Level::Low => write!(f, "Low"),
            Level::High => write!(f, "High"),
        }
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// A digital output line that can be driven high or low.
///
/// The line should already be configured as an output by the time it's passed
/// to [`PwmEngine`]. While PWM is enabled, `write` is only ever called from the
/// PWM thread.
///
/// A failed `write` isn't fatal. The PWM thread logs the error and retries the
/// same level until it succeeds or PWM is disabled.
///
/// [`PwmEngine`]: ../pwm/struct.PwmEngine.html
pub trait OutputLine: Send + 'static {
    /// Sets the line's logic level.
    fn write(&mut self, level: Level) -> io::Result<()>;
}

impl OutputLine for Box<dyn OutputLine> {
    fn write(&mut self, level: Level) -> io::Result<()> {
        (**self).write(level)
    }
}
