//! Software-based PWM on a digital output line.
//!
//! [`PwmEngine`] emulates a PWM signal on any [`OutputLine`] by toggling the line's
//! logic level on a dedicated thread. Every period consists of an active (high) part
//! and an inactive (low) part. The length of the high part is calculated from the
//! configured duty cycle, rounded to the nearest microsecond. The low part takes up
//! whatever remains of the period.
//!
//! ## Configuration
//!
//! The frequency and duty cycle can be changed at any time, whether or not PWM is
//! enabled. Settings are remembered when PWM is disabled and enabled again. While
//! PWM is enabled, a new configuration takes effect at the next transition between
//! the high and low part of the signal.
//!
//! A duty cycle of 0% or 100% results in a line that's held low or high respectively.
//! The empty part of the period is skipped entirely.
//!
//! ## Accuracy
//!
//! Software-based PWM is inherently inaccurate on a multi-threaded OS due to
//! scheduling/preemption. The PWM thread attempts to switch to a real-time
//! scheduling policy when it starts, which only succeeds with the appropriate
//! privileges. Use [`set_realtime`] to disable this behavior.
//!
//! Each part of the signal is timed with a combination of sleep and busy-waiting.
//! If the remaining time is shorter than 250 µs, only busy-waiting is used, which
//! will increase CPU usage. Timing errors aren't compensated for in later periods.
//!
//! ## Examples
//!
//! ```no_run
//! use std::thread;
//! use std::time::Duration;
//!
//! use softpwm::pwm::PwmEngine;
//!
//! # fn main() -> softpwm::pwm::Result<()> {
//! let mut pwm = PwmEngine::open("BCM21")?;
//!
//! pwm.set_frequency(100.0)?;
//! pwm.set_duty_cycle(31.0)?;
//! pwm.set_enabled(true)?;
//!
//! thread::sleep(Duration::from_secs(1));
//!
//! // Dim to 5% without interrupting the signal
//! pwm.set_duty_cycle(5.0)?;
//! thread::sleep(Duration::from_secs(1));
//!
//! pwm.set_enabled(false)?;
//! # Ok(())
//! # }
//! ```
//!
//! [`PwmEngine`]: struct.PwmEngine.html
//! [`OutputLine`]: ../gpio/trait.OutputLine.html
//! [`set_realtime`]: struct.PwmEngine.html#method.set_realtime

use std::error;
use std::fmt;
use std::io;
use std::result;
use std::sync::{Arc, Mutex};
use std::thread;

#[cfg(feature = "hal")]
mod hal;
mod timing;
mod worker;

use crate::gpio::{self, Level, OutputLine, SysfsLine};

pub use self::timing::HoldTimes;
use self::worker::{lock, Worker};

/// Lowest supported frequency in hertz (Hz), which results in a period of 1000 s.
pub const MIN_FREQUENCY: f64 = 0.001;

/// Highest supported frequency in hertz (Hz).
///
/// Higher frequencies result in periods that are too short for a thread to time
/// reliably.
pub const MAX_FREQUENCY: f64 = 5000.0;

/// Errors that can occur when controlling software-based PWM.
#[derive(Debug)]
pub enum Error {
    /// Opening the GPIO line failed.
    Gpio(gpio::Error),
    /// Invalid frequency.
    ///
    /// The frequency must be between [`MIN_FREQUENCY`] and [`MAX_FREQUENCY`] (inclusive).
    ///
    /// [`MIN_FREQUENCY`]: constant.MIN_FREQUENCY.html
    /// [`MAX_FREQUENCY`]: constant.MAX_FREQUENCY.html
    InvalidFrequency(f64),
    /// Invalid duty cycle.
    ///
    /// The duty cycle must be between `0.0` and `100.0` (inclusive).
    InvalidDutyCycle(f64),
    /// PWM can't be enabled before a frequency has been set.
    FrequencyNotSet,
    /// I/O error.
    Io(io::Error),
    /// The PWM thread panicked.
    ThreadPanic,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Gpio(ref err) => write!(f, "GPIO error: {}", err),
            Error::InvalidFrequency(frequency) => write!(
                f,
                "Invalid frequency: {} Hz (must be between {} and {} Hz)",
                frequency, MIN_FREQUENCY, MAX_FREQUENCY
            ),
            Error::InvalidDutyCycle(duty_cycle) => write!(
                f,
                "Invalid duty cycle: {}% (must be between 0 and 100)",
                duty_cycle
            ),
            Error::FrequencyNotSet => write!(f, "Frequency must be set before enabling PWM"),
            Error::Io(ref err) => write!(f, "I/O error: {}", err),
            Error::ThreadPanic => write!(f, "PWM thread panicked"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Gpio(ref err) => Some(err),
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<gpio::Error> for Error {
    fn from(err: gpio::Error) -> Error {
        Error::Gpio(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Result type returned from methods that can have `softpwm::pwm::Error`s.
pub type Result<T> = result::Result<T, Error>;

/// Generates a software-based PWM signal on a digital output line.
///
/// `PwmEngine` takes ownership of the line. The line is released when the
/// `PwmEngine` goes out of scope, after the PWM thread has been stopped.
///
/// All configuration methods take `&mut self`. To control PWM from multiple
/// threads, wrap the `PwmEngine` in a `Mutex`.
pub struct PwmEngine<L: OutputLine> {
    // Declared before line, so the thread is stopped before the line is released
    worker: Option<Worker>,
    line: Arc<Mutex<L>>,
    hold_times: Arc<Mutex<HoldTimes>>,
    frequency: Option<f64>,
    duty_cycle: f64,
    realtime: bool,
    reset_on_disable: bool,
}

impl PwmEngine<SysfsLine> {
    /// Opens the specified sysfs GPIO line, and constructs a new `PwmEngine` for it.
    ///
    /// The line is configured as an output, initially set low. Accepted line names
    /// are listed in the [`gpio`] module documentation.
    ///
    /// [`gpio`]: ../gpio/index.html#line-names
    pub fn open(name: &str) -> Result<PwmEngine<SysfsLine>> {
        Ok(PwmEngine::new(SysfsLine::open(name)?))
    }
}

impl<L: OutputLine> PwmEngine<L> {
    /// Constructs a new `PwmEngine` for a line that's already configured as an output.
    ///
    /// PWM starts out disabled, with the duty cycle set to 0% and no frequency.
    pub fn new(line: L) -> PwmEngine<L> {
        PwmEngine {
            worker: None,
            line: Arc::new(Mutex::new(line)),
            hold_times: Arc::new(Mutex::new(HoldTimes::default())),
            frequency: None,
            duty_cycle: 0.0,
            realtime: true,
            reset_on_disable: false,
        }
    }

    /// Constructs a new `PwmEngine` using the specified settings.
    ///
    /// `frequency` is specified in hertz (Hz).
    ///
    /// `duty_cycle` is specified as a percentage between `0.0` and `100.0` (inclusive).
    ///
    /// `enabled` immediately enables PWM.
    pub fn with_frequency(
        line: L,
        frequency: f64,
        duty_cycle: f64,
        enabled: bool,
    ) -> Result<PwmEngine<L>> {
        let mut pwm = PwmEngine::new(line);

        pwm.set_duty_cycle(duty_cycle)?;
        pwm.set_frequency(frequency)?;
        if enabled {
            pwm.set_enabled(true)?;
        }

        Ok(pwm)
    }

    /// Returns the configured frequency, or `None` if no frequency has been set.
    pub fn frequency(&self) -> Option<f64> {
        self.frequency
    }

    /// Sets the frequency.
    ///
    /// `frequency` is specified in hertz (Hz), and must be between [`MIN_FREQUENCY`]
    /// and [`MAX_FREQUENCY`] (inclusive). The hold times are recalculated based on the
    /// configured duty cycle.
    ///
    /// If PWM is enabled, the new period takes effect at the next transition between
    /// the high and low part of the signal.
    ///
    /// [`MIN_FREQUENCY`]: constant.MIN_FREQUENCY.html
    /// [`MAX_FREQUENCY`]: constant.MAX_FREQUENCY.html
    pub fn set_frequency(&mut self, frequency: f64) -> Result<()> {
        let period_us = timing::period_us(frequency)?;

        self.frequency = Some(frequency);
        self.publish(HoldTimes::with_period(period_us, self.duty_cycle));

        Ok(())
    }

    /// Returns the configured duty cycle as a percentage between `0.0` and `100.0`.
    pub fn duty_cycle(&self) -> f64 {
        self.duty_cycle
    }

    /// Sets the duty cycle.
    ///
    /// `duty_cycle` is specified as a percentage between `0.0` and `100.0` (inclusive),
    /// and represents the part of each period during which the line is held high.
    ///
    /// Setting the duty cycle doesn't change the line's current logic level. If PWM is
    /// enabled, the new duty cycle takes effect at the next transition between the high
    /// and low part of the signal.
    pub fn set_duty_cycle(&mut self, duty_cycle: f64) -> Result<()> {
        self.duty_cycle = timing::check_duty_cycle(duty_cycle)?;

        if self.frequency.is_some() {
            let period_us = lock(&self.hold_times).period_us();
            self.publish(HoldTimes::with_period(period_us, duty_cycle));
        }

        Ok(())
    }

    /// Returns the hold times for the current configuration, or `None` if no
    /// frequency has been set.
    pub fn hold_times(&self) -> Option<HoldTimes> {
        self.frequency.map(|_| *lock(&self.hold_times))
    }

    /// Returns `true` if PWM is enabled.
    pub fn is_enabled(&self) -> bool {
        self.worker.is_some()
    }

    /// Enables or disables PWM.
    ///
    /// Enabling PWM starts a new PWM thread. If PWM is already enabled, the existing
    /// thread is stopped first. A frequency must be set before PWM can be enabled.
    ///
    /// Disabling PWM blocks until the PWM thread has exited, which can take up to 10 ms
    /// plus the duration of a pending write. Afterwards, the line is
    /// left at the last level it was set to, unless [`set_reset_on_disable`] is enabled.
    /// Disabling PWM when it's already disabled has no effect.
    ///
    /// [`set_reset_on_disable`]: #method.set_reset_on_disable
    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        if !enabled {
            return self.stop();
        }

        if self.frequency.is_none() {
            return Err(Error::FrequencyNotSet);
        }

        self.stop()?;

        self.worker = Some(Worker::spawn(
            self.line.clone(),
            self.hold_times.clone(),
            self.realtime,
        )?);

        log::debug!(
            "PWM enabled ({:?} Hz, {}%)",
            self.frequency,
            self.duty_cycle
        );

        Ok(())
    }

    /// Returns the value of `realtime`.
    pub fn realtime(&self) -> bool {
        self.realtime
    }

    /// When enabled, the PWM thread attempts to switch to a real-time scheduling
    /// policy at the highest priority when it starts.
    ///
    /// Switching to a real-time policy requires superuser privileges, and silently
    /// fails otherwise. The new value applies the next time PWM is enabled.
    ///
    /// By default, `realtime` is set to `true`.
    pub fn set_realtime(&mut self, realtime: bool) {
        self.realtime = realtime;
    }

    /// Returns the value of `reset_on_disable`.
    pub fn reset_on_disable(&self) -> bool {
        self.reset_on_disable
    }

    /// When enabled, the line is set low after the PWM thread has been stopped,
    /// rather than being left at its last level.
    ///
    /// By default, `reset_on_disable` is set to `false`.
    pub fn set_reset_on_disable(&mut self, reset_on_disable: bool) {
        self.reset_on_disable = reset_on_disable;
    }

    /// Disables PWM and releases the line.
    ///
    /// Dropping a `PwmEngine` does the same, but only logs any errors.
    pub fn close(mut self) -> Result<()> {
        self.stop()
    }

    fn publish(&mut self, hold_times: HoldTimes) {
        log::trace!(
            "PWM hold times: high {} µs, low {} µs",
            hold_times.high_us(),
            hold_times.low_us()
        );

        *lock(&self.hold_times) = hold_times;
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(mut worker) = self.worker.take() {
            worker.stop()?;

            log::debug!("PWM disabled");

            if self.reset_on_disable {
                if let Err(e) = lock(&self.line).write(Level::Low) {
                    log::warn!("Unable to reset PWM line: {}", e);
                }
            }
        }

        Ok(())
    }
}

impl<L: OutputLine> Drop for PwmEngine<L> {
    fn drop(&mut self) {
        // Worker::drop signals the thread without joining it while unwinding
        if thread::panicking() {
            return;
        }

        if let Err(e) = self.stop() {
            log::warn!("Unable to stop PWM thread: {}", e);
        }
    }
}

impl<L: OutputLine> fmt::Debug for PwmEngine<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PwmEngine")
            .field("enabled", &self.is_enabled())
            .field("frequency", &self.frequency)
            .field("duty_cycle", &self.duty_cycle)
            .field("hold_times", &self.hold_times())
            .field("realtime", &self.realtime)
            .field("reset_on_disable", &self.reset_on_disable)
            .finish()
    }
}
