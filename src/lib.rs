//! softpwm emulates pulse-width modulation (PWM) on digital output lines that
//! lack hardware PWM support.
//!
//! A [`PwmEngine`] owns a single output line, and drives it high and low on a
//! dedicated thread. The frequency and duty cycle can be reconfigured while the
//! signal is running. Lines are accessed through the [`OutputLine`] trait, with
//! implementations included for the Linux sysfs GPIO interface and, when the `hal`
//! feature flag is enabled, any `embedded-hal` output pin.
//!
//! Software-based PWM is inherently inaccurate on a multi-threaded OS. If an
//! accurate or faster signal is required, use a hardware PWM peripheral instead.
//!
//! softpwm requires Linux. Both `gnu` and `musl` libc targets are supported.
//!
//! [`PwmEngine`]: pwm/struct.PwmEngine.html
//! [`OutputLine`]: gpio/trait.OutputLine.html

// Used by rustdoc to link other crates to softpwm's docs
#![doc(html_root_url = "https://docs.rs/softpwm/0.1.0")]

#[macro_use]
mod macros;

pub mod gpio;
pub mod pwm;
