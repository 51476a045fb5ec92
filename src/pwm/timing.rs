use std::time::Duration;

use super::{Error, Result, MAX_FREQUENCY, MIN_FREQUENCY};

const MICROS_PER_SEC: f64 = 1_000_000.0;

/// Active (high) and inactive (low) hold times for a single PWM period.
///
/// Only the high time is rounded. The low time absorbs the remainder, so
/// `high + low` always equals the period.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct HoldTimes {
    period_us: u64,
    high_us: u64,
    low_us: u64,
}

impl HoldTimes {
    /// Calculates the hold times for the specified frequency and duty cycle.
    ///
    /// `frequency` is specified in hertz (Hz), and must be between [`MIN_FREQUENCY`]
    /// and [`MAX_FREQUENCY`] (inclusive).
    ///
    /// `duty_cycle` is specified as a percentage between `0.0` and `100.0` (inclusive).
    ///
    /// [`MIN_FREQUENCY`]: constant.MIN_FREQUENCY.html
    /// [`MAX_FREQUENCY`]: constant.MAX_FREQUENCY.html
    pub fn new(frequency: f64, duty_cycle: f64) -> Result<HoldTimes> {
        Ok(HoldTimes::with_period(
            period_us(frequency)?,
            check_duty_cycle(duty_cycle)?,
        ))
    }

    // Assumes duty_cycle has already been validated
    pub(crate) fn with_period(period_us: u64, duty_cycle: f64) -> HoldTimes {
        let high_us = ((period_us as f64) * duty_cycle / 100.0).round() as u64;
        let high_us = high_us.min(period_us);

        HoldTimes {
            period_us,
            high_us,
            low_us: period_us - high_us,
        }
    }

    /// Returns the time it takes to complete one cycle.
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_us)
    }

    /// Returns the amount of time the line is held high during a single period.
    pub fn high(&self) -> Duration {
        Duration::from_micros(self.high_us)
    }

    /// Returns the amount of time the line is held low during a single period.
    pub fn low(&self) -> Duration {
        Duration::from_micros(self.low_us)
    }

    /// Returns the period in microseconds.
    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    /// Returns the high time in microseconds.
    pub fn high_us(&self) -> u64 {
        self.high_us
    }

    /// Returns the low time in microseconds.
    pub fn low_us(&self) -> u64 {
        self.low_us
    }
}

pub(crate) fn period_us(frequency: f64) -> Result<u64> {
    // NaN fails both comparisons
    if !(MIN_FREQUENCY..=MAX_FREQUENCY).contains(&frequency) {
        return Err(Error::InvalidFrequency(frequency));
    }

    Ok((MICROS_PER_SEC / frequency).round() as u64)
}

pub(crate) fn check_duty_cycle(duty_cycle: f64) -> Result<f64> {
    // NaN fails both comparisons
    if (0.0..=100.0).contains(&duty_cycle) {
        Ok(duty_cycle)
    } else {
        Err(Error::InvalidDutyCycle(duty_cycle))
    }
}
