use embedded_hal::pwm::{ErrorKind, ErrorType, SetDutyCycle};

use super::{Error, PwmEngine};
use crate::gpio::OutputLine;

// Duty cycle resolution of 0.01%
const MAX_DUTY: u16 = 10_000;

impl embedded_hal::pwm::Error for Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// `ErrorType` trait implementation for `embedded-hal` v1.0.0.
impl<L: OutputLine> ErrorType for PwmEngine<L> {
    type Error = Error;
}

/// `SetDutyCycle` trait implementation for `embedded-hal` v1.0.0.
///
/// A duty cycle of `max_duty_cycle()` corresponds to 100%. Values above
/// that are rejected.
impl<L: OutputLine> SetDutyCycle for PwmEngine<L> {
    fn max_duty_cycle(&self) -> u16 {
        MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        PwmEngine::set_duty_cycle(self, f64::from(duty) * 100.0 / f64::from(MAX_DUTY))
    }
}

/// `PwmPin` trait implementation for `embedded-hal` v0.2.7.
///
/// The duty cycle is specified as a floating point ratio between `0.0` (0%)
/// and `1.0` (100%).
impl<L: OutputLine> embedded_hal_0::PwmPin for PwmEngine<L> {
    type Duty = f64;

    fn disable(&mut self) {
        let _ = self.set_enabled(false);
    }

    fn enable(&mut self) {
        let _ = self.set_enabled(true);
    }

    fn get_duty(&self) -> Self::Duty {
        self.duty_cycle / 100.0
    }

    fn get_max_duty(&self) -> Self::Duty {
        1.0
    }

    fn set_duty(&mut self, duty: Self::Duty) {
        let _ = PwmEngine::set_duty_cycle(self, duty.max(0.0).min(1.0) * 100.0);
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use embedded_hal_0::PwmPin;

    use super::*;
    use crate::gpio::Level;

    struct NullLine;

    impl OutputLine for NullLine {
        fn write(&mut self, _level: Level) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn set_duty_cycle_fraction() {
        let mut pwm = PwmEngine::with_frequency(NullLine, 1000.0, 0.0, false).unwrap();

        SetDutyCycle::set_duty_cycle_fraction(&mut pwm, 1, 4).unwrap();
        assert_eq!(pwm.duty_cycle(), 25.0);
        assert_eq!(pwm.hold_times().unwrap().high_us(), 250);

        SetDutyCycle::set_duty_cycle_fully_on(&mut pwm).unwrap();
        assert_eq!(pwm.duty_cycle(), 100.0);
    }

    #[test]
    fn rejects_duty_above_max() {
        let mut pwm = PwmEngine::new(NullLine);

        assert!(SetDutyCycle::set_duty_cycle(&mut pwm, MAX_DUTY + 1).is_err());
        assert_eq!(pwm.duty_cycle(), 0.0);
    }

    #[test]
    fn pwm_pin_uses_ratio() {
        let mut pwm = PwmEngine::with_frequency(NullLine, 100.0, 0.0, false).unwrap();
        pwm.set_realtime(false);

        pwm.set_duty(0.5);
        assert_eq!(pwm.get_duty(), 0.5);
        assert_eq!(pwm.hold_times().unwrap().high_us(), 5000);

        pwm.set_duty(2.0);
        assert_eq!(pwm.get_duty(), 1.0);
        assert_eq!(pwm.get_max_duty(), 1.0);

        PwmPin::enable(&mut pwm);
        assert!(pwm.is_enabled());
        PwmPin::disable(&mut pwm);
        assert!(!pwm.is_enabled());
    }
}
