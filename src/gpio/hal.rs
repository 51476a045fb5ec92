use std::io;

use embedded_hal::digital::{Error as _, OutputPin, PinState};

use super::{Level, OutputLine};

/// Adapts an `embedded-hal` v1.0 [`OutputPin`] so it can be driven by `PwmEngine`.
///
/// Pin errors are reported to the PWM thread as `io::Error`s carrying the
/// `embedded-hal` error kind.
///
/// [`OutputPin`]: https://docs.rs/embedded-hal/1/embedded_hal/digital/trait.OutputPin.html
#[derive(Debug)]
pub struct HalLine<P> {
    pin: P,
}

impl<P> HalLine<P>
where
    P: OutputPin + Send + 'static,
{
    /// Constructs a new `HalLine`. The pin should already be configured as an output.
    pub fn new(pin: P) -> HalLine<P> {
        HalLine { pin }
    }

    /// Returns the wrapped pin.
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl From<Level> for PinState {
    fn from(level: Level) -> PinState {
        match level {
            Level::Low => PinState::Low,
            Level::High => PinState::High,
        }
    }
}

/// `OutputLine` implementation for `embedded-hal` v1.0 output pins.
impl<P> OutputLine for HalLine<P>
where
    P: OutputPin + Send + 'static,
{
    fn write(&mut self, level: Level) -> io::Result<()> {
        self.pin
            .set_state(level.into())
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{:?}", e.kind())))
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use embedded_hal::digital::{ErrorKind, ErrorType};

    use super::*;

    #[derive(Default)]
    struct Pin {
        states: Vec<bool>,
    }

    impl ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.states.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.states.push(true);
            Ok(())
        }
    }

    struct BrokenPin;

    impl ErrorType for BrokenPin {
        type Error = ErrorKind;
    }

    impl OutputPin for BrokenPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    #[test]
    fn writes_levels_to_pin() {
        let mut line = HalLine::new(Pin::default());

        line.write(Level::High).unwrap();
        line.write(Level::Low).unwrap();
        line.write(Level::High).unwrap();

        assert_eq!(line.into_inner().states, vec![true, false, true]);
    }

    #[test]
    fn pin_errors_become_io_errors() {
        let mut line = HalLine::new(BrokenPin);

        let err = line.write(Level::High).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
