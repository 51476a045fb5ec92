// softpwm_fade_signals.rs - Fades an LED in and out using software-based PWM,
// while handling any incoming SIGINT (Ctrl-C) and SIGTERM signals so the line
// can be set low before the application exits.
//
// Remember to add a resistor of an appropriate value in series, to prevent
// exceeding the maximum current rating of the GPIO line and the LED.
//
// Run with RUST_LOG=debug to see when the PWM thread starts and stops.

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// The simple-signal crate is used to handle incoming signals.
use simple_signal::{self, Signal};

use softpwm::gpio::SysfsLine;
use softpwm::pwm::PwmEngine;

// BCM GPIO 21 is tied to physical pin 40.
const GPIO_LED: &str = "BCM21";

const FREQUENCY_HZ: f64 = 200.0;
const STEP_MS: u64 = 20;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let line = SysfsLine::open(GPIO_LED)?;
    let mut pwm = PwmEngine::with_frequency(line, FREQUENCY_HZ, 0.0, true)?;
    pwm.set_reset_on_disable(true);

    let running = Arc::new(AtomicBool::new(true));

    // When a SIGINT (Ctrl-C) or SIGTERM signal is caught, atomically set running to false.
    simple_signal::set_handler(&[Signal::Int, Signal::Term], {
        let running = running.clone();
        move |_| {
            running.store(false, Ordering::SeqCst);
        }
    });

    // Fade in and out until running is set to false. The duty cycle is updated
    // while PWM is enabled, and takes effect within one period.
    let steps = (0..=100).chain((0..100).rev());
    for duty_cycle in steps.cycle() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        pwm.set_duty_cycle(f64::from(duty_cycle))?;
        thread::sleep(Duration::from_millis(STEP_MS));
    }

    // Stop the PWM thread. reset_on_disable sets the line low afterwards.
    pwm.close()?;

    Ok(())
}
