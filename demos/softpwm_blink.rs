// softpwm_blink.rs - Drives an LED connected to a GPIO line using software-based
// PWM, at 100 Hz with a 31% duty cycle.
//
// Remember to add a resistor of an appropriate value in series, to prevent
// exceeding the maximum current rating of the GPIO line and the LED.
//
// Software-based PWM is inherently inaccurate on a multi-threaded OS due to
// scheduling/preemption. Keep the frequency low (a few hundred Hz at most) for
// a stable signal.

use std::error::Error;
use std::thread;
use std::time::Duration;

use softpwm::pwm::PwmEngine;

// BCM GPIO 21 is tied to physical pin 40.
const GPIO_LED: &str = "BCM21";

const FREQUENCY_HZ: f64 = 100.0;
const DUTY_CYCLE: f64 = 31.0;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    // Open the GPIO line. It's configured as an output, initially set low.
    let mut pwm = PwmEngine::open(GPIO_LED)?;

    pwm.set_frequency(FREQUENCY_HZ)?;
    pwm.set_duty_cycle(DUTY_CYCLE)?;
    pwm.set_enabled(true)?;

    thread::sleep(Duration::from_secs(5));

    Ok(())

    // When the pwm variable goes out of scope, the PWM thread is stopped and the
    // GPIO line is released.
}
