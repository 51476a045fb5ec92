// Prevent warning when casting u32 as i64
#![allow(clippy::cast_lossless)]

use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use libc::{
    self, c_long, sched_param, time_t, timespec, CLOCK_MONOTONIC, PR_SET_TIMERSLACK, SCHED_RR,
};

use super::{Error, HoldTimes, Result};
use crate::gpio::{Level, OutputLine};

// Only call sleep_ns() if we have enough time remaining
const SLEEP_THRESHOLD: i64 = 250_000;
// Reserve some time for busy waiting
const BUSYWAIT_MAX: i64 = 200_000;
// Subtract from the remaining busy wait time to account for get_time_ns() overhead
const BUSYWAIT_REMAINDER: i64 = 100;
// Longest single sleep, which limits how long stop() waits during a long phase
const SLEEP_SLICE: i64 = 10_000_000;

const THREAD_NAME: &str = "softpwm";

// Neither lock guards any invariant a panicking thread could have broken
// halfway, so a poisoned lock is still safe to use.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the PWM thread. Dropping a `Worker` stops the thread.
#[derive(Debug)]
pub(crate) struct Worker {
    pwm_thread: Option<thread::JoinHandle<()>>,
    active: Arc<AtomicBool>,
}

impl Worker {
    pub(crate) fn spawn<L: OutputLine>(
        line: Arc<Mutex<L>>,
        hold_times: Arc<Mutex<HoldTimes>>,
        realtime: bool,
    ) -> Result<Worker> {
        let active = Arc::new(AtomicBool::new(true));

        let pwm_thread = thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn({
                let active = active.clone();
                move || {
                    if realtime {
                        set_realtime_priority();
                    }

                    run(&line, &hold_times, &active);
                }
            })
            .map_err(Error::Io)?;

        Ok(Worker {
            pwm_thread: Some(pwm_thread),
            active,
        })
    }

    pub(crate) fn stop(&mut self) -> Result<()> {
        self.active.store(false, Ordering::Release);

        if let Some(pwm_thread) = self.pwm_thread.take() {
            if pwm_thread.join().is_err() {
                return Err(Error::ThreadPanic);
            }
        }

        Ok(())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Don't wait for the pwm thread to exit if the main thread is panicking,
        // because we could potentially block indefinitely while unwinding if the
        // pwm thread is stuck in a write that never returns.
        if thread::panicking() {
            self.active.store(false, Ordering::Release);
        } else {
            let _ = self.stop();
        }
    }
}

fn run<L: OutputLine>(line: &Mutex<L>, hold_times: &Mutex<HoldTimes>, active: &AtomicBool) {
    log::debug!("PWM thread started");

    let mut phase = Level::High;
    let mut failed_writes: u64 = 0;

    // Checked at the top of every cycle, and again between the high and low phase
    while active.load(Ordering::Acquire) {
        // Copy the pair, so a concurrent reconfiguration is picked up on the next phase
        let times = *lock(hold_times);
        let hold_us = match phase {
            Level::High => times.high_us(),
            Level::Low => times.low_us(),
        };
        let hold_ns = hold_us as i64 * 1_000;

        // 0% and 100% duty cycles skip the empty phase entirely
        if hold_ns == 0 {
            phase = !phase;
            continue;
        }

        let start_ns = get_time_ns();

        if let Err(e) = lock(line).write(phase) {
            // Retry the same phase. Only the first failure is logged, so a
            // broken line doesn't flood the log.
            if failed_writes == 0 {
                log::error!("Failed to set PWM line {}: {}", phase, e);
            } else {
                log::trace!(
                    "Failed to set PWM line {} ({} retries): {}",
                    phase,
                    failed_writes,
                    e
                );
            }

            failed_writes += 1;
            continue;
        }

        if failed_writes > 0 {
            log::info!("PWM line recovered after {} failed writes", failed_writes);
            failed_writes = 0;
        }

        wait_until(start_ns + hold_ns, active);

        phase = !phase;
    }

    log::debug!("PWM thread stopped");
}

// Sleep if we have enough time remaining, while reserving some time for busy
// waiting to compensate for sleep taking longer than needed. Returns early once
// active is cleared.
fn wait_until(deadline_ns: i64, active: &AtomicBool) {
    loop {
        let remaining_ns = deadline_ns - get_time_ns();
        if remaining_ns < SLEEP_THRESHOLD {
            break;
        }

        if !active.load(Ordering::Acquire) {
            return;
        }

        sleep_ns((remaining_ns - BUSYWAIT_MAX).min(SLEEP_SLICE));
    }

    // Busy-wait for the remaining time, minus BUSYWAIT_REMAINDER to account
    // for get_time_ns() overhead
    while deadline_ns - get_time_ns() > BUSYWAIT_REMAINDER {}
}

fn set_realtime_priority() {
    // Set the scheduling policy to real-time round robin at the highest priority. This
    // will fail if we're not running as root.
    let mut params: sched_param = unsafe { mem::zeroed() };
    params.sched_priority = unsafe { libc::sched_get_priority_max(SCHED_RR) };

    if let Err(e) = parse_retval!(unsafe { libc::sched_setscheduler(0, SCHED_RR, &params) }) {
        log::debug!("Unable to set real-time scheduling policy: {}", e);

        // Set timer slack to 1 ns (default = 50 µs). This is only relevant if we're unable
        // to set a real-time scheduling policy.
        if let Err(e) = parse_retval!(unsafe { libc::prctl(PR_SET_TIMERSLACK, 1) }) {
            log::debug!("Unable to set timer slack: {}", e);
        }
    }
}

#[inline(always)]
fn get_time_ns() -> i64 {
    let mut ts = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    unsafe {
        libc::clock_gettime(CLOCK_MONOTONIC, &mut ts);
    }

    (ts.tv_sec as i64 * 1_000_000_000) + ts.tv_nsec as i64
}

#[inline(always)]
fn sleep_ns(ns: i64) {
    let ts = timespec {
        tv_sec: (ns / 1_000_000_000) as time_t,
        tv_nsec: (ns % 1_000_000_000) as c_long,
    };

    unsafe {
        libc::clock_nanosleep(CLOCK_MONOTONIC, 0, &ts, ptr::null_mut());
    }
}
