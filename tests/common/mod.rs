#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use softpwm::gpio::{Level, OutputLine};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A single successful write.
#[derive(Debug, Clone, Copy)]
pub struct Write {
    pub level: Level,
    pub at: Instant,
    pub thread: ThreadId,
}

#[derive(Debug, Default)]
struct State {
    writes: Vec<Write>,
    failed: usize,
    // Fail the next n writes of the specified level (any level if None)
    fail: Option<(Option<Level>, usize)>,
    write_delay: Duration,
}

/// Shared view of everything a `FakeLine` has been asked to do.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    state: Arc<Mutex<State>>,
    in_write: Arc<AtomicBool>,
}

impl Probe {
    pub fn line(&self) -> FakeLine {
        FakeLine {
            probe: self.clone(),
        }
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn levels(&self) -> Vec<Level> {
        self.writes().iter().map(|w| w.level).collect()
    }

    pub fn count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    pub fn failed(&self) -> usize {
        self.state.lock().unwrap().failed
    }

    pub fn fail_next(&self, level: Option<Level>, count: usize) {
        self.state.lock().unwrap().fail = Some((level, count));
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.state.lock().unwrap().write_delay = delay;
    }

    pub fn in_write(&self) -> bool {
        self.in_write.load(Ordering::SeqCst)
    }

    /// Polls until `cond` holds for the recorded writes, or `timeout` elapses.
    pub fn wait_for<F>(&self, timeout: Duration, cond: F) -> bool
    where
        F: Fn(&[Write]) -> bool,
    {
        let deadline = Instant::now() + timeout;

        loop {
            if cond(self.state.lock().unwrap().writes.as_slice()) {
                return true;
            }

            if Instant::now() >= deadline {
                return false;
            }

            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        self.wait_for(timeout, |writes| writes.len() >= count)
    }
}

/// An `OutputLine` that records writes instead of driving hardware.
pub struct FakeLine {
    probe: Probe,
}

impl OutputLine for FakeLine {
    fn write(&mut self, level: Level) -> io::Result<()> {
        self.probe.in_write.store(true, Ordering::SeqCst);

        let delay = self.probe.state.lock().unwrap().write_delay;
        if delay > Duration::from_secs(0) {
            thread::sleep(delay);
        }

        let result = {
            let mut state = self.probe.state.lock().unwrap();

            let pending = state.fail;
            let fail = match pending {
                Some((filter, remaining)) if remaining > 0 => {
                    let matches = filter.map_or(true, |l| l == level);
                    if matches {
                        state.fail = Some((filter, remaining - 1));
                    }
                    matches
                }
                _ => false,
            };

            if fail {
                state.failed += 1;
                Err(io::Error::new(io::ErrorKind::Other, "simulated write failure"))
            } else {
                state.writes.push(Write {
                    level,
                    at: Instant::now(),
                    thread: thread::current().id(),
                });
                Ok(())
            }
        };

        self.probe.in_write.store(false, Ordering::SeqCst);

        result
    }
}
