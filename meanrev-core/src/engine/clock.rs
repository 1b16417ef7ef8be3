//! Time sources for the loop.
//!
//! The trader reads local wall-clock time through [`Clock`] and the supervisor
//! waits through [`Pacer`], so both can be replaced by simulated versions.

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Local wall-clock time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, to: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    pub fn advance(&self, by: Duration) {
        let step = ChronoDuration::from_std(by).unwrap_or(ChronoDuration::zero());
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += step;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Waits between iterations.
pub trait Pacer {
    /// Wait for `duration`, returning early once `shutdown` is set.
    fn pause(&mut self, duration: Duration, shutdown: &AtomicBool);
}

/// Sleeps the current thread in short slices so a shutdown request is
/// honored within one slice.
#[derive(Debug, Clone)]
pub struct ThreadPacer {
    slice: Duration,
}

impl ThreadPacer {
    pub fn new(slice: Duration) -> Self {
        Self {
            slice: slice.max(Duration::from_millis(1)),
        }
    }
}

impl Default for ThreadPacer {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

impl Pacer for ThreadPacer {
    fn pause(&mut self, duration: Duration, shutdown: &AtomicBool) {
        let deadline = Instant::now() + duration;
        while !shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(self.slice.min(deadline - now));
        }
    }
}

/// Advances a [`ManualClock`] instead of sleeping, for accelerated runs.
#[derive(Debug, Clone)]
pub struct SimulatedPacer {
    clock: ManualClock,
    total: Duration,
}

impl SimulatedPacer {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            total: Duration::ZERO,
        }
    }

    /// Simulated time spent waiting so far.
    pub fn total(&self) -> Duration {
        self.total
    }
}

impl Pacer for SimulatedPacer {
    fn pause(&mut self, duration: Duration, shutdown: &AtomicBool) {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        self.clock.advance(duration);
        self.total += duration;
    }
}
