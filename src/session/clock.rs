//! Sleep seam for every bounded delay in the session
//!
//! Poll intervals, settle delays and cooldowns all go through a `Sleeper`
//! so tests can run on simulated time.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by `std::thread::sleep`
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Simulated-time sleeper: records requested delays and returns immediately.
///
/// An optional real delay per call keeps polling loops from spinning hot
/// while other threads make progress.
#[derive(Clone, Debug, Default)]
pub struct RecordingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
    real_delay: Duration,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield for `delay` of real time on every call
    pub fn with_real_delay(mut self, delay: Duration) -> Self {
        self.real_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().clone()
    }

    /// Total simulated time slept
    pub fn elapsed(&self) -> Duration {
        self.calls.lock().iter().sum()
    }

    /// Whether a delay of exactly `duration` was requested
    pub fn slept_for(&self, duration: Duration) -> bool {
        self.calls.lock().contains(&duration)
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.calls.lock().push(duration);
        if !self.real_delay.is_zero() {
            std::thread::sleep(self.real_delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sleeper_records_without_waiting() {
        let sleeper = RecordingSleeper::new();
        let start = std::time::Instant::now();
        sleeper.sleep(Duration::from_secs(5));
        sleeper.sleep(Duration::from_millis(300));

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(sleeper.calls().len(), 2);
        assert_eq!(sleeper.elapsed(), Duration::from_millis(5300));
        assert!(sleeper.slept_for(Duration::from_secs(5)));
    }
}
