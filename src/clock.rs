use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source and sleep primitive. All polling loops in the
/// controller go through this so that tests can run them without real delays.
pub trait Clock: Send {
    /// Microseconds since an arbitrary fixed origin.
    fn now_us(&self) -> u64;
    fn sleep_us(&self, us: u64);
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock{origin: Instant::now()}
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn sleep_us(&self, us: u64) {
        std::thread::sleep(Duration::from_micros(us));
    }
}

/// Fake clock whose sleeps just advance a counter. Clones share the same
/// counter, so a test can keep a handle while the controller owns another.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
    sleeps: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_us(&self, us: u64) {
        self.now.fetch_add(us, Ordering::SeqCst);
    }

    /// How many times sleep_us() has been called.
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep_us(&self, us: u64) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance_us(us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        clock.sleep_us(2000);
        clock.sleep_us(2000);
        assert_eq!(handle.now_us(), 4000);
        assert_eq!(handle.sleep_count(), 2);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let t0 = clock.now_us();
        clock.sleep_us(100);
        assert!(clock.now_us() >= t0 + 100);
    }
}
