//! Clock authority.
//!
//! Every deadline comparison asks a [`Clock`] for "now". Timestamps supplied by
//! clients are never used for time math.

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Host wall clock that never runs backwards.
///
/// If the system clock steps back (NTP correction, manual change), the last
/// observed instant is returned until real time catches up again.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_micros: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now();
        let wall_micros = wall.timestamp_micros();
        let prev = self.last_micros.fetch_max(wall_micros, Ordering::AcqRel);

        if prev > wall_micros {
            DateTime::from_timestamp_micros(prev).unwrap_or(wall)
        } else {
            wall
        }
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock() = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A poisoned lock still holds a valid instant
        self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next >= prev);
            prev = next;
        }
    }

    #[test]
    fn test_system_clock_holds_after_backwards_step() {
        let clock = SystemClock::new();
        let future = Utc::now() + Duration::hours(1);
        clock
            .last_micros
            .store(future.timestamp_micros(), Ordering::SeqCst);

        assert_eq!(clock.now().timestamp_micros(), future.timestamp_micros());
    }

    #[test]
    fn test_manual_clock_advance_and_set() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now(), start + Duration::seconds(30));

        let shared = clock.clone();
        shared.set(start);
        assert_eq!(clock.now(), start);
    }
}
