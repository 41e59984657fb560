//! Host clocks.
//!
//! Every component reads time through [`Clock`] so that sessions can be
//! driven deterministically in tests and simulations. Two readings are
//! exposed:
//!
//! - a monotonic millisecond counter used for interval arithmetic, and
//! - the local wall-clock time used by clock-time policies (reminders,
//!   hourly chimes).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{Duration, Local, NaiveDateTime};

/// Source of host time.
pub trait Clock {
    /// Monotonic milliseconds since an arbitrary origin.
    fn now_ms(&self) -> u64;

    /// Current local wall-clock time.
    fn local_now(&self) -> NaiveDateTime;
}

/// Real clock backed by [`Instant`] and the system time zone.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually advanced clock.
///
/// The wall clock is `base + elapsed`, so both readings always move together.
#[derive(Debug)]
pub struct ManualClock {
    base: NaiveDateTime,
    elapsed_ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock whose wall-clock reading starts at `base`.
    pub fn starting_at(base: NaiveDateTime) -> Self {
        Self {
            base,
            elapsed_ms: AtomicU64::new(0),
        }
    }

    /// Move time forward.
    pub fn advance_ms(&self, ms: u64) {
        self.elapsed_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump forward to an absolute monotonic reading. Never moves backwards.
    pub fn set_ms(&self, ms: u64) {
        self.elapsed_ms.fetch_max(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.elapsed_ms.load(Ordering::SeqCst)
    }

    fn local_now(&self) -> NaiveDateTime {
        self.base + Duration::milliseconds(self.now_ms() as i64)
    }
}

impl<C: Clock + ?Sized> Clock for std::rc::Rc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn local_now(&self) -> NaiveDateTime {
        (**self).local_now()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn local_now(&self) -> NaiveDateTime {
        (**self).local_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap()
    }

    #[test]
    fn manual_clock_moves_both_readings() {
        let clock = ManualClock::starting_at(base());
        clock.advance_ms(90_000);
        assert_eq!(clock.now_ms(), 90_000);
        assert_eq!(clock.local_now(), base() + Duration::seconds(90));
    }

    #[test]
    fn set_ms_never_rewinds() {
        let clock = ManualClock::starting_at(base());
        clock.set_ms(500);
        clock.set_ms(100);
        assert_eq!(clock.now_ms(), 500);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
