//! Reference "now" for every date comparison.
//!
//! Comparisons never read the wall clock directly; they take a `Clock` so
//! tests can pin the instant.

use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::Arc;

pub trait Clock: Send + Sync {
    /// Current local date-time.
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Wall clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Pinned instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Midnight on `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self(date.and_time(chrono::NaiveTime::MIN))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub fn system() -> SharedClock {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_its_date() {
        let day = NaiveDate::from_ymd_opt(2025, 10, 25).unwrap();
        let clock = FixedClock::on(day);
        assert_eq!(clock.today(), day);
        assert_eq!(clock.now().time(), chrono::NaiveTime::MIN);
    }
}
