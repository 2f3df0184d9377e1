use chrono::Utc;

/// Source of wall-clock time, in seconds since the UNIX epoch.
///
/// `None` means the time is unknown. Callers treat that as "no reference
/// point": the poll gate never throttles and SAS tokens are not refreshed.
pub trait Clock {
    fn now(&self) -> Option<i64>;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Option<i64> {
        Some(Utc::now().timestamp())
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Option<i64> {
        (**self).now()
    }
}
