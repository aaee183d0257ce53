//! The source of the current time for code that needs to know "now".
//!
//! Report scheduling depends heavily on the current time, so it is injected
//! rather than read from the system clock directly. Tests use a fixed clock.

use time::OffsetDateTime;
use time_tz::{TimeZone, Tz};

use crate::{
    Error,
    timezone::{get_offset_at, get_timezone},
};

/// Provides the current date and time.
pub trait Clock: Send + Sync {
    /// The current date and time in the server's local offset.
    fn now(&self) -> OffsetDateTime;

    /// The timezone report dates are calculated in.
    fn timezone(&self) -> &'static Tz;
}

/// A [Clock] that reads the system time and converts it to a local timezone.
#[derive(Clone, Copy)]
pub struct SystemClock {
    timezone: &'static Tz,
}

impl std::fmt::Debug for SystemClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemClock")
            .field("timezone", &self.timezone.name())
            .finish()
    }
}

impl SystemClock {
    /// Create a clock for the canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns [Error::InvalidTimezoneError] if `canonical_timezone` is not a known timezone.
    pub fn new(canonical_timezone: &str) -> Result<Self, Error> {
        let timezone = get_timezone(canonical_timezone)
            .ok_or_else(|| Error::InvalidTimezoneError(canonical_timezone.to_owned()))?;

        Ok(Self { timezone })
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        now.to_offset(get_offset_at(self.timezone, now))
    }

    fn timezone(&self) -> &'static Tz {
        self.timezone
    }
}

/// A [Clock] that always returns the same instant.
#[cfg(test)]
#[derive(Clone, Copy)]
pub struct FixedClock {
    now: OffsetDateTime,
    timezone: &'static Tz,
}

#[cfg(test)]
impl FixedClock {
    /// A clock fixed at `now` in UTC.
    pub fn utc(now: OffsetDateTime) -> Self {
        Self::in_timezone(now, "Etc/UTC")
    }

    /// A clock fixed at the instant `now`, seen from `canonical_timezone`.
    pub fn in_timezone(now: OffsetDateTime, canonical_timezone: &str) -> Self {
        let timezone = get_timezone(canonical_timezone).expect("unknown timezone");

        Self {
            now: now.to_offset(get_offset_at(timezone, now)),
            timezone,
        }
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.now
    }

    fn timezone(&self) -> &'static Tz {
        self.timezone
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time_tz::TimeZone;

    use crate::{
        Error,
        clock::{Clock, FixedClock, SystemClock},
    };

    #[test]
    fn new_fails_on_unknown_timezone() {
        let clock = SystemClock::new("Not/A_Timezone");

        assert_eq!(
            clock.map(|_| ()),
            Err(Error::InvalidTimezoneError("Not/A_Timezone".to_owned()))
        );
    }

    #[test]
    fn new_succeeds_on_utc() {
        assert!(SystemClock::new("Etc/UTC").is_ok());
    }

    #[test]
    fn fixed_clock_reports_local_offset() {
        let clock = FixedClock::in_timezone(datetime!(2025-10-31 23:30 UTC), "Europe/Berlin");

        assert_eq!(clock.now(), datetime!(2025-11-01 00:30 +01:00));
        assert_eq!(clock.timezone().name(), "Europe/Berlin");
    }
}
