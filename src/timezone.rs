use time::{Date, Duration, OffsetDateTime, UtcOffset};
use time_tz::{Offset, OffsetResult, PrimitiveDateTimeExt, TimeZone, Tz};

/// Look up a timezone by its canonical name, e.g. "Pacific/Auckland".
pub fn get_timezone(canonical_timezone: &str) -> Option<&'static Tz> {
    time_tz::timezones::get_by_name(canonical_timezone)
}

/// The UTC offset of `timezone` at the instant `at`.
pub fn get_offset_at(timezone: &Tz, at: OffsetDateTime) -> UtcOffset {
    timezone.get_offset_utc(&at).to_utc()
}

/// Local midnight at the start of `date` in `timezone`.
///
/// When a daylight saving change makes midnight ambiguous the earlier instant
/// is used. When midnight is skipped, midnight is taken at the offset in force
/// before the change, which lands on the first valid local time of the day.
pub fn start_of_day(date: Date, timezone: &Tz) -> OffsetDateTime {
    let midnight = date.midnight();

    match midnight.assume_timezone(timezone) {
        OffsetResult::Some(start) => start,
        OffsetResult::Ambiguous(earlier, _) => earlier,
        OffsetResult::None => {
            let day_before = midnight.assume_utc() - Duration::days(1);
            midnight.assume_offset(get_offset_at(timezone, day_before))
        }
    }
}
