//! Report frequencies and the calculation of when the next report is due.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, OffsetDateTime};
use time_tz::{OffsetDateTimeExt, Tz};

use crate::{Error, timezone::start_of_day};

/// How often a user receives a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportFrequency {
    /// Every Monday, covering the previous Monday to Sunday.
    Weekly,
    /// On the first of every month, covering the previous calendar month.
    #[default]
    Monthly,
}

impl ReportFrequency {
    /// The name of the frequency as stored in the database and used in the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFrequency::Weekly => "WEEKLY",
            ReportFrequency::Monthly => "MONTHLY",
        }
    }
}

impl Display for ReportFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFrequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WEEKLY" => Ok(ReportFrequency::Weekly),
            "MONTHLY" => Ok(ReportFrequency::Monthly),
            other => Err(Error::InvalidFrequency(other.to_owned())),
        }
    }
}

impl ToSql for ReportFrequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ReportFrequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// Calculate when the next report should be sent.
///
/// The schedule is anchored on `last_sent_date`, or on `now` if no report has
/// been sent yet. The next report date is the start (local midnight in
/// `timezone`) of the period after the anchor: the first of the next month for
/// monthly reports and the next Monday for weekly reports. The offset of the
/// result is the one in force at that midnight, so daylight saving changes
/// between the anchor and the next report date do not shift it.
///
/// If the schedule has fallen behind so that this date is not after `now`, the
/// schedule is re-anchored on `now`. The returned date is therefore always
/// strictly after both `now` and `last_sent_date`.
pub fn calculate_next_report_date(
    last_sent_date: Option<OffsetDateTime>,
    frequency: ReportFrequency,
    now: OffsetDateTime,
    timezone: &Tz,
) -> OffsetDateTime {
    let anchor = last_sent_date.unwrap_or(now);
    let next_report_date = start_of_next_period(anchor, frequency, timezone);

    if next_report_date > now {
        next_report_date
    } else {
        start_of_next_period(now, frequency, timezone)
    }
}

fn start_of_next_period(
    anchor: OffsetDateTime,
    frequency: ReportFrequency,
    timezone: &Tz,
) -> OffsetDateTime {
    let date = anchor.to_timezone(timezone).date();

    let next_period_start = match frequency {
        ReportFrequency::Monthly => first_day_of_next_month(date),
        ReportFrequency::Weekly => {
            let days_until_monday = 7 - i64::from(date.weekday().number_days_from_monday());
            date.checked_add(Duration::days(days_until_monday))
                .unwrap_or(Date::MAX)
        }
    };

    start_of_day(next_period_start, timezone)
}

/// The first day of the month after the month `date` is in.
pub(super) fn first_day_of_next_month(date: Date) -> Date {
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        month => (date.year(), month.next()),
    };

    Date::from_calendar_date(year, month, 1).unwrap_or(Date::MAX)
}
