//! The span of days a report covers.

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::{Error, report::ReportFrequency};

/// An inclusive range of calendar dates covered by a report.
///
/// Deserialization goes through [ReportPeriod::new], so a period that ends
/// before it starts is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "UncheckedReportPeriod")]
pub struct ReportPeriod {
    /// The first day of the period.
    pub start: Date,
    /// The last day of the period.
    pub end: Date,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UncheckedReportPeriod {
    start: Date,
    end: Date,
}

impl TryFrom<UncheckedReportPeriod> for ReportPeriod {
    type Error = Error;

    fn try_from(period: UncheckedReportPeriod) -> Result<Self, Self::Error> {
        Self::new(period.start, period.end)
    }
}

impl ReportPeriod {
    /// Create a period from `start` to `end`, inclusive.
    ///
    /// # Errors
    /// Returns [Error::InvalidDateRange] if `start` is after `end`.
    pub fn new(start: Date, end: Date) -> Result<Self, Error> {
        if start > end {
            return Err(Error::InvalidDateRange(start, end));
        }

        Ok(Self { start, end })
    }

    /// The most recent complete period of `frequency` before `today`.
    ///
    /// Monthly reports cover the previous calendar month and weekly reports
    /// cover the previous Monday to Sunday.
    pub fn preceding(frequency: ReportFrequency, today: Date) -> Self {
        match frequency {
            ReportFrequency::Monthly => {
                let end = today
                    .replace_day(1)
                    .ok()
                    .and_then(Date::previous_day)
                    .unwrap_or(Date::MIN);
                let start = end.replace_day(1).unwrap_or(end);

                Self { start, end }
            }
            ReportFrequency::Weekly => {
                let days_since_monday = i64::from(today.weekday().number_days_from_monday());
                let end = today
                    .checked_sub(Duration::days(days_since_monday + 1))
                    .unwrap_or(Date::MIN);
                let start = end.checked_sub(Duration::days(6)).unwrap_or(Date::MIN);

                Self { start, end }
            }
        }
    }

    /// A human readable label, e.g. "March 1 - 31, 2025" or "March 31 - April 6, 2025".
    pub fn label(&self) -> String {
        let Self { start, end } = self;

        if start.year() != end.year() {
            format!(
                "{} {}, {} - {} {}, {}",
                start.month(),
                start.day(),
                start.year(),
                end.month(),
                end.day(),
                end.year()
            )
        } else if start.month() != end.month() {
            format!(
                "{} {} - {} {}, {}",
                start.month(),
                start.day(),
                end.month(),
                end.day(),
                end.year()
            )
        } else {
            format!(
                "{} {} - {}, {}",
                start.month(),
                start.day(),
                end.day(),
                end.year()
            )
        }
    }
}
