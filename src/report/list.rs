//! Paginated listing of a user's reports.

use rusqlite::Connection;
use serde::Serialize;

use crate::{
    Error,
    pagination::{PageRequest, Pagination},
    report::{Report, generate::map_report_row},
    user::UserId,
};

/// One page of a user's reports, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    /// The reports on the page.
    pub reports: Vec<Report>,
    /// Where the page sits among all of the user's reports.
    pub pagination: Pagination,
}

/// Get one page of the reports of `user_id`, newest first.
///
/// Requesting a page past the last page returns an empty list of reports.
///
/// # Errors
/// Returns an [Error::SqlError] if there is some SQL error.
pub fn list_reports(
    user_id: UserId,
    page: PageRequest,
    connection: &Connection,
) -> Result<ReportPage, Error> {
    let total_count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM report WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    let limit = i64::try_from(page.page_size()).unwrap_or(i64::MAX);
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

    let reports = connection
        .prepare(
            "SELECT id, user_id, created_at, period_start, period_end, summary
            FROM report WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3",
        )?
        .query_map((user_id, limit, offset), map_report_row)?
        .map(|maybe_report| maybe_report.map_err(|error| error.into()))
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(ReportPage {
        reports,
        pagination: Pagination::new(page, total_count.unsigned_abs()),
    })
}
