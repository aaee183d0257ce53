//! Generation and storage of reports.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::ReportId,
    db::{get_timestamp, to_timestamp},
    report::{ReportPeriod, ReportSummary, summary::summarise},
    transaction::get_transactions_in_range,
    user::UserId,
};

/// A summary of a user's finances over a period. Reports are never modified
/// after they are created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// The ID of the report.
    pub id: ReportId,
    /// The user the report was generated for.
    pub user_id: UserId,
    /// When the report was generated.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// The days the report covers.
    pub period: ReportPeriod,
    /// The aggregated figures.
    pub summary: ReportSummary,
}

/// Create the report table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_report_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS report (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            period_start TEXT NOT NULL,
            period_end TEXT NOT NULL,
            summary TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_report_user_created ON report(user_id, created_at);",
    )?;

    Ok(())
}

/// Generate a report of the transactions of `user_id` in `period` and store it.
///
/// The summary is computed before anything is written, so a failed query or
/// serialization leaves no partial report behind.
///
/// # Errors
/// Returns an [Error::SqlError] if the transactions cannot be read or the
/// report cannot be stored, and [Error::JSONSerializationError] if the summary
/// cannot be serialized.
pub fn generate_report(
    user_id: UserId,
    period: ReportPeriod,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Report, Error> {
    let transactions = get_transactions_in_range(user_id, period.start, period.end, connection)?;
    let summary = summarise(period, &transactions);
    let summary_json = serde_json::to_string(&summary)?;

    connection.execute(
        "INSERT INTO report (user_id, created_at, period_start, period_end, summary)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            user_id,
            to_timestamp(now),
            period.start,
            period.end,
            summary_json,
        ),
    )?;

    let id = connection.last_insert_rowid();

    tracing::debug!(
        "generated report {id} for user {user_id} covering {}",
        summary.period_label
    );

    Ok(Report {
        id,
        user_id,
        created_at: now,
        period,
        summary,
    })
}

/// Get the most recent report of `user_id` covering exactly `period`, if any.
///
/// # Errors
/// Returns an [Error::SqlError] if there is some SQL error.
pub fn get_report_for_period(
    user_id: UserId,
    period: ReportPeriod,
    connection: &Connection,
) -> Result<Option<Report>, Error> {
    let result = connection.query_row(
        "SELECT id, user_id, created_at, period_start, period_end, summary
        FROM report WHERE user_id = ?1 AND period_start = ?2 AND period_end = ?3
        ORDER BY created_at DESC, id DESC LIMIT 1",
        (user_id, period.start, period.end),
        map_report_row,
    );

    match result {
        Ok(report) => Ok(Some(report)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Map a database row to a Report.
pub(super) fn map_report_row(row: &Row) -> Result<Report, rusqlite::Error> {
    let summary_json: String = row.get(5)?;
    let summary = serde_json::from_str(&summary_json).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(Report {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: get_timestamp(row, 2)?,
        period: ReportPeriod {
            start: row.get(3)?,
            end: row.get(4)?,
        },
        summary,
    })
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use crate::{
        Error,
        report::{ReportPeriod, generate::get_report_for_period, generate_report},
        test_utils::{create_test_user, get_test_connection},
        transaction::{Transaction, create_transaction},
        user::UserId,
    };

    fn count_reports(conn: &rusqlite::Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM report", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn generate_report_summarises_period() {
        let conn = get_test_connection();
        let user = create_test_user("Alice", &conn);
        for (amount, date) in [
            (1000.0, date!(2025 - 02 - 28)),
            (2000.0, date!(2025 - 03 - 01)),
            (-500.0, date!(2025 - 03 - 31)),
            (-70.0, date!(2025 - 04 - 01)),
        ] {
            create_transaction(user.id, Transaction::build(amount, date, ""), &conn).unwrap();
        }
        let period = ReportPeriod::new(date!(2025 - 03 - 01), date!(2025 - 03 - 31)).unwrap();
        let now = datetime!(2025-04-01 00:05 UTC);

        let report = generate_report(user.id, period, now, &conn).unwrap();

        assert!(report.id > 0);
        assert_eq!(report.user_id, user.id);
        assert_eq!(report.created_at, now);
        assert_eq!(report.period, period);
        assert_eq!(report.summary.transaction_count, 2);
        assert_eq!(report.summary.total_income, 2000.0);
        assert_eq!(report.summary.total_expenses, 500.0);
        assert_eq!(count_reports(&conn), 1);
    }

    #[test]
    fn generate_report_without_transactions_creates_empty_report() {
        let conn = get_test_connection();
        let user = create_test_user("Alice", &conn);
        let period = ReportPeriod::new(date!(2025 - 03 - 01), date!(2025 - 03 - 31)).unwrap();

        let report = generate_report(user.id, period, datetime!(2025-04-01 00:05 UTC), &conn)
            .unwrap();

        assert_eq!(report.summary.transaction_count, 0);
        assert!(report.summary.top_categories.is_empty());
    }

    #[test]
    fn failed_generation_does_not_persist_report() {
        let conn = get_test_connection();
        let period = ReportPeriod::new(date!(2025 - 03 - 01), date!(2025 - 03 - 31)).unwrap();

        let result = generate_report(
            UserId::new(999),
            period,
            datetime!(2025-04-01 00:05 UTC),
            &conn,
        );

        assert!(matches!(result, Err(Error::SqlError(_))));
        assert_eq!(count_reports(&conn), 0);
    }

    #[test]
    fn get_report_for_period_finds_matching_report() {
        let conn = get_test_connection();
        let user = create_test_user("Alice", &conn);
        let march = ReportPeriod::new(date!(2025 - 03 - 01), date!(2025 - 03 - 31)).unwrap();
        let april = ReportPeriod::new(date!(2025 - 04 - 01), date!(2025 - 04 - 30)).unwrap();
        let want = generate_report(user.id, march, datetime!(2025-04-01 00:05 UTC), &conn).unwrap();

        assert_eq!(get_report_for_period(user.id, march, &conn), Ok(Some(want)));
        assert_eq!(get_report_for_period(user.id, april, &conn), Ok(None));
    }
}
