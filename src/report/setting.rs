//! Storage of each user's recurring report setting.
//!
//! Every user has exactly one report setting, created with reports disabled
//! when the user is created. A setting is *due* when it is enabled and its
//! next report date is at or before the current time.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time_tz::Tz;

use crate::{
    Error,
    db::{get_optional_timestamp, to_timestamp},
    report::{ReportFrequency, calculate_next_report_date},
    user::UserId,
};

/// A user's configuration for recurring reports.
///
/// `next_report_date` is only ever set while `is_enabled` is true, and when
/// set it is after `last_sent_date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSetting {
    /// The user the setting belongs to.
    pub user_id: UserId,
    /// Whether the user receives recurring reports.
    pub is_enabled: bool,
    /// How often reports are sent.
    pub frequency: ReportFrequency,
    /// When the last report was successfully delivered.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_sent_date: Option<OffsetDateTime>,
    /// When the next report is due.
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_report_date: Option<OffsetDateTime>,
}

/// A partial update of a [ReportSetting]. Fields that are `None` are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReportSettingPatch {
    /// Turn recurring reports on or off.
    pub is_enabled: Option<bool>,
    /// Change how often reports are sent.
    pub frequency: Option<ReportFrequency>,
}

/// Create the report setting table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_report_setting_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS report_setting (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL UNIQUE,
            is_enabled INTEGER NOT NULL DEFAULT 0,
            frequency TEXT NOT NULL,
            last_sent_date INTEGER,
            next_report_date INTEGER,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_report_setting_due
            ON report_setting(is_enabled, next_report_date);",
    )?;

    Ok(())
}

/// Create the default report setting for a new user: disabled, monthly, never sent.
///
/// # Errors
/// Returns [Error::SqlError] if the user already has a setting, does not exist,
/// or there is some other SQL error.
pub fn create_report_setting(user_id: UserId, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO report_setting (user_id, is_enabled, frequency) VALUES (?1, 0, ?2)",
        (user_id, ReportFrequency::default()),
    )?;

    Ok(())
}

/// Get the report setting for `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the user has no report setting.
pub fn get_report_setting(user_id: UserId, connection: &Connection) -> Result<ReportSetting, Error> {
    let setting = connection
        .prepare(
            "SELECT user_id, is_enabled, frequency, last_sent_date, next_report_date
            FROM report_setting WHERE user_id = :user_id",
        )?
        .query_row(&[(":user_id", &user_id)], map_row)?;

    Ok(setting)
}

/// Apply `patch` to the report setting of `user_id` and return the updated setting.
///
/// When the resulting setting is enabled and its next report date is missing
/// or already due at `now`, the next report date is recalculated from the
/// last sent date in `timezone`. A future next report date is kept. Disabling the setting
/// clears the next report date.
///
/// # Errors
/// Returns [Error::NotFound] if the user has no report setting.
pub fn update_report_setting(
    user_id: UserId,
    patch: ReportSettingPatch,
    now: OffsetDateTime,
    timezone: &Tz,
    connection: &Connection,
) -> Result<ReportSetting, Error> {
    let transaction = connection.unchecked_transaction()?;
    let existing = get_report_setting(user_id, &transaction)?;

    let is_enabled = patch.is_enabled.unwrap_or(existing.is_enabled);
    let frequency = patch.frequency.unwrap_or(existing.frequency);

    let next_report_date = if is_enabled {
        match existing.next_report_date {
            Some(next_report_date) if next_report_date > now => Some(next_report_date),
            _ => Some(calculate_next_report_date(
                existing.last_sent_date,
                frequency,
                now,
                timezone,
            )),
        }
    } else {
        None
    };

    let updated = ReportSetting {
        user_id,
        is_enabled,
        frequency,
        last_sent_date: existing.last_sent_date,
        next_report_date,
    };

    transaction.execute(
        "UPDATE report_setting SET is_enabled = ?1, frequency = ?2, next_report_date = ?3
        WHERE user_id = ?4",
        (
            updated.is_enabled,
            updated.frequency,
            updated.next_report_date.map(to_timestamp),
            user_id,
        ),
    )?;
    transaction.commit()?;

    tracing::debug!(
        "updated report setting for user {user_id}: enabled={is_enabled}, frequency={frequency}"
    );

    Ok(updated)
}

/// Get every enabled report setting whose next report date is at or before `now`.
///
/// # Errors
/// Returns [Error::SqlError] if there is some SQL error.
pub fn list_due_report_settings(
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Vec<ReportSetting>, Error> {
    connection
        .prepare(
            "SELECT user_id, is_enabled, frequency, last_sent_date, next_report_date
            FROM report_setting
            WHERE is_enabled = 1 AND next_report_date IS NOT NULL AND next_report_date <= ?1
            ORDER BY next_report_date ASC, user_id ASC",
        )?
        .query_map([to_timestamp(now)], map_row)?
        .map(|maybe_setting| maybe_setting.map_err(|error| error.into()))
        .collect()
}

/// Record that a report was delivered to `user_id` at `sent_at` and schedule the next one.
///
/// If the setting was disabled in the meantime, only the last sent date is
/// updated and the next report date stays empty.
///
/// # Errors
/// Returns [Error::NotFound] if the user has no report setting.
pub fn mark_report_sent(
    user_id: UserId,
    sent_at: OffsetDateTime,
    timezone: &Tz,
    connection: &Connection,
) -> Result<ReportSetting, Error> {
    let transaction = connection.unchecked_transaction()?;
    let existing = get_report_setting(user_id, &transaction)?;

    let next_report_date = existing.is_enabled.then(|| {
        calculate_next_report_date(Some(sent_at), existing.frequency, sent_at, timezone)
    });

    transaction.execute(
        "UPDATE report_setting SET last_sent_date = ?1, next_report_date = ?2 WHERE user_id = ?3",
        (
            to_timestamp(sent_at),
            next_report_date.map(to_timestamp),
            user_id,
        ),
    )?;
    transaction.commit()?;

    Ok(ReportSetting {
        last_sent_date: Some(sent_at),
        next_report_date,
        ..existing
    })
}

fn map_row(row: &Row) -> Result<ReportSetting, rusqlite::Error> {
    Ok(ReportSetting {
        user_id: row.get(0)?,
        is_enabled: row.get(1)?,
        frequency: row.get(2)?,
        last_sent_date: get_optional_timestamp(row, 3)?,
        next_report_date: get_optional_timestamp(row, 4)?,
    })
}
