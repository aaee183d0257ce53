//! Set up of the application's SQLite database and shared column conversions.

use rusqlite::{Connection, Row, Transaction as SqlTransaction, types::Type};
use time::OffsetDateTime;

use crate::{
    Error,
    report::{create_report_setting_table, create_report_table},
    transaction::create_transaction_table,
    user::create_user_table,
};

/// Create the tables for the domain models if they do not exist yet.
///
/// Foreign key enforcement is turned on for `connection`, which account
/// deletion relies on to cascade to a user's settings, reports and
/// transactions.
///
/// # Errors
/// Returns an error if a table cannot be created or if there is some other SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_report_setting_table(&transaction)?;
    create_report_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Convert a date-time to the representation stored in the database: UTC Unix seconds.
///
/// Storing integers keeps `<=` comparisons in SQL correct regardless of the
/// offset the date-time was created in.
pub(crate) fn to_timestamp(date_time: OffsetDateTime) -> i64 {
    date_time.unix_timestamp()
}

/// Read a column written by [to_timestamp] back as a UTC date-time.
pub(crate) fn get_timestamp(row: &Row, index: usize) -> Result<OffsetDateTime, rusqlite::Error> {
    let timestamp: i64 = row.get(index)?;
    from_timestamp(index, timestamp)
}

/// Like [get_timestamp] for nullable columns.
pub(crate) fn get_optional_timestamp(
    row: &Row,
    index: usize,
) -> Result<Option<OffsetDateTime>, rusqlite::Error> {
    let timestamp: Option<i64> = row.get(index)?;
    timestamp
        .map(|timestamp| from_timestamp(index, timestamp))
        .transpose()
}

fn from_timestamp(index: usize, timestamp: i64) -> Result<OffsetDateTime, rusqlite::Error> {
    OffsetDateTime::from_unix_timestamp(timestamp).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(error))
    })
}
