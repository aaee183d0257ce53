//! Code for creating the user table and fetching users from the database.

use std::fmt::Display;

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::{Error, report::create_report_setting};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(i64);

impl UserId {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql for UserId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for UserId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(UserId)
    }
}

/// A user of the application and the recipient of their reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserId,
    /// The name used to greet the user in reports.
    pub name: String,
    /// The address reports are delivered to.
    pub email: String,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// Onboarding a user also creates their report setting with recurring reports
/// disabled. Both rows are written in the same database transaction.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred, e.g. the
/// email address is already in use.
pub fn create_user(name: &str, email: &str, connection: &Connection) -> Result<User, Error> {
    let transaction = connection.unchecked_transaction()?;

    transaction.execute(
        "INSERT INTO user (name, email) VALUES (?1, ?2)",
        (name, email),
    )?;

    let id = UserId::new(transaction.last_insert_rowid());
    create_report_setting(id, &transaction)?;

    transaction.commit()?;

    Ok(User {
        id,
        name: name.to_owned(),
        email: email.to_owned(),
    })
}

/// Get the user from the database that has the specified `id`.
///
/// # Errors
///
/// This function will return an error if:
/// - there is no user with the specified `id`, [Error::NotFound],
/// - or there was an error trying to access the store, [Error::SqlError].
pub fn get_user(id: UserId, connection: &Connection) -> Result<User, Error> {
    let user = connection
        .prepare("SELECT id, name, email FROM user WHERE id = :id")?
        .query_row(&[(":id", &id)], map_row)?;

    Ok(user)
}

/// Delete a user's account.
///
/// The user's report setting, reports and transactions are removed with it.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no user with the specified `id`.
pub fn delete_user(id: UserId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM user WHERE id = ?1", [id])?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
    })
}
