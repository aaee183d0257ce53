//! Database query helpers for reading transactions.

use rusqlite::Connection;
use serde::Serialize;
use time::Date;

use crate::{
    Error,
    database_id::DatabaseId,
    pagination::{PageRequest, Pagination},
    user::UserId,
};

use super::core::{Transaction, map_transaction_row};

/// One page of a user's transactions, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    /// The transactions on the page.
    pub transactions: Vec<Transaction>,
    /// Where the page sits among all of the user's transactions.
    pub pagination: Pagination,
}

/// Retrieve the transaction `id` of `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction of `user_id`,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    user_id: UserId,
    id: DatabaseId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "SELECT id, user_id, amount, date, description, category FROM \"transaction\" \
            WHERE id = :id AND user_id = :user_id",
        )?
        .query_row(
            rusqlite::named_params! {":id": id, ":user_id": user_id},
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Get one page of the transactions of `user_id`, most recent date first.
///
/// Requesting a page past the last page returns an empty list of transactions.
///
/// # Errors
/// Returns an [Error::SqlError] if there is some SQL error.
pub fn list_transactions(
    user_id: UserId,
    page: PageRequest,
    connection: &Connection,
) -> Result<TransactionPage, Error> {
    let total_count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM \"transaction\" WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    let limit = i64::try_from(page.page_size()).unwrap_or(i64::MAX);
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

    let transactions = connection
        .prepare(
            "SELECT id, user_id, amount, date, description, category FROM \"transaction\" \
            WHERE user_id = ?1 \
            ORDER BY date DESC, id DESC \
            LIMIT ?2 OFFSET ?3",
        )?
        .query_map((user_id, limit, offset), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TransactionPage {
        transactions,
        pagination: Pagination::new(page, total_count.unsigned_abs()),
    })
}

/// Get the transactions of `user_id` dated between `start` and `end` (inclusive),
/// oldest first.
///
/// # Errors
/// Returns [Error::SqlError] if:
/// - SQL query preparation or execution fails
/// - Transaction row mapping fails
pub fn get_transactions_in_range(
    user_id: UserId,
    start: Date,
    end: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    // Sort by date, and then ID to keep transaction order stable
    connection
        .prepare(
            "SELECT id, user_id, amount, date, description, category FROM \"transaction\" \
            WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3 \
            ORDER BY date ASC, id ASC",
        )?
        .query_map((user_id, start, end), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}
