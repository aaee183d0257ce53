//! Defines the core data model and database writes for transactions.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{Error, database_id::DatabaseId, user::UserId};

// ============================================================================
// MODELS
// ============================================================================

/// An expense or income, i.e. an event where money was either spent or earned.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseId,
    /// The user the transaction belongs to.
    pub user_id: UserId,
    /// The amount of money spent or earned in this transaction.
    pub amount: f64,
    /// When the transaction happened.
    pub date: Date,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The spending category, e.g. "Groceries". `None` for uncategorised transactions.
    pub category: Option<String>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(amount: f64, date: Date, description: &str) -> TransactionBuilder {
        TransactionBuilder {
            amount,
            date,
            description: description.to_owned(),
            category: None,
        }
    }
}

/// A builder for creating [Transaction] instances.
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    /// The monetary amount of the transaction.
    ///
    /// Positive values represent income/credits, negative values represent
    /// expenses/debits.
    ///
    /// # Examples
    /// - `150.00` - Salary deposit
    /// - `-45.99` - Coffee shop purchase
    /// - `-1200.00` - Rent payment
    pub amount: f64,

    /// The date when the transaction occurred.
    pub date: Date,

    /// A human-readable description of the transaction.
    pub description: String,

    /// The category of the transaction, e.g. "Groceries", "Transport", "Rent".
    pub category: Option<String>,
}

impl TransactionBuilder {
    /// Set the category for the transaction.
    ///
    /// Blank category names are treated as no category.
    pub fn category(mut self, category: Option<&str>) -> Self {
        self.category = category
            .map(str::trim)
            .filter(|category| !category.is_empty())
            .map(str::to_owned);
        self
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create a new transaction for `user_id` in the database from a builder.
///
/// # Errors
/// This function will return a [Error::SqlError] if `user_id` does not refer
/// to a user or there is some other SQL error.
pub fn create_transaction(
    user_id: UserId,
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (user_id, amount, date, description, category)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, user_id, amount, date, description, category",
        )?
        .query_row(
            (
                user_id,
                builder.amount,
                builder.date,
                builder.description,
                builder.category,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Create many transactions for `user_id` at once.
///
/// Either all of the transactions are created or, if any insert fails, none are.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn create_transactions(
    user_id: UserId,
    builders: Vec<TransactionBuilder>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let transactions = builders
        .into_iter()
        .map(|builder| create_transaction(user_id, builder, &sql_transaction))
        .collect::<Result<Vec<_>, _>>()?;

    sql_transaction.commit()?;

    Ok(transactions)
}

/// Replace the fields of the transaction `id` of `user_id` with those of `builder`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction of `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    user_id: UserId,
    id: DatabaseId,
    builder: TransactionBuilder,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "UPDATE \"transaction\"
             SET amount = ?1, date = ?2, description = ?3, category = ?4
             WHERE id = ?5 AND user_id = ?6
             RETURNING id, user_id, amount, date, description, category",
        )?
        .query_row(
            (
                builder.amount,
                builder.date,
                builder.description,
                builder.category,
                id,
                user_id,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Create a copy of the transaction `id` of `user_id` with a new ID.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction of `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn duplicate_transaction(
    user_id: UserId,
    id: DatabaseId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (user_id, amount, date, description, category)
             SELECT user_id, amount, date, description, category FROM \"transaction\"
             WHERE id = ?1 AND user_id = ?2
             RETURNING id, user_id, amount, date, description, category",
        )?
        .query_row((id, user_id), map_transaction_row)?;

    Ok(transaction)
}

/// Delete the transaction `id` of `user_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction of `user_id`,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn delete_transaction(
    user_id: UserId,
    id: DatabaseId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete the transactions in `ids` that belong to `user_id`.
///
/// IDs that do not exist or belong to another user are ignored.
/// Returns the number of transactions that were deleted.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is some SQL error.
pub fn delete_transactions(
    user_id: UserId,
    ids: &[DatabaseId],
    connection: &Connection,
) -> Result<usize, Error> {
    let sql_transaction = connection.unchecked_transaction()?;
    let mut deleted = 0;

    {
        let mut statement = sql_transaction
            .prepare("DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2")?;

        for id in ids {
            deleted += statement.execute((id, user_id))?;
        }
    }

    sql_transaction.commit()?;

    Ok(deleted)
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount REAL NOT NULL,
                date TEXT NOT NULL,
                description TEXT NOT NULL,
                category TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                );

        CREATE INDEX IF NOT EXISTS idx_transaction_user_date ON \"transaction\"(user_id, date);",
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub(super) fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        date: row.get(3)?,
        description: row.get(4)?,
        category: row.get(5)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use time::macros::date;

    use crate::{
        Error,
        test_utils::{create_test_user, get_test_connection},
        transaction::{
            Transaction, create_transaction, create_transactions, delete_transaction,
            delete_transactions, duplicate_transaction, get_transaction, get_transactions_in_range,
            update_transaction,
        },
        user::UserId,
    };

    #[test]
    fn create_succeeds() {
        let conn = get_test_connection();
        let user = create_test_user("Alice", &conn);

        let result = create_transaction(
            user.id,
            Transaction::build(-12.3, date!(2025 - 10 - 05), "Lunch").category(Some("Food")),
            &conn,
        );

        let transaction = result.expect("Could not create transaction");
        assert!(transaction.id > 0);
        assert_eq!(transaction.user_id, user.id);
        assert_eq!(transaction.amount, -12.3);
        assert_eq!(transaction.category.as_deref(), Some("Food"));
    }

    #[test]
    fn blank_category_is_stored_as_none() {
        let conn = get_test_connection();
        let user = create_test_user("Alice", &conn);

        let transaction = create_transaction(
            user.id,
            Transaction::build(-1.0, date!(2025 - 10 - 05), "").category(Some("   ")),
            &conn,
        )
        .unwrap();

        assert_eq!(transaction.category, None);
    }

    #[test]
    fn create_fails_with_unknown_user() {
        let conn = get_test_connection();

        let result = create_transaction(
            UserId::new(999),
            Transaction::build(1.0, date!(2025 - 10 - 05), ""),
            &conn,
        );

        assert!(matches!(result, Err(Error::SqlError(_))));
    }

    #[test]
    fn bulk_create_is_all_or_nothing() {
        let conn = get_test_connection();
        let user = create_test_user("Alice", &conn);

        let result = create_transactions(
            UserId::new(999),
            vec![
                Transaction::build(1.0, date!(2025 - 10 - 05), "a"),
                Transaction::build(2.0, date!(2025 - 10 - 06), "b"),
            ],
            &conn,
        );
        assert!(result.is_err());

        let created = create_transactions(
            user.id,
            vec![
                Transaction::build(1.0, date!(2025 - 10 - 05), "a"),
                Transaction::build(2.0, date!(2025 - 10 - 06), "b"),
            ],
            &conn,
        )
        .unwrap();
        assert_eq!(created.len(), 2);

        let stored = get_transactions_in_range(
            user.id,
            date!(2025 - 10 - 01),
            date!(2025 - 10 - 31),
            &conn,
        )
        .unwrap();
        assert_eq!(stored, created);
    }

    #[test]
    fn bulk_delete_only_removes_own_transactions() {
        let conn = get_test_connection();
        let alice = create_test_user("Alice", &conn);
        let bob = create_test_user("Bob", &conn);
        let alices = create_transaction(
            alice.id,
            Transaction::build(1.0, date!(2025 - 10 - 05), ""),
            &conn,
        )
        .unwrap();
        let bobs = create_transaction(
            bob.id,
            Transaction::build(1.0, date!(2025 - 10 - 05), ""),
            &conn,
        )
        .unwrap();

        let deleted = delete_transactions(alice.id, &[alices.id, bobs.id, 12345], &conn);

        assert_eq!(deleted, Ok(1));
        let remaining = get_transactions_in_range(
            bob.id,
            date!(2025 - 10 - 01),
            date!(2025 - 10 - 31),
            &conn,
        )
        .unwrap();
        assert_eq!(remaining, vec![bobs]);
    }

    #[test]
    fn update_replaces_fields() {
        let conn = get_test_connection();
        let user = create_test_user("Alice", &conn);
        let original = create_transaction(
            user.id,
            Transaction::build(-12.3, date!(2025 - 10 - 05), "Lunch").category(Some("Food")),
            &conn,
        )
        .unwrap();

        let updated = update_transaction(
            user.id,
            original.id,
            Transaction::build(-15.0, date!(2025 - 10 - 06), "Dinner"),
            &conn,
        )
        .unwrap();

        assert_eq!(updated.id, original.id);
        assert_eq!(updated.amount, -15.0);
        assert_eq!(updated.date, date!(2025 - 10 - 06));
        assert_eq!(updated.description, "Dinner");
        assert_eq!(updated.category, None);
        assert_eq!(get_transaction(user.id, original.id, &conn), Ok(updated));
    }

    #[test]
    fn update_fails_for_other_users_transaction() {
        let conn = get_test_connection();
        let alice = create_test_user("Alice", &conn);
        let bob = create_test_user("Bob", &conn);
        let bobs = create_transaction(
            bob.id,
            Transaction::build(1.0, date!(2025 - 10 - 05), "Refund"),
            &conn,
        )
        .unwrap();

        let result = update_transaction(
            alice.id,
            bobs.id,
            Transaction::build(100.0, date!(2025 - 10 - 05), "Mine now"),
            &conn,
        );

        assert_eq!(result, Err(Error::NotFound));
        assert_eq!(get_transaction(bob.id, bobs.id, &conn), Ok(bobs));
    }

    #[test]
    fn duplicate_copies_fields_with_new_id() {
        let conn = get_test_connection();
        let user = create_test_user("Alice", &conn);
        let original = create_transaction(
            user.id,
            Transaction::build(-4.5, date!(2025 - 10 - 05), "Coffee").category(Some("Food")),
            &conn,
        )
        .unwrap();

        let copy = duplicate_transaction(user.id, original.id, &conn).unwrap();

        assert_ne!(copy.id, original.id);
        assert_eq!(
            copy,
            Transaction {
                id: copy.id,
                ..original
            }
        );
    }

    #[test]
    fn duplicate_fails_for_unknown_transaction() {
        let conn = get_test_connection();
        let user = create_test_user("Alice", &conn);

        assert_eq!(
            duplicate_transaction(user.id, 42, &conn),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn delete_removes_transaction() {
        let conn = get_test_connection();
        let user = create_test_user("Alice", &conn);
        let transaction = create_transaction(
            user.id,
            Transaction::build(-4.5, date!(2025 - 10 - 05), "Coffee"),
            &conn,
        )
        .unwrap();

        assert_eq!(delete_transaction(user.id, transaction.id, &conn), Ok(()));
        assert_eq!(
            get_transaction(user.id, transaction.id, &conn),
            Err(Error::NotFound)
        );
        assert_eq!(
            delete_transaction(user.id, transaction.id, &conn),
            Err(Error::NotFound)
        );
    }
}
