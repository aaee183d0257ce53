//! The JSON endpoints for managing the signed-in user's transactions.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Extension, Json,
    extract::{
        FromRef, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderName, StatusCode, header::LOCATION},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    AppState, Error,
    database_id::DatabaseId,
    endpoints::{self, format_endpoint},
    pagination::{PageRequest, PaginationConfig},
    transaction::{
        Transaction, TransactionBuilder, TransactionPage, create_transaction, create_transactions,
        delete_transaction, delete_transactions, duplicate_transaction, get_transaction,
        list_transactions, update_transaction,
    },
    user::UserId,
};

/// The state needed for managing transactions.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for reading and writing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The config that controls the page returned when the query omits it.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The body for creating or updating a transaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransactionForm {
    /// Positive for income, negative for expenses. Must not be zero.
    pub amount: f64,
    /// When the transaction happened, e.g. "2025-03-14".
    pub date: Date,
    /// What the transaction was for.
    #[serde(default)]
    pub description: String,
    /// The spending category. Blank or missing means uncategorised.
    #[serde(default)]
    pub category: Option<String>,
}

impl TryFrom<TransactionForm> for TransactionBuilder {
    type Error = Error;

    fn try_from(form: TransactionForm) -> Result<Self, Self::Error> {
        if form.amount == 0.0 || !form.amount.is_finite() {
            return Err(Error::InvalidPayload(format!(
                "amount must be a non-zero number, got {}",
                form.amount
            )));
        }

        Ok(Transaction::build(form.amount, form.date, form.description.trim())
            .category(form.category.as_deref()))
    }
}

/// The body for creating many transactions at once.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkTransactionForm {
    /// The transactions to create, at least one.
    pub transactions: Vec<TransactionForm>,
}

/// The body for deleting many transactions at once.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkDeleteForm {
    /// The IDs of the transactions to delete, at least one.
    pub transaction_ids: Vec<DatabaseId>,
}

/// The response to a bulk delete.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteResponse {
    /// How many of the requested transactions were deleted.
    pub deleted_count: usize,
}

/// The query parameters for listing transactions.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    /// The page to get, starting at 1.
    pub page_number: Option<u64>,
    /// The number of transactions per page.
    pub page_size: Option<u64>,
}

/// Get one page of the signed-in user's transactions, most recent first.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserId>,
    query: Result<Query<TransactionsQuery>, QueryRejection>,
) -> Result<Json<TransactionPage>, Error> {
    let Query(query) = query.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;
    let page = PageRequest::new(
        query
            .page_number
            .unwrap_or(state.pagination_config.default_page),
        query
            .page_size
            .unwrap_or(state.pagination_config.default_page_size),
    )?;

    let connection = lock_connection(&state.db_connection)?;
    list_transactions(user_id, page, &connection).map(Json)
}

/// Get one of the signed-in user's transactions.
pub async fn get_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserId>,
    transaction_id: Result<Path<DatabaseId>, PathRejection>,
) -> Result<Json<Transaction>, Error> {
    let Path(transaction_id) =
        transaction_id.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;

    let connection = lock_connection(&state.db_connection)?;
    get_transaction(user_id, transaction_id, &connection).map(Json)
}

/// A new transaction with a `Location` header pointing at it.
type Created = (StatusCode, [(HeaderName, String); 1], Json<Transaction>);

fn created(transaction: Transaction) -> Created {
    let location = format_endpoint(endpoints::TRANSACTION, transaction.id);

    (StatusCode::CREATED, [(LOCATION, location)], Json(transaction))
}

/// Create a transaction for the signed-in user.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserId>,
    form: Result<Json<TransactionForm>, JsonRejection>,
) -> Result<Created, Error> {
    let Json(form) = form.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;
    let builder = TransactionBuilder::try_from(form)?;

    let connection = lock_connection(&state.db_connection)?;
    let transaction = create_transaction(user_id, builder, &connection)?;
    tracing::debug!("user {user_id} created transaction {}", transaction.id);

    Ok(created(transaction))
}

/// Create many transactions for the signed-in user. Either all are created or none are.
pub async fn bulk_create_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserId>,
    form: Result<Json<BulkTransactionForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<Transaction>>), Error> {
    let Json(form) = form.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;
    if form.transactions.is_empty() {
        return Err(Error::InvalidPayload(
            "transactions must not be empty".to_owned(),
        ));
    }

    let builders = form
        .transactions
        .into_iter()
        .map(TransactionBuilder::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let connection = lock_connection(&state.db_connection)?;
    let transactions = create_transactions(user_id, builders, &connection)?;
    tracing::info!("user {user_id} created {} transactions", transactions.len());

    Ok((StatusCode::CREATED, Json(transactions)))
}

/// Replace one of the signed-in user's transactions.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserId>,
    transaction_id: Result<Path<DatabaseId>, PathRejection>,
    form: Result<Json<TransactionForm>, JsonRejection>,
) -> Result<Json<Transaction>, Error> {
    let Path(transaction_id) =
        transaction_id.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;
    let Json(form) = form.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;
    let builder = TransactionBuilder::try_from(form)?;

    let connection = lock_connection(&state.db_connection)?;
    update_transaction(user_id, transaction_id, builder, &connection).map(Json)
}

/// Copy one of the signed-in user's transactions.
pub async fn duplicate_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserId>,
    transaction_id: Result<Path<DatabaseId>, PathRejection>,
) -> Result<Created, Error> {
    let Path(transaction_id) =
        transaction_id.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;

    let connection = lock_connection(&state.db_connection)?;
    let copy = duplicate_transaction(user_id, transaction_id, &connection)?;

    Ok(created(copy))
}

/// Delete one of the signed-in user's transactions.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserId>,
    transaction_id: Result<Path<DatabaseId>, PathRejection>,
) -> Result<StatusCode, Error> {
    let Path(transaction_id) =
        transaction_id.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;

    let connection = lock_connection(&state.db_connection)?;
    delete_transaction(user_id, transaction_id, &connection)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Delete many of the signed-in user's transactions.
///
/// IDs that do not exist or belong to another user are skipped, so the
/// response reports how many were actually deleted.
pub async fn bulk_delete_transactions_endpoint(
    State(state): State<TransactionState>,
    Extension(user_id): Extension<UserId>,
    form: Result<Json<BulkDeleteForm>, JsonRejection>,
) -> Result<Json<BulkDeleteResponse>, Error> {
    let Json(form) = form.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;
    if form.transaction_ids.is_empty() {
        return Err(Error::InvalidPayload(
            "transactionIds must not be empty".to_owned(),
        ));
    }

    let connection = lock_connection(&state.db_connection)?;
    let deleted_count = delete_transactions(user_id, &form.transaction_ids, &connection)?;
    tracing::info!("user {user_id} deleted {deleted_count} transactions");

    Ok(Json(BulkDeleteResponse { deleted_count }))
}

fn lock_connection(db_connection: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}
