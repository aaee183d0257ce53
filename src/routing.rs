//! Builds the router for the JSON API.

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::{
    AppState, Error,
    auth::user_id_guard,
    endpoints,
    report::{
        get_report_setting_endpoint, get_report_summary, get_reports,
        update_report_setting_endpoint,
    },
    transaction::{
        bulk_create_transactions_endpoint, bulk_delete_transactions_endpoint,
        create_transaction_endpoint, delete_transaction_endpoint, duplicate_transaction_endpoint,
        get_transaction_endpoint, get_transactions_endpoint, update_transaction_endpoint,
    },
};

/// Create the router for the API. Every route requires a signed-in user.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::REPORTS, get(get_reports))
        .route(
            endpoints::REPORT_SETTING,
            get(get_report_setting_endpoint).put(update_report_setting_endpoint),
        )
        .route(endpoints::REPORT_SUMMARY, get(get_report_summary))
        .route(endpoints::TRANSACTIONS, get(get_transactions_endpoint))
        .route(endpoints::TRANSACTION, get(get_transaction_endpoint))
        .route(endpoints::CREATE_TRANSACTION, post(create_transaction_endpoint))
        .route(
            endpoints::BULK_CREATE_TRANSACTIONS,
            post(bulk_create_transactions_endpoint),
        )
        .route(endpoints::UPDATE_TRANSACTION, put(update_transaction_endpoint))
        .route(
            endpoints::DUPLICATE_TRANSACTION,
            put(duplicate_transaction_endpoint),
        )
        .route(endpoints::DELETE_TRANSACTION, delete(delete_transaction_endpoint))
        .route(
            endpoints::BULK_DELETE_TRANSACTIONS,
            delete(bulk_delete_transactions_endpoint),
        )
        .layer(middleware::from_fn_with_state(state.clone(), user_id_guard))
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
