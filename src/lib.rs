//! Finance Reports is the API server of a personal finance app.
//!
//! Users record their income and expenses as transactions and can opt in to
//! recurring reports. A background scheduler periodically aggregates each
//! opted-in user's transactions for the previous week or month, stores the
//! result as an immutable report and delivers it to the user.
//!
//! This library provides the JSON API, the report scheduler and the SQLite
//! backed stores they share.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use time::Date;
use tokio::signal;
use tokio_util::sync::CancellationToken;

mod app_state;
mod auth;
mod clock;
mod database_id;
mod db;
mod endpoints;
mod logging;
mod pagination;
mod report;
mod routing;
mod timezone;
mod transaction;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use clock::{Clock, SystemClock};
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::PaginationConfig;
pub use report::{
    LogDelivery, Report, ReportDelivery, ReportFrequency, ReportPeriod, ReportScheduler,
    ReportSetting, ReportSettingPatch, ReportSummary, TickOutcome, TickSummary,
    calculate_next_report_date, generate_report, get_report_setting, update_report_setting,
};
pub use routing::build_router;
pub use transaction::{
    Transaction, TransactionBuilder, TransactionPage, create_transaction, create_transactions,
    delete_transaction, delete_transactions, duplicate_transaction, get_transaction,
    list_transactions, update_transaction,
};
pub use user::{User, UserId, create_user, delete_user, get_user};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server and the background tasks to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server` and `cancellation_token` is shared with background
/// tasks such as the [ReportScheduler].
pub async fn graceful_shutdown(handle: Handle<SocketAddr>, cancellation_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
        },
    }

    cancellation_token.cancel();
    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The request did not identify a known user.
    #[error("the request is missing a valid user ID")]
    Unauthorized,

    /// The request body could not be parsed or failed validation.
    ///
    /// The string describes what was wrong with the payload and is safe to
    /// show to the client.
    #[error("invalid request payload: {0}")]
    InvalidPayload(String),

    /// A page number or page size of zero was requested.
    #[error("page number and page size must be at least 1")]
    InvalidPagination,

    /// The start of a date range came after its end.
    #[error("the date range {0} to {1} is invalid, the start must not be after the end")]
    InvalidDateRange(Date, Date),

    /// A report frequency string did not match a known frequency.
    #[error("\"{0}\" is not a valid report frequency")]
    InvalidFrequency(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The report could not be delivered to its owner.
    ///
    /// The string should only be logged on the server.
    #[error("could not deliver report: {0}")]
    DeliveryFailed(String),

    /// An error occurred while serializing or deserializing JSON.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::JSONSerializationError(value.to_string())
    }
}

/// The JSON body sent to the client when a request fails.
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Error::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Error::InvalidPayload(_)
            | Error::InvalidPagination
            | Error::InvalidDateRange(_, _)
            | Error::InvalidFrequency(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::InvalidTimezoneError(ref timezone) => {
                tracing::error!("could not get local timezone \"{timezone}\"");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!(
                        "Could not get local timezone \"{timezone}\". Check your server settings and \
                        ensure the timezone has been set to valid, canonical timezone string"
                    ),
                )
            }
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred, check the server logs for more details."
                        .to_owned(),
                )
            }
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}

#[cfg(test)]
mod error_response_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::Error;

    #[test]
    fn not_found_maps_to_404() {
        let response = Error::NotFound.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_errors_map_to_400() {
        for error in [
            Error::InvalidPayload("missing field".to_owned()),
            Error::InvalidPagination,
            Error::InvalidFrequency("YEARLY".to_owned()),
        ] {
            assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn unexpected_errors_map_to_500() {
        let response = Error::DatabaseLockError.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn query_returned_no_rows_becomes_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }
}
