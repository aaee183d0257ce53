//! The JSON endpoints for reports and report settings.

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Extension, Json,
    extract::{
        FromRef, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error,
    clock::Clock,
    pagination::{PageRequest, PaginationConfig},
    report::{
        ReportPeriod, ReportSetting, ReportSettingPatch, ReportSummary, get_report_setting,
        list::{ReportPage, list_reports},
        summary::summarise,
        update_report_setting,
    },
    transaction::get_transactions_in_range,
    user::UserId,
};

/// The state needed for listing reports.
#[derive(Debug, Clone)]
pub struct ReportsState {
    /// The database connection for reading reports.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The config that controls the page returned when the query omits it.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ReportsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query parameters for listing reports.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportsQuery {
    /// The page to get, starting at 1.
    pub page_number: Option<u64>,
    /// The number of reports per page.
    pub page_size: Option<u64>,
}

/// Get one page of the signed-in user's reports, newest first.
pub async fn get_reports(
    State(state): State<ReportsState>,
    Extension(user_id): Extension<UserId>,
    query: Result<Query<ReportsQuery>, QueryRejection>,
) -> Result<Json<ReportPage>, Error> {
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
    list_reports(user_id, page, &connection).map(Json)
}

/// The state needed for reading and updating report settings.
#[derive(Clone)]
pub struct ReportSettingState {
    /// The database connection for reading and writing settings.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The source of the current time for scheduling the next report.
    pub clock: Arc<dyn Clock>,
}

impl FromRef<AppState> for ReportSettingState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            clock: state.clock.clone(),
        }
    }
}

/// Get the signed-in user's report setting.
pub async fn get_report_setting_endpoint(
    State(state): State<ReportSettingState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<ReportSetting>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    get_report_setting(user_id, &connection).map(Json)
}

/// Apply a partial update to the signed-in user's report setting and return the result.
///
/// The body may only contain `isEnabled` and `frequency`.
pub async fn update_report_setting_endpoint(
    State(state): State<ReportSettingState>,
    Extension(user_id): Extension<UserId>,
    patch: Result<Json<ReportSettingPatch>, JsonRejection>,
) -> Result<Json<ReportSetting>, Error> {
    let Json(patch) = patch.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;
    let now = state.clock.now();

    let connection = lock_connection(&state.db_connection)?;
    let setting =
        update_report_setting(user_id, patch, now, state.clock.timezone(), &connection)?;

    tracing::info!(
        "user {user_id} {} {} reports",
        if setting.is_enabled {
            "enabled"
        } else {
            "disabled"
        },
        setting.frequency
    );

    Ok(Json(setting))
}

/// The state needed for summarising a date range.
#[derive(Debug, Clone)]
pub struct ReportSummaryState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ReportSummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The inclusive date range to summarise.
#[derive(Debug, Deserialize)]
pub struct ReportSummaryQuery {
    /// The first day to include.
    pub from: Date,
    /// The last day to include.
    pub to: Date,
}

/// Summarise the signed-in user's transactions between two dates without storing a report.
pub async fn get_report_summary(
    State(state): State<ReportSummaryState>,
    Extension(user_id): Extension<UserId>,
    query: Result<Query<ReportSummaryQuery>, QueryRejection>,
) -> Result<Json<ReportSummary>, Error> {
    let Query(query) = query.map_err(|rejection| Error::InvalidPayload(rejection.body_text()))?;
    let period = ReportPeriod::new(query.from, query.to)?;

    let connection = lock_connection(&state.db_connection)?;
    let transactions = get_transactions_in_range(user_id, period.start, period.end, &connection)?;

    Ok(Json(summarise(period, &transactions)))
}

fn lock_connection(db_connection: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}
