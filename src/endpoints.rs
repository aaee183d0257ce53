//! The API endpoints URIs.

/// The route for listing the signed-in user's reports, one page at a time.
pub const REPORTS: &str = "/api/report/all";
/// The route for reading and updating the signed-in user's report setting.
pub const REPORT_SETTING: &str = "/api/report/setting";
/// The route for summarising an arbitrary date range without storing a report.
pub const REPORT_SUMMARY: &str = "/api/report/summary";

/// The route for listing the signed-in user's transactions, one page at a time.
pub const TRANSACTIONS: &str = "/api/transaction/all";
/// The route for reading a single transaction.
pub const TRANSACTION: &str = "/api/transaction/{transaction_id}";
/// The route for creating a transaction.
pub const CREATE_TRANSACTION: &str = "/api/transaction/create";
/// The route for creating many transactions in one request.
pub const BULK_CREATE_TRANSACTIONS: &str = "/api/transaction/bulk-transaction";
/// The route for replacing a transaction.
pub const UPDATE_TRANSACTION: &str = "/api/transaction/update/{transaction_id}";
/// The route for copying a transaction.
pub const DUPLICATE_TRANSACTION: &str = "/api/transaction/duplicate/{transaction_id}";
/// The route for deleting a transaction.
pub const DELETE_TRANSACTION: &str = "/api/transaction/delete/{transaction_id}";
/// The route for deleting many transactions in one request.
pub const BULK_DELETE_TRANSACTIONS: &str = "/api/transaction/bulk-delete";

/// Replace the first `{parameter}` in `endpoint_path` with `id`.
///
/// Returns `endpoint_path` unchanged if it has no parameter.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };
    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |offset| param_start + offset + 1);

    format!(
        "{}{id}{}",
        &endpoint_path[..param_start],
        &endpoint_path[param_end..]
    )
}
