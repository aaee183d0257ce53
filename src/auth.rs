//! Identification of the user making a request.
//!
//! Users sign in through the authenticating gateway in front of this server,
//! which forwards the signed-in user's ID in the [USER_ID_HEADER] header.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    user::{UserId, get_user},
};

/// The header containing the ID of the signed-in user.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The state needed for the auth middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The database connection for checking that the user exists.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Middleware function that checks the request identifies an existing user.
///
/// The user ID is placed into the request and the request executed normally
/// if the user exists, otherwise a 401 Unauthorized response is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user_id): Extension<UserId>` to receive the user ID.
pub async fn user_id_guard(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(user_id) = parse_user_id(request.headers()) else {
        tracing::debug!("rejecting request without a valid {USER_ID_HEADER} header");
        return Error::Unauthorized.into_response();
    };

    let user = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return Error::DatabaseLockError.into_response();
            }
        };

        get_user(user_id, &connection)
    };

    match user {
        Ok(_) => {}
        Err(Error::NotFound) => {
            tracing::warn!("rejecting request for unknown user {user_id}");
            return Error::Unauthorized.into_response();
        }
        Err(error) => return error.into_response(),
    }

    request.extensions_mut().insert(user_id);
    next.run(request).await
}

fn parse_user_id(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .map(UserId::new)
}
