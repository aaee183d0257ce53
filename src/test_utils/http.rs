use axum::http::{HeaderName, HeaderValue};

use crate::{auth::USER_ID_HEADER, user::UserId};

pub(crate) const USER_ID_HEADER_NAME: HeaderName = HeaderName::from_static(USER_ID_HEADER);

#[track_caller]
pub(crate) fn user_id_header_value(user_id: UserId) -> HeaderValue {
    HeaderValue::from_str(&user_id.to_string()).expect("Could not create header value")
}
