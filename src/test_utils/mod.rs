#![allow(missing_docs)]

pub(crate) mod db;
pub(crate) mod http;

pub(crate) use db::{create_test_user, get_test_connection};
pub(crate) use http::{USER_ID_HEADER_NAME, user_id_header_value};
