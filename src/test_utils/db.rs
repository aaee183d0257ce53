use rusqlite::Connection;

use crate::{
    db::initialize,
    user::{User, create_user},
};

pub(crate) fn get_test_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("Could not open in-memory SQLite database");
    initialize(&conn).expect("Could not initialize database");
    conn
}

#[track_caller]
pub(crate) fn create_test_user(name: &str, conn: &Connection) -> User {
    let email = format!("{}@example.com", name.to_lowercase());
    create_user(name, &email, conn).expect("Could not create test user")
}
