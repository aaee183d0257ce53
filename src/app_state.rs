//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, clock::Clock, db::initialize, pagination::PaginationConfig};

/// The state of the REST server.
#[derive(Clone)]
pub struct AppState {
    /// The config that controls the default page of reports.
    pub pagination_config: PaginationConfig,

    /// The source of the current time, in the server's local timezone.
    pub clock: Arc<dyn Clock>,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pagination_config", &self.pagination_config)
            .field("now", &self.clock.now())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        clock: Arc<dyn Clock>,
        pagination_config: PaginationConfig,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            pagination_config,
            clock,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{AppState, clock::FixedClock, pagination::PaginationConfig};

    #[test]
    fn new_initializes_database() {
        let connection = Connection::open_in_memory().unwrap();

        let state = AppState::new(
            connection,
            Arc::new(FixedClock::utc(datetime!(2025-04-01 00:00 UTC))),
            PaginationConfig::default(),
        )
        .unwrap();

        let connection = state.db_connection.lock().unwrap();
        let table_count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                AND name IN ('user', 'transaction', 'report_setting', 'report')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 4);
    }
}
