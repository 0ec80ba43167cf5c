// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Application-wide database handle.
//!
//! One connection is opened at startup and shared behind a mutex. SQLite
//! calls are blocking, so every access runs on the blocking thread pool.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

use super::connection::{ConnectionString, OpenError};

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("database connection lock poisoned")]
    Poisoned,

    #[error("database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Shared SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    data_source: Arc<str>,
}

impl Database {
    /// Open the shared connection.
    pub fn open(
        connection_string: &ConnectionString,
        busy_timeout: Duration,
    ) -> Result<Self, OpenError> {
        let conn = connection_string.open(busy_timeout)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            data_source: connection_string.data_source().into(),
        })
    }

    /// Data source the connection was opened with.
    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    /// Run `f` with exclusive access to the connection on a blocking thread.
    pub async fn with_connection<T, F>(&self, f: F) -> Result<T, DatabaseError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| DatabaseError::Poisoned)?;
            f(&guard).map_err(DatabaseError::from)
        })
        .await?
    }

    /// Check that the database answers a trivial query.
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        self.with_connection(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|_| ())
    }
}
