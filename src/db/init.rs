// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! One-shot database initialization from a bundled SQL script.
//!
//! At startup the service looks for `Data/Scripts/transferencia.sql` under
//! its base directory. When present, the whole file is sent to SQLite as a
//! single batch. When absent, a warning is logged and startup continues.
//! Any other failure aborts startup.
//!
//! The script runs on its own connection, so a private in-memory database
//! would receive the schema and vanish with that connection. Such data
//! sources are rejected whenever a script is present; named shared-cache
//! memory databases work as long as another connection keeps them alive.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use super::connection::{ConnectionString, OpenError};

/// Script location relative to the application base directory.
const SCRIPT_SEGMENTS: [&str; 3] = ["Data", "Scripts", "transferencia.sql"];

/// UTF-8 byte order mark some editors prepend to SQL files.
const UTF8_BOM: char = '\u{feff}';

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to read initialization script {path}: {source}")]
    ReadScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Open(#[from] OpenError),

    #[error("initialization script {path} failed: {source}")]
    Execute {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to close database after initialization: {0}")]
    Close(#[source] rusqlite::Error),

    #[error(
        "in-memory data source '{data_source}' is private to one connection; \
         use a named database with Mode=Memory;Cache=Shared"
    )]
    PrivateMemoryDatabase { data_source: String },
}

/// Result of a successful initializer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// No script at `path`; nothing was executed.
    ScriptMissing { path: PathBuf },
    /// The script at `path` was executed once.
    ScriptExecuted { path: PathBuf },
}

/// Absolute path of the initialization script for a base directory.
pub fn script_path(base_dir: &Path) -> PathBuf {
    SCRIPT_SEGMENTS
        .iter()
        .fold(base_dir.to_path_buf(), |path, segment| path.join(segment))
}

/// Execute the initialization script against the configured database.
///
/// The connection is opened only when the script exists, and is released
/// before this function returns on every path.
pub fn ensure_database_created(
    connection_string: &ConnectionString,
    base_dir: &Path,
    busy_timeout: Duration,
) -> Result<InitOutcome, InitError> {
    let path = script_path(base_dir);

    if !path.is_file() {
        warn!(path = %path.display(), "Initialization script not found, skipping database setup");
        return Ok(InitOutcome::ScriptMissing { path });
    }

    if connection_string.is_memory() && !connection_string.is_shared_memory() {
        return Err(InitError::PrivateMemoryDatabase {
            data_source: connection_string.data_source().to_string(),
        });
    }

    let script = std::fs::read_to_string(&path).map_err(|source| InitError::ReadScript {
        path: path.clone(),
        source,
    })?;
    let script = script.strip_prefix(UTF8_BOM).unwrap_or(&script);

    let conn = connection_string.open(busy_timeout)?;

    // On error `conn` is dropped here, which closes it.
    conn.execute_batch(script)
        .map_err(|source| InitError::Execute {
            path: path.clone(),
            source,
        })?;

    conn.close().map_err(|(_, e)| InitError::Close(e))?;

    info!(
        path = %path.display(),
        data_source = connection_string.data_source(),
        "Initialization script executed successfully"
    );
    Ok(InitOutcome::ScriptExecuted { path })
}
