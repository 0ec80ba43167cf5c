// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SQLite connection strings.
//!
//! Connection strings use the ADO keyword format:
//!
//! ```text
//! Data Source=transferencia.db;Mode=ReadWriteCreate;Cache=Shared;Foreign Keys=True
//! ```
//!
//! Keywords are case-insensitive and surrounding whitespace is ignored.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

/// Connection string used when none is configured.
pub const DEFAULT_CONNECTION_STRING: &str = "Data Source=transferencia.db";

/// Special data source for a private in-memory database.
const MEMORY_DATA_SOURCE: &str = ":memory:";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("connection string has no data source")]
    MissingDataSource,

    #[error("malformed connection string segment '{0}' (expected key=value)")]
    MalformedSegment(String),

    #[error("unsupported connection string keyword '{0}'")]
    UnknownKeyword(String),

    #[error("invalid value '{value}' for connection string keyword '{keyword}'")]
    InvalidValue { keyword: String, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open database '{data_source}': {source}")]
    Open {
        data_source: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to configure database connection: {0}")]
    Configure(#[source] rusqlite::Error),
}

/// How the database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Open for reading and writing, creating the file if needed.
    #[default]
    ReadWriteCreate,
    /// Open for reading and writing; the file must exist.
    ReadWrite,
    ReadOnly,
    /// In-memory database named by the data source.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    Private,
    Shared,
}

/// A parsed SQLite connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    data_source: String,
    mode: OpenMode,
    cache: CacheMode,
    foreign_keys: Option<bool>,
}

impl ConnectionString {
    pub fn data_source(&self) -> &str {
        &self.data_source
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn cache(&self) -> CacheMode {
        self.cache
    }

    pub fn foreign_keys(&self) -> Option<bool> {
        self.foreign_keys
    }

    /// Whether the connection targets an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.mode == OpenMode::Memory || self.data_source == MEMORY_DATA_SOURCE
    }

    /// Whether every connection opened from this string reaches the same
    /// in-memory database, for as long as one of them stays open.
    ///
    /// Only named `Mode=Memory` databases with `Cache=Shared` qualify; a
    /// `:memory:` database is always private to its connection.
    pub fn is_shared_memory(&self) -> bool {
        self.mode == OpenMode::Memory
            && self.cache == CacheMode::Shared
            && self.data_source != MEMORY_DATA_SOURCE
    }

    fn open_flags(&self) -> OpenFlags {
        let mut flags = match self.mode {
            OpenMode::ReadWriteCreate => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
            OpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::Memory => {
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_MEMORY
            }
        };
        flags |= OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self.cache {
            CacheMode::Default => {}
            CacheMode::Private => flags |= OpenFlags::SQLITE_OPEN_PRIVATE_CACHE,
            CacheMode::Shared => flags |= OpenFlags::SQLITE_OPEN_SHARED_CACHE,
        }
        flags
    }

    /// Open a new connection.
    ///
    /// For `ReadWriteCreate` file databases the parent directory is created
    /// first. `busy_timeout` bounds how long a statement waits on a locked
    /// database before failing.
    pub fn open(&self, busy_timeout: Duration) -> Result<Connection, OpenError> {
        if self.mode == OpenMode::ReadWriteCreate && !self.is_memory() {
            if let Some(parent) = Path::new(&self.data_source).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|source| OpenError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
            }
        }

        let conn = Connection::open_with_flags(&self.data_source, self.open_flags()).map_err(
            |source| OpenError::Open {
                data_source: self.data_source.clone(),
                source,
            },
        )?;

        conn.busy_timeout(busy_timeout)
            .map_err(OpenError::Configure)?;

        let pragma = match self.foreign_keys {
            Some(true) => conn.execute_batch("PRAGMA foreign_keys = ON"),
            Some(false) => conn.execute_batch("PRAGMA foreign_keys = OFF"),
            None => Ok(()),
        };
        pragma.map_err(OpenError::Configure)?;

        Ok(conn)
    }
}

impl Default for ConnectionString {
    fn default() -> Self {
        Self {
            data_source: "transferencia.db".to_string(),
            mode: OpenMode::default(),
            cache: CacheMode::default(),
            foreign_keys: None,
        }
    }
}

impl FromStr for ConnectionString {
    type Err = ConnectionStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut data_source = None;
        let mut mode = OpenMode::default();
        let mut cache = CacheMode::default();
        let mut foreign_keys = None;

        for segment in s.split(';').map(str::trim).filter(|seg| !seg.is_empty()) {
            let (keyword, value) = segment
                .split_once('=')
                .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;
            let keyword = keyword.trim();
            let value = value.trim();
            let invalid = || ConnectionStringError::InvalidValue {
                keyword: keyword.to_string(),
                value: value.to_string(),
            };

            match normalize_keyword(keyword).as_str() {
                "datasource" | "filename" => {
                    if value.is_empty() {
                        return Err(ConnectionStringError::MissingDataSource);
                    }
                    data_source = Some(value.to_string());
                }
                "mode" => {
                    mode = match value.to_lowercase().as_str() {
                        "readwritecreate" => OpenMode::ReadWriteCreate,
                        "readwrite" => OpenMode::ReadWrite,
                        "readonly" => OpenMode::ReadOnly,
                        "memory" => OpenMode::Memory,
                        _ => return Err(invalid()),
                    }
                }
                "cache" => {
                    cache = match value.to_lowercase().as_str() {
                        "default" => CacheMode::Default,
                        "private" => CacheMode::Private,
                        "shared" => CacheMode::Shared,
                        _ => return Err(invalid()),
                    }
                }
                "foreignkeys" => {
                    foreign_keys = match value.to_lowercase().as_str() {
                        "true" => Some(true),
                        "false" => Some(false),
                        _ => return Err(invalid()),
                    }
                }
                _ => return Err(ConnectionStringError::UnknownKeyword(keyword.to_string())),
            }
        }

        Ok(Self {
            data_source: data_source.ok_or(ConnectionStringError::MissingDataSource)?,
            mode,
            cache,
            foreign_keys,
        })
    }
}

/// Lowercase and drop inner whitespace so `Data Source` matches `DataSource`.
fn normalize_keyword(keyword: &str) -> String {
    keyword
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Data Source={}", self.data_source)?;
        match self.mode {
            OpenMode::ReadWriteCreate => {}
            OpenMode::ReadWrite => write!(f, ";Mode=ReadWrite")?,
            OpenMode::ReadOnly => write!(f, ";Mode=ReadOnly")?,
            OpenMode::Memory => write!(f, ";Mode=Memory")?,
        }
        match self.cache {
            CacheMode::Default => {}
            CacheMode::Private => write!(f, ";Cache=Private")?,
            CacheMode::Shared => write!(f, ";Cache=Shared")?,
        }
        if let Some(enabled) = self.foreign_keys {
            write!(f, ";Foreign Keys={}", if enabled { "True" } else { "False" })?;
        }
        Ok(())
    }
}
