// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # SQLite Database
//!
//! - `connection` - connection string parsing and scoped connections
//! - `init` - startup script execution (`Data/Scripts/transferencia.sql`)
//! - `shared` - the long-lived connection handed to request handlers

pub mod connection;
pub mod init;
pub mod shared;

pub use connection::{
    CacheMode, ConnectionString, ConnectionStringError, OpenError, OpenMode,
    DEFAULT_CONNECTION_STRING,
};
pub use init::{ensure_database_created, script_path, InitError, InitOutcome};
pub use shared::{Database, DatabaseError};
