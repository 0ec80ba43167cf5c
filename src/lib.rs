// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! BancoAna - API Transferência
//!
//! Service bootstrap for the transfer API: layered configuration, one-shot
//! SQLite initialization from `Data/Scripts/transferencia.sql`, JWT bearer
//! authentication and OpenAPI documentation.
//!
//! ## Modules
//!
//! - `api` - HTTP routes and OpenAPI document (Axum)
//! - `auth` - JWT bearer authentication
//! - `bootstrap` - composition root
//! - `config` - runtime configuration
//! - `db` - SQLite connection strings, startup script, shared handle
//! - `telemetry` - logging setup

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod state;
pub mod telemetry;
