// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Composition root.
//!
//! Every service is constructed here from the loaded [`AppConfig`], in
//! order: shared database handle, database initialization, authentication,
//! and finally the HTTP router.
//!
//! The shared handle is opened first so a shared-cache memory database is
//! still alive when the initialization script runs against it.

use axum::Router;
use tracing::info;

use crate::{
    api,
    auth::AuthConfigError,
    config::{AppConfig, ConfigError},
    db::{self, Database, InitError, InitOutcome, OpenError},
    state::{AppState, AuthConfig},
};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("database initialization failed: {0}")]
    Init(#[from] InitError),

    #[error("failed to open application database: {0}")]
    Database(#[from] OpenError),

    #[error("invalid authentication configuration: {0}")]
    Auth(#[from] AuthConfigError),

    #[error("failed to load TLS credentials: {0}")]
    Tls(#[source] std::io::Error),

    #[error("server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Run startup initialization and build the shared application state.
pub fn build_state(config: &AppConfig) -> Result<AppState, StartupError> {
    let database = Database::open(
        &config.database.connection_string,
        config.database.command_timeout,
    )?;

    let outcome = db::ensure_database_created(
        &config.database.connection_string,
        &config.base_dir,
        config.database.command_timeout,
    )?;
    if let InitOutcome::ScriptExecuted { ref path } = outcome {
        tracing::debug!(path = %path.display(), "Database schema initialized");
    }
    let auth_config = AuthConfig::from_settings(&config.jwt)?;

    Ok(AppState::new(database, auth_config))
}

/// Build the fully wired application router.
pub fn compose(config: &AppConfig) -> Result<Router, StartupError> {
    let state = build_state(config)?;
    let expose_docs = config.environment.exposes_api_docs();

    info!(
        environment = %config.environment,
        data_source = state.database.data_source(),
        auth_enabled = state.auth_config.is_enabled(),
        api_docs = expose_docs,
        "Services composed"
    );

    Ok(api::router(state, expose_docs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DatabaseSettings, JwtSettings, RuntimeEnvironment, ServerSettings,
    };
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    fn config_for(dir: &Path, environment: RuntimeEnvironment) -> AppConfig {
        AppConfig {
            environment,
            base_dir: dir.to_path_buf(),
            database: DatabaseSettings {
                connection_string: format!("Data Source={}", dir.join("app.db").display())
                    .parse()
                    .unwrap(),
                command_timeout: Duration::from_secs(5),
            },
            jwt: JwtSettings::default(),
            server: ServerSettings {
                bind_addr: "127.0.0.1:0".parse().unwrap(),
                tls: None,
            },
        }
    }

    fn write_script(dir: &Path, sql: &str) -> PathBuf {
        let path = db::script_path(dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, sql).unwrap();
        path
    }

    #[tokio::test]
    async fn script_schema_is_visible_through_shared_handle() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "CREATE TABLE transferencia (id TEXT PRIMARY KEY);");
        let config = config_for(dir.path(), RuntimeEnvironment::Production);

        let state = build_state(&config).unwrap();

        assert_eq!(table_count(&state, "transferencia").await, 1);
    }

    async fn table_count(state: &AppState, name: &'static str) -> i64 {
        state
            .database
            .with_connection(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
                    [name],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn shared_memory_database_keeps_script_schema() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "CREATE TABLE transferencia (id TEXT PRIMARY KEY);");
        let mut config = config_for(dir.path(), RuntimeEnvironment::Production);
        config.database.connection_string =
            "Data Source=bootstrap-banco;Mode=Memory;Cache=Shared".parse().unwrap();

        let state = build_state(&config).unwrap();

        assert_eq!(table_count(&state, "transferencia").await, 1);
    }

    #[test]
    fn private_memory_database_with_script_aborts_startup() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "CREATE TABLE transferencia (id TEXT PRIMARY KEY);");
        let mut config = config_for(dir.path(), RuntimeEnvironment::Production);
        config.database.connection_string = "Data Source=:memory:".parse().unwrap();

        let err = build_state(&config).err().expect("startup should fail");
        assert!(matches!(
            err,
            StartupError::Init(InitError::PrivateMemoryDatabase { .. })
        ));
    }

    #[test]
    fn missing_script_does_not_block_startup() {
        let dir = TempDir::new().unwrap();
        let config = config_for(dir.path(), RuntimeEnvironment::Development);
        assert!(compose(&config).is_ok());
    }

    #[test]
    fn broken_script_aborts_startup() {
        let dir = TempDir::new().unwrap();
        write_script(dir.path(), "CREATE TABLE;");
        let config = config_for(dir.path(), RuntimeEnvironment::Production);

        let err = compose(&config).err().expect("startup should fail");
        assert!(matches!(err, StartupError::Init(InitError::Execute { .. })));
    }

    #[test]
    fn audience_policy_is_enforced_at_startup() {
        let dir = TempDir::new().unwrap();
        let mut config = config_for(dir.path(), RuntimeEnvironment::Production);
        config.jwt.authority = Some("https://auth.example.com".to_string());

        let err = compose(&config).err().expect("startup should fail");
        assert!(matches!(
            err,
            StartupError::Auth(AuthConfigError::AudienceRequired)
        ));
    }
}
