// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is assembled once at startup into an [`AppConfig`] and
//! passed to every component that needs it. Sources, later ones winning:
//!
//! 1. built-in defaults
//! 2. `<base_dir>/appsettings.json`
//! 3. `<base_dir>/appsettings.<Environment>.json`
//! 4. environment variables (`__` separates sections)
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_ENVIRONMENT` | `Development`, `Docker`, `Production`, ... | `Production` |
//! | `APP_BASE_DIR` | Directory holding `appsettings*.json` and `Data/Scripts` | executable directory |
//! | `CONNECTIONSTRINGS__DEFAULTCONNECTION` | SQLite connection string | `Data Source=transferencia.db` |
//! | `JWT__AUTHORITY` | Token issuer base URL (OpenID discovery) | unset |
//! | `JWT__AUDIENCE` | Expected `aud` claim | unset |
//! | `JWT__VALIDATEAUDIENCE` | Set `false` to accept tokens for any audience | `true` |
//! | `JWT__SIGNINGKEY` | Shared HS256 secret, used instead of the authority's keys | unset |
//! | `DATABASE__COMMANDTIMEOUTSECS` | SQLite busy timeout | `30` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate and key; enables HTTPS | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! Section variables are also accepted in their mixed-case form, e.g.
//! `ConnectionStrings__DefaultConnection`.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::db::{ConnectionString, ConnectionStringError, DEFAULT_CONNECTION_STRING};

pub const APP_ENVIRONMENT_ENV: &str = "APP_ENVIRONMENT";
/// Fallback environment variable recognised for existing deployments.
pub const ASPNETCORE_ENVIRONMENT_ENV: &str = "ASPNETCORE_ENVIRONMENT";
pub const APP_BASE_DIR_ENV: &str = "APP_BASE_DIR";
pub const CONNECTION_STRING_ENV: &str = "ConnectionStrings__DefaultConnection";
pub const JWT_AUTHORITY_ENV: &str = "Jwt__Authority";
pub const JWT_AUDIENCE_ENV: &str = "Jwt__Audience";
pub const JWT_VALIDATE_AUDIENCE_ENV: &str = "Jwt__ValidateAudience";
pub const JWT_SIGNING_KEY_ENV: &str = "Jwt__SigningKey";
pub const DB_COMMAND_TIMEOUT_ENV: &str = "Database__CommandTimeoutSecs";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
const SETTINGS_FILE_STEM: &str = "appsettings";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to determine application base directory: {0}")]
    BaseDir(#[source] std::io::Error),

    #[error("failed to read settings file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid ConnectionStrings:DefaultConnection: {0}")]
    ConnectionString(#[from] ConnectionStringError),

    #[error("invalid Jwt:Authority '{value}': {source}")]
    Authority {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("TLS requires both TLS_CERT_PATH and TLS_KEY_PATH")]
    IncompleteTls,
}

// =============================================================================
// Runtime environment
// =============================================================================

/// Hosting environment the process runs in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RuntimeEnvironment {
    Development,
    Docker,
    Staging,
    #[default]
    Production,
    Other(String),
}

impl RuntimeEnvironment {
    /// Parse an environment name (case-insensitive).
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "development" => Self::Development,
            "docker" => Self::Docker,
            "staging" => Self::Staging,
            "production" => Self::Production,
            _ => Self::Other(name.trim().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Development => "Development",
            Self::Docker => "Docker",
            Self::Staging => "Staging",
            Self::Production => "Production",
            Self::Other(name) => name,
        }
    }

    /// Swagger UI and the OpenAPI document are only served here.
    pub fn exposes_api_docs(&self) -> bool {
        matches!(self, Self::Development | Self::Docker)
    }
}

impl fmt::Display for RuntimeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Log format
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    /// Read `LOG_FORMAT` from the process environment.
    ///
    /// Logging starts before the rest of the configuration is loaded, so
    /// this is read on its own. Unknown values fall back to `pretty`.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }

    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

/// JWT bearer authentication settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtSettings {
    /// Issuer base URL, as configured.
    pub authority: Option<String>,
    pub audience: Option<String>,
    pub validate_audience: bool,
    pub signing_key: Option<String>,
}

impl Default for JwtSettings {
    fn default() -> Self {
        Self {
            authority: None,
            audience: None,
            validate_audience: true,
            signing_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub connection_string: ConnectionString,
    /// How long SQLite waits on a locked database before failing.
    pub command_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    pub tls: Option<TlsSettings>,
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub environment: RuntimeEnvironment,
    pub base_dir: PathBuf,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub server: ServerSettings,
}

// =============================================================================
// Settings files
// =============================================================================

/// Shape of `appsettings*.json`. Unknown sections are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SettingsFile {
    #[serde(default)]
    connection_strings: ConnectionStringsSection,
    #[serde(default)]
    jwt: JwtSection,
    #[serde(default)]
    database: DatabaseSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConnectionStringsSection {
    default_connection: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JwtSection {
    authority: Option<String>,
    audience: Option<String>,
    validate_audience: Option<bool>,
    signing_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DatabaseSection {
    command_timeout_secs: Option<u64>,
}

impl SettingsFile {
    /// Load a settings file; a missing file yields empty settings.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay `other` on top of `self`.
    fn merge(self, other: Self) -> Self {
        Self {
            connection_strings: ConnectionStringsSection {
                default_connection: other
                    .connection_strings
                    .default_connection
                    .or(self.connection_strings.default_connection),
            },
            jwt: JwtSection {
                authority: other.jwt.authority.or(self.jwt.authority),
                audience: other.jwt.audience.or(self.jwt.audience),
                validate_audience: other.jwt.validate_audience.or(self.jwt.validate_audience),
                signing_key: other.jwt.signing_key.or(self.jwt.signing_key),
            },
            database: DatabaseSection {
                command_timeout_secs: other
                    .database
                    .command_timeout_secs
                    .or(self.database.command_timeout_secs),
            },
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl AppConfig {
    /// Load configuration from the process environment and settings files.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` for environment variables.
    pub fn load<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup_var(&lookup, key);

        let environment = var(APP_ENVIRONMENT_ENV)
            .or_else(|| var(ASPNETCORE_ENVIRONMENT_ENV))
            .map(|name| RuntimeEnvironment::parse(&name))
            .unwrap_or_default();

        let base_dir = match var(APP_BASE_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => default_base_dir()?,
        };

        let settings = SettingsFile::load(&base_dir.join(format!("{SETTINGS_FILE_STEM}.json")))?
            .merge(SettingsFile::load(&base_dir.join(format!(
                "{SETTINGS_FILE_STEM}.{}.json",
                environment.name()
            )))?)
            .merge(settings_from_env(&var)?);

        let connection_string: ConnectionString = settings
            .connection_strings
            .default_connection
            .as_deref()
            .unwrap_or(DEFAULT_CONNECTION_STRING)
            .parse()?;

        let command_timeout = Duration::from_secs(
            settings
                .database
                .command_timeout_secs
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
        );

        let authority = non_blank(settings.jwt.authority);
        if let Some(ref value) = authority {
            Url::parse(value).map_err(|source| ConfigError::Authority {
                value: value.clone(),
                source,
            })?;
        }

        let jwt = JwtSettings {
            authority,
            audience: non_blank(settings.jwt.audience),
            validate_audience: settings.jwt.validate_audience.unwrap_or(true),
            signing_key: non_blank(settings.jwt.signing_key),
        };

        let server = server_settings(&var)?;

        Ok(Self {
            environment,
            base_dir,
            database: DatabaseSettings {
                connection_string,
                command_timeout,
            },
            jwt,
            server,
        })
    }
}

/// Look up `key` as given, then upper-cased.
fn lookup_var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).or_else(|| lookup(&key.to_uppercase()))
}

fn settings_from_env(var: &impl Fn(&str) -> Option<String>) -> Result<SettingsFile, ConfigError> {
    Ok(SettingsFile {
        connection_strings: ConnectionStringsSection {
            default_connection: var(CONNECTION_STRING_ENV),
        },
        jwt: JwtSection {
            authority: var(JWT_AUTHORITY_ENV),
            audience: var(JWT_AUDIENCE_ENV),
            validate_audience: var(JWT_VALIDATE_AUDIENCE_ENV)
                .map(|v| parse_bool(JWT_VALIDATE_AUDIENCE_ENV, &v))
                .transpose()?,
            signing_key: var(JWT_SIGNING_KEY_ENV),
        },
        database: DatabaseSection {
            command_timeout_secs: var(DB_COMMAND_TIMEOUT_ENV)
                .map(|v| {
                    v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                        key: DB_COMMAND_TIMEOUT_ENV,
                        value: v,
                    })
                })
                .transpose()?,
        },
    })
}

fn server_settings(var: &impl Fn(&str) -> Option<String>) -> Result<ServerSettings, ConfigError> {
    let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = match var(PORT_ENV) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: PORT_ENV,
            value,
        })?,
        None => DEFAULT_PORT,
    };

    let candidate = format!("{host}:{port}");
    let bind_addr = candidate
        .parse()
        .map_err(|_| ConfigError::BindAddress(candidate.clone()))?;

    let tls = match (var(TLS_CERT_PATH_ENV), var(TLS_KEY_PATH_ENV)) {
        (Some(cert), Some(key)) => Some(TlsSettings {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => return Err(ConfigError::IncompleteTls),
    };

    Ok(ServerSettings { bind_addr, tls })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Directory containing the running executable.
fn default_base_dir() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(ConfigError::BaseDir)?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        ConfigError::BaseDir(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "executable has no parent directory",
        ))
    })
}
