// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tracing::warn;

use crate::auth::{AuthConfigError, JwksManager, KeySource};
use crate::config::JwtSettings;
use crate::db::Database;

/// Token verification settings.
///
/// `keys: None` means authentication is not configured and protected
/// endpoints reject every request.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub keys: Option<KeySource>,
    /// Expected issuer, without trailing slash
    pub issuer: Option<String>,
    /// Expected audience; `None` skips the audience check
    pub audience: Option<String>,
}

impl AuthConfig {
    /// Build the auth configuration from `Jwt:*` settings.
    ///
    /// A shared signing key takes precedence over the authority's JWKS; the
    /// authority is still used as the expected issuer. When keys are
    /// configured, an audience must be set unless audience validation was
    /// turned off explicitly.
    pub fn from_settings(settings: &JwtSettings) -> Result<Self, AuthConfigError> {
        let issuer = settings
            .authority
            .as_deref()
            .map(|a| a.trim_end_matches('/').to_string());

        let keys = match (&settings.signing_key, &settings.authority) {
            (Some(secret), _) => Some(KeySource::shared_secret(secret)),
            (None, Some(authority)) => Some(KeySource::Jwks(Arc::new(JwksManager::new(
                authority.as_str(),
            )?))),
            (None, None) => None,
        };

        if keys.is_none() {
            warn!("JWT authentication is not configured; protected endpoints will reject all requests");
            return Ok(Self::default());
        }

        let audience = match (&settings.audience, settings.validate_audience) {
            (Some(audience), _) => Some(audience.clone()),
            (None, true) => return Err(AuthConfigError::AudienceRequired),
            (None, false) => {
                warn!("JWT audience validation is disabled by configuration");
                None
            }
        };

        Ok(Self {
            keys,
            issuer,
            audience,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.keys.is_some()
    }

    /// JWKS manager, when keys come from the authority.
    pub fn jwks(&self) -> Option<&JwksManager> {
        match &self.keys {
            Some(KeySource::Jwks(manager)) => Some(manager.as_ref()),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub auth_config: AuthConfig,
}

impl AppState {
    pub fn new(database: Database, auth_config: AuthConfig) -> Self {
        Self {
            database,
            auth_config,
        }
    }
}
