// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::Deserialize;

/// Claims read from a bearer token.
///
/// `exp`, `iss`, `aud` and `nbf` are checked by `jsonwebtoken` during
/// decoding; only the fields the service uses are kept here.
#[derive(Debug, Clone, Deserialize)]
pub struct BearerClaims {
    /// Subject - the caller's identifier at the authority
    pub sub: String,

    /// Expiration timestamp
    pub exp: i64,

    #[serde(default)]
    pub iss: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// Space-separated OAuth scopes
    #[serde(default)]
    pub scope: Option<String>,
}

/// Authenticated caller extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub scopes: Vec<String>,
    /// Issuer of the token, if it carried one
    pub issuer: Option<String>,
    /// Token expiration (Unix timestamp)
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: BearerClaims) -> Self {
        let scopes = claims
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Self {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            scopes,
            issuer: claims.iss,
            expires_at: claims.exp,
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}
