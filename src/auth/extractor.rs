// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Validation};

use super::{claims::BearerClaims, AuthError, AuthenticatedUser};
use crate::state::{AppState, AuthConfig};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Extractor for authenticated users.
///
/// Validates the bearer token from the Authorization header against the
/// configured key source. When authentication is not configured every
/// request is rejected with [`AuthError::NotConfigured`].
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;

        let user = verify_token(token, &state.auth_config).await?;
        parts.extensions.insert(user.clone());

        Ok(Auth(user))
    }
}

/// Verify a bearer token and extract the caller.
pub async fn verify_token(token: &str, config: &AuthConfig) -> Result<AuthenticatedUser, AuthError> {
    let keys = config.keys.as_ref().ok_or(AuthError::NotConfigured)?;

    let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
    let (decoding_key, algorithm) = keys.resolve(&header).await?;

    let mut validation = Validation::new(algorithm);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.validate_nbf = true;

    // Authorities differ on whether `iss` carries a trailing slash.
    if let Some(ref issuer) = config.issuer {
        validation.set_issuer(&[issuer.clone(), format!("{issuer}/")]);
    }

    match config.audience {
        Some(ref audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let token_data =
        decode::<BearerClaims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            _ => AuthError::MalformedToken,
        })?;

    Ok(AuthenticatedUser::from_claims(token_data.claims))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::KeySource;
    use crate::db::{ConnectionString, Database};
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub(crate) const SECRET: &str = "test-signing-key-with-enough-entropy";
    pub(crate) const ISSUER: &str = "https://auth.example.com";
    pub(crate) const AUDIENCE: &str = "transferencia-api";

    pub(crate) fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    pub(crate) fn sign(claims: serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    pub(crate) fn valid_claims() -> serde_json::Value {
        json!({
            "sub": "conta_123",
            "exp": now() + 3600,
            "iss": ISSUER,
            "aud": AUDIENCE,
            "name": "Ana",
            "scope": "transferencia.write"
        })
    }

    pub(crate) fn shared_key_config() -> AuthConfig {
        AuthConfig {
            keys: Some(KeySource::shared_secret(SECRET)),
            issuer: Some(ISSUER.to_string()),
            audience: Some(AUDIENCE.to_string()),
        }
    }

    pub(crate) fn test_state(auth_config: AuthConfig) -> AppState {
        let cs: ConnectionString = "Data Source=:memory:".parse().unwrap();
        let database = Database::open(&cs, Duration::from_secs(1)).unwrap();
        AppState::new(database, auth_config)
    }

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = value {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    async fn verify(claims: serde_json::Value) -> Result<AuthenticatedUser, AuthError> {
        verify_token(&sign(claims, SECRET), &shared_key_config()).await
    }

    #[tokio::test]
    async fn valid_token_yields_user() {
        let user = verify(valid_claims()).await.unwrap();
        assert_eq!(user.user_id, "conta_123");
        assert_eq!(user.name.as_deref(), Some("Ana"));
        assert!(user.has_scope("transferencia.write"));
    }

    #[tokio::test]
    async fn issuer_with_trailing_slash_is_accepted() {
        let mut claims = valid_claims();
        claims["iss"] = json!(format!("{ISSUER}/"));
        assert!(verify(claims).await.is_ok());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let mut claims = valid_claims();
        claims["exp"] = json!(now() - 3600);
        assert!(matches!(verify(claims).await, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn future_not_before_is_rejected() {
        let mut claims = valid_claims();
        claims["nbf"] = json!(now() + 3600);
        assert!(matches!(
            verify(claims).await,
            Err(AuthError::TokenNotYetValid)
        ));
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let mut claims = valid_claims();
        claims["aud"] = json!("another-api");
        assert!(matches!(
            verify(claims).await,
            Err(AuthError::InvalidAudience)
        ));
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected() {
        let mut claims = valid_claims();
        claims["iss"] = json!("https://evil.example.com");
        assert!(matches!(verify(claims).await, Err(AuthError::InvalidIssuer)));
    }

    #[tokio::test]
    async fn wrong_signature_is_rejected() {
        let token = sign(valid_claims(), "some-other-secret-entirely-different");
        let result = verify_token(&token, &shared_key_config()).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn audience_is_ignored_when_not_configured() {
        let mut config = shared_key_config();
        config.audience = None;
        let mut claims = valid_claims();
        claims["aud"] = json!("anything");

        let token = sign(claims, SECRET);
        assert!(verify_token(&token, &config).await.is_ok());
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let result = verify_token("not.a.jwt", &shared_key_config()).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }

    #[tokio::test]
    async fn unconfigured_auth_fails_closed() {
        let token = sign(valid_claims(), SECRET);
        let result = verify_token(&token, &AuthConfig::default()).await;
        assert!(matches!(result, Err(AuthError::NotConfigured)));
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let state = test_state(shared_key_config());
        let mut parts = parts_with_auth(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_non_bearer_scheme() {
        let state = test_state(shared_key_config());
        let mut parts = parts_with_auth(Some("Basic dXNlcjpwYXNz"));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_jwt() {
        let state = test_state(shared_key_config());
        let token = sign(valid_claims(), SECRET);
        let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "conta_123");
        // Cached for later extractors on the same request.
        assert_eq!(parts.extensions.get::<AuthenticatedUser>(), Some(&user));
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let state = test_state(AuthConfig::default());
        let mut parts = parts_with_auth(None);

        let user = AuthenticatedUser {
            user_id: "user_from_middleware".to_string(),
            name: None,
            email: None,
            scopes: Vec::new(),
            issuer: None,
            expires_at: 0,
        };
        parts.extensions.insert(user);

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.user_id, "user_from_middleware");
    }
}
