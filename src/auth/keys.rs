// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Where token verification keys come from.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Header};

use super::{AuthError, JwksManager};

#[derive(Clone)]
pub enum KeySource {
    /// Asymmetric keys published by the authority.
    Jwks(Arc<JwksManager>),
    /// Shared HS256 secret (`Jwt:SigningKey`).
    Shared(DecodingKey),
}

impl KeySource {
    pub fn shared_secret(secret: &str) -> Self {
        Self::Shared(DecodingKey::from_secret(secret.as_bytes()))
    }

    /// Pick the key and algorithm used to verify a token with `header`.
    pub async fn resolve(&self, header: &Header) -> Result<(DecodingKey, Algorithm), AuthError> {
        match self {
            Self::Shared(key) => Ok((key.clone(), Algorithm::HS256)),
            Self::Jwks(jwks) => match &header.kid {
                Some(kid) => jwks.get_decoding_key(kid).await,
                None => jwks.get_any_decoding_key().await,
            },
        }
    }
}
