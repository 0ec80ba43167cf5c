// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! JWT bearer authentication for the transfer API.
//!
//! ## Auth Flow
//!
//! 1. Client obtains a token from the configured authority
//! 2. Client sends `Authorization: Bearer <JWT>`
//! 3. Server:
//!    - Resolves the verification key (authority JWKS or shared secret)
//!    - Verifies signature, expiry, not-before, issuer and audience
//!    - Extracts `sub` as the canonical `user_id`
//!
//! ## Security
//!
//! - Health and documentation endpoints are public; everything else
//!   requires a token
//! - Without an authority or signing key, protected endpoints fail closed
//! - JWKS is cached with TTL for performance
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod keys;

pub use claims::AuthenticatedUser;
pub use error::{AuthConfigError, AuthError};
pub use extractor::Auth;
pub use jwks::JwksManager;
pub use keys::KeySource;
