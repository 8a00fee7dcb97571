//! HS256 bearer tokens for user sessions and API tokens.
//!
//! Session tokens expire (`exp`), API tokens do not; an API token stays valid
//! only while the stored `ApiToken` entity still carries the same string.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use ulid::Ulid;

use super::error::EntityError;

/// Lifetime of a session created with `remember: true`.
pub const REMEMBER_TTL_DAYS: i64 = 30;
/// Default lifetime of a session token.
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 60 * 60 * 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    User,
    ApiToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub kind: TokenKind,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    pub jti: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_on: i64,
}

#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    session_ttl: Duration,
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys")
            .field("secret", &"***")
            .field("session_ttl", &self.session_ttl.num_seconds())
            .finish()
    }
}

impl TokenKeys {
    #[must_use]
    pub fn new(secret: &SecretString, session_ttl_seconds: i64) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            session_ttl: Duration::seconds(session_ttl_seconds.max(1)),
        }
    }

    /// Mint a session token for a user.
    ///
    /// # Errors
    /// Returns `INTERNAL` if signing fails.
    pub fn issue_session(&self, user_id: &str, remember: bool) -> Result<IssuedToken, EntityError> {
        let now = Utc::now();
        let ttl = if remember {
            Duration::days(REMEMBER_TTL_DAYS)
        } else {
            self.session_ttl
        };
        let expires_on = (now + ttl).timestamp();
        let token = self.sign(&Claims {
            sub: user_id.to_string(),
            kind: TokenKind::User,
            iat: now.timestamp(),
            exp: Some(expires_on),
            jti: Ulid::new().to_string(),
        })?;
        Ok(IssuedToken { token, expires_on })
    }

    /// Mint a non-expiring token bound to an API token entity.
    ///
    /// # Errors
    /// Returns `INTERNAL` if signing fails.
    pub fn issue_api_token(&self, token_id: &str) -> Result<String, EntityError> {
        self.sign(&Claims {
            sub: token_id.to_string(),
            kind: TokenKind::ApiToken,
            iat: Utc::now().timestamp(),
            exp: None,
            jti: Ulid::new().to_string(),
        })
    }

    /// Validate signature and expiry. Session tokens must carry `exp`.
    ///
    /// # Errors
    /// Returns `INVALID_TOKEN` for any malformed, forged or expired token.
    pub fn verify(&self, token: &str) -> Result<Claims, EntityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub"]);
        let claims = decode::<Claims>(token.trim(), &self.decoding, &validation)
            .map_err(|err| {
                debug!("token rejected: {err}");
                EntityError::InvalidToken
            })?
            .claims;
        if claims.kind == TokenKind::User && claims.exp.is_none() {
            return Err(EntityError::InvalidToken);
        }
        Ok(claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, EntityError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|err| EntityError::Internal(format!("failed to sign token: {err}")))
    }
}
