//! AuthGate — credential issuance and validation.
//!
//! ARCHITECTURE
//! ============
//! Credentials are HS256 JWTs signed with the configured secret. The rest of
//! the service treats them as opaque strings: handlers hand a credential in
//! (bearer header, or `token` query parameter on WebSocket upgrades, which is
//! treated identically) and get a subject identity out. Passwords are hashed
//! with argon2id and never stored or logged in the clear.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid or expired credential")]
    InvalidCredential,
    #[error("credential issuance failed: {0}")]
    Issue(#[from] jsonwebtoken::errors::Error),
    #[error("password hashing failed")]
    Hash,
}

/// Claims carried inside a credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id.
    pub sub: Uuid,
    pub email: String,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Issued-at, unix seconds.
    pub iat: i64,
}

/// Issues and validates bearer credentials.
#[derive(Clone)]
pub struct AuthGate {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_secs: i64,
}

impl AuthGate {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.token_secret.as_bytes()),
            expiry_secs: config.token_expiry.as_secs() as i64,
        }
    }

    /// Issue a credential for a subject. Returns the token and its expiry
    /// as unix seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue(&self, subject: Uuid, email: &str) -> Result<(String, i64), AuthError> {
        let now = Utc::now().timestamp();
        let exp = now + self.expiry_secs;
        let claims = Claims { sub: subject, email: email.to_owned(), exp, iat: now };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)?;
        Ok((token, exp))
    }

    /// Validate a credential and return its claims. Expiry is enforced.
    ///
    /// # Errors
    ///
    /// `InvalidCredential` for malformed, tampered, or expired tokens.
    pub fn validate(&self, credential: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(credential, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidCredential)
    }
}

// =============================================================================
// PASSWORDS
// =============================================================================

/// Hash a password with argon2id and a random salt.
///
/// # Errors
///
/// Returns `AuthError::Hash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::Hash)
}

/// Verify a password against a stored argon2id hash.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

// =============================================================================
// HELPERS
// =============================================================================

/// Extract the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    (scheme == "Bearer" && !token.is_empty()).then_some(token)
}

/// Normalize an email for storage and lookup: trimmed, lowercase.
#[must_use]
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
