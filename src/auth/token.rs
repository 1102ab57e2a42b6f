//! Signed, time-limited bearer tokens (HS256).

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::time::get_timestamp;

/// Token errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),

    #[error("invalid or expired token: {0}")]
    Verify(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Account email
    sub: String,
    /// Issued-at, Unix seconds
    iat: i64,
    /// Expiry, Unix seconds
    exp: i64,
}

/// Issues and verifies HS256 bearer tokens with a fixed lifetime
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: ttl_secs as i64,
        }
    }

    /// Issue a token for the given account email
    pub fn issue(&self, email: &str) -> Result<String, TokenError> {
        let now_secs = get_timestamp() / 1000;
        let claims = Claims {
            sub: email.to_string(),
            iat: now_secs,
            exp: now_secs + self.ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(TokenError::Sign)
    }

    /// Verify a token, returning the account email it was issued for
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(TokenError::Verify)?;
        Ok(data.claims.sub)
    }
}
