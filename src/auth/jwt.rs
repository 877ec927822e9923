//! Sign-in tokens: HS256 JWTs naming the user who signed in.

use crate::neo4j::models::User;
use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: store-assigned user id
    pub sub: String,
    pub username: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Secret and lifetime used to sign tokens
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub expiry_secs: u64,
}

impl TokenSettings {
    pub fn issue(&self, user: &User) -> Result<String> {
        encode_jwt(
            user.id.as_str(),
            &user.username,
            &self.secret,
            self.expiry_secs,
        )
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode_jwt(token, &self.secret)
    }
}

/// Encode a JWT token for the given user.
pub fn encode_jwt(user_id: &str, username: &str, secret: &str, expiry_secs: u64) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let exp = i64::try_from(expiry_secs)
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .context("Token expiry out of range")?;
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        iat: now,
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to encode JWT")
}

/// Decode and validate a JWT token.
///
/// Returns the claims if the token is valid, not expired, and
/// signed with the correct secret.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims> {
    let token_data: TokenData<Claims> = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .context("Failed to decode JWT")?;

    Ok(token_data.claims)
}

// ============================================================================
// Tests
// ============================================================================
