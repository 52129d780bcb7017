// src/auth/jwt.rs

use anyhow::{Result, anyhow};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub uid: i64,           // user id
    pub oid: i64,           // organization id
    pub email: String,
    pub exp: usize,         // expiration timestamp
}

/// HS256 signing material, built from `AuthConfig` at startup.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn create_token(&self, uid: i64, oid: i64, email: &str, ttl: chrono::Duration) -> Result<String> {
        let expiration = chrono::Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| anyhow!("Failed to calculate expiration"))?
            .timestamp() as usize;

        let claims = Claims {
            uid,
            oid,
            email: email.to_string(),
            exp: expiration,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| anyhow!("Failed to create token: {}", e))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| anyhow!("Invalid token: {}", e))
    }
}
