//! Bearer token issue and verification.
//!
//! Tokens are stateless HMAC JWTs. There is no revocation list; instead a
//! token whose `iat` predates process start is rejected, so a restart
//! invalidates every outstanding session at once.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// JWT claims payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user id.
    pub sub: String,
    /// Email at time of issue.
    pub email: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

/// Signing material plus the process start time used for the
/// invalidate-on-restart check. Built once in `main` and shared.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    token_hours: u64,
    boot_time: i64,
}

impl JwtKeys {
    pub fn new(secret: Option<&str>, token_hours: u64) -> Self {
        let secret = match secret {
            Some(s) => s.as_bytes().to_vec(),
            None => {
                // No configured secret: generate one for this process.
                let mut bytes = [0u8; 32];
                rand::thread_rng().fill_bytes(&mut bytes);
                tracing::info!("No jwt_secret configured, generated an ephemeral one");
                hex::encode(bytes).into_bytes()
            }
        };

        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            encoding: EncodingKey::from_secret(&secret),
            decoding: DecodingKey::from_secret(&secret),
            validation,
            token_hours,
            boot_time: Utc::now().timestamp(),
        }
    }

    #[cfg(test)]
    pub fn with_boot_time(mut self, boot_time: i64) -> Self {
        self.boot_time = boot_time;
        self
    }

    /// Issue a token for a user.
    pub fn issue(&self, user_id: &str, email: &str) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + self.token_hours as i64 * 3600,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Token encoding failed: {}", e)))
    }

    /// Verify a token and return its claims. Fails on bad signature,
    /// expiry, or issue before process start.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|_| AppError::AuthenticationRequired)?;

        if data.claims.iat < self.boot_time {
            return Err(AppError::AuthenticationRequired);
        }

        Ok(data.claims)
    }
}
