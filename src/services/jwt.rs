use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::AppError;
use crate::models::Role;

/// Session token service. Tokens are HS256-signed with the configured
/// secret and carry the resolved identity and role.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_days: i64,
}

/// Session token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (organization or facility id)
    pub sub: Uuid,
    /// Resolved role at login time
    pub role: Role,
    /// Email
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl Claims {
    /// Role-restricted operations call this before any handler logic.
    pub fn require_role(&self, role: Role, message: &'static str) -> Result<(), AppError> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!(message)))
        }
    }
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            expiry_days: config.expiry_days,
        }
    }

    /// Generate a session token for a resolved principal.
    pub fn generate_token(&self, id: Uuid, role: Role, email: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::days(self.expiry_days);

        let claims = Claims {
            sub: id,
            role,
            email: email.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to encode token: {}", e)))?;

        Ok(token)
    }

    /// Validate signature and expiry, returning the claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid or expired token")))?;

        Ok(token_data.claims)
    }
}
