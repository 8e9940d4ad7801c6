use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Shared-secret JWT configuration, stored in actix app data.
#[derive(Clone)]
pub struct AuthConfig {
    secret: String,
    token_ttl_hours: i64,
}

impl AuthConfig {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            token_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id the rest of the system trusts as the caller's identity.
    pub sub: Uuid,
    pub admin: bool,
    pub exp: i64,
}

pub fn issue_token(config: &AuthConfig, user_id: Uuid, admin: bool) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::hours(config.token_ttl_hours)).timestamp();
    let claims = Claims {
        sub: user_id,
        admin,
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
}

pub fn decode_token(config: &AuthConfig, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))
}

fn claims_from_request(req: &HttpRequest) -> Result<Claims, AppError> {
    let config = req
        .app_data::<web::Data<AuthConfig>>()
        .ok_or_else(|| AppError::Internal("AuthConfig not configured".to_string()))?;

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Expected Bearer token".to_string()))?;

    decode_token(config, token)
}

/// Authenticated caller. Extraction fails with 401 when the bearer token is
/// missing, malformed, or expired.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(claims_from_request(req).map(|claims| AuthUser {
            user_id: claims.sub,
            is_admin: claims.admin,
        }))
    }
}

/// Authenticated caller holding the admin claim; 403 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser {
    pub user_id: Uuid,
}

impl FromRequest for AdminUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(claims_from_request(req).and_then(|claims| {
            if claims.admin {
                Ok(AdminUser {
                    user_id: claims.sub,
                })
            } else {
                Err(AppError::Forbidden)
            }
        }))
    }
}

// ── Password hashing ─────────────────────────────────────────────────────────

pub fn hash_password(password: &str) -> Result<String, AppError> {
    if password.is_empty() {
        return Err(AppError::Validation("Password cannot be empty".to_string()));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

/// Returns `Ok(false)` on a non-matching password; errors are reserved for
/// malformed stored hashes.
pub fn verify_password(stored_hash: &str, provided: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Internal(format!("Invalid stored password hash: {e}")))?;
    match Argon2::default().verify_password(provided.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!(
            "Password verification failed: {e}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new("test-secret".to_string())
    }

    #[test]
    fn token_roundtrip_preserves_claims() {
        let cfg = config();
        let user_id = Uuid::new_v4();
        let token = issue_token(&cfg, user_id, true).expect("sign failed");
        let claims = decode_token(&cfg, &token).expect("decode failed");
        assert_eq!(claims.sub, user_id);
        assert!(claims.admin);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token(&config(), Uuid::new_v4(), false).expect("sign failed");
        let other = AuthConfig::new("other-secret".to_string());
        assert!(matches!(
            decode_token(&other, &token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(matches!(
            decode_token(&config(), "not.a.token"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let cfg = AuthConfig {
            secret: "test-secret".to_string(),
            token_ttl_hours: -1,
        };
        let token = issue_token(&cfg, Uuid::new_v4(), false).expect("sign failed");
        assert!(matches!(
            decode_token(&cfg, &token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn password_hash_and_verify() {
        let hash = hash_password("hunter2!").expect("hash failed");
        assert!(verify_password(&hash, "hunter2!").expect("verify failed"));
        assert!(!verify_password(&hash, "wrong").expect("verify failed"));
    }

    #[test]
    fn empty_password_is_rejected() {
        assert!(matches!(
            hash_password(""),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn malformed_stored_hash_errors() {
        assert!(verify_password("not-a-phc-string", "pw").is_err());
    }
}
