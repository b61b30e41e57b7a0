//! Token issuance and verification.

use chrono::{Duration, Utc};
use enquete_common::{AppError, AppResult, Config};
use enquete_db::entities::user::{self, UserRole};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    /// Username at issuance time.
    pub username: String,
    /// Role at issuance time.
    pub role: UserRole,
    /// Expiry (seconds since epoch).
    pub exp: i64,
}

impl Claims {
    /// The authenticated user's ID.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

/// Auth service issuing and verifying JWTs.
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
}

impl AuthService {
    /// Create a new auth service from configuration.
    pub fn new(config: &Config) -> AppResult<Self> {
        let token_ttl = parse_expiry(&config.auth.jwt_expires_in).ok_or_else(|| {
            AppError::Config(format!(
                "invalid auth.jwt_expires_in: {}",
                config.auth.jwt_expires_in
            ))
        })?;

        let secret = config.auth.jwt_secret.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            token_ttl,
        })
    }

    /// Issue a token for a user.
    pub fn issue(&self, user: &user::Model) -> AppResult<String> {
        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            exp: (Utc::now() + self.token_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a bearer token and return its claims.
    ///
    /// An expired token is a 401 (the client should log in again); any other
    /// defect (bad signature, malformed) is a 403.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Token expired, please log in again".to_string())
                }
                _ => AppError::Forbidden("Invalid token".to_string()),
            })
    }
}

/// Parse a token lifetime: plain seconds, or a number with an s/m/h/d
/// suffix (`3600`, `45s`, `15m`, `12h`, `1d`).
#[must_use]
pub fn parse_expiry(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let (number, unit) = match value.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&value[..idx], Some(c)),
        _ => (value, None),
    };

    let amount: i64 = number.parse().ok().filter(|n| *n > 0)?;

    match unit {
        None | Some('s') => Some(Duration::seconds(amount)),
        Some('m') => Some(Duration::minutes(amount)),
        Some('h') => Some(Duration::hours(amount)),
        Some('d') => Some(Duration::days(amount)),
        _ => None,
    }
}
