use crate::domain::user::Role;
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use uuid::Uuid;

/// Signed token payload shared by the access and refresh token families.
/// The two families are told apart only by which secret verifies them.
///
/// `jti` makes every minted token a distinct string, even for the same
/// subject within the same second; the store is keyed by token value, so
/// collisions would silently merge sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
    pub jti: Uuid,
}

impl Claims {
    #[must_use]
    pub fn new(user_id: Uuid, role: Role, ttl_secs: u64) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(std::time::Duration::from_secs(0))
            .as_secs() as usize;

        Self {
            sub: user_id,
            role,
            iat: now,
            exp: now + ttl_secs as usize,
            jti: Uuid::new_v4(),
        }
    }

    pub fn encode(&self, secret: &str) -> Result<String> {
        encode(&Header::default(), self, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|_| AppError::Internal)
    }

    /// Decodes and verifies a token with zero expiry leeway.
    ///
    /// An expired-but-legitimate token yields `TokenExpired` (clean re-login);
    /// anything else wrong with it yields `InvalidToken`.
    pub fn decode(token: &str, secret: &str) -> Result<Self> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let token_data =
            decode::<Self>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
                .map_err(|e| match e.kind() {
                    ErrorKind::ExpiredSignature => AppError::TokenExpired,
                    _ => AppError::InvalidToken,
                })?;

        Ok(token_data.claims)
    }

    #[must_use]
    pub fn expires_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.exp as i64)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    #[must_use]
    pub fn issued_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.iat as i64)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

/// Persisted form of a refresh token. Presence in the store IS validity:
/// consumption, revocation and reaping all delete the row outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl RefreshTokenRecord {
    /// Derives the record from the signed claims so the persisted expiry can
    /// never disagree with the one embedded in the token.
    #[must_use]
    pub fn from_claims(token: &str, claims: &Claims) -> Self {
        Self {
            token_hash: hash_token_value(token),
            user_id: claims.sub,
            created_at: claims.issued_at(),
            expires_at: claims.expires_at(),
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at < OffsetDateTime::now_utc()
    }
}

/// SHA-256 hash of a token value, hex encoded. The raw bearer string never
/// rests in the database; stores are keyed by this hash.
#[must_use]
pub fn hash_token_value(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug)]
pub struct Password;

impl Password {
    pub fn hash(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash =
            argon2.hash_password(password.as_bytes(), &salt).map_err(|_| AppError::Internal)?.to_string();
        Ok(password_hash)
    }

    pub fn verify(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AppError::Internal)?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }
}
