use crate::config::AuthConfig;
use crate::domain::auth::{Claims, Password, RefreshTokenRecord, hash_token_value};
use crate::domain::session::AuthSession;
use crate::domain::user::Role;
use crate::error::{AppError, Result};
use crate::storage::{RefreshTokenStore, UserDirectory};
use opentelemetry::{global, metrics::Counter};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
struct Metrics {
    login_total: Counter<u64>,
    refresh_total: Counter<u64>,
    logout_total: Counter<u64>,
    replay_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("clearwell-server");
        Self {
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Total number of successful logins")
                .build(),
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Total number of successful token rotations")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Total number of logout requests")
                .build(),
            replay_total: meter
                .u64_counter("auth_refresh_replay_total")
                .with_description("Refresh attempts with a well-signed token that had no store record")
                .build(),
        }
    }
}

/// Session issuer, rotation protocol and revocation service in one place.
/// Stateless between calls; the refresh token store is the only shared
/// mutable resource it touches.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    users: Arc<dyn UserDirectory>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    metrics: Metrics,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserDirectory>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        Self { config, users, refresh_tokens, metrics: Metrics::new() }
    }

    #[tracing::instrument(
        skip(self, username, password),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn login(&self, username: String, password: String) -> Result<AuthSession> {
        let Some(user) = self.users.find_by_username(&username).await? else {
            tracing::warn!("Login failed: user not found");
            // Same error as a bad password, to avoid username enumeration.
            return Err(AppError::InvalidCredentials);
        };

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        let is_valid = self.verify_password(&password, &user.password_hash).await?;
        if !is_valid {
            tracing::warn!("Login failed: invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let session = self.create_session(user.id, user.role).await?;
        self.metrics.login_total.add(1, &[]);
        Ok(session)
    }

    #[tracing::instrument(skip(self, username, password), err(level = "warn"))]
    pub async fn register(&self, username: String, password: String) -> Result<AuthSession> {
        let password_hash = self.hash_password(&password).await?;
        let user = self.users.create(&username, &password_hash, Role::User).await?;

        tracing::info!(user_id = %user.id, "User registered");
        let session = self.create_session(user.id, user.role).await?;
        self.metrics.login_total.add(1, &[]);
        Ok(session)
    }

    /// Mints an access/refresh pair and persists the refresh record.
    /// One new record per call; concurrent sessions per user are unlimited.
    #[tracing::instrument(err, skip(self), fields(user_id = %user_id))]
    pub async fn create_session(&self, user_id: Uuid, role: Role) -> Result<AuthSession> {
        let access_claims = Claims::new(user_id, role, self.config.access_token_ttl_secs);
        let token = access_claims.encode(&self.config.jwt_secret)?;

        let refresh_ttl_secs = self.config.refresh_token_ttl_days.max(0) as u64 * 86_400;
        let refresh_claims = Claims::new(user_id, role, refresh_ttl_secs);
        let refresh_token = refresh_claims.encode(&self.config.jwt_refresh_secret)?;

        let record = RefreshTokenRecord::from_claims(&refresh_token, &refresh_claims);
        self.refresh_tokens.insert(&record).await?;

        Ok(AuthSession {
            user_id,
            token,
            refresh_token,
            expires_at: access_claims.exp as i64,
        })
    }

    /// Rotates a refresh token: one successful exchange per token value, ever.
    ///
    /// The presented token is verified by signature and expiry first, then
    /// atomically consumed from the store. A well-signed, unexpired token
    /// with no store record has necessarily been rotated or revoked before:
    /// that is a replay and is refused.
    #[tracing::instrument(err, skip(self, refresh_token), fields(user_id = tracing::field::Empty))]
    pub async fn refresh_session(&self, refresh_token: String) -> Result<AuthSession> {
        let claims = Claims::decode(&refresh_token, &self.config.jwt_refresh_secret)?;
        tracing::Span::current().record("user_id", tracing::field::display(claims.sub));

        let token_hash = hash_token_value(&refresh_token);

        // The consume is the linearization point: the token is unusable the
        // instant it is found, before any replacement exists.
        let Some(owner) = self.refresh_tokens.consume(&token_hash).await? else {
            self.metrics.replay_total.add(1, &[]);
            tracing::warn!("Refresh token replay detected: valid signature, no store record");
            return Err(AppError::TokenReused);
        };

        let session = self.create_session(owner, claims.role).await?;

        tracing::info!("Tokens rotated successfully");
        self.metrics.refresh_total.add(1, &[]);
        Ok(session)
    }

    /// Revokes a single refresh record. Lenient by contract: a malformed,
    /// expired or unknown token still logs out successfully, so the caller
    /// can always clear its cookies. A stray record is the reaper's problem.
    #[tracing::instrument(skip(self, refresh_token))]
    pub async fn logout(&self, refresh_token: Option<String>) -> Result<()> {
        if let Some(token) = refresh_token {
            if let Err(e) = Claims::decode(&token, &self.config.jwt_refresh_secret) {
                tracing::debug!(error = %e, "Logout with unverifiable refresh token");
            }

            let token_hash = hash_token_value(&token);
            match self.refresh_tokens.delete(&token_hash).await {
                Ok(true) => tracing::debug!("Refresh token revoked"),
                Ok(false) => tracing::debug!("Logout had no matching refresh record"),
                Err(e) => tracing::warn!(error = %e, "Logout could not revoke refresh record"),
            }
        }

        self.metrics.logout_total.add(1, &[]);
        Ok(())
    }

    /// Revokes every refresh record for a subject. The subject id comes from
    /// an authenticated context, never from the token being revoked.
    #[tracing::instrument(err, skip(self), fields(user_id = %user_id))]
    pub async fn logout_all(&self, user_id: Uuid) -> Result<u64> {
        let revoked = self.refresh_tokens.delete_all_for_user(user_id).await?;
        tracing::info!(count = %revoked, "All sessions revoked");
        self.metrics.logout_total.add(1, &[]);
        Ok(revoked)
    }

    /// Changes the subject's password and revokes every outstanding refresh
    /// record, so no old session can keep minting access tokens. Unexpired
    /// access tokens keep working until their own expiry; they are not
    /// individually revocable.
    #[tracing::instrument(err(level = "warn"), skip(self, current_password, new_password), fields(user_id = %user_id))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: String,
        new_password: String,
    ) -> Result<()> {
        let user = self.users.find_by_id(user_id).await?.ok_or(AppError::NotFound)?;

        let is_valid = self.verify_password(&current_password, &user.password_hash).await?;
        if !is_valid {
            tracing::warn!("Password change rejected: current password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        let new_hash = self.hash_password(&new_password).await?;
        self.users.set_password_hash(user_id, &new_hash).await?;

        let revoked = self.logout_all(user_id).await?;
        tracing::info!(revoked = %revoked, "Password changed, sessions invalidated");
        Ok(())
    }

    /// Verifies an access token and returns its claims.
    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        Claims::decode(token, &self.config.jwt_secret)
    }

    #[tracing::instrument(err, skip(self, password))]
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || Password::hash(&password))
            .await
            .map_err(|_| AppError::Internal)?
    }

    #[tracing::instrument(err, skip(self, password, password_hash))]
    pub async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || Password::verify(&password, &password_hash))
            .await
            .map_err(|_| AppError::Internal)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryRefreshTokenStore, MemoryUserDirectory};

    fn setup_service() -> AuthService {
        let config = AuthConfig {
            jwt_secret: "access_secret".to_string(),
            jwt_refresh_secret: "refresh_secret".to_string(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_days: 7,
            cookie_secure: false,
        };
        AuthService::new(
            config,
            Arc::new(MemoryUserDirectory::new()),
            Arc::new(MemoryRefreshTokenStore::new()),
        )
    }

    #[tokio::test]
    async fn test_access_token_roundtrip() {
        let service = setup_service();
        let user_id = Uuid::new_v4();

        let session = service.create_session(user_id, Role::User).await.unwrap();
        let claims = service.verify_access_token(&session.token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::User);
    }

    #[tokio::test]
    async fn test_token_families_do_not_cross_verify() {
        let service = setup_service();
        let session = service.create_session(Uuid::new_v4(), Role::Admin).await.unwrap();

        // The refresh token must not pass as an access token and vice versa.
        assert!(matches!(
            service.verify_access_token(&session.refresh_token),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            Claims::decode(&session.token, "refresh_secret"),
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_password_hashing() {
        let service = setup_service();
        let password = "password12345";
        let hash = service.hash_password(password).await.unwrap();

        assert!(service.verify_password(password, &hash).await.unwrap());
        assert!(!service.verify_password("wrong_password", &hash).await.unwrap());
    }
}
