use clearwell_server::config::AuthConfig;
use clearwell_server::domain::session::AuthSession;
use clearwell_server::services::AuthService;
use clearwell_server::storage::memory::{MemoryRefreshTokenStore, MemoryUserDirectory};
use std::sync::{Arc, Once};

pub const ACCESS_SECRET: &str = "test_access_secret";
pub const REFRESH_SECRET: &str = "test_refresh_secret";
pub const PASSWORD: &str = "password123";

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("clearwell_server=debug".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: ACCESS_SECRET.to_string(),
        jwt_refresh_secret: REFRESH_SECRET.to_string(),
        access_token_ttl_secs: 900,
        refresh_token_ttl_days: 7,
        cookie_secure: false,
    }
}

/// Auth service wired to in-memory stores, with direct handles kept so tests
/// can inspect and seed store state.
pub struct TestHarness {
    pub service: AuthService,
    pub users: Arc<MemoryUserDirectory>,
    pub store: Arc<MemoryRefreshTokenStore>,
}

pub fn setup() -> TestHarness {
    setup_tracing();

    let users = Arc::new(MemoryUserDirectory::new());
    let store = Arc::new(MemoryRefreshTokenStore::new());
    let service = AuthService::new(test_auth_config(), users.clone(), store.clone());

    TestHarness { service, users, store }
}

impl TestHarness {
    #[allow(dead_code)]
    pub async fn signup(&self, username: &str) -> AuthSession {
        self.service
            .register(username.to_string(), PASSWORD.to_string())
            .await
            .expect("registration should succeed")
    }
}
