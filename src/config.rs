use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "CLEARWELL_DATABASE_URL")]
    pub database_url: String,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub cleanup: CleanupConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "CLEARWELL_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "CLEARWELL_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Seconds to wait for background tasks during shutdown
    #[arg(long, env = "CLEARWELL_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for access token signing
    #[arg(long, env = "CLEARWELL_JWT_SECRET")]
    pub jwt_secret: String,

    /// Secret key for refresh token signing (must differ from the access secret)
    #[arg(long, env = "CLEARWELL_JWT_REFRESH_SECRET")]
    pub jwt_refresh_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long, env = "CLEARWELL_ACCESS_TOKEN_TTL_SECS", default_value_t = 900)]
    pub access_token_ttl_secs: u64,

    /// Refresh token time-to-live in days
    #[arg(long, env = "CLEARWELL_REFRESH_TOKEN_TTL_DAYS", default_value_t = 7)]
    pub refresh_token_ttl_days: i64,

    /// Mark session cookies Secure with SameSite=None (enable behind TLS)
    #[arg(long, env = "CLEARWELL_COOKIE_SECURE", default_value_t = false)]
    pub cookie_secure: bool,
}

#[derive(Clone, Debug, Args)]
pub struct CleanupConfig {
    /// How often to sweep expired refresh tokens, in seconds (0 disables)
    #[arg(long, env = "CLEARWELL_CLEANUP_INTERVAL_SECS", default_value_t = 86_400)]
    pub cleanup_interval_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP endpoint for traces and metrics (disabled when unset)
    #[arg(long, env = "CLEARWELL_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "CLEARWELL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
