use crate::auth::codec::ServerSecret;
use crate::auth::service::{AuthSettings, DEFAULT_CHALLENGE_TTL_SECS, DEFAULT_SESSION_TTL_SECS};
use std::env;
use std::net::SocketAddr;

#[derive(Clone)]
pub struct Config {
    // Shared secret for sealing challenges and signing session tokens
    pub secret: ServerSecret,

    // Storage: Redis when set, in-memory otherwise
    pub redis_url: Option<String>,

    // Server
    pub bind_addr: SocketAddr,

    // TTLs (in seconds)
    pub challenge_ttl_secs: u64,
    pub session_ttl_secs: u64,

    // Rate limiting
    pub rate_limit_auth_per_min: u32,

    // In-memory session sweep interval (in seconds)
    pub session_sweep_secs: u64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("secret", &"[REDACTED]")
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("bind_addr", &self.bind_addr)
            .field("challenge_ttl_secs", &self.challenge_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("rate_limit_auth_per_min", &self.rate_limit_auth_per_min)
            .field("session_sweep_secs", &self.session_sweep_secs)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        let secret =
            env::var("APP_SECRET").map_err(|_| ConfigError::MissingVar("APP_SECRET".to_string()))?;
        let secret = ServerSecret::new(secret).map_err(|_| {
            ConfigError::InvalidValue("APP_SECRET".to_string(), "cannot be empty".to_string())
        })?;

        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        let challenge_ttl_secs =
            parse_positive_or_default("CHALLENGE_TTL_SECS", DEFAULT_CHALLENGE_TTL_SECS)?;
        let session_ttl_secs =
            parse_positive_or_default("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;

        let rate_limit_auth_per_min = parse_env_or_default("RATE_LIMIT_AUTH_PER_MIN", 30)?;

        let session_sweep_secs = parse_positive_or_default("SESSION_SWEEP_SECS", 60)?;

        Ok(Config {
            secret,
            redis_url,
            bind_addr,
            challenge_ttl_secs,
            session_ttl_secs,
            rate_limit_auth_per_min,
            session_sweep_secs,
        })
    }

    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            secret: self.secret.clone(),
            challenge_ttl_secs: self.challenge_ttl_secs,
            session_ttl_secs: self.session_ttl_secs,
        }
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

/// Like [`parse_env_or_default`], but zero is rejected, and so is anything
/// that cannot be added to a signed unix timestamp.
fn parse_positive_or_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = parse_env_or_default(key, default)?;
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    if i64::try_from(value).is_err() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be at most {}", i64::MAX),
        ));
    }
    Ok(value)
}
