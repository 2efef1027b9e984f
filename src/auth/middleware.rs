//! Axum extractors for authentication and rate limiting.

use crate::auth::clock::Clock;
use crate::auth::error::AuthError;
use crate::auth::service::AuthService;
use crate::auth::session::SessionClaims;
use crate::config::Config;
use crate::error::AppError;
use crate::storage::Store;
use axum::{extract::FromRequestParts, http::request::Parts};
use redis::AsyncCommands;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService<Store>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, store: Store, clock: Arc<dyn Clock>) -> Self {
        let auth = AuthService::new(config.auth_settings(), store, clock);
        AppState {
            auth: Arc::new(auth),
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Store {
        self.auth.store()
    }
}

/// Authenticated session extractor.
///
/// Extracts session from `Authorization: Bearer {token}` header.
/// Returns 401 Unauthorized if missing, invalid, expired, or revoked.
pub struct AuthSession {
    pub claims: SessionClaims,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))?
            .to_string();

        let claims = state.auth.authenticate_token(&token).await?;

        Ok(AuthSession { claims, token })
    }
}

/// Check rate limit using Redis INCR with TTL.
///
/// # Arguments
/// * `con` - Redis connection
/// * `key` - Rate limit key (e.g., "ratelimit:auth:127.0.0.1")
/// * `max` - Maximum requests allowed in window
/// * `window_secs` - Time window in seconds
///
/// # Returns
/// * `Ok(true)` if under limit
/// * `Ok(false)` if limit exceeded
pub async fn check_rate_limit<C>(
    con: &mut C,
    key: &str,
    max: u32,
    window_secs: u64,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let count: u32 = con.incr(key, 1).await?;

    // Set TTL on first request
    if count == 1 {
        con.expire::<_, ()>(key, window_secs as i64).await?;
    }

    Ok(count <= max)
}

/// Count an auth request from `ip` and reject it once the per-minute limit
/// is used up. Only a hash of the address is logged.
pub async fn enforce_auth_rate_limit(
    state: &AppState,
    ip: IpAddr,
    endpoint: &'static str,
) -> Result<(), AppError> {
    let key = format!("ratelimit:auth:{}", ip);
    let allowed = state
        .store()
        .check_rate_limit(&key, state.config.rate_limit_auth_per_min, 60)
        .await
        .map_err(|e| match e {
            AuthError::Store(msg) => AppError::Internal(format!("Rate limit check failed: {}", msg)),
            other => AppError::from(other),
        })?;

    if !allowed {
        let mut hasher = std::hash::DefaultHasher::new();
        ip.hash(&mut hasher);
        let ip_hash = format!("{:x}", hasher.finish());
        tracing::warn!(action = "rate_limited", endpoint, ip_hash = %ip_hash, "Rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(())
}
