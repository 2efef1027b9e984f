//! Auth API endpoints.

use crate::auth::challenge::DELIMITER;
use crate::auth::middleware::{enforce_auth_rate_limit, AppState, AuthSession};
use crate::error::AppError;
use crate::models::{
    InitiateRequest, InitiateResponse, LogoutAllResponse, SessionInfoResponse, VerifyRequest,
    VerifyResponse,
};
use crate::storage::IdentityStore;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::net::SocketAddr;

/// POST /auth/initiate - Issue a challenge for a public key
pub async fn initiate(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<InitiateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    enforce_auth_rate_limit(&state, addr.ip(), "auth/initiate").await?;

    let Json(req) = payload?;

    if req.public_key.trim().is_empty() {
        return Err(AppError::BadRequest("public_key is required".to_string()));
    }
    // The delimiter would split the sealed challenge into extra fields
    if req.public_key.contains(DELIMITER) {
        return Err(AppError::BadRequest(
            "public_key contains an invalid character".to_string(),
        ));
    }

    let issued = state.auth.initiate_challenge(&req.public_key).await?;

    Ok(Json(InitiateResponse {
        challenge: issued.nonce_hex,
        key_data: issued.sealed,
    }))
}

/// POST /auth/verify - Verify a signed challenge and issue a session token
pub async fn verify(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    enforce_auth_rate_limit(&state, addr.ip(), "auth/verify").await?;

    let Json(req) = payload?;

    let minted = state
        .auth
        .complete_auth(&req.signed_challenge, &req.key_data)
        .await?;

    Ok(Json(VerifyResponse {
        message: "Authentication successful".to_string(),
        session_token: minted.token,
    }))
}

/// GET /auth/session - Describe the presented session
pub async fn session_info(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.store().identity(&session.claims.pk_hash).await?;

    Ok(Json(SessionInfoResponse {
        pk_hash: session.claims.pk_hash,
        expires_at: session.claims.exp,
        public_key: identity.map(|i| i.public_key),
    }))
}

/// POST /auth/logout - Revoke the presented session
pub async fn logout(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.revoke(&session.token).await?;

    tracing::info!(action = "logout", pk_hash = %session.claims.pk_hash, "Session revoked");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /auth/logout-all - Revoke every session of the presented identity
pub async fn logout_all(
    session: AuthSession,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let revoked = state.auth.revoke_all(&session.claims.pk_hash).await?;

    tracing::info!(action = "logout_all", pk_hash = %session.claims.pk_hash, revoked, "All sessions revoked");

    Ok(Json(LogoutAllResponse { revoked }))
}
