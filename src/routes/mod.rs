//! API route handlers.

pub mod auth;

use crate::auth::middleware::AppState;
use crate::middleware::api_headers;
use axum::{extract::DefaultBodyLimit, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

/// Request bodies are a PEM key or a signature plus sealed challenge.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// GET /ping - Health check
pub async fn ping() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

/// Build the API router with all endpoints.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        // Auth endpoints
        .route("/auth/initiate", post(auth::initiate))
        .route("/auth/verify", post(auth::verify))
        .route("/auth/session", get(auth::session_info))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logout-all", post(auth::logout_all))
}

/// The full application: routes, body limit, CORS, and API headers.
pub fn app(state: AppState) -> Router {
    // CorsLayer::new() with no allowed origins rejects all CORS preflight requests.
    let cors = CorsLayer::new();

    api_router()
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(axum::middleware::from_fn(api_headers))
        .with_state(state)
}
