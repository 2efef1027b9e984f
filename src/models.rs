//! Request and response models for the API.
//!
//! Wire field names are fixed by existing device clients.
//! Storage models represent Redis / in-memory records.

use serde::{Deserialize, Serialize};

// ============================================================================
// Auth Models
// ============================================================================

/// Request to start authentication.
#[derive(Debug, Deserialize)]
pub struct InitiateRequest {
    pub public_key: String, // PEM
}

/// Nonce to sign plus the opaque sealed challenge.
#[derive(Debug, Serialize)]
pub struct InitiateResponse {
    pub challenge: String, // 64 hex chars
    pub key_data: String,  // base64url
}

/// Request to complete authentication.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub signed_challenge: String, // base64url
    pub key_data: String,         // base64url, as returned by initiate
}

/// Response after successful verification.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub message: String,
    pub session_token: String,
}

/// Claims of the presented session token.
#[derive(Debug, Serialize)]
pub struct SessionInfoResponse {
    pub pk_hash: String,
    pub expires_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>, // PEM, when the identity record exists
}

/// Result of revoking every session of an identity.
#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    pub revoked: usize,
}

// ============================================================================
// Storage Models
// ============================================================================

/// A public key that has completed authentication at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIdentity {
    pub pk_hash: String,
    pub public_key: String,
    pub first_seen: i64,
}

/// Audit record of an issued session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub pk_hash: String,
    pub created_at: i64,
    pub expires_at: i64,
}

impl StoredSession {
    /// Seconds the record should be retained, at least one.
    pub fn ttl_secs(&self) -> u64 {
        (self.expires_at - self.created_at).max(1) as u64
    }
}
