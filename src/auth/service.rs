//! The authentication pipeline: issue a challenge, verify its signature,
//! mint a session.
//!
//! `AuthService` owns the server-side pieces (sealer, minter, clock) and
//! talks to storage only through [`IdentityStore`] and [`SessionStore`].
//! A request that fails before the signature check touches no store.

use crate::auth::challenge::{ChallengeIssuer, IssuedChallenge};
use crate::auth::clock::Clock;
use crate::auth::codec::{self, ChallengeSealer, ServerSecret, XorSealer};
use crate::auth::error::AuthError;
use crate::auth::session::{hash_public_key, MintedSession, SessionClaims, SessionMinter};
use crate::auth::verify::verify_signature;
use crate::models::StoredSession;
use crate::storage::{IdentityStore, SessionStore};
use std::sync::Arc;

pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 60;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 600;

/// Secret and lifetimes the service is built from.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub secret: ServerSecret,
    pub challenge_ttl_secs: u64,
    pub session_ttl_secs: u64,
}

impl AuthSettings {
    pub fn new(secret: ServerSecret) -> Self {
        AuthSettings {
            secret,
            challenge_ttl_secs: DEFAULT_CHALLENGE_TTL_SECS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

pub struct AuthService<S> {
    issuer: ChallengeIssuer,
    minter: SessionMinter,
    challenge_ttl_secs: u64,
    clock: Arc<dyn Clock>,
    store: S,
}

impl<S> AuthService<S>
where
    S: IdentityStore + SessionStore,
{
    /// Build a service that seals challenges with the XOR keystream.
    pub fn new(settings: AuthSettings, store: S, clock: Arc<dyn Clock>) -> Self {
        let sealer = Arc::new(XorSealer::new(settings.secret.clone()));
        Self::with_sealer(settings, sealer, store, clock)
    }

    pub fn with_sealer(
        settings: AuthSettings,
        sealer: Arc<dyn ChallengeSealer>,
        store: S,
        clock: Arc<dyn Clock>,
    ) -> Self {
        AuthService {
            issuer: ChallengeIssuer::new(sealer),
            minter: SessionMinter::new(settings.secret, settings.session_ttl_secs),
            challenge_ttl_secs: settings.challenge_ttl_secs,
            clock,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> i64 {
        self.clock.now_unix()
    }

    /// Issue a challenge for `public_key`.
    ///
    /// Whether the key is already known is logged and otherwise ignored; a
    /// failing identity lookup never blocks issuance.
    pub async fn initiate_challenge(&self, public_key: &str) -> Result<IssuedChallenge, AuthError> {
        let issued = self.issuer.issue(public_key, self.now())?;

        let pk_hash = hash_public_key(public_key);
        match self.store.exists(public_key).await {
            Ok(known) => {
                tracing::info!(
                    action = "challenge_issued",
                    pk_hash = %pk_hash,
                    nonce_prefix = %&issued.nonce_hex[..8],
                    known,
                    "Challenge issued"
                );
            }
            Err(e) => {
                tracing::warn!(
                    action = "challenge_issued",
                    pk_hash = %pk_hash,
                    error = %e,
                    "Challenge issued; identity lookup failed"
                );
            }
        }

        Ok(issued)
    }

    /// Verify a signed challenge and mint a session for its public key.
    ///
    /// On success the identity is upserted and the session recorded.
    ///
    /// Nothing is written until the signature verifies. If recording the
    /// session fails after the upsert, the identity stays known and the
    /// request fails with `Store`; a retry then upserts as a no-op.
    pub async fn complete_auth(
        &self,
        signature_encoded: &str,
        sealed_challenge: &str,
    ) -> Result<MintedSession, AuthError> {
        let now = self.now();

        let challenge = self.issuer.open(sealed_challenge)?;
        challenge.check_fresh(self.challenge_ttl_secs, now)?;

        let signature =
            codec::decode(signature_encoded).map_err(|_| AuthError::InvalidSignatureEncoding)?;

        if let Err(e) = verify_signature(&challenge.public_key, &challenge.nonce_hex, &signature) {
            tracing::warn!(
                action = "auth_failed",
                pk_hash = %hash_public_key(&challenge.public_key),
                error = %e,
                "Signature rejected"
            );
            return Err(e);
        }

        let new_identity = self.store.upsert(&challenge.public_key, now).await?;

        let minted = self.minter.mint(&challenge.public_key, now);
        self.store
            .persist(&StoredSession {
                token: minted.token.clone(),
                pk_hash: minted.claims.pk_hash.clone(),
                created_at: now,
                expires_at: minted.claims.exp,
            })
            .await?;

        tracing::info!(
            action = "auth_success",
            pk_hash = %minted.claims.pk_hash,
            expires_at = minted.claims.exp,
            new_identity,
            "Session issued"
        );

        Ok(minted)
    }

    /// Stateless check of a token's digest and expiry.
    pub fn validate_token(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.minter.validate(token, self.now())
    }

    /// Validate a token and require its session record to still be active.
    pub async fn authenticate_token(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let claims = self.validate_token(token)?;
        if !self.store.is_active(token).await? {
            return Err(AuthError::SessionRevoked);
        }
        Ok(claims)
    }

    /// Revoke one session. Returns true if a record was removed.
    pub async fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        self.store.revoke(token).await
    }

    /// Revoke every session of an identity.
    pub async fn revoke_all(&self, pk_hash: &str) -> Result<usize, AuthError> {
        self.store.revoke_all(pk_hash).await
    }
}
