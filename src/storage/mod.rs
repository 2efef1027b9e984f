//! Identity and session storage.
//!
//! Two backends sit behind [`Store`]: Redis (free functions in
//! [`identity`] and [`session`], generic over `AsyncCommands`) and the
//! in-process [`MemoryStore`]. The auth pipeline only sees the
//! [`IdentityStore`] and [`SessionStore`] traits.

pub mod identity;
pub mod memory;
pub mod session;

pub use memory::MemoryStore;

use crate::auth::error::AuthError;
use crate::auth::session::hash_public_key;
use crate::models::{StoredIdentity, StoredSession};
use redis::aio::MultiplexedConnection;
use std::future::Future;
use std::sync::Arc;

/// Known-identity records.
pub trait IdentityStore: Send + Sync {
    /// Whether the public key has authenticated before.
    fn exists(&self, public_key: &str) -> impl Future<Output = Result<bool, AuthError>> + Send;

    /// Record the public key as known. Idempotent: repeated calls keep the
    /// first `first_seen`. Returns true if the identity was new.
    fn upsert(
        &self,
        public_key: &str,
        now: i64,
    ) -> impl Future<Output = Result<bool, AuthError>> + Send;

    fn identity(
        &self,
        pk_hash: &str,
    ) -> impl Future<Output = Result<Option<StoredIdentity>, AuthError>> + Send;
}

/// Session records, kept for audit and revocation.
pub trait SessionStore: Send + Sync {
    fn persist(&self, session: &StoredSession)
        -> impl Future<Output = Result<(), AuthError>> + Send;

    /// Whether a session record is present and unrevoked.
    fn is_active(&self, token: &str) -> impl Future<Output = Result<bool, AuthError>> + Send;

    /// Returns true if a record was removed.
    fn revoke(&self, token: &str) -> impl Future<Output = Result<bool, AuthError>> + Send;

    /// Revoke every session of an identity. Returns the number removed.
    fn revoke_all(&self, pk_hash: &str)
        -> impl Future<Output = Result<usize, AuthError>> + Send;
}

/// The configured storage backend.
#[derive(Clone)]
pub enum Store {
    Redis(redis::Client),
    Memory(Arc<MemoryStore>),
}

fn store_error(err: redis::RedisError) -> AuthError {
    AuthError::Store(err.to_string())
}

async fn connect(client: &redis::Client) -> Result<MultiplexedConnection, AuthError> {
    client
        .get_multiplexed_async_connection()
        .await
        .map_err(store_error)
}

impl Store {
    /// Count a hit against `key`. Returns true while under `max` per window.
    pub async fn check_rate_limit(
        &self,
        key: &str,
        max: u32,
        window_secs: u64,
    ) -> Result<bool, AuthError> {
        match self {
            Store::Redis(client) => {
                let mut con = connect(client).await?;
                crate::auth::middleware::check_rate_limit(&mut con, key, max, window_secs)
                    .await
                    .map_err(store_error)
            }
            Store::Memory(mem) => Ok(mem.check_rate_limit(key, max, window_secs)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Redis(_) => "redis",
            Store::Memory(_) => "memory",
        }
    }
}

impl IdentityStore for Store {
    async fn exists(&self, public_key: &str) -> Result<bool, AuthError> {
        let pk_hash = hash_public_key(public_key);
        match self {
            Store::Redis(client) => {
                let mut con = connect(client).await?;
                identity::identity_exists(&mut con, &pk_hash)
                    .await
                    .map_err(store_error)
            }
            Store::Memory(mem) => Ok(mem.identity_exists(&pk_hash)),
        }
    }

    async fn upsert(&self, public_key: &str, now: i64) -> Result<bool, AuthError> {
        let record = StoredIdentity {
            pk_hash: hash_public_key(public_key),
            public_key: public_key.to_string(),
            first_seen: now,
        };
        match self {
            Store::Redis(client) => {
                let mut con = connect(client).await?;
                identity::upsert_identity(&mut con, &record)
                    .await
                    .map_err(store_error)
            }
            Store::Memory(mem) => Ok(mem.upsert_identity(record)),
        }
    }

    async fn identity(&self, pk_hash: &str) -> Result<Option<StoredIdentity>, AuthError> {
        match self {
            Store::Redis(client) => {
                let mut con = connect(client).await?;
                identity::get_identity(&mut con, pk_hash)
                    .await
                    .map_err(store_error)
            }
            Store::Memory(mem) => Ok(mem.get_identity(pk_hash)),
        }
    }
}

impl SessionStore for Store {
    async fn persist(&self, record: &StoredSession) -> Result<(), AuthError> {
        match self {
            Store::Redis(client) => {
                let mut con = connect(client).await?;
                session::store_session(&mut con, record)
                    .await
                    .map_err(store_error)
            }
            Store::Memory(mem) => {
                mem.store_session(record.clone());
                Ok(())
            }
        }
    }

    async fn is_active(&self, token: &str) -> Result<bool, AuthError> {
        match self {
            Store::Redis(client) => {
                let mut con = connect(client).await?;
                session::session_exists(&mut con, token)
                    .await
                    .map_err(store_error)
            }
            Store::Memory(mem) => Ok(mem.session_exists(token)),
        }
    }

    async fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        match self {
            Store::Redis(client) => {
                let mut con = connect(client).await?;
                session::delete_session(&mut con, token)
                    .await
                    .map_err(store_error)
            }
            Store::Memory(mem) => Ok(mem.delete_session(token)),
        }
    }

    async fn revoke_all(&self, pk_hash: &str) -> Result<usize, AuthError> {
        match self {
            Store::Redis(client) => {
                let mut con = connect(client).await?;
                session::delete_identity_sessions(&mut con, pk_hash)
                    .await
                    .map_err(store_error)
            }
            Store::Memory(mem) => Ok(mem.delete_identity_sessions(pk_hash)),
        }
    }
}
