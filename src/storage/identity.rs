//! Known-identity Redis operations.
//!
//! Redis key patterns:
//! - `identity:{pk_hash}` - known public key (JSON, no TTL)

use crate::models::StoredIdentity;
use redis::AsyncCommands;

fn identity_key(pk_hash: &str) -> String {
    format!("identity:{}", pk_hash)
}

/// Check whether an identity has been recorded.
pub async fn identity_exists<C>(con: &mut C, pk_hash: &str) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    con.exists(identity_key(pk_hash)).await
}

/// Record an identity if it is not already known.
///
/// Uses SET NX, so repeated calls keep the first `first_seen`.
/// Returns true if the identity was new.
pub async fn upsert_identity<C>(
    con: &mut C,
    identity: &StoredIdentity,
) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let json = serde_json::to_string(identity).map_err(|e| {
        redis::RedisError::from((
            redis::ErrorKind::UnexpectedReturnType,
            "JSON serialize",
            e.to_string(),
        ))
    })?;

    con.set_nx(identity_key(&identity.pk_hash), json).await
}

/// Get a recorded identity.
pub async fn get_identity<C>(
    con: &mut C,
    pk_hash: &str,
) -> Result<Option<StoredIdentity>, redis::RedisError>
where
    C: AsyncCommands,
{
    let json: Option<String> = con.get(identity_key(pk_hash)).await?;

    match json {
        Some(data) => {
            let identity = serde_json::from_str(&data).map_err(|e| {
                redis::RedisError::from((
                    redis::ErrorKind::UnexpectedReturnType,
                    "JSON deserialize",
                    e.to_string(),
                ))
            })?;
            Ok(Some(identity))
        }
        None => Ok(None),
    }
}
