//! Session record Redis operations.
//!
//! Redis key patterns:
//! - `session:{token}` - session audit record (JSON, expires with the token)
//! - `identity_sessions:{pk_hash}` - tokens issued to an identity (SET)
//!
//! Records exist for audit and revocation. Token validity itself never
//! depends on them.

use crate::models::StoredSession;
use redis::AsyncCommands;
use zeroize::Zeroizing;

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

fn identity_sessions_key(pk_hash: &str) -> String {
    format!("identity_sessions:{}", pk_hash)
}

/// Store a session record until its token expires.
///
/// Also adds the token to the identity's session set.
pub async fn store_session<C>(con: &mut C, session: &StoredSession) -> Result<(), redis::RedisError>
where
    C: AsyncCommands,
{
    let ttl_secs = session.ttl_secs();
    let json = serde_json::to_string(session).map_err(|e| {
        redis::RedisError::from((
            redis::ErrorKind::UnexpectedReturnType,
            "JSON serialize",
            e.to_string(),
        ))
    })?;

    con.set_ex::<_, _, ()>(session_key(&session.token), json, ttl_secs)
        .await?;

    let set_key = identity_sessions_key(&session.pk_hash);
    con.sadd::<_, _, ()>(&set_key, &session.token).await?;
    // Keep the set alive at least as long as the newest session
    con.expire::<_, ()>(&set_key, ttl_secs as i64).await?;

    Ok(())
}

/// Get a session record by token.
pub async fn get_session<C>(
    con: &mut C,
    token: &str,
) -> Result<Option<StoredSession>, redis::RedisError>
where
    C: AsyncCommands,
{
    let json: Option<String> = con.get(session_key(token)).await?;

    match json {
        Some(data) => {
            let data = Zeroizing::new(data);
            let session = serde_json::from_str(&data).map_err(|e| {
                redis::RedisError::from((
                    redis::ErrorKind::UnexpectedReturnType,
                    "JSON deserialize",
                    e.to_string(),
                ))
            })?;
            Ok(Some(session))
        }
        None => Ok(None),
    }
}

/// Check whether a session record is still present.
pub async fn session_exists<C>(con: &mut C, token: &str) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    con.exists(session_key(token)).await
}

/// Delete a session record.
///
/// Returns true if the session existed.
pub async fn delete_session<C>(con: &mut C, token: &str) -> Result<bool, redis::RedisError>
where
    C: AsyncCommands,
{
    let Some(session) = get_session(con, token).await? else {
        return Ok(false);
    };

    let deleted: i32 = con.del(session_key(token)).await?;
    con.srem::<_, _, ()>(identity_sessions_key(&session.pk_hash), token)
        .await?;

    Ok(deleted > 0)
}

/// Delete every session issued to an identity.
///
/// Uses the `identity_sessions:{pk_hash}` set instead of scanning.
/// Returns the number of session records removed.
pub async fn delete_identity_sessions<C>(
    con: &mut C,
    pk_hash: &str,
) -> Result<usize, redis::RedisError>
where
    C: AsyncCommands,
{
    let set_key = identity_sessions_key(pk_hash);
    let tokens: Vec<String> = con.smembers(&set_key).await?;

    let mut removed = 0;
    for token in &tokens {
        let deleted: i32 = con.del(session_key(token)).await?;
        removed += deleted as usize;
    }
    con.del::<_, ()>(&set_key).await?;

    Ok(removed)
}
