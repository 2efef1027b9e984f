//! In-process store for single-node deployments and tests.
//!
//! Unlike Redis there is no native key expiry: expired session records and
//! stale rate-limit windows are dropped by [`MemoryStore::purge_expired`],
//! which the cleanup loop calls periodically.

use crate::auth::clock::Clock;
use crate::models::{StoredIdentity, StoredSession};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    resets_at: i64,
}

pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    identities: Mutex<HashMap<String, StoredIdentity>>,
    sessions: Mutex<HashMap<String, StoredSession>>,
    identity_sessions: Mutex<HashMap<String, HashSet<String>>>,
    rate_limits: Mutex<HashMap<String, RateWindow>>,
}

/// Lock a map, recovering from poison: every update below is a single insert
/// or remove, so a panicking holder cannot leave it half-written.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryStore {
            clock,
            identities: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            identity_sessions: Mutex::new(HashMap::new()),
            rate_limits: Mutex::new(HashMap::new()),
        }
    }

    pub fn identity_exists(&self, pk_hash: &str) -> bool {
        lock(&self.identities).contains_key(pk_hash)
    }

    /// Insert if absent. Returns true if the identity was new.
    pub fn upsert_identity(&self, identity: StoredIdentity) -> bool {
        let mut identities = lock(&self.identities);
        if identities.contains_key(&identity.pk_hash) {
            return false;
        }
        identities.insert(identity.pk_hash.clone(), identity);
        true
    }

    pub fn get_identity(&self, pk_hash: &str) -> Option<StoredIdentity> {
        lock(&self.identities).get(pk_hash).cloned()
    }

    pub fn store_session(&self, session: StoredSession) {
        lock(&self.identity_sessions)
            .entry(session.pk_hash.clone())
            .or_default()
            .insert(session.token.clone());
        lock(&self.sessions).insert(session.token.clone(), session);
    }

    /// Present and not past expiry.
    pub fn session_exists(&self, token: &str) -> bool {
        let now = self.clock.now_unix();
        lock(&self.sessions)
            .get(token)
            .is_some_and(|s| now <= s.expires_at)
    }

    pub fn delete_session(&self, token: &str) -> bool {
        let Some(session) = lock(&self.sessions).remove(token) else {
            return false;
        };
        let mut identity_sessions = lock(&self.identity_sessions);
        if let Some(tokens) = identity_sessions.get_mut(&session.pk_hash) {
            tokens.remove(token);
            if tokens.is_empty() {
                identity_sessions.remove(&session.pk_hash);
            }
        }
        true
    }

    /// Returns the number of session records removed.
    pub fn delete_identity_sessions(&self, pk_hash: &str) -> usize {
        let tokens = lock(&self.identity_sessions)
            .remove(pk_hash)
            .unwrap_or_default();
        let mut sessions = lock(&self.sessions);
        tokens
            .iter()
            .filter(|token| sessions.remove(*token).is_some())
            .count()
    }

    /// Fixed-window counter. Returns true while under `max` for the window.
    pub fn check_rate_limit(&self, key: &str, max: u32, window_secs: u64) -> bool {
        let now = self.clock.now_unix();
        let mut windows = lock(&self.rate_limits);
        let window = windows.entry(key.to_string()).or_insert(RateWindow {
            count: 0,
            resets_at: now + window_secs as i64,
        });
        if now >= window.resets_at {
            *window = RateWindow {
                count: 0,
                resets_at: now + window_secs as i64,
            };
        }
        window.count += 1;
        window.count <= max
    }

    /// Drop expired sessions and finished rate-limit windows.
    ///
    /// Returns the number of session records removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_unix();

        lock(&self.rate_limits).retain(|_, w| now < w.resets_at);

        let expired: Vec<StoredSession> = {
            let mut sessions = lock(&self.sessions);
            let expired: Vec<StoredSession> = sessions
                .values()
                .filter(|s| now > s.expires_at)
                .cloned()
                .collect();
            for session in &expired {
                sessions.remove(&session.token);
            }
            expired
        };

        let mut identity_sessions = lock(&self.identity_sessions);
        for session in &expired {
            if let Some(tokens) = identity_sessions.get_mut(&session.pk_hash) {
                tokens.remove(&session.token);
                if tokens.is_empty() {
                    identity_sessions.remove(&session.pk_hash);
                }
            }
        }

        expired.len()
    }

    pub fn identity_count(&self) -> usize {
        lock(&self.identities).len()
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;

    fn store() -> (Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new(1_000));
        (clock.clone(), MemoryStore::new(clock))
    }

    fn identity(pk_hash: &str, first_seen: i64) -> StoredIdentity {
        StoredIdentity {
            pk_hash: pk_hash.to_string(),
            public_key: format!("pem-{}", pk_hash),
            first_seen,
        }
    }

    fn session(token: &str, pk_hash: &str, expires_at: i64) -> StoredSession {
        StoredSession {
            token: token.to_string(),
            pk_hash: pk_hash.to_string(),
            created_at: 1_000,
            expires_at,
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (_, store) = store();
        assert!(store.upsert_identity(identity("h1", 1)));
        assert!(!store.upsert_identity(identity("h1", 2)));
        assert_eq!(store.identity_count(), 1);
        assert_eq!(store.get_identity("h1").unwrap().first_seen, 1);
        assert!(store.identity_exists("h1"));
        assert!(!store.identity_exists("h2"));
    }

    #[test]
    fn test_session_lifecycle() {
        let (clock, store) = store();
        store.store_session(session("t1", "h1", 1_600));
        assert!(store.session_exists("t1"));

        clock.set(1_601);
        assert!(!store.session_exists("t1"));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_delete_session() {
        let (_, store) = store();
        store.store_session(session("t1", "h1", 1_600));
        assert!(store.delete_session("t1"));
        assert!(!store.delete_session("t1"));
        assert!(!store.session_exists("t1"));
    }

    #[test]
    fn test_delete_last_session_drops_index_entry() {
        let (_, store) = store();
        store.store_session(session("t1", "h1", 1_600));
        store.store_session(session("t2", "h1", 1_600));

        assert!(store.delete_session("t1"));
        assert!(lock(&store.identity_sessions).contains_key("h1"));

        assert!(store.delete_session("t2"));
        assert!(lock(&store.identity_sessions).is_empty());
    }

    #[test]
    fn test_delete_identity_sessions() {
        let (_, store) = store();
        store.store_session(session("t1", "h1", 1_600));
        store.store_session(session("t2", "h1", 1_600));
        store.store_session(session("t3", "h2", 1_600));

        assert_eq!(store.delete_identity_sessions("h1"), 2);
        assert!(!store.session_exists("t1"));
        assert!(!store.session_exists("t2"));
        assert!(store.session_exists("t3"));
        assert_eq!(store.delete_identity_sessions("h1"), 0);
    }

    #[test]
    fn test_rate_limit_window() {
        let (clock, store) = store();
        for _ in 0..3 {
            assert!(store.check_rate_limit("ip", 3, 60));
        }
        assert!(!store.check_rate_limit("ip", 3, 60));
        assert!(store.check_rate_limit("other-ip", 3, 60));

        clock.advance(60);
        assert!(store.check_rate_limit("ip", 3, 60));
    }

    #[test]
    fn test_purge_drops_finished_windows() {
        let (clock, store) = store();
        assert!(store.check_rate_limit("ip", 1, 60));
        assert!(!store.check_rate_limit("ip", 1, 60));

        clock.advance(61);
        store.purge_expired();
        assert!(store.check_rate_limit("ip", 1, 60));
    }
}
